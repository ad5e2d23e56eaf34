//! 규칙 함수 -- 규칙 표현식에서 호출하는 이름 붙은 함수
//!
//! 각 함수는 [`FunctionDescriptor`]로 이름, 순수성(pure), 파라미터를 선언합니다.
//! 인자는 호출 전에 평가되고, 기본값이 적용되고, 타입이 검사된 뒤
//! [`FunctionArgs`]로 전달됩니다.
//!
//! [`FunctionRegistry`]는 이름 -> 함수 테이블입니다. 한 번 구성한 뒤
//! `Arc`로 공유하며 이후에는 변경하지 않습니다. 상태 컴파일러가 이 테이블로
//! 규칙 표현식을 해석합니다.

pub mod builtin;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sieve_core::value::{Value, ValueKind};

use crate::context::EvaluationContext;
use crate::error::{EvalError, PipelineError};

/// 규칙 함수
///
/// 순수 함수(`pure`)는 메시지를 변경하거나 메시지를 합성하지 않아야 합니다.
pub trait Function: Send + Sync {
    /// 함수 선언
    fn descriptor(&self) -> &FunctionDescriptor;

    /// 함수를 실행합니다. `None`은 null 결과입니다.
    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError>;
}

/// 파라미터 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Any,
    String,
    Long,
    Double,
    /// `Long` 또는 `Double`
    Number,
    Bool,
    Timestamp,
    List,
    Map,
}

impl ParamKind {
    /// 값이 이 타입을 만족하는지 확인합니다.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Number => value.is_number(),
            Self::String => value.kind() == ValueKind::String,
            Self::Long => value.kind() == ValueKind::Long,
            Self::Double => value.kind() == ValueKind::Double,
            Self::Bool => value.kind() == ValueKind::Bool,
            Self::Timestamp => value.kind() == ValueKind::Timestamp,
            Self::List => value.kind() == ValueKind::List,
            Self::Map => value.kind() == ValueKind::Map,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Long => "long",
            Self::Double => "double",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
            Self::List => "list",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

/// 파라미터 선언
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub kind: ParamKind,
    pub optional: bool,
    pub default: Option<Value>,
}

impl ParameterDescriptor {
    /// 필수 파라미터
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            default: None,
        }
    }

    /// 선택 파라미터 (기본값 없음)
    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            optional: true,
            ..Self::required(name, kind)
        }
    }

    /// 기본값을 지정합니다. 기본값이 있으면 선택 파라미터가 됩니다.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.optional = true;
        self.default = Some(default.into());
        self
    }
}

/// 함수 선언
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub pure: bool,
    pub params: Vec<ParameterDescriptor>,
}

impl FunctionDescriptor {
    /// 부수 효과가 있는 함수 선언을 만듭니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pure: false,
            params: Vec::new(),
        }
    }

    /// 순수 함수로 표시합니다.
    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    /// 파라미터를 추가합니다 (선언 순서가 위치 인자 순서).
    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// 이름으로 파라미터 위치를 찾습니다.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

/// 해석된 함수 인자
///
/// 값이 null이고 기본값 없는 선택 파라미터는 포함되지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct FunctionArgs {
    function: String,
    values: BTreeMap<String, Value>,
}

impl FunctionArgs {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// 필수 인자. 없으면 `MissingArgument`.
    pub fn required(&self, name: &str) -> Result<&Value, EvalError> {
        self.values
            .get(name)
            .ok_or_else(|| EvalError::MissingArgument {
                function: self.function.clone(),
                param: name.to_owned(),
            })
    }

    /// 필수 문자열 인자
    pub fn str(&self, name: &str) -> Result<&str, EvalError> {
        let value = self.required(name)?;
        value.as_str().ok_or_else(|| EvalError::TypeMismatch {
            function: self.function.clone(),
            param: name.to_owned(),
            expected: ParamKind::String,
            actual: value.kind(),
        })
    }

    /// 선택 문자열 인자
    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// 불리언 인자. 없으면 `default`.
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.values
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

/// 함수 테이블
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// 빈 테이블을 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 제공 함수가 모두 등록된 테이블을 만듭니다.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for function in builtin::all() {
            registry
                .functions
                .insert(function.descriptor().name.clone(), function);
        }
        registry
    }

    /// 함수를 등록합니다. 같은 이름이 있으면 에러입니다.
    pub fn register(&mut self, function: Arc<dyn Function>) -> Result<(), PipelineError> {
        let name = function.descriptor().name.clone();
        if self.functions.contains_key(&name) {
            return Err(PipelineError::DuplicateFunction(name));
        }
        self.functions.insert(name, function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}
