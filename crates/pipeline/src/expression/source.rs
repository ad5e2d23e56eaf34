//! 표현식 소스 -- 정의 파일에 기록되는 표현식 트리
//!
//! YAML/JSON 노드 형태로 표현식을 기술합니다.
//!
//! ```yaml
//! # 함수 호출 (이름 인자 또는 위치 인자)
//! call: set_field
//! args: { field: bar, value: baz }
//!
//! # 필드 참조, 논리/비교/산술 연산
//! and:
//!   - call: has_field
//!     args: [foo]
//!   - gt: [{ field: count }, 10]
//!
//! # 리터럴: 스칼라는 그대로, 리스트/맵은 `value`로 감쌉니다
//! value: { a: 1 }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sieve_core::value::Value;

use super::{ArithmeticOp, ComparisonOp, Expression, FunctionCall};
use crate::error::CompileError;
use crate::function::FunctionRegistry;

/// 스칼라 리터럴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarLiteral {
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
}

impl From<&ScalarLiteral> for Value {
    fn from(scalar: &ScalarLiteral) -> Self {
        match scalar {
            ScalarLiteral::Bool(b) => Value::Bool(*b),
            ScalarLiteral::Long(n) => Value::Long(*n),
            ScalarLiteral::Double(n) => Value::Double(*n),
            ScalarLiteral::String(s) => Value::String(s.clone()),
        }
    }
}

/// 함수 호출 인자
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallArgs {
    /// 파라미터 이름으로 지정
    Named(BTreeMap<String, ExpressionSource>),
    /// 선언 순서대로 지정
    Positional(Vec<ExpressionSource>),
}

impl Default for CallArgs {
    fn default() -> Self {
        Self::Named(BTreeMap::new())
    }
}

impl CallArgs {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Named(args) => args.is_empty(),
            Self::Positional(args) => args.is_empty(),
        }
    }
}

/// 표현식 소스 노드
///
/// 역직렬화는 변형 순서대로 시도합니다. 연산자 노드는 피연산자 2개 목록을 받습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpressionSource {
    Call {
        call: String,
        #[serde(default, skip_serializing_if = "CallArgs::is_empty")]
        args: CallArgs,
    },
    Field {
        field: String,
    },
    Not {
        not: Box<ExpressionSource>,
    },
    And {
        and: Vec<ExpressionSource>,
    },
    Or {
        or: Vec<ExpressionSource>,
    },
    Eq {
        eq: Vec<ExpressionSource>,
    },
    Ne {
        ne: Vec<ExpressionSource>,
    },
    Lt {
        lt: Vec<ExpressionSource>,
    },
    Le {
        le: Vec<ExpressionSource>,
    },
    Gt {
        gt: Vec<ExpressionSource>,
    },
    Ge {
        ge: Vec<ExpressionSource>,
    },
    Add {
        add: Vec<ExpressionSource>,
    },
    Sub {
        sub: Vec<ExpressionSource>,
    },
    Mul {
        mul: Vec<ExpressionSource>,
    },
    Div {
        div: Vec<ExpressionSource>,
    },
    Rem {
        rem: Vec<ExpressionSource>,
    },
    Literal {
        value: Value,
    },
    Scalar(ScalarLiteral),
}

impl ExpressionSource {
    /// 함수 호출 노드를 만듭니다.
    pub fn call(name: impl Into<String>, args: CallArgs) -> Self {
        Self::Call {
            call: name.into(),
            args,
        }
    }

    /// 함수 테이블로 평가 트리를 컴파일합니다.
    ///
    /// 알 수 없는 함수/파라미터, 기본값 없는 필수 인자 누락, 리터럴 인자
    /// 타입 불일치, 연산자 피연산자 개수 불일치를 검출합니다.
    pub fn compile(&self, registry: &FunctionRegistry) -> Result<Expression, CompileError> {
        match self {
            Self::Call { call, args } => compile_call(call, args, registry),
            Self::Field { field } => Ok(Expression::Field(field.clone())),
            Self::Not { not } => Ok(Expression::Not(Box::new(not.compile(registry)?))),
            Self::And { and } => Ok(Expression::And(compile_all(and, registry)?)),
            Self::Or { or } => Ok(Expression::Or(compile_all(or, registry)?)),
            Self::Eq { eq } => comparison(ComparisonOp::Eq, eq, registry),
            Self::Ne { ne } => comparison(ComparisonOp::Ne, ne, registry),
            Self::Lt { lt } => comparison(ComparisonOp::Lt, lt, registry),
            Self::Le { le } => comparison(ComparisonOp::Le, le, registry),
            Self::Gt { gt } => comparison(ComparisonOp::Gt, gt, registry),
            Self::Ge { ge } => comparison(ComparisonOp::Ge, ge, registry),
            Self::Add { add } => arithmetic(ArithmeticOp::Add, add, registry),
            Self::Sub { sub } => arithmetic(ArithmeticOp::Sub, sub, registry),
            Self::Mul { mul } => arithmetic(ArithmeticOp::Mul, mul, registry),
            Self::Div { div } => arithmetic(ArithmeticOp::Div, div, registry),
            Self::Rem { rem } => arithmetic(ArithmeticOp::Rem, rem, registry),
            Self::Literal { value } => Ok(Expression::Literal(value.clone())),
            Self::Scalar(scalar) => Ok(Expression::Literal(scalar.into())),
        }
    }
}

impl From<ScalarLiteral> for ExpressionSource {
    fn from(scalar: ScalarLiteral) -> Self {
        Self::Scalar(scalar)
    }
}

fn compile_all(
    sources: &[ExpressionSource],
    registry: &FunctionRegistry,
) -> Result<Vec<Expression>, CompileError> {
    sources.iter().map(|s| s.compile(registry)).collect()
}

fn binary(
    operator: &'static str,
    operands: &[ExpressionSource],
    registry: &FunctionRegistry,
) -> Result<(Box<Expression>, Box<Expression>), CompileError> {
    match operands {
        [left, right] => Ok((
            Box::new(left.compile(registry)?),
            Box::new(right.compile(registry)?),
        )),
        _ => Err(CompileError::Arity {
            operator,
            expected: 2,
            actual: operands.len(),
        }),
    }
}

fn comparison(
    op: ComparisonOp,
    operands: &[ExpressionSource],
    registry: &FunctionRegistry,
) -> Result<Expression, CompileError> {
    let (left, right) = binary(op.as_str(), operands, registry)?;
    Ok(Expression::Comparison { op, left, right })
}

fn arithmetic(
    op: ArithmeticOp,
    operands: &[ExpressionSource],
    registry: &FunctionRegistry,
) -> Result<Expression, CompileError> {
    let (left, right) = binary(op.as_str(), operands, registry)?;
    Ok(Expression::Arithmetic { op, left, right })
}

fn compile_call(
    name: &str,
    args: &CallArgs,
    registry: &FunctionRegistry,
) -> Result<Expression, CompileError> {
    let function = registry
        .get(name)
        .ok_or_else(|| CompileError::UnknownFunction {
            name: name.to_owned(),
        })?;
    let descriptor = function.descriptor();
    let mut slots: Vec<Option<Expression>> = (0..descriptor.params.len()).map(|_| None).collect();

    match args {
        CallArgs::Named(named) => {
            for (param, source) in named {
                let index =
                    descriptor
                        .position(param)
                        .ok_or_else(|| CompileError::UnknownParameter {
                            function: name.to_owned(),
                            param: param.clone(),
                        })?;
                slots[index] = Some(source.compile(registry)?);
            }
        }
        CallArgs::Positional(positional) => {
            if positional.len() > descriptor.params.len() {
                return Err(CompileError::TooManyArguments {
                    function: name.to_owned(),
                    expected: descriptor.params.len(),
                    actual: positional.len(),
                });
            }
            for (slot, source) in slots.iter_mut().zip(positional) {
                *slot = Some(source.compile(registry)?);
            }
        }
    }

    for (param, slot) in descriptor.params.iter().zip(&slots) {
        match slot {
            None if !param.optional => {
                return Err(CompileError::MissingParameter {
                    function: name.to_owned(),
                    param: param.name.clone(),
                });
            }
            Some(Expression::Literal(value)) if !param.kind.accepts(value) => {
                return Err(CompileError::LiteralType {
                    function: name.to_owned(),
                    param: param.name.clone(),
                    expected: param.kind,
                    actual: value.kind(),
                });
            }
            _ => {}
        }
    }

    Ok(Expression::Call(FunctionCall::new(Arc::clone(function), slots)))
}
