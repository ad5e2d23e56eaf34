//! 문자열 함수

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;
use sieve_core::value::Value;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParamKind, ParameterDescriptor};

/// 정규식 캐시 최대 항목 수. 넘으면 캐시를 비웁니다.
const MAX_CACHED_PATTERNS: usize = 1024;

/// 문자열이 아닌 값은 표시 형식으로 비교합니다.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `contains(value, search, ignore_case = false)`
pub(crate) struct Contains {
    descriptor: FunctionDescriptor,
}

impl Contains {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("contains")
                .pure()
                .param(ParameterDescriptor::required("value", ParamKind::Any))
                .param(ParameterDescriptor::required("search", ParamKind::String))
                .param(
                    ParameterDescriptor::optional("ignore_case", ParamKind::Bool)
                        .with_default(false),
                ),
        }
    }
}

impl Function for Contains {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let value = text_of(args.required("value")?);
        let search = args.str("search")?;
        let found = if args.bool_or("ignore_case", false) {
            value.to_lowercase().contains(&search.to_lowercase())
        } else {
            value.contains(search)
        };
        Ok(Some(Value::Bool(found)))
    }
}

/// `regex(pattern, value)`
///
/// 컴파일된 패턴은 함수 인스턴스에 캐시됩니다.
pub(crate) struct RegexMatch {
    descriptor: FunctionDescriptor,
    cache: RwLock<HashMap<String, Arc<Regex>>>,
}

impl RegexMatch {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("regex")
                .pure()
                .param(ParameterDescriptor::required("pattern", ParamKind::String))
                .param(ParameterDescriptor::required("value", ParamKind::Any)),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn compiled(&self, pattern: &str) -> Result<Arc<Regex>, EvalError> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(re) = cache.get(pattern) {
                return Ok(Arc::clone(re));
            }
        }

        let re = Regex::new(pattern)
            .map(Arc::new)
            .map_err(|e| EvalError::function("regex", format!("invalid pattern: {e}")))?;

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // 패턴은 규칙 리터럴로 가정합니다. 메시지 필드에서 온 패턴이 상한을
        // 채우면 자주 쓰는 패턴까지 함께 비워집니다.
        if cache.len() >= MAX_CACHED_PATTERNS {
            cache.clear();
        }
        cache.insert(pattern.to_owned(), Arc::clone(&re));
        Ok(re)
    }
}

impl Function for RegexMatch {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let re = self.compiled(args.str("pattern")?)?;
        let value = text_of(args.required("value")?);
        Ok(Some(Value::Bool(re.is_match(&value))))
    }
}

/// `concat(first, second)`. null 인자는 빈 문자열로 취급합니다.
pub(crate) struct Concat {
    descriptor: FunctionDescriptor,
}

impl Concat {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("concat")
                .pure()
                .param(ParameterDescriptor::optional("first", ParamKind::Any))
                .param(ParameterDescriptor::optional("second", ParamKind::Any)),
        }
    }
}

impl Function for Concat {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let mut out = args.get("first").map(text_of).unwrap_or_default();
        out.push_str(&args.get("second").map(text_of).unwrap_or_default());
        Ok(Some(Value::String(out)))
    }
}

/// `lowercase(value)`
pub(crate) struct Lowercase {
    descriptor: FunctionDescriptor,
}

impl Lowercase {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("lowercase")
                .pure()
                .param(ParameterDescriptor::required("value", ParamKind::String)),
        }
    }
}

impl Function for Lowercase {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        Ok(Some(Value::String(args.str("value")?.to_lowercase())))
    }
}

/// `uppercase(value)`
pub(crate) struct Uppercase {
    descriptor: FunctionDescriptor,
}

impl Uppercase {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("uppercase")
                .pure()
                .param(ParameterDescriptor::required("value", ParamKind::String)),
        }
    }
}

impl Function for Uppercase {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        Ok(Some(Value::String(args.str("value")?.to_uppercase())))
    }
}
