//! 타입 변환 함수
//!
//! 변환할 수 없는 값이나 null은 `default` 인자 값으로 대체됩니다.

use sieve_core::value::Value;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParamKind, ParameterDescriptor};

/// `to_string(value, default = "")`
pub(crate) struct StringConversion {
    descriptor: FunctionDescriptor,
}

impl StringConversion {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("to_string")
                .pure()
                .param(ParameterDescriptor::optional("value", ParamKind::Any))
                .param(ParameterDescriptor::optional("default", ParamKind::String).with_default("")),
        }
    }
}

impl Function for StringConversion {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let converted = match args.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => args.opt_str("default").unwrap_or_default().to_owned(),
        };
        Ok(Some(Value::String(converted)))
    }
}

/// `to_long(value, default = 0)`
pub(crate) struct ToLong {
    descriptor: FunctionDescriptor,
}

impl ToLong {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("to_long")
                .pure()
                .param(ParameterDescriptor::optional("value", ParamKind::Any))
                .param(ParameterDescriptor::optional("default", ParamKind::Long).with_default(0i64)),
        }
    }
}

impl Function for ToLong {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let default = args.get("default").and_then(Value::as_i64).unwrap_or(0);
        let converted = args.get("value").and_then(to_i64).unwrap_or(default);
        Ok(Some(Value::Long(converted)))
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Long(n) => Some(*n),
        Value::Double(n) if n.is_finite() => Some(n.trunc() as i64),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Timestamp(ts) => Some(ts.timestamp_millis()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|n| n.is_finite()).map(|n| n.trunc() as i64))
        }
        _ => None,
    }
}

/// `to_double(value, default = 0.0)`
pub(crate) struct ToDouble {
    descriptor: FunctionDescriptor,
}

impl ToDouble {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("to_double")
                .pure()
                .param(ParameterDescriptor::optional("value", ParamKind::Any))
                .param(ParameterDescriptor::optional("default", ParamKind::Number).with_default(0.0)),
        }
    }
}

impl Function for ToDouble {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let default = args.get("default").and_then(Value::as_f64).unwrap_or(0.0);
        let converted = match args.get("value") {
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
            Some(other) => other.as_f64(),
            None => None,
        };
        Ok(Some(Value::Double(converted.unwrap_or(default))))
    }
}

/// `to_bool(value)`
///
/// 문자열은 대소문자 구분 없이 `"true"`일 때만 참, 숫자는 0이 아니면 참입니다.
pub(crate) struct ToBool {
    descriptor: FunctionDescriptor,
}

impl ToBool {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("to_bool")
                .pure()
                .param(ParameterDescriptor::optional("value", ParamKind::Any)),
        }
    }
}

impl Function for ToBool {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let converted = match args.get("value") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            Some(v) if v.is_number() => v.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        };
        Ok(Some(Value::Bool(converted)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::builtin::testing::{invoke_on, message};

    #[test]
    fn to_long_parses_strings_and_truncates_doubles() {
        let mut msg = message();
        let f = ToLong::new();
        let (r, _) = invoke_on(&f, &mut msg, &[("value", Value::from(" 42 "))]);
        assert_eq!(r.unwrap(), Some(Value::Long(42)));
        let (r, _) = invoke_on(&f, &mut msg, &[("value", Value::Double(3.9))]);
        assert_eq!(r.unwrap(), Some(Value::Long(3)));
        let (r, _) = invoke_on(&f, &mut msg, &[("value", Value::from("2.5"))]);
        assert_eq!(r.unwrap(), Some(Value::Long(2)));
    }

    #[test]
    fn to_long_uses_default_for_unconvertible() {
        let mut msg = message();
        let f = ToLong::new();
        let (r, _) = invoke_on(
            &f,
            &mut msg,
            &[("value", Value::from("abc")), ("default", Value::Long(-1))],
        );
        assert_eq!(r.unwrap(), Some(Value::Long(-1)));
        let (r, _) = invoke_on(&f, &mut msg, &[]);
        assert_eq!(r.unwrap(), Some(Value::Long(0)));
    }

    #[test]
    fn to_double_converts_numbers_and_strings() {
        let mut msg = message();
        let f = ToDouble::new();
        let (r, _) = invoke_on(&f, &mut msg, &[("value", Value::Long(2))]);
        assert_eq!(r.unwrap(), Some(Value::Double(2.0)));
        let (r, _) = invoke_on(&f, &mut msg, &[("value", Value::from("1.25"))]);
        assert_eq!(r.unwrap(), Some(Value::Double(1.25)));
    }

    #[test]
    fn to_string_formats_values() {
        let mut msg = message();
        let f = StringConversion::new();
        let (r, _) = invoke_on(&f, &mut msg, &[("value", Value::Long(7))]);
        assert_eq!(r.unwrap(), Some(Value::from("7")));
        let (r, _) = invoke_on(&f, &mut msg, &[("default", Value::from("none"))]);
        assert_eq!(r.unwrap(), Some(Value::from("none")));
    }

    #[test]
    fn to_bool_semantics() {
        let mut msg = message();
        let f = ToBool::new();
        for (input, expected) in [
            (Value::from("TRUE"), true),
            (Value::from("yes"), false),
            (Value::Long(0), false),
            (Value::Double(0.5), true),
            (Value::Bool(true), true),
        ] {
            let (r, _) = invoke_on(&f, &mut msg, &[("value", input)]);
            assert_eq!(r.unwrap(), Some(Value::Bool(expected)));
        }
    }
}
