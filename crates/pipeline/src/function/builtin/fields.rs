//! 필드 조회/변경 함수

use sieve_core::value::Value;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParamKind, ParameterDescriptor};

/// `has_field(field)`
pub(crate) struct HasField {
    descriptor: FunctionDescriptor,
}

impl HasField {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("has_field")
                .pure()
                .param(ParameterDescriptor::required("field", ParamKind::String)),
        }
    }
}

impl Function for HasField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let field = args.str("field")?;
        Ok(Some(Value::Bool(ctx.message().has_field(field))))
    }
}

/// `set_field(field, value)`
///
/// `value`가 null이면 아무것도 하지 않습니다.
pub(crate) struct SetField {
    descriptor: FunctionDescriptor,
}

impl SetField {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("set_field")
                .param(ParameterDescriptor::required("field", ParamKind::String))
                .param(ParameterDescriptor::optional("value", ParamKind::Any)),
        }
    }
}

impl Function for SetField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let field = args.str("field")?;
        if let Some(value) = args.get("value") {
            ctx.message_mut().set_field(field, value.clone())?;
        }
        Ok(None)
    }
}

/// `set_fields(fields, prefix = "")`
pub(crate) struct SetFields {
    descriptor: FunctionDescriptor,
}

impl SetFields {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("set_fields")
                .param(ParameterDescriptor::required("fields", ParamKind::Map))
                .param(ParameterDescriptor::optional("prefix", ParamKind::String).with_default("")),
        }
    }
}

impl Function for SetFields {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let fields = args
            .required("fields")?
            .as_map()
            .ok_or_else(|| EvalError::function("set_fields", "fields must be a map"))?;
        let prefix = args.opt_str("prefix").unwrap_or_default();
        let message = ctx.message_mut();
        for (name, value) in fields {
            message.set_field(format!("{prefix}{name}"), value.clone())?;
        }
        Ok(None)
    }
}

/// `remove_field(field)`
pub(crate) struct RemoveField {
    descriptor: FunctionDescriptor,
}

impl RemoveField {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("remove_field")
                .param(ParameterDescriptor::required("field", ParamKind::String)),
        }
    }
}

impl Function for RemoveField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let field = args.str("field")?;
        ctx.message_mut().remove_field(field)?;
        Ok(None)
    }
}

/// `rename_field(old_field, new_field)`. 이름이 바뀌었으면 `true`.
pub(crate) struct RenameField {
    descriptor: FunctionDescriptor,
}

impl RenameField {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("rename_field")
                .param(ParameterDescriptor::required("old_field", ParamKind::String))
                .param(ParameterDescriptor::required("new_field", ParamKind::String)),
        }
    }
}

impl Function for RenameField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let old = args.str("old_field")?;
        let new = args.str("new_field")?;
        let renamed = ctx.message_mut().rename_field(old, new)?;
        Ok(Some(Value::Bool(renamed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::builtin::testing::{invoke_on, message};
    use sieve_core::error::FieldError;
    use std::collections::BTreeMap;

    #[test]
    fn has_field_reports_presence() {
        let mut msg = message();
        msg.set_field("foo", Value::from("x")).unwrap();
        let (r, _) = invoke_on(&HasField::new(), &mut msg, &[("field", Value::from("foo"))]);
        assert_eq!(r.unwrap(), Some(Value::Bool(true)));
        let (r, _) = invoke_on(&HasField::new(), &mut msg, &[("field", Value::from("bar"))]);
        assert_eq!(r.unwrap(), Some(Value::Bool(false)));
    }

    #[test]
    fn set_field_writes_and_skips_null() {
        let mut msg = message();
        let (r, _) = invoke_on(
            &SetField::new(),
            &mut msg,
            &[("field", Value::from("bar")), ("value", Value::from("baz"))],
        );
        assert_eq!(r.unwrap(), None);
        assert_eq!(msg.field("bar"), Some(&Value::from("baz")));

        let (r, _) = invoke_on(&SetField::new(), &mut msg, &[("field", Value::from("empty"))]);
        assert!(r.is_ok());
        assert!(!msg.has_field("empty"));
    }

    #[test]
    fn set_field_rejects_id() {
        let mut msg = message();
        let (r, _) = invoke_on(
            &SetField::new(),
            &mut msg,
            &[("field", Value::from("_id")), ("value", Value::from("x"))],
        );
        assert!(matches!(r, Err(EvalError::Field(FieldError::ReadOnly { .. }))));
    }

    #[test]
    fn set_fields_applies_prefix() {
        let mut msg = message();
        let mut map = BTreeMap::new();
        map.insert("a".to_owned(), Value::Long(1));
        map.insert("b".to_owned(), Value::Long(2));
        let (r, _) = invoke_on(
            &SetFields::new(),
            &mut msg,
            &[("fields", Value::Map(map)), ("prefix", Value::from("p_"))],
        );
        assert!(r.is_ok());
        assert_eq!(msg.field("p_a"), Some(&Value::Long(1)));
        assert_eq!(msg.field("p_b"), Some(&Value::Long(2)));
    }

    #[test]
    fn remove_field_rejects_reserved() {
        let mut msg = message();
        let (r, _) = invoke_on(&RemoveField::new(), &mut msg, &[("field", Value::from("source"))]);
        assert!(matches!(
            r,
            Err(EvalError::Field(FieldError::ReservedRemoval { .. }))
        ));
    }

    #[test]
    fn rename_field_moves_value() {
        let mut msg = message();
        msg.set_field("a", Value::Long(1)).unwrap();
        let (r, _) = invoke_on(
            &RenameField::new(),
            &mut msg,
            &[("old_field", Value::from("a")), ("new_field", Value::from("b"))],
        );
        assert_eq!(r.unwrap(), Some(Value::Bool(true)));
        assert!(!msg.has_field("a"));
        assert_eq!(msg.field("b"), Some(&Value::Long(1)));
    }
}
