//! 메시지 합성 함수
//!
//! 두 함수 모두 계보 예산에서 합성 순번을 예약합니다. `prevent_loops`가
//! 켜져 있고 예산을 넘으면 메시지를 만들지 않고 null을 반환합니다.
//! 성공하면 새 메시지의 ID를 반환합니다.

use chrono::Utc;
use sieve_core::value::Value;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParamKind, ParameterDescriptor};

/// `clone_message(prevent_loops = true)`
pub(crate) struct CloneMessage {
    descriptor: FunctionDescriptor,
}

impl CloneMessage {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("clone_message").param(
                ParameterDescriptor::optional("prevent_loops", ParamKind::Bool).with_default(true),
            ),
        }
    }
}

impl Function for CloneMessage {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let Some(clone_count) = ctx.reserve_synthesis(args.bool_or("prevent_loops", true)) else {
            return Ok(None);
        };
        let clone = ctx.message().derive_clone(clone_count);
        let id = clone.id().to_owned();
        ctx.emit(clone);
        Ok(Some(Value::String(id)))
    }
}

/// `create_message(message?, source?, timestamp?, prevent_loops = true)`
///
/// 생략한 `message`, `source`는 현재 메시지의 값을, `timestamp`는 현재
/// 시각을 사용합니다. 새 메시지는 어떤 스트림에도 속하지 않습니다.
pub(crate) struct CreateMessage {
    descriptor: FunctionDescriptor,
}

impl CreateMessage {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("create_message")
                .param(ParameterDescriptor::optional("message", ParamKind::String))
                .param(ParameterDescriptor::optional("source", ParamKind::String))
                .param(ParameterDescriptor::optional("timestamp", ParamKind::Timestamp))
                .param(
                    ParameterDescriptor::optional("prevent_loops", ParamKind::Bool)
                        .with_default(true),
                ),
        }
    }
}

impl Function for CreateMessage {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let Some(clone_count) = ctx.reserve_synthesis(args.bool_or("prevent_loops", true)) else {
            return Ok(None);
        };
        let current = ctx.message();
        let text = args.opt_str("message").unwrap_or(current.message()).to_owned();
        let source = args.opt_str("source").unwrap_or(current.source()).to_owned();
        let timestamp = args
            .get("timestamp")
            .and_then(Value::as_timestamp)
            .copied()
            .unwrap_or_else(Utc::now);

        let created = current.derive_new(text, source, timestamp, clone_count);
        let id = created.id().to_owned();
        ctx.emit(created);
        Ok(Some(Value::String(id)))
    }
}
