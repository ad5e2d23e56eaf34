//! 스트림 라우팅과 드롭 함수

use sieve_core::message::DEFAULT_STREAM_ID;
use sieve_core::value::Value;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParamKind, ParameterDescriptor};

/// `route_to_stream(id, remove_from_default = false)`
///
/// 새 스트림이 추가되면 인터프리터는 그 스트림에 연결된 파이프라인으로
/// 메시지를 다시 평가합니다.
pub(crate) struct RouteToStream {
    descriptor: FunctionDescriptor,
}

impl RouteToStream {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("route_to_stream")
                .param(ParameterDescriptor::required("id", ParamKind::String))
                .param(
                    ParameterDescriptor::optional("remove_from_default", ParamKind::Bool)
                        .with_default(false),
                ),
        }
    }
}

impl Function for RouteToStream {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let id = args.str("id")?;
        if id.is_empty() {
            return Err(EvalError::function("route_to_stream", "stream id must not be empty"));
        }
        let message = ctx.message_mut();
        message.add_stream(id);
        if args.bool_or("remove_from_default", false) && id != DEFAULT_STREAM_ID {
            message.remove_stream(DEFAULT_STREAM_ID);
        }
        Ok(None)
    }
}

/// `remove_from_stream(id)`
pub(crate) struct RemoveFromStream {
    descriptor: FunctionDescriptor,
}

impl RemoveFromStream {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("remove_from_stream")
                .param(ParameterDescriptor::required("id", ParamKind::String)),
        }
    }
}

impl Function for RemoveFromStream {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let id = args.str("id")?;
        ctx.message_mut().remove_stream(id);
        Ok(None)
    }
}

/// `drop_message()`
///
/// 메시지에 드롭 표시를 합니다. 이후 스테이지는 실행되지 않고 메시지는
/// 출력되지 않습니다.
pub(crate) struct DropMessage {
    descriptor: FunctionDescriptor,
}

impl DropMessage {
    pub(crate) fn new() -> Self {
        Self {
            descriptor: FunctionDescriptor::new("drop_message"),
        }
    }
}

impl Function for DropMessage {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        _args: &FunctionArgs,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        ctx.message_mut().set_filter_out(true);
        Ok(None)
    }
}
