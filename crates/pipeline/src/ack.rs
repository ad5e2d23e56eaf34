//! 메시지 확인(acknowledgement) 인터페이스
//!
//! 입력 측 저장 계층은 출력되지 않는 메시지를 알아야 재전송 대기열을 정리할
//! 수 있습니다. 인터프리터는 드롭되었거나 불완전해 버려진 메시지마다
//! [`MessageAcknowledger::acknowledge_dropped`]를, 계보 하나의 처리가 끝나면
//! [`MessageAcknowledger::lineage_completed`]를 호출합니다.

use sieve_core::message::Message;

/// 메시지 확인자
pub trait MessageAcknowledger: Send + Sync {
    /// 출력되지 않고 버려진 메시지
    fn acknowledge_dropped(&self, message: &Message);

    /// 계보 처리 완료. `emitted`는 이 계보에서 출력된 메시지 수입니다.
    fn lineage_completed(&self, _root_id: &str, _emitted: usize) {}
}

/// 아무것도 하지 않는 확인자
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAcknowledger;

impl MessageAcknowledger for NoopAcknowledger {
    fn acknowledge_dropped(&self, _message: &Message) {}
}
