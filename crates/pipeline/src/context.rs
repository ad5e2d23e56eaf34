//! 평가 컨텍스트 -- 규칙 평가 동안 공유되는 가변 상태
//!
//! [`EvaluationContext`]는 현재 메시지에 대한 가변 참조, 이번 평가에서 합성된
//! 메시지, 계보 예산, 평가 기한을 묶습니다. 한 메시지가 여러 파이프라인을
//! 거치는 동안 같은 컨텍스트가 재사용되므로 앞선 파이프라인의 변경이 뒤의
//! 파이프라인에 그대로 보입니다.

use std::time::Instant;

use metrics::counter;
use sieve_core::message::Message;
use sieve_core::metrics as m;

/// 계보 루트당 합성 예산
///
/// 루트 메시지의 `clone_count`에서 시작해 합성마다 1씩 증가합니다.
/// 계보 하나는 한 작업 단위에서 순차 처리되므로 잠금이 필요 없습니다.
#[derive(Debug)]
pub struct LineageBudget {
    root_id: String,
    issued: u32,
    max_clones: u32,
    prevented: u64,
}

impl LineageBudget {
    /// 루트 메시지 기준으로 예산을 만듭니다.
    pub fn new(root: &Message, max_clones: u32) -> Self {
        Self {
            root_id: root.lineage().root_id.clone(),
            issued: root.clone_count(),
            max_clones,
            prevented: 0,
        }
    }

    /// 다음 합성 순번을 발급합니다.
    ///
    /// `prevent_loops`가 켜져 있고 순번이 상한을 넘으면 `None`을 반환하고
    /// 루프 방지 이벤트를 기록합니다.
    pub fn reserve(&mut self, prevent_loops: bool) -> Option<u32> {
        let next = self.issued.saturating_add(1);
        if prevent_loops && next > self.max_clones {
            self.prevented += 1;
            counter!(m::INTERPRETER_LOOP_PREVENTED_TOTAL).increment(1);
            tracing::warn!(
                root_id = %self.root_id,
                max_clones = self.max_clones,
                "loop prevention refused message synthesis"
            );
            return None;
        }
        self.issued = next;
        Some(next)
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// 지금까지 발급한 마지막 순번
    pub fn issued(&self) -> u32 {
        self.issued
    }

    /// 루프 방지로 거부된 합성 수
    pub fn prevented(&self) -> u64 {
        self.prevented
    }
}

/// 규칙 평가 컨텍스트
pub struct EvaluationContext<'a> {
    message: &'a mut Message,
    budget: &'a mut LineageBudget,
    created: Vec<Message>,
    deadline: Option<Instant>,
    timed_out: bool,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        message: &'a mut Message,
        budget: &'a mut LineageBudget,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            message,
            budget,
            created: Vec::new(),
            deadline,
            timed_out: false,
        }
    }

    pub fn message(&self) -> &Message {
        &*self.message
    }

    pub fn message_mut(&mut self) -> &mut Message {
        &mut *self.message
    }

    /// 합성 순번을 예약합니다. 루프 방지에 걸리면 `None`.
    pub fn reserve_synthesis(&mut self, prevent_loops: bool) -> Option<u32> {
        self.budget.reserve(prevent_loops)
    }

    /// 합성된 메시지를 다음 웨이브로 넘기기 위해 보관합니다.
    pub fn emit(&mut self, message: Message) {
        tracing::debug!(
            parent_id = %self.message.id(),
            message_id = %message.id(),
            clone_count = message.clone_count(),
            "rule synthesized message"
        );
        counter!(m::INTERPRETER_MESSAGES_CREATED_TOTAL).increment(1);
        self.created.push(message);
    }

    /// 이번 평가에서 합성된 메시지
    pub fn created(&self) -> &[Message] {
        &self.created
    }

    /// 평가 기한을 넘겼는지 확인합니다. 한 번 넘으면 계속 `true`입니다.
    pub fn deadline_exceeded(&mut self) -> bool {
        if !self.timed_out
            && let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            self.timed_out = true;
        }
        self.timed_out
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// 컨텍스트를 소비하고 합성된 메시지를 반환합니다.
    pub fn into_created(self) -> Vec<Message> {
        self.created
    }
}
