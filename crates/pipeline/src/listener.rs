//! 인터프리터 관찰 훅
//!
//! [`InterpreterListener`]는 스트림 해석, 스테이지 진입/종료, 규칙 평가/실행
//! 시점에 호출됩니다. 기본 구현은 모두 no-op입니다.
//!
//! 상태의 규칙 메트릭 설정이 켜져 있으면 인터프리터는 [`RuleMetricsListener`]를,
//! 아니면 [`NoopListener`]를 사용합니다.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use sieve_core::message::Message;
use sieve_core::metrics as m;

use crate::pipeline::Pipeline;
use crate::rule::{ConditionOutcome, Rule};

/// 인터프리터 관찰자
pub trait InterpreterListener: Send + Sync {
    /// 메시지에 대해 실행할 파이프라인이 결정됨
    fn process_streams(
        &self,
        _message: &Message,
        _pipelines: &[Arc<Pipeline>],
        _streams: &BTreeSet<String>,
    ) {
    }

    /// 파이프라인 평가 시작
    fn enter_pipeline(&self, _pipeline_id: &str) {}

    /// 스테이지 평가 시작
    fn enter_stage(&self, _pipeline_id: &str, _stage: i32) {}

    /// 규칙 조건 평가 완료
    fn rule_evaluated(
        &self,
        _pipeline_id: &str,
        _stage: i32,
        _rule: &Rule,
        _outcome: ConditionOutcome,
    ) {
    }

    /// 규칙 액션 실행 완료
    fn rule_executed(&self, _pipeline_id: &str, _stage: i32, _rule: &Rule, _succeeded: bool) {}

    /// 스테이지 평가 종료
    fn exit_stage(&self, _pipeline_id: &str, _stage: i32, _matched: bool, _elapsed: Duration) {}
}

/// 아무것도 하지 않는 관찰자
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl InterpreterListener for NoopListener {}

/// 규칙/스테이지 단위 메트릭을 기록하는 관찰자
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleMetricsListener;

impl InterpreterListener for RuleMetricsListener {
    fn process_streams(
        &self,
        message: &Message,
        pipelines: &[Arc<Pipeline>],
        streams: &BTreeSet<String>,
    ) {
        tracing::trace!(
            message_id = %message.id(),
            streams = ?streams,
            pipelines = pipelines.len(),
            "resolved pipelines for streams"
        );
    }

    fn enter_pipeline(&self, pipeline_id: &str) {
        counter!(m::PIPELINE_EXECUTIONS_TOTAL, m::LABEL_PIPELINE_ID => pipeline_id.to_owned())
            .increment(1);
    }

    fn rule_evaluated(&self, pipeline_id: &str, stage: i32, rule: &Rule, outcome: ConditionOutcome) {
        let name = match outcome {
            ConditionOutcome::Matched => m::RULE_MATCHED_TOTAL,
            ConditionOutcome::NotMatched => m::RULE_NOT_MATCHED_TOTAL,
            ConditionOutcome::Failed => m::RULE_FAILED_TOTAL,
        };
        let labels = rule_labels(pipeline_id, stage, rule);
        counter!(m::RULE_EVALUATED_TOTAL, labels.clone()).increment(1);
        counter!(name, labels).increment(1);
    }

    fn rule_executed(&self, pipeline_id: &str, stage: i32, rule: &Rule, succeeded: bool) {
        let labels = rule_labels(pipeline_id, stage, rule);
        counter!(m::RULE_EXECUTED_TOTAL, labels.clone()).increment(1);
        if !succeeded {
            counter!(m::RULE_ACTION_FAILURES_TOTAL, labels).increment(1);
        }
    }

    fn exit_stage(&self, pipeline_id: &str, stage: i32, _matched: bool, elapsed: Duration) {
        histogram!(
            m::STAGE_DURATION_SECONDS,
            m::LABEL_PIPELINE_ID => pipeline_id.to_owned(),
            m::LABEL_STAGE => stage.to_string()
        )
        .record(elapsed.as_secs_f64());
    }
}

fn rule_labels(pipeline_id: &str, stage: i32, rule: &Rule) -> Vec<metrics::Label> {
    vec![
        metrics::Label::new(m::LABEL_RULE_ID, rule.id().to_owned()),
        metrics::Label::new(m::LABEL_PIPELINE_ID, pipeline_id.to_owned()),
        metrics::Label::new(m::LABEL_STAGE, stage.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn metrics_listener_without_recorder_does_not_panic() {
        let listener = RuleMetricsListener;
        let rule = Rule::always_false("r", "test");
        let msg = Message::new("m", "s", Utc::now());
        listener.process_streams(&msg, &[], &BTreeSet::new());
        listener.enter_pipeline("p");
        listener.enter_stage("p", 0);
        listener.rule_evaluated("p", 0, &rule, ConditionOutcome::NotMatched);
        listener.rule_executed("p", 0, &rule, false);
        listener.exit_stage("p", 0, false, Duration::from_micros(5));
    }
}
