//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sieve_`
//! - 구성 요소: `interpreter_`, `rule_`, `stage_`, `state_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(sieve_core::metrics::INTERPRETER_MESSAGES_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 규칙 ID 레이블 키
pub const LABEL_RULE_ID: &str = "rule_id";

/// 파이프라인 ID 레이블 키
pub const LABEL_PIPELINE_ID: &str = "pipeline_id";

/// 스테이지 번호 레이블 키
pub const LABEL_STAGE: &str = "stage";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Interpreter 메트릭 ─────────────────────────────────────────────

/// Interpreter: 처리한 입력 메시지 수 (counter)
pub const INTERPRETER_MESSAGES_PROCESSED_TOTAL: &str =
    "sieve_interpreter_messages_processed_total";

/// Interpreter: 출력된 메시지 수 (counter)
pub const INTERPRETER_MESSAGES_EMITTED_TOTAL: &str = "sieve_interpreter_messages_emitted_total";

/// Interpreter: drop_message로 걸러진 메시지 수 (counter)
pub const INTERPRETER_MESSAGES_FILTERED_TOTAL: &str =
    "sieve_interpreter_messages_filtered_total";

/// Interpreter: 불완전하여 버려진 메시지 수 (counter)
pub const INTERPRETER_MESSAGES_INCOMPLETE_TOTAL: &str =
    "sieve_interpreter_messages_incomplete_total";

/// Interpreter: 규칙이 합성한 메시지 수 (counter)
pub const INTERPRETER_MESSAGES_CREATED_TOTAL: &str = "sieve_interpreter_messages_created_total";

/// Interpreter: 루프 방지로 거부된 합성 수 (counter)
pub const INTERPRETER_LOOP_PREVENTED_TOTAL: &str = "sieve_interpreter_loop_prevented_total";

/// Interpreter: 평가 제한 시간 초과 수 (counter)
pub const INTERPRETER_EVALUATION_TIMEOUTS_TOTAL: &str =
    "sieve_interpreter_evaluation_timeouts_total";

/// Interpreter: 배치 처리 시간 (histogram, 초)
pub const INTERPRETER_PROCESSING_DURATION_SECONDS: &str =
    "sieve_interpreter_processing_duration_seconds";

// ─── Rule 메트릭 ────────────────────────────────────────────────────

/// Rule: 조건 평가 수 (counter, labels: rule_id, pipeline_id, stage)
pub const RULE_EVALUATED_TOTAL: &str = "sieve_rule_evaluated_total";

/// Rule: 조건 일치 수 (counter)
pub const RULE_MATCHED_TOTAL: &str = "sieve_rule_matched_total";

/// Rule: 조건 불일치 수 (counter)
pub const RULE_NOT_MATCHED_TOTAL: &str = "sieve_rule_not_matched_total";

/// Rule: 조건 평가 실패 수 (counter)
pub const RULE_FAILED_TOTAL: &str = "sieve_rule_failed_total";

/// Rule: 액션 실행 수 (counter)
pub const RULE_EXECUTED_TOTAL: &str = "sieve_rule_executed_total";

/// Rule: 액션 실행 실패 수 (counter)
pub const RULE_ACTION_FAILURES_TOTAL: &str = "sieve_rule_action_failures_total";

/// Rule: 해석되지 않은 규칙 참조 수 (counter)
pub const RULE_UNRESOLVED_REFERENCES_TOTAL: &str = "sieve_rule_unresolved_references_total";

// ─── Stage 메트릭 ───────────────────────────────────────────────────

/// Stage: 스테이지 실행 시간 (histogram, 초, labels: pipeline_id, stage)
pub const STAGE_DURATION_SECONDS: &str = "sieve_stage_duration_seconds";

/// Stage: 파이프라인 실행 수 (counter, label: pipeline_id)
pub const PIPELINE_EXECUTIONS_TOTAL: &str = "sieve_pipeline_executions_total";

// ─── State 메트릭 ───────────────────────────────────────────────────

/// State: 상태 리로드 수 (counter, label: result)
pub const STATE_RELOADS_TOTAL: &str = "sieve_state_reloads_total";

/// State: 로드된 규칙 수 (gauge)
pub const STATE_RULES_LOADED: &str = "sieve_state_rules_loaded";

/// State: 로드된 파이프라인 수 (gauge)
pub const STATE_PIPELINES_LOADED: &str = "sieve_state_pipelines_loaded";

/// State: 파이프라인이 연결된 스트림 수 (gauge)
pub const STATE_CONNECTED_STREAMS: &str = "sieve_state_connected_streams";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 처리 지연 시간 히스토그램 버킷 (초)
///
/// 10us ~ 1s 범위
pub const PROCESSING_DURATION_BUCKETS: [f64; 10] = [
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 1.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Interpreter
    describe_counter!(
        INTERPRETER_MESSAGES_PROCESSED_TOTAL,
        "Total number of input messages handed to the interpreter"
    );
    describe_counter!(
        INTERPRETER_MESSAGES_EMITTED_TOTAL,
        "Total number of messages emitted after pipeline processing"
    );
    describe_counter!(
        INTERPRETER_MESSAGES_FILTERED_TOTAL,
        "Total number of messages dropped by drop_message"
    );
    describe_counter!(
        INTERPRETER_MESSAGES_INCOMPLETE_TOTAL,
        "Total number of messages discarded for missing message or source"
    );
    describe_counter!(
        INTERPRETER_MESSAGES_CREATED_TOTAL,
        "Total number of messages synthesized by rule actions"
    );
    describe_counter!(
        INTERPRETER_LOOP_PREVENTED_TOTAL,
        "Total number of message syntheses refused by loop prevention"
    );
    describe_counter!(
        INTERPRETER_EVALUATION_TIMEOUTS_TOTAL,
        "Total number of lineages whose evaluation exceeded the deadline"
    );
    describe_histogram!(
        INTERPRETER_PROCESSING_DURATION_SECONDS,
        "Time to process a single batch in seconds"
    );

    // Rule
    describe_counter!(RULE_EVALUATED_TOTAL, "Rule conditions evaluated");
    describe_counter!(RULE_MATCHED_TOTAL, "Rule conditions that matched");
    describe_counter!(RULE_NOT_MATCHED_TOTAL, "Rule conditions that did not match");
    describe_counter!(RULE_FAILED_TOTAL, "Rule conditions that failed to evaluate");
    describe_counter!(RULE_EXECUTED_TOTAL, "Rule action lists executed");
    describe_counter!(
        RULE_ACTION_FAILURES_TOTAL,
        "Rule action lists with at least one failed action"
    );
    describe_counter!(
        RULE_UNRESOLVED_REFERENCES_TOTAL,
        "Stage evaluations that hit a rule reference with no loaded rule"
    );

    // Stage
    describe_histogram!(
        STAGE_DURATION_SECONDS,
        "Time to evaluate a single stage in seconds"
    );
    describe_counter!(PIPELINE_EXECUTIONS_TOTAL, "Pipeline evaluations started");

    // State
    describe_counter!(STATE_RELOADS_TOTAL, "Configuration state reload attempts");
    describe_gauge!(STATE_RULES_LOADED, "Number of rules in the active state");
    describe_gauge!(
        STATE_PIPELINES_LOADED,
        "Number of pipelines in the active state"
    );
    describe_gauge!(
        STATE_CONNECTED_STREAMS,
        "Number of streams with at least one connected pipeline"
    );
}
