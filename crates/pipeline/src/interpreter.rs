//! 파이프라인 인터프리터 -- 메시지 배치를 파이프라인으로 처리합니다.
//!
//! # 처리 모델
//!
//! 입력 메시지 하나와 그로부터 합성된 모든 메시지(계보)가 하나의 작업
//! 단위입니다. 계보 안에서는 웨이브 단위 너비 우선으로 처리합니다.
//!
//! 1. 메시지의 스트림 중 아직 처리하지 않은 스트림에 연결된 파이프라인을
//!    ID 순으로 중복 없이 고릅니다.
//! 2. 같은 가변 메시지에 대해 파이프라인을 차례로 실행합니다. 앞 파이프라인의
//!    변경은 뒤 파이프라인에 그대로 보입니다.
//! 3. 규칙이 합성한 메시지는 다음 웨이브로 넘어갑니다. 원본 메시지는 규칙이
//!    새 스트림을 추가했을 때만 다음 웨이브에서 그 스트림에 대해 다시
//!    처리되고, 아니면 출력됩니다.
//! 4. 처리할 메시지가 없으면 계보가 끝납니다.
//!
//! 합성은 계보 루트당 `max_clones`로 제한됩니다 ([`LineageBudget`]).
//! (메시지, 스트림) 쌍은 두 번 처리되지 않으므로 스트림 라우팅만으로는
//! 무한 루프가 생기지 않습니다.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use sieve_core::message::{Message, ProcessingError, ProcessingFailureCause};
use sieve_core::metrics as m;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::ack::{MessageAcknowledger, NoopAcknowledger};
use crate::config::InterpreterConfig;
use crate::context::{EvaluationContext, LineageBudget};
use crate::error::PipelineError;
use crate::listener::{InterpreterListener, NoopListener, RuleMetricsListener};
use crate::pipeline::{Pipeline, PipelineOutcome};
use crate::state::{State, StateHandle};

/// 처리 대기 중인 메시지와 이미 처리한 스트림
struct WorkItem {
    message: Message,
    processed: BTreeSet<String>,
}

impl WorkItem {
    fn new(message: Message) -> Self {
        Self {
            message,
            processed: BTreeSet::new(),
        }
    }

    /// 아직 처리하지 않은 스트림
    fn pending_streams(&self) -> BTreeSet<String> {
        self.message
            .streams()
            .difference(&self.processed)
            .cloned()
            .collect()
    }
}

/// 파이프라인 실행 한 번의 결과
struct PassResult {
    created: Vec<Message>,
    timed_out: bool,
}

/// 파이프라인 인터프리터
pub struct PipelineInterpreter {
    state: StateHandle,
    config: InterpreterConfig,
    acknowledger: Arc<dyn MessageAcknowledger>,
}

impl PipelineInterpreter {
    /// 상태 핸들과 설정으로 인터프리터를 만듭니다.
    ///
    /// # Errors
    /// 설정이 유효하지 않으면 에러를 반환합니다.
    pub fn new(state: StateHandle, config: InterpreterConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            state,
            config,
            acknowledger: Arc::new(NoopAcknowledger),
        })
    }

    /// 메시지 확인자를 지정합니다.
    pub fn with_acknowledger(mut self, acknowledger: Arc<dyn MessageAcknowledger>) -> Self {
        self.acknowledger = acknowledger;
        self
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// 현재 상태 스냅샷
    pub fn state(&self) -> Arc<State> {
        self.state.load()
    }

    /// 최신 상태로 메시지 배치를 처리합니다.
    ///
    /// 출력 순서는 입력 순서를 따르고, 한 입력의 계보 안에서는 처리가 끝난 순서입니다.
    pub fn process(&self, messages: Vec<Message>) -> Vec<Message> {
        let state = self.state.load();
        self.process_with_state(messages, &state)
    }

    /// 지정한 상태 스냅샷으로 메시지 배치를 처리합니다.
    pub fn process_with_state(&self, messages: Vec<Message>, state: &State) -> Vec<Message> {
        let started = Instant::now();
        let listener = listener_for(state);
        counter!(m::INTERPRETER_MESSAGES_PROCESSED_TOTAL).increment(messages.len() as u64);

        let mut output = Vec::with_capacity(messages.len());
        for message in messages {
            output.extend(self.process_lineage(message, state, listener));
        }

        histogram!(m::INTERPRETER_PROCESSING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        output
    }

    /// 계보를 병렬로 처리합니다.
    ///
    /// 계보마다 블로킹 스레드 풀에서 평가하며 동시에 `concurrency`개까지 실행합니다.
    /// 출력 순서는 [`process`](Self::process)와 같습니다.
    ///
    /// # Errors
    /// 작업 스레드가 패닉하면 에러를 반환합니다.
    pub async fn process_concurrent(
        self: &Arc<Self>,
        messages: Vec<Message>,
    ) -> Result<Vec<Message>, PipelineError> {
        let started = Instant::now();
        let state = self.state.load();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let count = messages.len();
        counter!(m::INTERPRETER_MESSAGES_PROCESSED_TOTAL).increment(count as u64);

        let mut tasks = JoinSet::new();
        for (index, message) in messages.into_iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Channel(e.to_string()))?;
            let interpreter = Arc::clone(self);
            let state = Arc::clone(&state);

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let output = interpreter.process_lineage(message, &state, listener_for(&state));
                (index, output)
            });
        }

        let mut results: Vec<Vec<Message>> = vec![Vec::new(); count];
        while let Some(joined) = tasks.join_next().await {
            let (index, output) = joined.map_err(|e| PipelineError::Join(e.to_string()))?;
            results[index] = output;
        }

        histogram!(m::INTERPRETER_PROCESSING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        Ok(results.into_iter().flatten().collect())
    }

    /// 스트림 연결과 무관하게 지정한 파이프라인으로 메시지를 한 번 처리합니다.
    ///
    /// 시뮬레이션 용도입니다. 메시지는 제자리에서 변경되고, 이번 처리에서
    /// 합성된 메시지를 반환합니다 (다시 처리하지 않음). 없는 파이프라인 ID는
    /// 무시합니다.
    pub fn process_for_pipelines(
        &self,
        message: &mut Message,
        pipeline_ids: &[String],
        state: &State,
    ) -> Vec<Message> {
        let mut seen = BTreeSet::new();
        let mut pipelines: Vec<Arc<Pipeline>> = Vec::with_capacity(pipeline_ids.len());
        for id in pipeline_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match state.pipeline(id) {
                Some(pipeline) => pipelines.push(Arc::clone(pipeline)),
                None => warn!(pipeline_id = %id, "unknown pipeline requested, ignoring"),
            }
        }

        let mut budget = LineageBudget::new(message, self.config.max_clones);
        let deadline = self.deadline();
        let result = run_pipelines(message, &pipelines, &mut budget, deadline, listener_for(state));
        if result.timed_out {
            self.record_timeout(message);
        }
        result.created
    }

    /// 계보 하나를 끝까지 처리합니다.
    fn process_lineage(
        &self,
        root: Message,
        state: &State,
        listener: &dyn InterpreterListener,
    ) -> Vec<Message> {
        let mut budget = LineageBudget::new(&root, self.config.max_clones);
        let deadline = self.deadline();
        let mut emitted = Vec::new();
        let mut timed_out = false;
        let mut wave = vec![WorkItem::new(root)];
        let mut wave_number = 0usize;

        while !wave.is_empty() {
            trace!(
                root_id = %budget.root_id(),
                wave = wave_number,
                messages = wave.len(),
                "processing wave"
            );
            let mut next = Vec::new();

            for mut item in wave {
                if timed_out {
                    item.message.add_processing_error(ProcessingError::new(
                        ProcessingFailureCause::EvaluationTimeout,
                        "Evaluation skipped",
                        "lineage evaluation deadline exceeded before this message was processed",
                    ));
                    self.finish(item.message, &mut emitted);
                    continue;
                }

                let pending = item.pending_streams();
                if pending.is_empty() {
                    self.finish(item.message, &mut emitted);
                    continue;
                }

                let pipelines = state.connections().pipelines_for(&pending);
                listener.process_streams(&item.message, &pipelines, &pending);
                item.processed.extend(pending);

                let result = run_pipelines(&mut item.message, &pipelines, &mut budget, deadline, listener);
                next.extend(result.created.into_iter().map(WorkItem::new));

                if result.timed_out {
                    timed_out = true;
                    self.record_timeout(&mut item.message);
                    self.finish(item.message, &mut emitted);
                    continue;
                }

                let rerun = !item.message.filter_out()
                    && item.message.streams().iter().any(|s| !item.processed.contains(s));
                if rerun {
                    debug!(
                        message_id = %item.message.id(),
                        "message routed to new streams, scheduling another pass"
                    );
                    next.push(item);
                } else {
                    self.finish(item.message, &mut emitted);
                }
            }

            wave = next;
            wave_number += 1;
        }

        if budget.prevented() > 0 {
            debug!(
                root_id = %budget.root_id(),
                prevented = budget.prevented(),
                "loop prevention suppressed message synthesis"
            );
        }
        self.acknowledger
            .lineage_completed(budget.root_id(), emitted.len());
        emitted
    }

    fn deadline(&self) -> Option<Instant> {
        self.config.evaluation_timeout().map(|timeout| Instant::now() + timeout)
    }

    fn record_timeout(&self, message: &mut Message) {
        counter!(m::INTERPRETER_EVALUATION_TIMEOUTS_TOTAL).increment(1);
        warn!(
            message_id = %message.id(),
            root_id = %message.lineage().root_id,
            timeout_ms = self.config.evaluation_timeout_ms,
            "message evaluation exceeded deadline"
        );
        message.add_processing_error(ProcessingError::new(
            ProcessingFailureCause::EvaluationTimeout,
            "Evaluation timed out",
            format!("deadline of {} ms exceeded", self.config.evaluation_timeout_ms),
        ));
    }

    /// 처리가 끝난 메시지를 출력하거나 버립니다.
    fn finish(&self, message: Message, emitted: &mut Vec<Message>) {
        if message.filter_out() {
            counter!(m::INTERPRETER_MESSAGES_FILTERED_TOTAL).increment(1);
            debug!(message_id = %message.id(), "message dropped by rule");
            self.acknowledger.acknowledge_dropped(&message);
            return;
        }

        if !message.is_complete() {
            counter!(m::INTERPRETER_MESSAGES_INCOMPLETE_TOTAL).increment(1);
            warn!(
                message_id = %message.id(),
                "message is missing message or source, discarding"
            );
            self.acknowledger.acknowledge_dropped(&message);
            return;
        }

        counter!(m::INTERPRETER_MESSAGES_EMITTED_TOTAL).increment(1);
        emitted.push(message);
    }
}

fn listener_for(state: &State) -> &'static dyn InterpreterListener {
    if state.rule_metrics().metrics_enabled {
        &RuleMetricsListener
    } else {
        &NoopListener
    }
}

/// 파이프라인을 차례로 실행합니다. 기한을 넘기면 멈춥니다.
fn run_pipelines(
    message: &mut Message,
    pipelines: &[Arc<Pipeline>],
    budget: &mut LineageBudget,
    deadline: Option<Instant>,
    listener: &dyn InterpreterListener,
) -> PassResult {
    let mut ctx = EvaluationContext::new(message, budget, deadline);

    for pipeline in pipelines {
        let outcome = pipeline.evaluate(&mut ctx, listener);
        trace!(
            pipeline_id = %pipeline.id(),
            message_id = %ctx.message().id(),
            outcome = ?outcome,
            "pipeline evaluated"
        );
        if outcome == PipelineOutcome::TimedOut {
            break;
        }
    }

    let timed_out = ctx.timed_out();
    PassResult {
        created: ctx.into_created(),
        timed_out,
    }
}
