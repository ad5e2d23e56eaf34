//! 설정 상태 갱신기
//!
//! [`ConfigurationStateUpdater`]는 저장소에서 정의를 읽어 [`State`]를
//! 컴파일하고 [`StateHandle`]에 원자적으로 교체합니다.
//!
//! - 리로드는 비동기 뮤텍스로 직렬화됩니다.
//! - 리로드가 실패하면 이전 상태를 유지하고 다음 트리거에서 다시 시도합니다.
//! - [`spawn`](ConfigurationStateUpdater::spawn)으로 변경 이벤트 채널과 주기적
//!   리로드를 처리하는 백그라운드 태스크를 띄울 수 있습니다. 연속으로 도착한
//!   이벤트는 한 번의 리로드로 합쳐집니다.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::counter;
use sieve_core::metrics as m;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::function::FunctionRegistry;
use crate::state::{State, StateHandle};
use crate::store::{ConfigurationStore, load_definitions};

/// 저장소 변경 알림
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    RulesChanged {
        updated: BTreeSet<String>,
        deleted: BTreeSet<String>,
    },
    PipelinesChanged {
        updated: BTreeSet<String>,
        deleted: BTreeSet<String>,
    },
    ConnectionsChanged {
        streams: BTreeSet<String>,
    },
    RuleMetricsConfigChanged,
}

/// 설정 상태 갱신기
pub struct ConfigurationStateUpdater<S> {
    store: Arc<S>,
    registry: Arc<FunctionRegistry>,
    state: StateHandle,
    generation: AtomicU64,
    reload_lock: Mutex<()>,
}

impl<S: ConfigurationStore> ConfigurationStateUpdater<S> {
    /// 갱신기를 만들고 초기 상태를 로드합니다.
    ///
    /// # Errors
    /// 초기 로드가 실패하면 에러를 반환합니다.
    pub async fn new(store: Arc<S>, registry: Arc<FunctionRegistry>) -> Result<Self, PipelineError> {
        let updater = Self {
            store,
            registry,
            state: StateHandle::default(),
            generation: AtomicU64::new(0),
            reload_lock: Mutex::new(()),
        };
        updater.reload().await?;
        Ok(updater)
    }

    /// 인터프리터와 공유할 상태 핸들
    pub fn handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// 최신 상태 스냅샷
    pub fn latest(&self) -> Arc<State> {
        self.state.load()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// 저장소에서 정의를 다시 읽어 상태를 교체합니다.
    ///
    /// 실패하면 현재 상태를 그대로 유지합니다.
    pub async fn reload(&self) -> Result<Arc<State>, PipelineError> {
        let _guard = self.reload_lock.lock().await;
        let started = Instant::now();

        let definitions = match load_definitions(self.store.as_ref()).await {
            Ok(definitions) => definitions,
            Err(e) => {
                counter!(m::STATE_RELOADS_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                error!(
                    error = %e,
                    generation = self.state.load().generation(),
                    "configuration reload failed, keeping previous state"
                );
                return Err(e.into());
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let state = Arc::new(State::compile(&definitions, &self.registry).with_generation(generation));
        self.state.store(Arc::clone(&state));

        counter!(m::STATE_RELOADS_TOTAL, m::LABEL_RESULT => "success").increment(1);
        info!(
            generation,
            rules = state.rules().len(),
            pipelines = state.pipelines().len(),
            streams = state.connections().stream_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "configuration state reloaded"
        );

        Ok(state)
    }

    /// 변경 이벤트와 주기적 리로드를 처리하는 백그라운드 태스크를 시작합니다.
    ///
    /// 취소 토큰이 취소되거나 이벤트 채널이 닫히면 종료합니다.
    pub fn spawn(
        self: Arc<Self>,
        mut events: mpsc::Receiver<ChangeEvent>,
        cancel: CancellationToken,
        reload_interval: Option<Duration>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = reload_interval.filter(|p| !p.is_zero()).map(|period| {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });

            info!(
                interval_secs = reload_interval.map(|d| d.as_secs()),
                "state updater started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("state updater received shutdown signal");
                        break;
                    }
                    event = events.recv() => {
                        let Some(event) = event else {
                            info!("change channel closed, stopping state updater");
                            break;
                        };
                        debug!(event = ?event, "received change event");

                        let mut coalesced = 1usize;
                        while let Ok(event) = events.try_recv() {
                            debug!(event = ?event, "received change event");
                            coalesced += 1;
                        }
                        debug!(events = coalesced, "reloading after change events");

                        // 실패는 reload()에서 기록됨
                        let _ = self.reload().await;
                    }
                    _ = next_tick(&mut ticker) => {
                        debug!("periodic reload");
                        let _ = self.reload().await;
                    }
                }
            }
        })
    }
}

/// 주기가 없으면 영원히 대기합니다.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
