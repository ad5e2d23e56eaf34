#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`expression`]: 규칙 표현식 소스(YAML)와 평가 트리
//! - [`function`]: 함수 테이블과 기본 제공 함수
//! - [`rule`]: 규칙 정의, 컴파일된 규칙, 규칙 통계
//! - [`stage`] / [`pipeline`]: 스테이지 매치 정책과 파이프라인 평가
//! - [`connections`]: 스트림 -> 파이프라인 연결
//! - [`state`]: 불변 상태 스냅샷과 원자적 교체 핸들
//! - [`store`]: 설정 저장소 (YAML 디렉토리, 인메모리)
//! - [`updater`]: 변경 이벤트를 받아 상태를 다시 만드는 갱신기
//! - [`interpreter`]: 웨이브 기반 메시지 처리와 루프 방지
//! - [`listener`] / [`ack`]: 관찰 훅과 메시지 확인 인터페이스
//! - [`config`]: 인터프리터 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! ConfigurationStore -> Updater -> StateHandle (ArcSwap<State>)
//!                                       |
//!        messages -> PipelineInterpreter -> emitted messages
//!                        |
//!            streams -> pipelines -> stages -> rules -> functions
//! ```

pub mod ack;
pub mod config;
pub mod connections;
pub mod context;
pub mod error;
pub mod expression;
pub mod function;
pub mod interpreter;
pub mod listener;
pub mod pipeline;
pub mod rule;
pub mod stage;
pub mod state;
pub mod store;
pub mod updater;

// --- 주요 타입 re-export ---

// 인터프리터
pub use interpreter::PipelineInterpreter;

// 설정
pub use config::{InterpreterConfig, InterpreterConfigBuilder};

// 에러
pub use error::{CompileError, EvalError, PipelineError};

// 모델
pub use connections::{PipelineConnections, StreamConnections};
pub use pipeline::{Pipeline, PipelineDefinition, PipelineOutcome};
pub use rule::{ConditionOutcome, Rule, RuleDefinition};
pub use stage::{MatchPolicy, Stage, StageDefinition};

// 함수
pub use function::{Function, FunctionArgs, FunctionDescriptor, FunctionRegistry, ParamKind};

// 상태
pub use state::{RuleMetricsConfig, State, StateDefinitions, StateHandle};
pub use store::{ConfigurationStore, FileStore, MemoryStore};
pub use updater::{ChangeEvent, ConfigurationStateUpdater};

// 관찰/확인
pub use ack::{MessageAcknowledger, NoopAcknowledger};
pub use listener::{InterpreterListener, NoopListener, RuleMetricsListener};
