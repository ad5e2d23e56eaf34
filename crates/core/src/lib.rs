//! Sieve 공통 크레이트
//!
//! 파이프라인 인터프리터와 CLI가 공유하는 메시지 모델, 값 타입, 에러, 설정,
//! 메트릭 이름을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`value`]: 필드 값 태그드 유니온
//! - [`message`]: 메시지, 계보, 처리 에러 주석
//! - [`config`]: `sieve.toml` 설정 및 환경변수 오버라이드
//! - [`metrics`]: 메트릭 이름/레이블 상수와 설명 등록
//! - [`error`]: 도메인 에러 타입

pub mod config;
pub mod error;
pub mod message;
pub mod metrics;
pub mod value;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, FieldError, InterpreterError, SieveError, StoreError};

// 설정
pub use config::SieveConfig;

// 메시지 모델
pub use message::{Lineage, Message, ProcessingError, ProcessingFailureCause};
pub use value::{Value, ValueKind};
