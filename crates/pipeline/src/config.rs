//! 인터프리터 설정
//!
//! [`InterpreterConfig`]는 core의 [`InterpreterSection`](sieve_core::config::InterpreterSection)을
//! 기반으로 인터프리터 실행 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use sieve_core::config::SieveConfig;
//! use sieve_pipeline::config::InterpreterConfig;
//!
//! let core_config = SieveConfig::default();
//! let config = InterpreterConfig::from_core(&core_config.interpreter);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sieve_core::config::{DEFAULT_MAX_CLONES, InterpreterSection};

use crate::error::PipelineError;

/// 동시 처리 계보 수 상한
const MAX_CONCURRENCY: usize = 1024;
/// 계보당 평가 제한 시간 상한 (1분)
const MAX_EVALUATION_TIMEOUT_MS: u64 = 60_000;

/// 인터프리터 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// 계보 루트당 합성 메시지 상한 (`prevent_loops`가 켜진 합성에만 적용)
    pub max_clones: u32,
    /// 계보당 평가 제한 시간 (밀리초, 0이면 비활성)
    pub evaluation_timeout_ms: u64,
    /// `process_concurrent`에서 동시에 평가하는 계보 수
    pub concurrency: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_clones: DEFAULT_MAX_CLONES,
            evaluation_timeout_ms: 0,
            concurrency: 4,
        }
    }
}

impl InterpreterConfig {
    /// core 설정에서 인터프리터 설정을 생성합니다.
    pub fn from_core(core: &InterpreterSection) -> Self {
        Self {
            max_clones: core.max_clones,
            evaluation_timeout_ms: core.evaluation_timeout_ms,
            concurrency: core.concurrency,
        }
    }

    /// 평가 제한 시간. 비활성이면 `None`.
    pub fn evaluation_timeout(&self) -> Option<Duration> {
        (self.evaluation_timeout_ms > 0).then(|| Duration::from_millis(self.evaluation_timeout_ms))
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_clones == 0 {
            return Err(PipelineError::Config {
                field: "max_clones".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(PipelineError::Config {
                field: "concurrency".to_owned(),
                reason: format!("must be 1-{MAX_CONCURRENCY}"),
            });
        }

        if self.evaluation_timeout_ms > MAX_EVALUATION_TIMEOUT_MS {
            return Err(PipelineError::Config {
                field: "evaluation_timeout_ms".to_owned(),
                reason: format!("must be 0-{MAX_EVALUATION_TIMEOUT_MS}"),
            });
        }

        Ok(())
    }
}

/// 인터프리터 설정 빌더
#[derive(Default)]
pub struct InterpreterConfigBuilder {
    config: InterpreterConfig,
}

impl InterpreterConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 합성 메시지 상한을 설정합니다.
    pub fn max_clones(mut self, max_clones: u32) -> Self {
        self.config.max_clones = max_clones;
        self
    }

    /// 평가 제한 시간(밀리초)을 설정합니다.
    pub fn evaluation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.evaluation_timeout_ms = ms;
        self
    }

    /// 동시 처리 계보 수를 설정합니다.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// 설정을 검증하고 `InterpreterConfig`를 생성합니다.
    pub fn build(self) -> Result<InterpreterConfig, PipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
