//! 설정 관리 -- sieve.toml 파싱 및 런타임 설정
//!
//! [`SieveConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SIEVE_INTERPRETER_MAX_CLONES=50` 형식)
//! 3. 설정 파일 (`sieve.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sieve_core::error::SieveError> {
//! use sieve_core::config::SieveConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SieveConfig::load("sieve.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SieveConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SieveError};

/// 루프 방지 기본 상한 (계보 루트당 합성 메시지 수)
pub const DEFAULT_MAX_CLONES: u32 = 100;

/// Sieve 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SieveConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 인터프리터 설정
    #[serde(default)]
    pub interpreter: InterpreterSection,
    /// 정의 저장소 설정
    #[serde(default)]
    pub store: StoreSection,
}

impl SieveConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SieveError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SieveError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SieveError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SieveError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SieveError> {
        toml::from_str(toml_str).map_err(|e| {
            SieveError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SIEVE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SIEVE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SIEVE_GENERAL_LOG_FORMAT");

        // Interpreter
        override_u32(
            &mut self.interpreter.max_clones,
            "SIEVE_INTERPRETER_MAX_CLONES",
        );
        override_u64(
            &mut self.interpreter.evaluation_timeout_ms,
            "SIEVE_INTERPRETER_EVALUATION_TIMEOUT_MS",
        );
        override_usize(
            &mut self.interpreter.concurrency,
            "SIEVE_INTERPRETER_CONCURRENCY",
        );

        // Store
        override_string(&mut self.store.config_dir, "SIEVE_STORE_CONFIG_DIR");
        override_u64(
            &mut self.store.reload_interval_secs,
            "SIEVE_STORE_RELOAD_INTERVAL_SECS",
        );
        override_usize(
            &mut self.store.change_channel_capacity,
            "SIEVE_STORE_CHANGE_CHANNEL_CAPACITY",
        );
        override_bool(
            &mut self.store.rule_metrics_enabled,
            "SIEVE_STORE_RULE_METRICS_ENABLED",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SieveError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.interpreter.max_clones == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interpreter.max_clones".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.interpreter.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interpreter.concurrency".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.store.config_dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.config_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.store.change_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.change_channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 인터프리터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterSection {
    /// 계보 루트당 합성 메시지 상한
    pub max_clones: u32,
    /// 계보당 평가 제한 시간 (밀리초, 0이면 비활성)
    pub evaluation_timeout_ms: u64,
    /// 병렬 처리 시 동시에 평가하는 계보 수
    pub concurrency: usize,
}

impl Default for InterpreterSection {
    fn default() -> Self {
        Self {
            max_clones: DEFAULT_MAX_CLONES,
            evaluation_timeout_ms: 0,
            concurrency: 4,
        }
    }
}

/// 정의 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// 규칙/파이프라인/연결 정의 디렉토리
    pub config_dir: String,
    /// 주기적 리로드 간격 (초, 0이면 이벤트 기반만)
    pub reload_interval_secs: u64,
    /// 변경 이벤트 채널 용량
    pub change_channel_capacity: usize,
    /// 규칙별 메트릭 기록 여부
    pub rule_metrics_enabled: bool,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            config_dir: "/etc/sieve".to_owned(),
            reload_interval_secs: 0,
            change_channel_capacity: 64,
            rule_metrics_enabled: false,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
