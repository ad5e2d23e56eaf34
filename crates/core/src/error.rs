//! 에러 타입 -- 도메인별 에러 정의

/// Sieve 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SieveError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 정의 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 메시지 필드 조작 에러
    #[error("field error: {0}")]
    Field(#[from] FieldError),

    /// 인터프리터 에러
    #[error("interpreter error: {0}")]
    Interpreter(#[from] InterpreterError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 정의 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 컬렉션 로드 실패
    #[error("failed to load {collection}: {reason}")]
    Load { collection: String, reason: String },

    /// 저장소에 접근할 수 없음
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// 메시지 필드 조작 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// 빈 필드 이름
    #[error("field name must not be empty")]
    EmptyName,

    /// 예약 필드는 제거할 수 없음
    #[error("reserved field '{name}' cannot be removed")]
    ReservedRemoval { name: String },

    /// 읽기 전용 필드
    #[error("field '{name}' is read-only")]
    ReadOnly { name: String },
}

/// 인터프리터 에러
#[derive(Debug, thiserror::Error)]
pub enum InterpreterError {
    /// 초기화 실패
    #[error("interpreter init failed: {0}")]
    InitFailed(String),

    /// 상태 갱신 실패
    #[error("state reload failed: {0}")]
    ReloadFailed(String),

    /// 작업 실행 실패
    #[error("worker failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_error_converts_to_top_level() {
        let err: SieveError = FieldError::ReservedRemoval {
            name: "message".to_owned(),
        }
        .into();
        assert!(matches!(err, SieveError::Field(_)));
        assert!(err.to_string().contains("message"));
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Load {
            collection: "rules".to_owned(),
            reason: "connection reset".to_owned(),
        };
        assert_eq!(err.to_string(), "failed to load rules: connection reset");
    }
}
