//! 파이프라인 처리 에러 타입
//!
//! - [`PipelineError`]: 정의 로딩, 컴파일, 상태 갱신, 설정 등 크레이트 수준 에러.
//!   `From<PipelineError> for SieveError` 변환이 구현되어 있어 상위 레이어에서
//!   `?` 연산자로 전파할 수 있습니다.
//! - [`CompileError`]: 표현식 소스를 평가 트리로 컴파일할 때의 에러.
//! - [`EvalError`]: 메시지 평가 중 발생하는 런타임 에러. 규칙 경계에서
//!   잡혀 메트릭과 처리 에러 주석으로 기록되며 배치 호출자로 전파되지 않습니다.

use sieve_core::error::{ConfigError, FieldError, InterpreterError, SieveError, StoreError};
use sieve_core::value::ValueKind;

use crate::function::ParamKind;

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 정의 파일 로딩 실패
    #[error("definition load error: {path}: {reason}")]
    DefinitionLoad {
        /// 파일 또는 디렉토리 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 정의 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation { rule_id: String, reason: String },

    /// 규칙 표현식 컴파일 실패
    #[error("rule compile error: rule '{rule_id}': {source}")]
    RuleCompile {
        rule_id: String,
        #[source]
        source: CompileError,
    },

    /// 파이프라인 정의 검증 실패
    #[error("pipeline validation error: pipeline '{pipeline_id}': {reason}")]
    PipelineValidation {
        pipeline_id: String,
        reason: String,
    },

    /// 같은 이름의 함수가 이미 등록됨
    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 작업 스레드 실패
    #[error("worker join error: {0}")]
    Join(String),

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for SieveError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Store(e) => SieveError::Store(e),
            PipelineError::Io(e) => SieveError::Io(e),
            PipelineError::Config { field, reason } => {
                SieveError::Config(ConfigError::InvalidValue { field, reason })
            }
            PipelineError::Join(reason) => SieveError::Interpreter(InterpreterError::Worker(reason)),
            other => SieveError::Interpreter(InterpreterError::InitFailed(other.to_string())),
        }
    }
}

/// 표현식 컴파일 에러
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// 등록되지 않은 함수
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// 함수에 없는 파라미터
    #[error("function '{function}' has no parameter '{param}'")]
    UnknownParameter { function: String, param: String },

    /// 기본값 없는 필수 파라미터 누락
    #[error("function '{function}' requires parameter '{param}'")]
    MissingParameter { function: String, param: String },

    /// 위치 인자 개수 초과
    #[error("function '{function}' takes at most {expected} arguments, got {actual}")]
    TooManyArguments {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// 연산자 피연산자 개수 불일치
    #[error("operator '{operator}' expects {expected} operands, got {actual}")]
    Arity {
        operator: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 리터럴 인자 타입 불일치
    #[error("argument '{param}' of function '{function}' must be {expected}, got {actual}")]
    LiteralType {
        function: String,
        param: String,
        expected: ParamKind,
        actual: ValueKind,
    },
}

/// 표현식 평가 에러
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// 함수 실행 실패
    #[error("function '{function}' failed: {reason}")]
    Function { function: String, reason: String },

    /// 필수 인자가 null로 평가됨
    #[error("missing required argument '{param}' for function '{function}'")]
    MissingArgument { function: String, param: String },

    /// 인자 타입 불일치
    #[error("argument '{param}' of function '{function}' must be {expected}, got {actual}")]
    TypeMismatch {
        function: String,
        param: String,
        expected: ParamKind,
        actual: ValueKind,
    },

    /// 연산자 적용 불가
    #[error("operator '{operator}' cannot be applied: {reason}")]
    InvalidOperand {
        operator: &'static str,
        reason: String,
    },

    /// 불리언이 필요한 위치에 다른 값
    #[error("expected a boolean, got {actual}")]
    NotBoolean { actual: ValueKind },

    /// 메시지 필드 조작 실패
    #[error(transparent)]
    Field(#[from] FieldError),
}

impl EvalError {
    /// 함수 실패 에러를 생성합니다.
    pub fn function(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Function {
            function: function.into(),
            reason: reason.into(),
        }
    }
}
