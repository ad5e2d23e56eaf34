//! 규칙 -- 조건(`when`)과 액션 목록(`then`)
//!
//! [`Rule`]은 [`RuleDefinition`]을 함수 테이블로 컴파일한 결과입니다.
//! 평가 중 발생한 에러는 규칙 경계에서 잡혀 로그, 통계, 메시지 처리 에러
//! 주석으로 기록되고 호출자에게는 불리언 결과만 전달됩니다.
//!
//! - 조건 에러: 불일치로 취급 (`RuleConditionEvaluationError`)
//! - 액션 에러: 나머지 액션은 계속 실행, 규칙은 실패로 표시
//!   (`RuleStatementEvaluationError`)

pub mod types;

pub use types::RuleDefinition;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use sieve_core::message::{ProcessingError, ProcessingFailureCause};
use sieve_core::value::Value;

use crate::context::EvaluationContext;
use crate::error::PipelineError;
use crate::expression::Expression;
use crate::function::FunctionRegistry;

/// 조건 평가 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOutcome {
    Matched,
    NotMatched,
    /// 평가 중 에러 (불일치로 취급)
    Failed,
}

impl ConditionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::NotMatched => "not_matched",
            Self::Failed => "failed",
        }
    }
}

/// 규칙별 누적 통계
#[derive(Debug, Default)]
pub struct RuleStats {
    evaluated: AtomicU64,
    matched: AtomicU64,
    not_matched: AtomicU64,
    failed: AtomicU64,
    executed: AtomicU64,
    action_failures: AtomicU64,
}

/// [`RuleStats`] 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleStatsSnapshot {
    pub evaluated: u64,
    pub matched: u64,
    pub not_matched: u64,
    pub failed: u64,
    pub executed: u64,
    pub action_failures: u64,
}

impl RuleStats {
    pub fn snapshot(&self) -> RuleStatsSnapshot {
        RuleStatsSnapshot {
            evaluated: self.evaluated.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            not_matched: self.not_matched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            action_failures: self.action_failures.load(Ordering::Relaxed),
        }
    }
}

/// 컴파일된 규칙
#[derive(Debug)]
pub struct Rule {
    id: String,
    title: String,
    description: String,
    source: Option<String>,
    when: Expression,
    then: Vec<Expression>,
    stats: RuleStats,
}

impl Rule {
    /// 규칙 정의를 검증하고 컴파일합니다.
    pub fn compile(
        definition: &RuleDefinition,
        registry: &FunctionRegistry,
    ) -> Result<Self, PipelineError> {
        definition.validate()?;

        let compile_err = |source| PipelineError::RuleCompile {
            rule_id: definition.id.clone(),
            source,
        };
        let when = definition.when.compile(registry).map_err(compile_err)?;
        let then = definition
            .then
            .iter()
            .map(|action| action.compile(registry).map_err(compile_err))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: definition.id.clone(),
            title: definition.display_name().to_owned(),
            description: definition.description.clone(),
            source: definition.source.clone(),
            when,
            then,
            stats: RuleStats::default(),
        })
    }

    /// 절대 일치하지 않는 규칙을 만듭니다. 컴파일에 실패한 정의를 대신합니다.
    pub fn always_false(id: impl Into<String>, reason: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: reason.into(),
            source: None,
            when: Expression::Literal(Value::Bool(false)),
            then: Vec::new(),
            stats: RuleStats::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn stats(&self) -> &RuleStats {
        &self.stats
    }

    /// 조건과 모든 액션이 순수한지 여부
    pub fn is_pure(&self) -> bool {
        self.when.is_pure() && self.then.iter().all(Expression::is_pure)
    }

    /// 조건을 평가합니다.
    pub fn evaluate_condition(&self, ctx: &mut EvaluationContext<'_>) -> ConditionOutcome {
        self.stats.evaluated.fetch_add(1, Ordering::Relaxed);

        match self.when.evaluate_bool(ctx) {
            Ok(true) => {
                self.stats.matched.fetch_add(1, Ordering::Relaxed);
                ConditionOutcome::Matched
            }
            Ok(false) => {
                self.stats.not_matched.fetch_add(1, Ordering::Relaxed);
                ConditionOutcome::NotMatched
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    rule_id = %self.id,
                    message_id = %ctx.message().id(),
                    error = %e,
                    "rule condition evaluation failed"
                );
                ctx.message_mut().add_processing_error(ProcessingError::new(
                    ProcessingFailureCause::RuleConditionEvaluationError,
                    format!("Error evaluating condition for rule <{}> ({})", self.title, self.id),
                    e.to_string(),
                ));
                ConditionOutcome::Failed
            }
        }
    }

    /// 조건이 일치하는지 확인합니다. 에러는 불일치입니다.
    pub fn matches(&self, ctx: &mut EvaluationContext<'_>) -> bool {
        self.evaluate_condition(ctx) == ConditionOutcome::Matched
    }

    /// 액션을 선언 순서대로 실행합니다. 모두 성공했으면 `true`.
    ///
    /// 실패한 액션이 있어도 나머지 액션은 실행됩니다.
    pub fn run(&self, ctx: &mut EvaluationContext<'_>) -> bool {
        self.stats.executed.fetch_add(1, Ordering::Relaxed);

        let mut succeeded = true;
        for (index, action) in self.then.iter().enumerate() {
            if let Err(e) = action.evaluate(ctx) {
                succeeded = false;
                tracing::warn!(
                    rule_id = %self.id,
                    message_id = %ctx.message().id(),
                    action = index,
                    error = %e,
                    "rule action failed"
                );
                ctx.message_mut().add_processing_error(ProcessingError::new(
                    ProcessingFailureCause::RuleStatementEvaluationError,
                    format!("Error evaluating action for rule <{}> ({})", self.title, self.id),
                    e.to_string(),
                ));
            }
        }

        if !succeeded {
            self.stats.action_failures.fetch_add(1, Ordering::Relaxed);
        }
        succeeded
    }
}
