//! 스테이지 -- 같은 번호로 묶인 규칙 집합과 일치 정책

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use sieve_core::metrics as m;

use crate::context::EvaluationContext;
use crate::listener::InterpreterListener;
use crate::rule::{ConditionOutcome, Rule};

/// 스테이지 일치 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// 모든 규칙이 일치해야 다음 스테이지로 진행 (기본값)
    #[default]
    All,
    /// 하나 이상 일치하면 진행
    Either,
    /// 일치 여부와 무관하게 진행
    Pass,
}

/// 스테이지 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// 스테이지 번호 (오름차순 실행)
    pub stage: i32,
    /// 일치 정책
    #[serde(rename = "match", default)]
    pub match_policy: MatchPolicy,
    /// 규칙 ID 목록 (선언 순서대로 평가)
    #[serde(default)]
    pub rules: Vec<String>,
}

/// 스테이지의 규칙 참조
#[derive(Debug, Clone)]
pub enum StageRule {
    Resolved(Arc<Rule>),
    /// 로드된 규칙이 없는 참조
    Unresolved(String),
}

impl StageRule {
    pub fn id(&self) -> &str {
        match self {
            Self::Resolved(rule) => rule.id(),
            Self::Unresolved(id) => id,
        }
    }
}

/// 컴파일된 스테이지
#[derive(Debug, Clone)]
pub struct Stage {
    number: i32,
    policy: MatchPolicy,
    rules: Vec<StageRule>,
}

impl Stage {
    /// 규칙 테이블로 참조를 해석합니다. 없는 규칙은 `Unresolved`로 남습니다.
    pub fn resolve(definition: &StageDefinition, rules: &BTreeMap<String, Arc<Rule>>) -> Self {
        let rules = definition
            .rules
            .iter()
            .map(|id| match rules.get(id) {
                Some(rule) => StageRule::Resolved(Arc::clone(rule)),
                None => StageRule::Unresolved(id.clone()),
            })
            .collect();

        Self {
            number: definition.stage,
            policy: definition.match_policy,
            rules,
        }
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn rules(&self) -> &[StageRule] {
        &self.rules
    }

    /// 스테이지를 평가하고 다음 스테이지로 진행할지 반환합니다.
    ///
    /// 일치한 규칙의 액션은 즉시 실행됩니다. 평가 기한을 넘기면 남은
    /// 규칙을 건너뛰고 `false`를 반환합니다.
    pub fn evaluate(
        &self,
        pipeline_id: &str,
        ctx: &mut EvaluationContext<'_>,
        listener: &dyn InterpreterListener,
    ) -> bool {
        let mut resolved = 0usize;
        let mut matched = 0usize;
        let mut unresolved: Vec<&str> = Vec::new();

        for stage_rule in &self.rules {
            if ctx.deadline_exceeded() {
                return false;
            }

            let rule = match stage_rule {
                StageRule::Resolved(rule) => rule,
                StageRule::Unresolved(id) => {
                    unresolved.push(id);
                    continue;
                }
            };

            resolved += 1;
            let outcome = rule.evaluate_condition(ctx);
            listener.rule_evaluated(pipeline_id, self.number, rule, outcome);
            if outcome == ConditionOutcome::Matched {
                matched += 1;
                let succeeded = rule.run(ctx);
                listener.rule_executed(pipeline_id, self.number, rule, succeeded);
            }
        }

        if !unresolved.is_empty() {
            tracing::warn!(
                pipeline_id,
                stage = self.number,
                rules = ?unresolved,
                "stage references rules that are not loaded"
            );
            counter!(m::RULE_UNRESOLVED_REFERENCES_TOTAL).increment(unresolved.len() as u64);
        }

        match self.policy {
            MatchPolicy::All => resolved > 0 && unresolved.is_empty() && matched == resolved,
            MatchPolicy::Either => matched > 0,
            MatchPolicy::Pass => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LineageBudget;
    use crate::function::FunctionRegistry;
    use crate::listener::NoopListener;
    use crate::rule::RuleDefinition;
    use chrono::Utc;
    use sieve_core::message::Message;
    use sieve_core::value::Value;

    fn rules() -> BTreeMap<String, Arc<Rule>> {
        let registry = FunctionRegistry::builtin();
        [
            "id: yes\nwhen: true\nthen: [{ call: set_field, args: [yes_ran, true] }]",
            "id: no\nwhen: false\nthen: [{ call: set_field, args: [no_ran, true] }]",
        ]
        .into_iter()
        .map(|yaml| {
            let def: RuleDefinition = serde_yaml::from_str(yaml).unwrap();
            let rule = Rule::compile(&def, &registry).unwrap();
            (rule.id().to_owned(), Arc::new(rule))
        })
        .collect()
    }

    fn stage(policy: MatchPolicy, ids: &[&str]) -> Stage {
        let def = StageDefinition {
            stage: 0,
            match_policy: policy,
            rules: ids.iter().map(|s| (*s).to_owned()).collect(),
        };
        Stage::resolve(&def, &rules())
    }

    fn evaluate(stage: &Stage, msg: &mut Message) -> bool {
        let mut budget = LineageBudget::new(msg, 100);
        let mut ctx = EvaluationContext::new(msg, &mut budget, None);
        stage.evaluate("p", &mut ctx, &NoopListener)
    }

    fn message() -> Message {
        Message::new("m", "s", Utc::now())
    }

    #[test]
    fn all_requires_every_rule() {
        let mut msg = message();
        assert!(evaluate(&stage(MatchPolicy::All, &["yes"]), &mut msg));
        assert!(!evaluate(&stage(MatchPolicy::All, &["yes", "no"]), &mut msg));
    }

    #[test]
    fn matched_actions_run_even_when_stage_fails() {
        let mut msg = message();
        assert!(!evaluate(&stage(MatchPolicy::All, &["yes", "no"]), &mut msg));
        assert_eq!(msg.field("yes_ran"), Some(&Value::Bool(true)));
        assert!(!msg.has_field("no_ran"));
    }

    #[test]
    fn either_requires_one_rule() {
        let mut msg = message();
        assert!(evaluate(&stage(MatchPolicy::Either, &["no", "yes"]), &mut msg));
        assert!(!evaluate(&stage(MatchPolicy::Either, &["no"]), &mut msg));
    }

    #[test]
    fn pass_always_continues() {
        let mut msg = message();
        assert!(evaluate(&stage(MatchPolicy::Pass, &["no"]), &mut msg));
        assert!(evaluate(&stage(MatchPolicy::Pass, &[]), &mut msg));
    }

    #[test]
    fn empty_stage_does_not_match() {
        let mut msg = message();
        assert!(!evaluate(&stage(MatchPolicy::All, &[]), &mut msg));
        assert!(!evaluate(&stage(MatchPolicy::Either, &[]), &mut msg));
    }

    #[test]
    fn unresolved_reference_fails_all_but_not_either() {
        let s = stage(MatchPolicy::All, &["yes", "missing"]);
        assert!(matches!(s.rules()[1], StageRule::Unresolved(ref id) if id == "missing"));
        let mut msg = message();
        assert!(!evaluate(&s, &mut msg));
        assert!(evaluate(&stage(MatchPolicy::Either, &["yes", "missing"]), &mut msg));
    }

    #[test]
    fn match_policy_deserializes_lowercase() {
        let def: StageDefinition =
            serde_yaml::from_str("stage: 5\nmatch: either\nrules: [a]").unwrap();
        assert_eq!(def.match_policy, MatchPolicy::Either);
        let def: StageDefinition = serde_yaml::from_str("stage: 5").unwrap();
        assert_eq!(def.match_policy, MatchPolicy::All);
    }
}
