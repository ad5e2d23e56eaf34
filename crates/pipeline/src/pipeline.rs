//! 파이프라인 -- 번호 순으로 실행되는 스테이지 목록

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::context::EvaluationContext;
use crate::error::PipelineError;
use crate::listener::InterpreterListener;
use crate::rule::Rule;
use crate::stage::{Stage, StageDefinition};

/// 파이프라인 정의
///
/// # YAML 스키마
/// ```yaml
/// id: ssh
/// title: SSH processing
/// stages:
///   - stage: 0
///     match: all
///     rules: [tag_ssh]
///   - stage: 10
///     match: either
///     rules: [route_alerts, drop_noise]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}

impl PipelineDefinition {
    /// ID가 비어 있지 않고 스테이지 번호가 중복되지 않는지 검증합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.id.is_empty() {
            return Err(PipelineError::PipelineValidation {
                pipeline_id: "(empty)".to_owned(),
                reason: "pipeline id must not be empty".to_owned(),
            });
        }

        let mut seen = BTreeSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.stage) {
                return Err(PipelineError::PipelineValidation {
                    pipeline_id: self.id.clone(),
                    reason: format!("duplicate stage number {}", stage.stage),
                });
            }
        }

        Ok(())
    }
}

/// 파이프라인 평가 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// 모든 스테이지를 통과
    Completed,
    /// 해당 번호의 스테이지가 일치하지 않아 중단
    StoppedAt(i32),
    /// 평가 기한 초과로 중단
    TimedOut,
}

/// 컴파일된 파이프라인
#[derive(Debug, Clone)]
pub struct Pipeline {
    id: String,
    title: String,
    description: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// 정의를 검증하고 스테이지의 규칙 참조를 해석합니다.
    pub fn compile(
        definition: &PipelineDefinition,
        rules: &BTreeMap<String, Arc<Rule>>,
    ) -> Result<Self, PipelineError> {
        definition.validate()?;

        let mut stages: Vec<Stage> = definition
            .stages
            .iter()
            .map(|stage| Stage::resolve(stage, rules))
            .collect();
        stages.sort_by_key(Stage::number);

        Ok(Self {
            id: definition.id.clone(),
            title: definition.title.clone(),
            description: definition.description.clone(),
            stages,
        })
    }

    /// 스테이지가 없는 파이프라인. 검증에 실패한 정의를 대신합니다.
    pub fn empty(id: impl Into<String>, description: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: description.into(),
            stages: Vec::new(),
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

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// 스테이지를 번호 순으로 평가합니다.
    ///
    /// 일치하지 않는 스테이지나 평가 기한 초과에서 멈춥니다. 드롭 표시는
    /// 스테이지 진행에 영향을 주지 않으며 인터프리터가 모든 파이프라인을 실행한
    /// 뒤에 확인합니다.
    pub fn evaluate(
        &self,
        ctx: &mut EvaluationContext<'_>,
        listener: &dyn InterpreterListener,
    ) -> PipelineOutcome {
        listener.enter_pipeline(&self.id);

        for stage in &self.stages {
            if ctx.deadline_exceeded() {
                return PipelineOutcome::TimedOut;
            }

            listener.enter_stage(&self.id, stage.number());
            let started = Instant::now();
            let matched = stage.evaluate(&self.id, ctx, listener);
            listener.exit_stage(&self.id, stage.number(), matched, started.elapsed());

            tracing::trace!(
                pipeline_id = %self.id,
                stage = stage.number(),
                matched,
                message_id = %ctx.message().id(),
                "stage evaluated"
            );

            if ctx.timed_out() {
                return PipelineOutcome::TimedOut;
            }
            if !matched {
                return PipelineOutcome::StoppedAt(stage.number());
            }
        }

        PipelineOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LineageBudget;
    use crate::function::FunctionRegistry;
    use crate::listener::NoopListener;
    use crate::rule::RuleDefinition;
    use crate::stage::MatchPolicy;
    use chrono::Utc;
    use sieve_core::message::Message;
    use sieve_core::value::Value;

    fn rules(defs: &[&str]) -> BTreeMap<String, Arc<Rule>> {
        let registry = FunctionRegistry::builtin();
        defs.iter()
            .map(|yaml| {
                let def: RuleDefinition = serde_yaml::from_str(yaml).unwrap();
                let rule = Rule::compile(&def, &registry).unwrap();
                (rule.id().to_owned(), Arc::new(rule))
            })
            .collect()
    }

    fn stage(number: i32, rules: &[&str]) -> StageDefinition {
        StageDefinition {
            stage: number,
            match_policy: MatchPolicy::All,
            rules: rules.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    fn run(pipeline: &Pipeline, msg: &mut Message) -> PipelineOutcome {
        let mut budget = LineageBudget::new(msg, 100);
        let mut ctx = EvaluationContext::new(msg, &mut budget, None);
        pipeline.evaluate(&mut ctx, &NoopListener)
    }

    fn message() -> Message {
        Message::new("m", "s", Utc::now())
    }

    #[test]
    fn stages_run_in_ascending_order() {
        let table = rules(&[
            "id: first\nwhen: true\nthen: [{ call: set_field, args: [order, first] }]",
            "id: second\nwhen: true\nthen: [{ call: set_field, args: [order, second] }]",
        ]);
        let def = PipelineDefinition {
            id: "p".to_owned(),
            title: String::new(),
            description: String::new(),
            stages: vec![stage(10, &["second"]), stage(-5, &["first"])],
        };
        let pipeline = Pipeline::compile(&def, &table).unwrap();
        assert_eq!(pipeline.stages()[0].number(), -5);

        let mut msg = message();
        assert_eq!(run(&pipeline, &mut msg), PipelineOutcome::Completed);
        assert_eq!(msg.field("order"), Some(&Value::from("second")));
    }

    #[test]
    fn stops_at_first_unmatched_stage() {
        let table = rules(&[
            "id: no\nwhen: false",
            "id: mark\nwhen: true\nthen: [{ call: set_field, args: [ran, true] }]",
        ]);
        let def = PipelineDefinition {
            id: "p".to_owned(),
            title: String::new(),
            description: String::new(),
            stages: vec![stage(0, &["no"]), stage(10, &["mark"])],
        };
        let pipeline = Pipeline::compile(&def, &table).unwrap();
        let mut msg = message();
        assert_eq!(run(&pipeline, &mut msg), PipelineOutcome::StoppedAt(0));
        assert!(!msg.has_field("ran"));
    }

    #[test]
    fn drop_does_not_halt_later_stages() {
        let table = rules(&[
            "id: drop\nwhen: true\nthen: [{ call: drop_message }]",
            "id: mark\nwhen: true\nthen: [{ call: set_field, args: [ran, true] }]",
        ]);
        let def = PipelineDefinition {
            id: "p".to_owned(),
            title: String::new(),
            description: String::new(),
            stages: vec![stage(0, &["drop"]), stage(10, &["mark"])],
        };
        let pipeline = Pipeline::compile(&def, &table).unwrap();
        let mut msg = message();
        assert_eq!(run(&pipeline, &mut msg), PipelineOutcome::Completed);
        assert!(msg.filter_out());
        assert_eq!(msg.field("ran"), Some(&Value::Bool(true)));
    }

    #[test]
    fn duplicate_stage_numbers_are_rejected() {
        let def = PipelineDefinition {
            id: "p".to_owned(),
            title: String::new(),
            description: String::new(),
            stages: vec![stage(0, &[]), stage(0, &[])],
        };
        assert!(matches!(
            Pipeline::compile(&def, &BTreeMap::new()),
            Err(PipelineError::PipelineValidation { .. })
        ));
    }

    #[test]
    fn empty_pipeline_is_noop() {
        let pipeline = Pipeline::empty("p", "invalid definition");
        let mut msg = message();
        let before = msg.clone();
        assert_eq!(run(&pipeline, &mut msg), PipelineOutcome::Completed);
        assert_eq!(msg, before);
    }

    #[test]
    fn parse_pipeline_yaml() {
        let yaml = r#"
id: ssh
stages:
  - stage: 0
    rules: [a]
  - stage: 10
    match: either
    rules: [b, c]
"#;
        let def: PipelineDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.stages.len(), 2);
        assert!(def.validate().is_ok());
    }
}
