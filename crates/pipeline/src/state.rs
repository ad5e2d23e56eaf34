//! 설정 상태 -- 컴파일된 규칙, 파이프라인, 스트림 연결의 불변 스냅샷
//!
//! [`State`]는 한 번 만들어지면 변경되지 않습니다. 갱신은 새 스냅샷을 컴파일해
//! [`StateHandle`]에 원자적으로 교체하는 방식으로 이루어집니다. 처리 중인
//! 배치는 시작 시점에 읽은 스냅샷을 끝까지 사용합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use metrics::gauge;
use serde::{Deserialize, Serialize};
use sieve_core::metrics as m;

use crate::connections::{PipelineConnections, StreamConnections};
use crate::function::FunctionRegistry;
use crate::pipeline::{Pipeline, PipelineDefinition};
use crate::rule::{Rule, RuleDefinition};

/// 규칙 메트릭 설정
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleMetricsConfig {
    /// 규칙/스테이지 단위 메트릭 기록 여부
    pub metrics_enabled: bool,
}

/// 상태 컴파일 입력
#[derive(Debug, Clone, Default)]
pub struct StateDefinitions {
    pub rules: Vec<RuleDefinition>,
    pub pipelines: Vec<PipelineDefinition>,
    pub connections: Vec<PipelineConnections>,
    pub rule_metrics: RuleMetricsConfig,
}

/// 컴파일된 설정 스냅샷
#[derive(Debug, Default)]
pub struct State {
    rules: BTreeMap<String, Arc<Rule>>,
    pipelines: BTreeMap<String, Arc<Pipeline>>,
    connections: StreamConnections,
    rule_metrics: RuleMetricsConfig,
    generation: u64,
}

impl State {
    /// 규칙도 파이프라인도 없는 상태
    pub fn empty() -> Self {
        Self::default()
    }

    /// 정의를 컴파일합니다. 개별 정의의 실패로 전체가 실패하지는 않습니다.
    ///
    /// - 컴파일에 실패한 규칙은 항상 불일치하는 규칙으로 대체됩니다.
    /// - 같은 ID의 규칙/파이프라인은 처음 것만 사용합니다.
    /// - 검증에 실패한 파이프라인은 빈 파이프라인으로 대체됩니다.
    pub fn compile(definitions: &StateDefinitions, registry: &FunctionRegistry) -> Self {
        let mut rules: BTreeMap<String, Arc<Rule>> = BTreeMap::new();
        for definition in &definitions.rules {
            if rules.contains_key(&definition.id) {
                tracing::warn!(rule_id = %definition.id, "duplicate rule id, skipping");
                continue;
            }
            let rule = Rule::compile(definition, registry).unwrap_or_else(|e| {
                tracing::warn!(
                    rule_id = %definition.id,
                    error = %e,
                    "rule failed to compile, replacing with always-false rule"
                );
                Rule::always_false(definition.id.clone(), e.to_string())
            });
            rules.insert(definition.id.clone(), Arc::new(rule));
        }

        let mut pipelines: BTreeMap<String, Arc<Pipeline>> = BTreeMap::new();
        for definition in &definitions.pipelines {
            if pipelines.contains_key(&definition.id) {
                tracing::warn!(pipeline_id = %definition.id, "duplicate pipeline id, skipping");
                continue;
            }
            let pipeline = Pipeline::compile(definition, &rules).unwrap_or_else(|e| {
                tracing::warn!(
                    pipeline_id = %definition.id,
                    error = %e,
                    "pipeline is invalid, replacing with empty pipeline"
                );
                Pipeline::empty(definition.id.clone(), e.to_string())
            });
            pipelines.insert(definition.id.clone(), Arc::new(pipeline));
        }

        let connections = StreamConnections::build(&definitions.connections, &pipelines);

        gauge!(m::STATE_RULES_LOADED).set(rules.len() as f64);
        gauge!(m::STATE_PIPELINES_LOADED).set(pipelines.len() as f64);
        gauge!(m::STATE_CONNECTED_STREAMS).set(connections.stream_count() as f64);

        tracing::debug!(
            rules = rules.len(),
            pipelines = pipelines.len(),
            streams = connections.stream_count(),
            "compiled configuration state"
        );

        Self {
            rules,
            pipelines,
            connections,
            rule_metrics: definitions.rule_metrics,
            generation: 0,
        }
    }

    /// 세대 번호를 지정합니다.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn rules(&self) -> &BTreeMap<String, Arc<Rule>> {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Arc<Rule>> {
        self.rules.get(id)
    }

    pub fn pipelines(&self) -> &BTreeMap<String, Arc<Pipeline>> {
        &self.pipelines
    }

    pub fn pipeline(&self, id: &str) -> Option<&Arc<Pipeline>> {
        self.pipelines.get(id)
    }

    pub fn connections(&self) -> &StreamConnections {
        &self.connections
    }

    pub fn rule_metrics(&self) -> RuleMetricsConfig {
        self.rule_metrics
    }

    /// 리로드마다 1씩 증가하는 세대 번호 (빈 초기 상태는 0)
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// 최신 상태에 대한 공유 핸들
///
/// 읽기는 잠금 없이 현재 스냅샷의 `Arc`를 얻습니다.
#[derive(Debug, Clone)]
pub struct StateHandle {
    inner: Arc<ArcSwap<State>>,
}

impl StateHandle {
    pub fn new(state: State) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(state)),
        }
    }

    /// 현재 스냅샷
    pub fn load(&self) -> Arc<State> {
        self.inner.load_full()
    }

    /// 스냅샷을 교체합니다.
    pub fn store(&self, state: Arc<State>) {
        self.inner.store(state);
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new(State::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{MatchPolicy, StageDefinition};

    fn rule(yaml: &str) -> RuleDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn pipeline(id: &str, stages: Vec<StageDefinition>) -> PipelineDefinition {
        PipelineDefinition {
            id: id.to_owned(),
            title: String::new(),
            description: String::new(),
            stages,
        }
    }

    fn stage(number: i32, rules: &[&str]) -> StageDefinition {
        StageDefinition {
            stage: number,
            match_policy: MatchPolicy::All,
            rules: rules.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn broken_rule_becomes_always_false() {
        let defs = StateDefinitions {
            rules: vec![rule("id: broken\nwhen: { call: nope }")],
            ..Default::default()
        };
        let state = State::compile(&defs, &FunctionRegistry::builtin());
        let broken = state.rule("broken").unwrap();
        assert!(broken.description().contains("unknown function 'nope'"));
    }

    #[test]
    fn duplicate_rule_keeps_first() {
        let defs = StateDefinitions {
            rules: vec![
                rule("id: r\ntitle: first\nwhen: true"),
                rule("id: r\ntitle: second\nwhen: true"),
            ],
            ..Default::default()
        };
        let state = State::compile(&defs, &FunctionRegistry::builtin());
        assert_eq!(state.rules().len(), 1);
        assert_eq!(state.rule("r").unwrap().title(), "first");
    }

    #[test]
    fn invalid_pipeline_becomes_empty() {
        let defs = StateDefinitions {
            pipelines: vec![pipeline("p", vec![stage(0, &[]), stage(0, &[])])],
            ..Default::default()
        };
        let state = State::compile(&defs, &FunctionRegistry::builtin());
        assert!(state.pipeline("p").unwrap().is_empty());
    }

    #[test]
    fn connections_ignore_unknown_pipelines() {
        let defs = StateDefinitions {
            pipelines: vec![pipeline("p", vec![stage(0, &["r"])])],
            connections: vec![PipelineConnections::new("s", ["p", "ghost"])],
            ..Default::default()
        };
        let state = State::compile(&defs, &FunctionRegistry::builtin());
        assert_eq!(state.connections().for_stream("s").len(), 1);
    }

    #[test]
    fn handle_swaps_snapshots() {
        let handle = StateHandle::default();
        let before = handle.load();
        assert_eq!(before.generation(), 0);
        handle.store(Arc::new(State::empty().with_generation(7)));
        assert_eq!(handle.load().generation(), 7);
        // 이전 스냅샷은 그대로 유지된다
        assert_eq!(before.generation(), 0);
    }
}
