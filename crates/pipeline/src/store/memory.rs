//! 메모리 저장소

use std::sync::RwLock;

use sieve_core::error::StoreError;

use super::ConfigurationStore;
use crate::connections::PipelineConnections;
use crate::pipeline::PipelineDefinition;
use crate::rule::RuleDefinition;
use crate::state::RuleMetricsConfig;

#[derive(Debug, Default)]
struct Contents {
    rules: Vec<RuleDefinition>,
    pipelines: Vec<PipelineDefinition>,
    connections: Vec<PipelineConnections>,
    rule_metrics: RuleMetricsConfig,
    /// 설정되어 있으면 모든 로드가 `Unavailable`로 실패
    unavailable: Option<String>,
}

/// 프로세스 내 정의 저장소
///
/// 세터로 내용을 바꾼 뒤 상태 갱신기에 변경 이벤트를 보내는 방식으로 사용합니다.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contents: RwLock<Contents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rules(&self, rules: Vec<RuleDefinition>) {
        self.write().rules = rules;
    }

    pub fn set_pipelines(&self, pipelines: Vec<PipelineDefinition>) {
        self.write().pipelines = pipelines;
    }

    pub fn set_connections(&self, connections: Vec<PipelineConnections>) {
        self.write().connections = connections;
    }

    pub fn set_rule_metrics(&self, config: RuleMetricsConfig) {
        self.write().rule_metrics = config;
    }

    /// 같은 ID의 규칙을 교체하거나 추가합니다.
    pub fn upsert_rule(&self, rule: RuleDefinition) {
        let mut contents = self.write();
        match contents.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => contents.rules.push(rule),
        }
    }

    /// 규칙을 삭제합니다. 있었으면 `true`.
    pub fn delete_rule(&self, id: &str) -> bool {
        let mut contents = self.write();
        let before = contents.rules.len();
        contents.rules.retain(|r| r.id != id);
        contents.rules.len() != before
    }

    /// 같은 ID의 파이프라인을 교체하거나 추가합니다.
    pub fn upsert_pipeline(&self, pipeline: PipelineDefinition) {
        let mut contents = self.write();
        match contents.pipelines.iter_mut().find(|p| p.id == pipeline.id) {
            Some(existing) => *existing = pipeline,
            None => contents.pipelines.push(pipeline),
        }
    }

    /// 파이프라인을 삭제합니다. 있었으면 `true`.
    pub fn delete_pipeline(&self, id: &str) -> bool {
        let mut contents = self.write();
        let before = contents.pipelines.len();
        contents.pipelines.retain(|p| p.id != id);
        contents.pipelines.len() != before
    }

    /// 저장소 장애를 흉내냅니다. `None`이면 복구합니다.
    pub fn set_unavailable(&self, reason: Option<String>) {
        self.write().unavailable = reason;
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Contents> {
        self.contents.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read<T>(&self, f: impl FnOnce(&Contents) -> T) -> Result<T, StoreError> {
        let contents = self.contents.read().unwrap_or_else(|e| e.into_inner());
        match &contents.unavailable {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(f(&contents)),
        }
    }
}

impl ConfigurationStore for MemoryStore {
    async fn load_rules(&self) -> Result<Vec<RuleDefinition>, StoreError> {
        self.read(|c| c.rules.clone())
    }

    async fn load_pipelines(&self) -> Result<Vec<PipelineDefinition>, StoreError> {
        self.read(|c| c.pipelines.clone())
    }

    async fn load_connections(&self) -> Result<Vec<PipelineConnections>, StoreError> {
        self.read(|c| c.connections.clone())
    }

    async fn load_rule_metrics_config(&self) -> Result<RuleMetricsConfig, StoreError> {
        self.read(|c| c.rule_metrics)
    }
}
