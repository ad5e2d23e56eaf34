//! 파일 저장소 -- 디렉토리 구조로 정의를 관리합니다.
//!
//! ```text
//! <root>/
//!   rules/*.yml           규칙 정의 (파일당 하나)
//!   pipelines/*.yml       파이프라인 정의 (파일당 하나)
//!   connections.yml       스트림-파이프라인 연결 목록 (없으면 연결 없음)
//!   rule_metrics.yml      규칙 메트릭 설정 (선택)
//! ```

use std::path::{Path, PathBuf};

use sieve_core::error::StoreError;

use super::ConfigurationStore;
use super::loader::DefinitionLoader;
use crate::connections::PipelineConnections;
use crate::error::PipelineError;
use crate::pipeline::PipelineDefinition;
use crate::rule::RuleDefinition;
use crate::state::RuleMetricsConfig;

const RULES_DIR: &str = "rules";
const PIPELINES_DIR: &str = "pipelines";
const CONNECTIONS_FILE: &str = "connections.yml";
const RULE_METRICS_FILE: &str = "rule_metrics.yml";

/// YAML 디렉토리 저장소
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    rule_metrics_override: Option<RuleMetricsConfig>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rule_metrics_override: None,
        }
    }

    /// `rule_metrics.yml` 대신 사용할 규칙 메트릭 설정을 지정합니다.
    pub fn with_rule_metrics(mut self, config: RuleMetricsConfig) -> Self {
        self.rule_metrics_override = Some(config);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn optional_document<T>(&self, name: &str) -> Result<Option<T>, PipelineError>
    where
        T: serde::de::DeserializeOwned,
    {
        let path = self.root.join(name);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        DefinitionLoader::load_document(&path).await.map(Some)
    }
}

fn load_error(collection: &str) -> impl FnOnce(PipelineError) -> StoreError + '_ {
    move |e| StoreError::Load {
        collection: collection.to_owned(),
        reason: e.to_string(),
    }
}

impl ConfigurationStore for FileStore {
    async fn load_rules(&self) -> Result<Vec<RuleDefinition>, StoreError> {
        DefinitionLoader::load_directory(self.root.join(RULES_DIR))
            .await
            .map_err(load_error("rules"))
    }

    async fn load_pipelines(&self) -> Result<Vec<PipelineDefinition>, StoreError> {
        DefinitionLoader::load_directory(self.root.join(PIPELINES_DIR))
            .await
            .map_err(load_error("pipelines"))
    }

    async fn load_connections(&self) -> Result<Vec<PipelineConnections>, StoreError> {
        self.optional_document(CONNECTIONS_FILE)
            .await
            .map(Option::unwrap_or_default)
            .map_err(load_error("connections"))
    }

    async fn load_rule_metrics_config(&self) -> Result<RuleMetricsConfig, StoreError> {
        if let Some(config) = self.rule_metrics_override {
            return Ok(config);
        }
        self.optional_document(RULE_METRICS_FILE)
            .await
            .map(Option::unwrap_or_default)
            .map_err(load_error("rule_metrics"))
    }
}
