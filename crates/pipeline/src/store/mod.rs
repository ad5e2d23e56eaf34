//! 정의 저장소
//!
//! [`ConfigurationStore`]는 규칙, 파이프라인, 스트림 연결, 규칙 메트릭 설정을
//! 제공하는 외부 저장소 인터페이스입니다. 상태 갱신기는 리로드마다 네 컬렉션을
//! 모두 읽어 새 스냅샷을 컴파일합니다.
//!
//! - [`MemoryStore`]: 프로세스 내 저장소 (테스트, 임베딩)
//! - [`FileStore`]: YAML 디렉토리 저장소

pub mod file;
pub mod loader;
pub mod memory;

pub use file::FileStore;
pub use loader::{Definition, DefinitionLoader};
pub use memory::MemoryStore;

use std::future::Future;

use sieve_core::error::StoreError;

use crate::connections::PipelineConnections;
use crate::pipeline::PipelineDefinition;
use crate::rule::RuleDefinition;
use crate::state::{RuleMetricsConfig, StateDefinitions};

/// 정의 저장소 trait
pub trait ConfigurationStore: Send + Sync + 'static {
    /// 모든 규칙 정의
    fn load_rules(&self) -> impl Future<Output = Result<Vec<RuleDefinition>, StoreError>> + Send;

    /// 모든 파이프라인 정의
    fn load_pipelines(
        &self,
    ) -> impl Future<Output = Result<Vec<PipelineDefinition>, StoreError>> + Send;

    /// 모든 스트림-파이프라인 연결
    fn load_connections(
        &self,
    ) -> impl Future<Output = Result<Vec<PipelineConnections>, StoreError>> + Send;

    /// 규칙 메트릭 설정
    fn load_rule_metrics_config(
        &self,
    ) -> impl Future<Output = Result<RuleMetricsConfig, StoreError>> + Send;
}

/// 저장소에서 네 컬렉션을 동시에 읽습니다. 하나라도 실패하면 에러입니다.
pub async fn load_definitions<S: ConfigurationStore>(
    store: &S,
) -> Result<StateDefinitions, StoreError> {
    let (rules, pipelines, connections, rule_metrics) = tokio::try_join!(
        store.load_rules(),
        store.load_pipelines(),
        store.load_connections(),
        store.load_rule_metrics_config(),
    )?;

    Ok(StateDefinitions {
        rules,
        pipelines,
        connections,
        rule_metrics,
    })
}
