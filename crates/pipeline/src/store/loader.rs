//! 정의 파일 로더 -- YAML 정의 파일을 디스크에서 로드합니다.
//!
//! 디렉토리 내의 `.yml`/`.yaml` 파일을 경로 순으로 스캔하고 파싱합니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::PipelineError;
use crate::pipeline::PipelineDefinition;
use crate::rule::RuleDefinition;

/// 정의 파일 최대 크기
pub const MAX_DEFINITION_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 디렉토리당 최대 정의 수
pub const MAX_DEFINITIONS_COUNT: usize = 10_000;

/// 디렉토리 단위로 로드되는 정의
pub trait Definition: DeserializeOwned {
    /// 로그에 표시할 종류 이름
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn validate(&self) -> Result<(), PipelineError>;
}

impl Definition for RuleDefinition {
    const KIND: &'static str = "rule";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), PipelineError> {
        RuleDefinition::validate(self)
    }
}

impl Definition for PipelineDefinition {
    const KIND: &'static str = "pipeline";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), PipelineError> {
        PipelineDefinition::validate(self)
    }
}

/// 정의 파일 로더
pub struct DefinitionLoader;

impl DefinitionLoader {
    /// 디렉토리에서 모든 YAML 정의 파일을 로드합니다.
    ///
    /// 개별 파일 로딩 실패와 중복 ID는 경고 로그를 남기고 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 정의 수가 `MAX_DEFINITIONS_COUNT`를 초과하는 경우
    pub async fn load_directory<D: Definition>(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<D>, PipelineError> {
        let dir = dir.as_ref();
        let load_err = |reason: String| PipelineError::DefinitionLoad {
            path: dir.display().to_string(),
            reason,
        };

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| load_err(format!("failed to read directory: {e}")))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| load_err(format!("failed to read directory entry: {e}")))?
        {
            let path = entry.path();

            // .yml / .yaml 확장자만 처리
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut definitions: Vec<D> = Vec::new();
        let mut seen_ids = HashSet::new();

        for path in paths {
            match Self::load_file::<D>(&path).await {
                Ok(definition) => {
                    if !seen_ids.insert(definition.id().to_owned()) {
                        tracing::warn!(
                            kind = D::KIND,
                            id = %definition.id(),
                            path = %path.display(),
                            "duplicate definition id, skipping"
                        );
                        continue;
                    }
                    definitions.push(definition);
                }
                Err(e) => {
                    tracing::warn!(
                        kind = D::KIND,
                        path = %path.display(),
                        error = %e,
                        "failed to load definition file, skipping"
                    );
                }
            }

            if definitions.len() > MAX_DEFINITIONS_COUNT {
                return Err(load_err(format!(
                    "too many {} definitions: max {MAX_DEFINITIONS_COUNT}",
                    D::KIND
                )));
            }
        }

        tracing::info!(
            kind = D::KIND,
            dir = %dir.display(),
            count = definitions.len(),
            "loaded definitions"
        );

        Ok(definitions)
    }

    /// 단일 YAML 파일에서 정의를 로드하고 검증합니다.
    pub async fn load_file<D: Definition>(path: impl AsRef<Path>) -> Result<D, PipelineError> {
        let path = path.as_ref();
        let content = Self::read_limited(path).await?;
        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 정의를 생성합니다.
    pub fn parse_yaml<D: Definition>(yaml_str: &str, source: &str) -> Result<D, PipelineError> {
        let definition: D = Self::parse_document(yaml_str, source)?;

        // 유효성 검증
        definition.validate()?;

        Ok(definition)
    }

    /// 검증 없이 YAML 문서를 읽습니다 (연결, 규칙 메트릭 설정 파일).
    pub async fn load_document<T: DeserializeOwned>(
        path: impl AsRef<Path>,
    ) -> Result<T, PipelineError> {
        let path = path.as_ref();
        let content = Self::read_limited(path).await?;
        Self::parse_document(&content, &path.display().to_string())
    }

    fn parse_document<T: DeserializeOwned>(yaml_str: &str, source: &str) -> Result<T, PipelineError> {
        serde_yaml::from_str(yaml_str).map_err(|e| PipelineError::DefinitionLoad {
            path: source.to_owned(),
            reason: format!("YAML parse error: {e}"),
        })
    }

    async fn read_limited(path: &Path) -> Result<String, PipelineError> {
        // 파일 크기 검증
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PipelineError::DefinitionLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_DEFINITION_FILE_SIZE {
            return Err(PipelineError::DefinitionLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_DEFINITION_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::DefinitionLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })
    }
}
