//! 스트림-파이프라인 연결
//!
//! 저장소의 [`PipelineConnections`] 레코드를 상태 컴파일 시점에
//! 스트림 ID -> 파이프라인 목록 테이블([`StreamConnections`])로 변환합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;

/// 한 스트림에 연결된 파이프라인 ID 목록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConnections {
    pub stream_id: String,
    #[serde(default)]
    pub pipeline_ids: BTreeSet<String>,
}

impl PipelineConnections {
    pub fn new<I, S>(stream_id: impl Into<String>, pipeline_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stream_id: stream_id.into(),
            pipeline_ids: pipeline_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// 스트림 ID -> 파이프라인 테이블
///
/// 각 목록은 파이프라인 ID 순으로 정렬되어 있습니다.
#[derive(Debug, Clone, Default)]
pub struct StreamConnections {
    by_stream: BTreeMap<String, Vec<Arc<Pipeline>>>,
}

impl StreamConnections {
    /// 연결 레코드로 테이블을 만듭니다.
    ///
    /// 로드되지 않은 파이프라인 ID는 무시합니다. 같은 스트림의 레코드가
    /// 여러 개면 합칩니다.
    pub fn build(records: &[PipelineConnections], pipelines: &BTreeMap<String, Arc<Pipeline>>) -> Self {
        let mut ids: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for record in records {
            let entry = ids.entry(record.stream_id.as_str()).or_default();
            for pipeline_id in &record.pipeline_ids {
                if pipelines.contains_key(pipeline_id) {
                    entry.insert(pipeline_id.as_str());
                } else {
                    tracing::debug!(
                        stream_id = %record.stream_id,
                        pipeline_id = %pipeline_id,
                        "connection references unknown pipeline, ignoring"
                    );
                }
            }
        }

        let by_stream = ids
            .into_iter()
            .filter(|(_, pipeline_ids)| !pipeline_ids.is_empty())
            .map(|(stream_id, pipeline_ids)| {
                let connected = pipeline_ids
                    .into_iter()
                    .filter_map(|id| pipelines.get(id).cloned())
                    .collect();
                (stream_id.to_owned(), connected)
            })
            .collect();

        Self { by_stream }
    }

    /// 스트림 집합에 연결된 파이프라인을 ID 순으로, 중복 없이 반환합니다.
    pub fn pipelines_for<'a, I>(&self, streams: I) -> Vec<Arc<Pipeline>>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut selected: BTreeMap<&str, &Arc<Pipeline>> = BTreeMap::new();
        for stream in streams {
            if let Some(pipelines) = self.by_stream.get(stream) {
                for pipeline in pipelines {
                    selected.insert(pipeline.id(), pipeline);
                }
            }
        }
        selected.into_values().cloned().collect()
    }

    /// 스트림에 연결된 파이프라인
    pub fn for_stream(&self, stream_id: &str) -> &[Arc<Pipeline>] {
        self.by_stream.get(stream_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// 파이프라인이 하나 이상 연결된 스트림 수
    pub fn stream_count(&self) -> usize {
        self.by_stream.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipelines(ids: &[&str]) -> BTreeMap<String, Arc<Pipeline>> {
        ids.iter()
            .map(|id| ((*id).to_owned(), Arc::new(Pipeline::empty(*id, ""))))
            .collect()
    }

    #[test]
    fn unknown_pipelines_are_ignored() {
        let table = StreamConnections::build(
            &[PipelineConnections::new("s1", ["a", "ghost"])],
            &pipelines(&["a"]),
        );
        let ids: Vec<_> = table.for_stream("s1").iter().map(|p| p.id().to_owned()).collect();
        assert_eq!(ids, ["a"]);
    }

    #[test]
    fn duplicate_records_are_merged() {
        let table = StreamConnections::build(
            &[
                PipelineConnections::new("s1", ["b"]),
                PipelineConnections::new("s1", ["a"]),
            ],
            &pipelines(&["a", "b"]),
        );
        assert_eq!(table.for_stream("s1").len(), 2);
        assert_eq!(table.stream_count(), 1);
    }

    #[test]
    fn pipelines_for_deduplicates_and_sorts() {
        let table = StreamConnections::build(
            &[
                PipelineConnections::new("s1", ["c", "a"]),
                PipelineConnections::new("s2", ["a", "b"]),
            ],
            &pipelines(&["a", "b", "c"]),
        );
        let streams: BTreeSet<String> = ["s1".to_owned(), "s2".to_owned()].into();
        let ids: Vec<_> = table
            .pipelines_for(&streams)
            .iter()
            .map(|p| p.id().to_owned())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn unconnected_stream_has_no_pipelines() {
        let table = StreamConnections::build(&[], &pipelines(&["a"]));
        let streams: BTreeSet<String> = ["s1".to_owned()].into();
        assert!(table.pipelines_for(&streams).is_empty());
        assert_eq!(table.stream_count(), 0);
    }
}
