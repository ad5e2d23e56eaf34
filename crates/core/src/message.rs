//! 메시지 모델 -- 규칙이 읽고 변경하는 로그 이벤트
//!
//! [`Message`]는 필드 맵, 스트림 소속, 드롭 플래그, 계보(lineage) 정보를 담습니다.
//! 예약 필드(`_id`, `message`, `source`, `timestamp`)는 제거할 수 없고
//! `_id`는 변경할 수 없습니다.
//!
//! # 계보
//! 규칙 액션이 합성한 메시지(clone/create)는 원본의 루트 ID와
//! 합성 순번(`clone_count`)을 물려받습니다. 인터프리터는 이 값을 기준으로
//! 루프 방지 예산을 계산합니다.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::value::Value;

/// 메시지 ID 필드
pub const FIELD_ID: &str = "_id";
/// 본문 필드
pub const FIELD_MESSAGE: &str = "message";
/// 출처 필드
pub const FIELD_SOURCE: &str = "source";
/// 타임스탬프 필드
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// 제거할 수 없는 예약 필드 목록
pub const RESERVED_FIELDS: [&str; 4] = [FIELD_ID, FIELD_MESSAGE, FIELD_SOURCE, FIELD_TIMESTAMP];

/// 기본 스트림 ID
pub const DEFAULT_STREAM_ID: &str = "default";

/// 메시지 계보 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    /// 계보 루트(원본 입력 메시지) ID
    pub root_id: String,
    /// 직접 합성한 메시지 ID (원본이면 `None`)
    pub parent_id: Option<String>,
    /// 루트 기준 합성 순번 (원본은 0)
    pub clone_count: u32,
}

/// 처리 에러 원인
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingFailureCause {
    /// 규칙 조건 평가 실패
    RuleConditionEvaluationError,
    /// 규칙 액션 실행 실패
    RuleStatementEvaluationError,
    /// 평가 제한 시간 초과
    EvaluationTimeout,
}

/// 메시지에 기록되는 처리 에러
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub cause: ProcessingFailureCause,
    pub message: String,
    pub details: String,
}

impl ProcessingError {
    pub fn new(
        cause: ProcessingFailureCause,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            cause,
            message: message.into(),
            details: details.into(),
        }
    }
}

/// 로그 메시지
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    id: String,
    fields: BTreeMap<String, Value>,
    streams: BTreeSet<String>,
    filter_out: bool,
    lineage: Lineage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    processing_errors: Vec<ProcessingError>,
}

impl Message {
    /// 새 원본 메시지를 생성합니다.
    pub fn new(
        message: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_ID.to_owned(), Value::String(id.clone()));
        fields.insert(FIELD_MESSAGE.to_owned(), Value::String(message.into()));
        fields.insert(FIELD_SOURCE.to_owned(), Value::String(source.into()));
        fields.insert(FIELD_TIMESTAMP.to_owned(), Value::Timestamp(timestamp));

        Self {
            lineage: Lineage {
                root_id: id.clone(),
                parent_id: None,
                clone_count: 0,
            },
            id,
            fields,
            streams: BTreeSet::new(),
            filter_out: false,
            processing_errors: Vec::new(),
        }
    }

    /// 필드 맵과 스트림 목록으로 메시지를 생성합니다 (수집 경로).
    ///
    /// `_id`가 문자열이면 유지하고, 없으면 새로 발급합니다.
    /// `timestamp`는 RFC 3339 문자열이면 UTC로 변환하고, 없거나 해석할 수 없으면
    /// 현재 시각을 사용합니다. 다른 필드의 문자열은 그대로 둡니다.
    pub fn from_fields(
        mut fields: BTreeMap<String, Value>,
        streams: impl IntoIterator<Item = String>,
    ) -> Self {
        let id = match fields.remove(FIELD_ID) {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let timestamp = match fields.remove(FIELD_TIMESTAMP) {
            Some(Value::Timestamp(ts)) => ts,
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            _ => Utc::now(),
        };
        let message = take_string(&mut fields, FIELD_MESSAGE);
        let source = take_string(&mut fields, FIELD_SOURCE);

        let mut msg = Self::new(message, source, timestamp);
        msg.id = id.clone();
        msg.lineage.root_id = id.clone();
        msg.fields.insert(FIELD_ID.to_owned(), Value::String(id));
        msg.fields.extend(fields);
        msg.streams.extend(streams);
        msg
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 본문. 문자열이 아니면 빈 문자열을 반환합니다.
    pub fn message(&self) -> &str {
        self.fields
            .get(FIELD_MESSAGE)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn source(&self) -> &str {
        self.fields
            .get(FIELD_SOURCE)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.fields
            .get(FIELD_TIMESTAMP)
            .and_then(Value::as_timestamp)
            .copied()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// 필드를 설정합니다. `_id`는 변경할 수 없습니다.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) -> Result<(), FieldError> {
        let name = name.into();
        if name.is_empty() {
            return Err(FieldError::EmptyName);
        }
        if name == FIELD_ID {
            return Err(FieldError::ReadOnly { name });
        }
        self.fields.insert(name, value);
        Ok(())
    }

    /// 필드를 제거하고 이전 값을 반환합니다.
    pub fn remove_field(&mut self, name: &str) -> Result<Option<Value>, FieldError> {
        if RESERVED_FIELDS.contains(&name) {
            return Err(FieldError::ReservedRemoval {
                name: name.to_owned(),
            });
        }
        Ok(self.fields.remove(name))
    }

    /// 필드 이름을 변경합니다. 원본 필드가 없으면 아무것도 하지 않습니다.
    pub fn rename_field(&mut self, old: &str, new: impl Into<String>) -> Result<bool, FieldError> {
        let new = new.into();
        if old == new {
            return Ok(self.has_field(old));
        }
        if !self.has_field(old) {
            return Ok(false);
        }
        if new == FIELD_ID {
            return Err(FieldError::ReadOnly { name: new });
        }
        let value = self.remove_field(old)?;
        if let Some(value) = value {
            self.set_field(new, value)?;
        }
        Ok(true)
    }

    pub fn streams(&self) -> &BTreeSet<String> {
        &self.streams
    }

    /// 스트림을 추가합니다. 새로 추가되었으면 `true`.
    pub fn add_stream(&mut self, stream_id: impl Into<String>) -> bool {
        self.streams.insert(stream_id.into())
    }

    /// 스트림에서 제거합니다. 소속되어 있었으면 `true`.
    pub fn remove_stream(&mut self, stream_id: &str) -> bool {
        self.streams.remove(stream_id)
    }

    pub fn in_stream(&self, stream_id: &str) -> bool {
        self.streams.contains(stream_id)
    }

    pub fn filter_out(&self) -> bool {
        self.filter_out
    }

    pub fn set_filter_out(&mut self, filter_out: bool) {
        self.filter_out = filter_out;
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    pub fn clone_count(&self) -> u32 {
        self.lineage.clone_count
    }

    /// 이 메시지를 복제한 새 메시지를 만듭니다.
    ///
    /// 필드와 스트림을 복사하고 새 ID를 발급합니다. 드롭 플래그와 처리 에러는
    /// 복사하지 않습니다.
    pub fn derive_clone(&self, clone_count: u32) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let mut fields = self.fields.clone();
        fields.insert(FIELD_ID.to_owned(), Value::String(id.clone()));

        Self {
            lineage: self.child_lineage(clone_count),
            id,
            fields,
            streams: self.streams.clone(),
            filter_out: false,
            processing_errors: Vec::new(),
        }
    }

    /// 이 메시지의 계보를 잇는 새 메시지를 만듭니다. 스트림은 비어 있습니다.
    pub fn derive_new(
        &self,
        message: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
        clone_count: u32,
    ) -> Self {
        let mut msg = Self::new(message, source, timestamp);
        msg.lineage = self.child_lineage(clone_count);
        msg
    }

    fn child_lineage(&self, clone_count: u32) -> Lineage {
        Lineage {
            root_id: self.lineage.root_id.clone(),
            parent_id: Some(self.id.clone()),
            clone_count,
        }
    }

    pub fn add_processing_error(&mut self, error: ProcessingError) {
        self.processing_errors.push(error);
    }

    pub fn processing_errors(&self) -> &[ProcessingError] {
        &self.processing_errors
    }

    /// 출력 가능한 메시지인지 확인합니다 (`message`, `source`가 비어 있지 않음).
    pub fn is_complete(&self) -> bool {
        !self.message().is_empty() && !self.source().is_empty()
    }
}

fn take_string(fields: &mut BTreeMap<String, Value>, name: &str) -> String {
    match fields.remove(name) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        Message::new("hello", "host-a", Utc::now())
    }

    #[test]
    fn new_message_has_reserved_fields() {
        let msg = sample();
        for name in RESERVED_FIELDS {
            assert!(msg.has_field(name), "missing reserved field {name}");
        }
        assert_eq!(msg.field(FIELD_ID), Some(&Value::from(msg.id())));
        assert_eq!(msg.lineage().root_id, msg.id());
        assert_eq!(msg.clone_count(), 0);
        assert!(msg.streams().is_empty());
    }

    #[test]
    fn reserved_fields_cannot_be_removed() {
        let mut msg = sample();
        for name in RESERVED_FIELDS {
            assert_eq!(
                msg.remove_field(name),
                Err(FieldError::ReservedRemoval {
                    name: name.to_owned()
                })
            );
        }
    }

    #[test]
    fn id_is_read_only() {
        let mut msg = sample();
        let err = msg.set_field(FIELD_ID, Value::from("other")).unwrap_err();
        assert!(matches!(err, FieldError::ReadOnly { .. }));
    }

    #[test]
    fn empty_field_name_rejected() {
        let mut msg = sample();
        assert_eq!(
            msg.set_field("", Value::Long(1)),
            Err(FieldError::EmptyName)
        );
    }

    #[test]
    fn reserved_fields_can_be_overwritten() {
        let mut msg = sample();
        msg.set_field(FIELD_MESSAGE, Value::from("changed")).unwrap();
        assert_eq!(msg.message(), "changed");
    }

    #[test]
    fn rename_field_moves_value() {
        let mut msg = sample();
        msg.set_field("a", Value::Long(1)).unwrap();
        assert!(msg.rename_field("a", "b").unwrap());
        assert!(!msg.has_field("a"));
        assert_eq!(msg.field("b"), Some(&Value::Long(1)));
        assert!(!msg.rename_field("missing", "c").unwrap());
    }

    #[test]
    fn rename_reserved_field_fails() {
        let mut msg = sample();
        assert!(msg.rename_field(FIELD_SOURCE, "origin").is_err());
        assert_eq!(msg.source(), "host-a");
    }

    #[test]
    fn derive_clone_copies_fields_and_streams() {
        let mut msg = sample();
        msg.add_stream("s1");
        msg.set_field("k", Value::from("v")).unwrap();
        msg.set_filter_out(true);

        let clone = msg.derive_clone(1);
        assert_ne!(clone.id(), msg.id());
        assert_eq!(clone.field(FIELD_ID), Some(&Value::from(clone.id())));
        assert_eq!(clone.field("k"), Some(&Value::from("v")));
        assert!(clone.in_stream("s1"));
        assert!(!clone.filter_out());
        assert_eq!(clone.lineage().root_id, msg.id());
        assert_eq!(clone.lineage().parent_id.as_deref(), Some(msg.id()));
        assert_eq!(clone.clone_count(), 1);
    }

    #[test]
    fn derive_new_keeps_root_without_streams() {
        let mut root = sample();
        root.add_stream("s1");
        let clone = root.derive_clone(1);
        let created = clone.derive_new("new", "rule", Utc::now(), 2);
        assert_eq!(created.lineage().root_id, root.id());
        assert_eq!(created.lineage().parent_id.as_deref(), Some(clone.id()));
        assert!(created.streams().is_empty());
        assert_eq!(created.message(), "new");
    }

    #[test]
    fn from_fields_keeps_string_id() {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_ID.to_owned(), Value::from("abc"));
        fields.insert(FIELD_MESSAGE.to_owned(), Value::from("body"));
        fields.insert(FIELD_SOURCE.to_owned(), Value::from("src"));
        fields.insert("extra".to_owned(), Value::Long(3));
        let msg = Message::from_fields(fields, vec!["s1".to_owned()]);
        assert_eq!(msg.id(), "abc");
        assert_eq!(msg.lineage().root_id, "abc");
        assert_eq!(msg.field("extra"), Some(&Value::Long(3)));
        assert!(msg.in_stream("s1"));
        assert!(msg.timestamp().is_some());
    }

    #[test]
    fn completeness_requires_message_and_source() {
        assert!(sample().is_complete());
        assert!(!Message::new("", "src", Utc::now()).is_complete());
        let mut msg = sample();
        msg.set_field(FIELD_SOURCE, Value::Long(1)).unwrap();
        assert!(!msg.is_complete());
    }
    #[test]
    fn from_fields_converts_only_reserved_timestamp() {
        let json = r#"{
            "message": "body",
            "source": "src",
            "timestamp": "2024-01-15T12:00:00+02:00",
            "seen_at": "2024-01-15T12:00:00+02:00"
        }"#;
        let fields: BTreeMap<String, Value> = serde_json::from_str(json).unwrap();
        let msg = Message::from_fields(fields, Vec::new());

        let expected = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(msg.timestamp(), Some(expected));
        assert_eq!(
            msg.field("seen_at"),
            Some(&Value::from("2024-01-15T12:00:00+02:00"))
        );

        let out = serde_json::to_value(msg.fields()).unwrap();
        assert_eq!(out["seen_at"], "2024-01-15T12:00:00+02:00");
        assert_eq!(out["timestamp"], "2024-01-15T10:00:00Z");
    }

    #[test]
    fn from_fields_unparseable_timestamp_falls_back_to_now() {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_MESSAGE.to_owned(), Value::from("body"));
        fields.insert(FIELD_SOURCE.to_owned(), Value::from("src"));
        fields.insert(FIELD_TIMESTAMP.to_owned(), Value::from("yesterday"));
        let before = Utc::now();
        let msg = Message::from_fields(fields, Vec::new());
        assert!(msg.timestamp().is_some_and(|ts| ts >= before));
    }

    mod lineage_props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn derived_chain_keeps_root_and_parent(steps in proptest::collection::vec(any::<bool>(), 1..20)) {
                let root = sample();
                let mut current = root.clone();

                for (i, clone) in steps.into_iter().enumerate() {
                    let count = i as u32 + 1;
                    let next = if clone {
                        current.derive_clone(count)
                    } else {
                        current.derive_new("synth", "rule", Utc::now(), count)
                    };

                    prop_assert_eq!(&next.lineage().root_id, &root.lineage().root_id);
                    prop_assert_eq!(next.lineage().parent_id.as_deref(), Some(current.id()));
                    prop_assert_eq!(next.clone_count(), count);
                    prop_assert_ne!(next.id(), current.id());
                    prop_assert_eq!(next.field(FIELD_ID), Some(&Value::from(next.id())));
                    prop_assert!(!next.filter_out());
                    prop_assert!(next.processing_errors().is_empty());
                    current = next;
                }
            }

            #[test]
            fn clone_copies_streams_and_user_fields(
                streams in proptest::collection::btree_set("[a-z]{1,8}", 0..5),
                fields in proptest::collection::btree_map("f_[a-z]{1,6}", any::<i64>(), 0..5),
            ) {
                let mut msg = sample();
                for stream in &streams {
                    msg.add_stream(stream.clone());
                }
                for (name, value) in &fields {
                    msg.set_field(name.clone(), Value::Long(*value)).unwrap();
                }

                let clone = msg.derive_clone(1);

                prop_assert_eq!(clone.streams(), &streams);
                for (name, value) in &fields {
                    prop_assert_eq!(clone.field(name), Some(&Value::Long(*value)));
                }
                prop_assert_eq!(clone.message(), msg.message());
                prop_assert_eq!(clone.source(), msg.source());
            }
        }
    }
}
