//! 규칙 정의 타입
//!
//! 저장소에서 읽는 직렬화 형태입니다. 컴파일은 [`Rule::compile`](super::Rule::compile)이 담당합니다.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::expression::ExpressionSource;

/// 규칙 ID 최대 길이
const MAX_RULE_ID_LEN: usize = 256;

/// 규칙 정의 -- 하나의 YAML 규칙 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// id: tag_ssh
/// title: Tag SSH messages
/// when:
///   call: has_field
///   args: [foo]
/// then:
///   - call: set_field
///     args: { field: bar, value: baz }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// 규칙 고유 ID
    pub id: String,
    /// 규칙 제목
    #[serde(default)]
    pub title: String,
    /// 규칙 설명
    #[serde(default)]
    pub description: String,
    /// 사람이 작성한 원문 (표시용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 조건 표현식
    pub when: ExpressionSource,
    /// 액션 목록 (선언 순서대로 실행)
    #[serde(default)]
    pub then: Vec<ExpressionSource>,
}

impl RuleDefinition {
    /// 규칙 정의의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.id.is_empty() {
            return Err(PipelineError::RuleValidation {
                rule_id: "(empty)".to_owned(),
                reason: "rule id must not be empty".to_owned(),
            });
        }

        if self.id.len() > MAX_RULE_ID_LEN {
            return Err(PipelineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: format!("rule id must not exceed {MAX_RULE_ID_LEN} characters"),
            });
        }

        Ok(())
    }

    /// 표시용 이름. 제목이 없으면 ID를 사용합니다.
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}
