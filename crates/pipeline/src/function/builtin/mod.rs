//! 기본 제공 함수
//!
//! - `conversion`: `to_string`, `to_long`, `to_double`, `to_bool`
//! - `string`: `contains`, `regex`, `concat`, `lowercase`, `uppercase`
//! - `fields`: `has_field`, `set_field`, `set_fields`, `remove_field`, `rename_field`
//! - `streams`: `route_to_stream`, `remove_from_stream`, `drop_message`
//! - `synthesis`: `clone_message`, `create_message` (루프 방지 적용)

mod conversion;
mod fields;
mod streams;
mod string;
mod synthesis;

use std::sync::Arc;

use super::Function;

/// 모든 기본 제공 함수를 반환합니다.
pub fn all() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(conversion::StringConversion::new()),
        Arc::new(conversion::ToLong::new()),
        Arc::new(conversion::ToDouble::new()),
        Arc::new(conversion::ToBool::new()),
        Arc::new(string::Contains::new()),
        Arc::new(string::RegexMatch::new()),
        Arc::new(string::Concat::new()),
        Arc::new(string::Lowercase::new()),
        Arc::new(string::Uppercase::new()),
        Arc::new(fields::HasField::new()),
        Arc::new(fields::SetField::new()),
        Arc::new(fields::SetFields::new()),
        Arc::new(fields::RemoveField::new()),
        Arc::new(fields::RenameField::new()),
        Arc::new(streams::RouteToStream::new()),
        Arc::new(streams::RemoveFromStream::new()),
        Arc::new(streams::DropMessage::new()),
        Arc::new(synthesis::CloneMessage::new()),
        Arc::new(synthesis::CreateMessage::new()),
    ]
}
