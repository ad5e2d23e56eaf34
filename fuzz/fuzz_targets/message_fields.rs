#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use sieve_core::message::Message;
use sieve_core::value::Value;

fuzz_target!(|data: &[u8]| {
    // 시뮬레이션 입력 한 줄과 같은 형태
    let Ok(fields) = serde_json::from_slice::<BTreeMap<String, Value>>(data) else {
        return;
    };

    let message = Message::from_fields(fields, ["default".to_owned()]);

    // 수집 경로의 메시지는 항상 자기 자신이 계보 루트
    assert_eq!(message.lineage().root_id, message.id());
    assert_eq!(message.clone_count(), 0);
    assert!(message.in_stream("default"));
});
