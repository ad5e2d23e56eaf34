#![no_main]

use libfuzzer_sys::fuzz_target;
use sieve_pipeline::store::DefinitionLoader;
use sieve_pipeline::{FunctionRegistry, Rule, RuleDefinition};

fuzz_target!(|data: &[u8]| {
    // YAML 파서는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(yaml_str) = std::str::from_utf8(data)
        && let Ok(definition) =
            DefinitionLoader::parse_yaml::<RuleDefinition>(yaml_str, "fuzz-input.yml")
    {
        // 파싱된 정의는 컴파일 실패를 에러로만 보고해야 함
        let _ = Rule::compile(&definition, &FunctionRegistry::builtin());
    }
});
