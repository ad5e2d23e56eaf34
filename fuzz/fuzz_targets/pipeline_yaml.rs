#![no_main]

use libfuzzer_sys::fuzz_target;
use sieve_pipeline::store::DefinitionLoader;
use sieve_pipeline::PipelineDefinition;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let _ = DefinitionLoader::parse_yaml::<PipelineDefinition>(yaml_str, "fuzz-input.yml");
    }
});
