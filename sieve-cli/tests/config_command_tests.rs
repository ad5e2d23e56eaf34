//! Integration tests for the configuration and definition layout the CLI reads.
//!
//! Exercises `sieve.toml` loading and a simulate-style run over a real
//! definition directory.

use std::fs;
use std::sync::Arc;

use serial_test::serial;
use tempfile::TempDir;

use sieve_core::config::SieveConfig;
use sieve_core::message::Message;
use sieve_pipeline::{
    ConfigurationStateUpdater, FileStore, FunctionRegistry, InterpreterConfig,
    PipelineInterpreter,
};

#[tokio::test]
#[serial]
async fn test_config_load_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("sieve.toml");

    let valid_config = r#"
[general]
log_level = "debug"
log_format = "pretty"

[interpreter]
max_clones = 25
evaluation_timeout_ms = 500

[store]
config_dir = "/srv/sieve"
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let config = SieveConfig::load(&config_path)
        .await
        .expect("valid config should load successfully");

    // Then: File values win over defaults
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.interpreter.max_clones, 25);
    assert_eq!(config.interpreter.evaluation_timeout_ms, 500);
    assert_eq!(config.interpreter.concurrency, 4);
    assert_eq!(config.store.config_dir, "/srv/sieve");
}

#[tokio::test]
#[serial]
async fn test_config_load_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[general\nlog_level = \"info\"\n").expect("should write config");

    let result = SieveConfig::load(&config_path).await;
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[tokio::test]
#[serial]
async fn test_config_load_rejects_invalid_log_format() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("sieve.toml");

    fs::write(&config_path, "[general]\nlog_format = \"xml\"\n").expect("should write config");

    let result = SieveConfig::load(&config_path).await;
    assert!(result.is_err(), "unknown log format should be rejected");
}

#[tokio::test]
#[serial]
async fn test_env_override_beats_file_value() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("sieve.toml");
    fs::write(&config_path, "[interpreter]\nmax_clones = 25\n").expect("should write config");

    // SAFETY: serial 테스트로 환경변수 조작 구간을 직렬화합니다.
    unsafe {
        std::env::set_var("SIEVE_INTERPRETER_MAX_CLONES", "9");
    }
    let result = SieveConfig::load(&config_path).await;
    unsafe {
        std::env::remove_var("SIEVE_INTERPRETER_MAX_CLONES");
    }

    let config = result.expect("config should load");
    assert_eq!(config.interpreter.max_clones, 9);
}

fn write_definitions(temp_dir: &TempDir) {
    let root = temp_dir.path();
    fs::create_dir(root.join("rules")).expect("rules dir");
    fs::create_dir(root.join("pipelines")).expect("pipelines dir");

    fs::write(
        root.join("rules/mark.yml"),
        r#"
id: mark
title: Mark errors
when:
  eq: [{ field: level }, "error"]
then:
  - call: set_field
    args: { field: severity, value: high }
"#,
    )
    .expect("write rule");

    fs::write(
        root.join("rules/drop_debug.yml"),
        r#"
id: drop_debug
when:
  eq: [{ field: level }, "debug"]
then:
  - call: drop_message
"#,
    )
    .expect("write rule");

    fs::write(
        root.join("pipelines/main.yml"),
        r#"
id: main
stages:
  - stage: 0
    match: pass
    rules: [drop_debug]
  - stage: 10
    rules: [mark]
"#,
    )
    .expect("write pipeline");

    fs::write(
        root.join("connections.yml"),
        "- stream_id: default\n  pipeline_ids: [main]\n",
    )
    .expect("write connections");
}

fn message(level: &str) -> Message {
    let mut message = Message::new("disk full", "host-1", chrono::Utc::now());
    message
        .set_field("level", level.into())
        .expect("level is writable");
    message.add_stream("default");
    message
}

#[tokio::test]
async fn test_definition_directory_drives_interpreter() {
    // Given: A definition directory with one connected pipeline
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_definitions(&temp_dir);

    let updater = ConfigurationStateUpdater::new(
        Arc::new(FileStore::new(temp_dir.path())),
        Arc::new(FunctionRegistry::builtin()),
    )
    .await
    .expect("definitions should load");
    let interpreter = PipelineInterpreter::new(
        updater.handle(),
        InterpreterConfig::from_core(&SieveConfig::default().interpreter),
    )
    .expect("default interpreter config is valid");

    // When: Processing an error, a debug and an info message
    let output = interpreter.process(vec![message("error"), message("debug"), message("info")]);

    // Then: The debug message is dropped and only the error message is marked
    assert_eq!(output.len(), 2);
    assert_eq!(
        output[0].field("severity").and_then(|v| v.as_str()),
        Some("high")
    );
    assert!(output[1].field("severity").is_none());
    assert_eq!(updater.latest().generation(), 1);
}

#[tokio::test]
async fn test_simulate_selected_pipeline_ignores_connections() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_definitions(&temp_dir);
    fs::write(temp_dir.path().join("connections.yml"), "[]\n").expect("clear connections");

    let updater = ConfigurationStateUpdater::new(
        Arc::new(FileStore::new(temp_dir.path())),
        Arc::new(FunctionRegistry::builtin()),
    )
    .await
    .expect("definitions should load");
    let state = updater.latest();
    let interpreter = PipelineInterpreter::new(updater.handle(), InterpreterConfig::default())
        .expect("default interpreter config is valid");

    // Without connections the batch path leaves messages untouched
    let untouched = interpreter.process(vec![message("error")]);
    assert!(untouched[0].field("severity").is_none());

    // Naming the pipeline runs it directly
    let mut msg = message("error");
    let created = interpreter.process_for_pipelines(&mut msg, &["main".to_owned()], &state);
    assert!(created.is_empty());
    assert_eq!(
        msg.field("severity").and_then(|v| v.as_str()),
        Some("high")
    );
}
