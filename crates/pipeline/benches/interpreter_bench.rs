//! 인터프리터 벤치마크
//!
//! 스테이지/규칙 평가, 스트림 라우팅, 메시지 합성 경로의 처리량을 측정합니다.

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use sieve_core::message::Message;
use sieve_core::value::Value;
use sieve_pipeline::{
    FunctionRegistry, InterpreterConfig, PipelineConnections, PipelineDefinition,
    PipelineInterpreter, RuleDefinition, State, StateDefinitions, StateHandle,
};

const RULES: &[&str] = &[
    "id: is-error\nwhen: { call: contains, args: { value: { field: message }, search: error, ignore_case: true } }\nthen: [{ call: set_field, args: [level, error] }]",
    "id: has-status\nwhen: { call: has_field, args: [status] }\nthen: [{ call: set_field, args: [status_class, { div: [{ call: to_long, args: [{ field: status }] }, 100] }] }]",
    "id: slow\nwhen: { gt: [{ field: duration_ms }, 100] }\nthen: [{ call: route_to_stream, args: [slow] }]",
    "id: tag-slow\nwhen: true\nthen: [{ call: set_field, args: [slow, true] }]",
    "id: fanout\nwhen: { eq: [{ field: level }, error] }\nthen: [{ call: clone_message }]",
];

const PIPELINES: &[&str] = &[
    "id: classify\nstages:\n  - { stage: 0, match: pass, rules: [is-error, has-status] }\n  - { stage: 10, match: either, rules: [slow] }",
    "id: slow-path\nstages: [{ stage: 0, rules: [tag-slow] }]",
    "id: fanout\nstages: [{ stage: 0, rules: [fanout] }]",
];

fn build_state(fanout: bool) -> State {
    let mut connections = vec![
        PipelineConnections::new("default", ["classify"]),
        PipelineConnections::new("slow", ["slow-path"]),
    ];
    if fanout {
        connections.push(PipelineConnections::new("default", ["fanout"]));
    }

    let definitions = StateDefinitions {
        rules: RULES
            .iter()
            .map(|y| serde_yaml::from_str::<RuleDefinition>(y).unwrap())
            .collect(),
        pipelines: PIPELINES
            .iter()
            .map(|y| serde_yaml::from_str::<PipelineDefinition>(y).unwrap())
            .collect(),
        connections,
        ..Default::default()
    };
    State::compile(&definitions, &FunctionRegistry::builtin())
}

fn create_message(i: usize) -> Message {
    let text = if i % 10 == 0 {
        "ERROR upstream timed out"
    } else {
        "GET /api/v1/users HTTP/1.1 200 OK"
    };
    let mut msg = Message::new(text, "web-server-01", Utc::now());
    msg.add_stream("default");
    msg.set_field("status", Value::Long(200)).unwrap();
    msg.set_field("duration_ms", Value::Long((i % 200) as i64)).unwrap();
    msg
}

fn bench_process_batch(c: &mut Criterion) {
    let state = build_state(false);
    let interpreter =
        PipelineInterpreter::new(StateHandle::default(), InterpreterConfig::default()).unwrap();

    let mut group = c.benchmark_group("interpreter_process");
    for size in [1usize, 100, 1000] {
        let batch: Vec<Message> = (0..size).map(create_message).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| interpreter.process_with_state(black_box(batch.clone()), &state))
        });
    }
    group.finish();
}

fn bench_synthesis(c: &mut Criterion) {
    let state = build_state(true);
    let interpreter =
        PipelineInterpreter::new(StateHandle::default(), InterpreterConfig::default()).unwrap();
    let batch: Vec<Message> = (0..100).map(create_message).collect();

    let mut group = c.benchmark_group("interpreter_synthesis");
    group.throughput(Throughput::Elements(batch.len() as u64));
    // 에러 메시지는 루프 방지 상한까지 복제됨
    group.bench_function("fanout_to_max_clones", |b| {
        b.iter(|| interpreter.process_with_state(black_box(batch.clone()), &state))
    });
    group.finish();
}

fn bench_state_compile(c: &mut Criterion) {
    c.bench_function("state_compile", |b| b.iter(|| build_state(black_box(true))));
}

criterion_group!(benches, bench_process_batch, bench_synthesis, bench_state_compile);
criterion_main!(benches);
