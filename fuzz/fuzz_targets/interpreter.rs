#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use sieve_core::message::Message;
use sieve_pipeline::expression::{CallArgs, ExpressionSource, ScalarLiteral};
use sieve_pipeline::{
    FunctionRegistry, InterpreterConfig, MatchPolicy, PipelineConnections, PipelineDefinition,
    PipelineInterpreter, RuleDefinition, StageDefinition, State, StateDefinitions, StateHandle,
};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 목록 (최대 6개로 제한)
    rules: Vec<FuzzRule>,
    /// 스테이지별 정책 (최대 4개로 제한)
    policies: Vec<FuzzPolicy>,
    /// 입력 메시지 본문 (최대 4개로 제한)
    messages: Vec<String>,
    max_clones: u8,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    condition: FuzzCondition,
    actions: Vec<FuzzAction>,
}

#[derive(Arbitrary, Debug)]
enum FuzzCondition {
    Always,
    HasField(FuzzField),
    Contains(String),
    Regex(String),
}

#[derive(Arbitrary, Debug)]
enum FuzzAction {
    Set(FuzzField, String),
    Remove(FuzzField),
    Route(FuzzStream),
    Unroute(FuzzStream),
    Clone { prevent_loops: bool },
    Create,
    Drop,
}

#[derive(Arbitrary, Debug, Clone, Copy)]
enum FuzzField {
    Message,
    Source,
    Tag,
    Count,
}

#[derive(Arbitrary, Debug, Clone, Copy)]
enum FuzzStream {
    Default,
    Alerts,
}

#[derive(Arbitrary, Debug)]
enum FuzzPolicy {
    All,
    Either,
    Pass,
}

impl FuzzField {
    fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Source => "source",
            Self::Tag => "tag",
            Self::Count => "count",
        }
    }
}

impl FuzzStream {
    fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Alerts => "alerts",
        }
    }
}

fn text(s: &str) -> ExpressionSource {
    ExpressionSource::Scalar(ScalarLiteral::String(s.to_owned()))
}

fn call(name: &str, args: Vec<ExpressionSource>) -> ExpressionSource {
    ExpressionSource::call(name, CallArgs::Positional(args))
}

impl FuzzCondition {
    fn to_source(&self) -> ExpressionSource {
        match self {
            Self::Always => ExpressionSource::Scalar(ScalarLiteral::Bool(true)),
            Self::HasField(field) => call("has_field", vec![text(field.as_str())]),
            Self::Contains(search) => call(
                "contains",
                vec![
                    ExpressionSource::Field {
                        field: "message".to_owned(),
                    },
                    text(search),
                ],
            ),
            Self::Regex(pattern) => call(
                "regex",
                vec![
                    text(pattern),
                    ExpressionSource::Field {
                        field: "message".to_owned(),
                    },
                ],
            ),
        }
    }
}

impl FuzzAction {
    fn to_source(&self) -> ExpressionSource {
        match self {
            Self::Set(field, value) => call("set_field", vec![text(field.as_str()), text(value)]),
            Self::Remove(field) => call("remove_field", vec![text(field.as_str())]),
            Self::Route(stream) => call("route_to_stream", vec![text(stream.as_str())]),
            Self::Unroute(stream) => call("remove_from_stream", vec![text(stream.as_str())]),
            Self::Clone { prevent_loops } => call(
                "clone_message",
                vec![ExpressionSource::Scalar(ScalarLiteral::Bool(*prevent_loops))],
            ),
            Self::Create => call("create_message", Vec::new()),
            Self::Drop => call("drop_message", Vec::new()),
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let rules: Vec<RuleDefinition> = input
        .rules
        .iter()
        .take(6)
        .enumerate()
        .map(|(i, rule)| RuleDefinition {
            id: format!("r{i}"),
            title: String::new(),
            description: String::new(),
            source: None,
            when: rule.condition.to_source(),
            // 루프 방지를 끈 복제는 종료하지 않으므로 퍼징에서 제외
            then: rule
                .actions
                .iter()
                .take(4)
                .filter(|a| !matches!(a, FuzzAction::Clone { prevent_loops: false }))
                .map(FuzzAction::to_source)
                .collect(),
        })
        .collect();

    let stages: Vec<StageDefinition> = input
        .policies
        .iter()
        .take(4)
        .enumerate()
        .map(|(i, policy)| StageDefinition {
            stage: i as i32 * 10,
            match_policy: match policy {
                FuzzPolicy::All => MatchPolicy::All,
                FuzzPolicy::Either => MatchPolicy::Either,
                FuzzPolicy::Pass => MatchPolicy::Pass,
            },
            rules: rules.iter().map(|r| r.id.clone()).collect(),
        })
        .collect();

    let definitions = StateDefinitions {
        rules,
        pipelines: vec![PipelineDefinition {
            id: "p".to_owned(),
            title: String::new(),
            description: String::new(),
            stages,
        }],
        connections: vec![
            PipelineConnections::new("default", ["p"]),
            PipelineConnections::new("alerts", ["p"]),
        ],
        ..StateDefinitions::default()
    };

    let state = State::compile(&definitions, &FunctionRegistry::builtin());
    let max_clones = u32::from(input.max_clones % 16) + 1;
    let config = InterpreterConfig {
        max_clones,
        ..InterpreterConfig::default()
    };
    let Ok(interpreter) = PipelineInterpreter::new(StateHandle::new(state), config) else {
        return;
    };

    let messages: Vec<Message> = input
        .messages
        .iter()
        .take(4)
        .map(|body| {
            let mut message = Message::new(body.clone(), "fuzz", chrono::Utc::now());
            message.add_stream("default");
            message
        })
        .collect();
    let count = messages.len();

    let output = interpreter.process(messages);

    // 계보 루트당 최대 max_clones개까지만 합성됨
    assert!(output.len() <= count * (max_clones as usize + 1));
    for message in &output {
        assert!(message.clone_count() <= max_clones);
        assert!(!message.filter_out());
    }
});
