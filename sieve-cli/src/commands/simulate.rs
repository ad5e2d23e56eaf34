//! `sieve simulate` command handler
//!
//! Reads JSON-lines messages, runs them through the pipelines loaded from the
//! definition directory, and reports the emitted messages.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info};

use sieve_core::message::Message;
use sieve_core::value::Value;
use sieve_pipeline::rule::RuleStatsSnapshot;
use sieve_pipeline::{
    ConfigurationStateUpdater, FileStore, FunctionRegistry, InterpreterConfig, MessageAcknowledger,
    PipelineInterpreter, RuleMetricsConfig, State,
};

use crate::cli::SimulateArgs;
use crate::commands::{definition_dir, load_config};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Input field holding the stream list of a message.
const STREAMS_FIELD: &str = "streams";

/// Execute the `simulate` command.
pub async fn execute(
    args: SimulateArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let config_dir = definition_dir(&config, args.config_dir.clone());

    let metrics = if args.metrics {
        Some(install_recorder()?)
    } else {
        None
    };
    let rule_metrics_enabled = args.metrics || config.store.rule_metrics_enabled;

    info!(
        config_dir = %config_dir.display(),
        rule_metrics = rule_metrics_enabled,
        "loading definitions"
    );

    let mut store = FileStore::new(&config_dir);
    if rule_metrics_enabled {
        store = store.with_rule_metrics(RuleMetricsConfig {
            metrics_enabled: true,
        });
    }
    let updater =
        ConfigurationStateUpdater::new(Arc::new(store), Arc::new(FunctionRegistry::builtin()))
            .await?;
    let state = updater.latest();

    let messages = if args.input == Path::new("-") {
        read_messages(tokio::io::stdin(), &args.streams).await?
    } else {
        let file = tokio::fs::File::open(&args.input).await?;
        read_messages(file, &args.streams).await?
    };
    let input = messages.len();

    let dropped = Arc::new(DropCounter::default());
    let interpreter = PipelineInterpreter::new(
        updater.handle(),
        InterpreterConfig::from_core(&config.interpreter),
    )?
    .with_acknowledger(Arc::clone(&dropped) as Arc<dyn MessageAcknowledger>);

    let emitted = if args.pipelines.is_empty() {
        Arc::new(interpreter).process_concurrent(messages).await?
    } else {
        run_selected(&interpreter, messages, &args.pipelines, &state)?
    };

    info!(
        input,
        emitted = emitted.len(),
        dropped = dropped.count(),
        generation = state.generation(),
        "simulation finished"
    );

    let report = SimulationReport {
        config_dir: config_dir.display().to_string(),
        generation: state.generation(),
        input,
        dropped: dropped.count(),
        rules: rule_reports(&state),
        metrics: metrics.map(|handle| handle.render()),
        emitted,
    };

    writer.render(&report)?;

    Ok(())
}

fn install_recorder() -> Result<PrometheusHandle, CliError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(&sieve_core::metrics::PROCESSING_DURATION_BUCKETS)
        .map_err(|e| CliError::Command(format!("invalid histogram buckets: {e}")))?
        .install_recorder()
        .map_err(|e| CliError::Command(format!("failed to install metrics recorder: {e}")))?;
    sieve_core::metrics::describe_all();
    Ok(handle)
}

/// Run each message through the named pipelines once, ignoring connections.
fn run_selected(
    interpreter: &PipelineInterpreter,
    messages: Vec<Message>,
    pipeline_ids: &[String],
    state: &State,
) -> Result<Vec<Message>, CliError> {
    if let Some(unknown) = pipeline_ids.iter().find(|id| state.pipeline(id).is_none()) {
        return Err(CliError::Command(format!("unknown pipeline: {unknown}")));
    }

    let mut output = Vec::with_capacity(messages.len());
    for mut message in messages {
        let created = interpreter.process_for_pipelines(&mut message, pipeline_ids, state);
        debug!(
            message_id = %message.id(),
            created = created.len(),
            filter_out = message.filter_out(),
            "message simulated"
        );
        if !message.filter_out() {
            output.push(message);
        }
        output.extend(created);
    }
    Ok(output)
}

/// Parse JSON-lines input. Blank lines are skipped.
///
/// Each line is a JSON object of message fields. A `streams` array, if
/// present, replaces `default_streams` for that message.
pub(crate) async fn read_messages<R>(
    input: R,
    default_streams: &[String],
) -> Result<Vec<Message>, CliError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut messages = Vec::new();
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        messages.push(parse_line(&line, line_no, default_streams)?);
    }

    Ok(messages)
}

fn parse_line(line: &str, line_no: usize, default_streams: &[String]) -> Result<Message, CliError> {
    let input_err = |reason: String| CliError::Input {
        line: line_no,
        reason,
    };

    let mut fields: BTreeMap<String, Value> =
        serde_json::from_str(line).map_err(|e| input_err(e.to_string()))?;

    let streams = match fields.remove(STREAMS_FIELD) {
        None => default_streams.to_vec(),
        Some(Value::List(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| input_err("stream ids must be strings".to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(input_err(format!(
                "'{STREAMS_FIELD}' must be an array, got {}",
                other.kind()
            )));
        }
    };

    let message = Message::from_fields(fields, streams);
    if !message.is_complete() {
        return Err(input_err(
            "message must have non-empty 'message' and 'source' fields".to_owned(),
        ));
    }
    Ok(message)
}

fn rule_reports(state: &State) -> Vec<RuleReport> {
    state
        .rules()
        .values()
        .filter_map(|rule| {
            let stats = rule.stats().snapshot();
            (stats.evaluated > 0).then(|| RuleReport {
                id: rule.id().to_owned(),
                title: rule.title().to_owned(),
                stats,
            })
        })
        .collect()
}

/// Counts messages the interpreter discarded.
#[derive(Debug, Default)]
struct DropCounter {
    dropped: AtomicUsize,
}

impl DropCounter {
    fn count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MessageAcknowledger for DropCounter {
    fn acknowledge_dropped(&self, _message: &Message) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Simulation result.
#[derive(Serialize)]
pub struct SimulationReport {
    /// Definition directory the state was loaded from
    pub config_dir: String,
    /// State generation used for the run
    pub generation: u64,
    /// Number of input messages
    pub input: usize,
    /// Number of messages dropped or discarded
    pub dropped: usize,
    /// Per-rule counters (rules that were evaluated at least once)
    pub rules: Vec<RuleReport>,
    /// Prometheus text snapshot, when `--metrics` was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
    /// Messages emitted by the interpreter
    pub emitted: Vec<Message>,
}

#[derive(Serialize)]
pub struct RuleReport {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub stats: RuleStatsSnapshot,
}

impl Render for SimulationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Simulation: {} (generation {})",
            self.config_dir.bold(),
            self.generation
        )?;
        writeln!(
            w,
            "  Messages: {} in, {} out, {} dropped",
            self.input,
            self.emitted.len().to_string().green(),
            self.dropped.to_string().yellow()
        )?;

        for message in &self.emitted {
            writeln!(w)?;
            let streams: Vec<&str> = message.streams().iter().map(String::as_str).collect();
            writeln!(
                w,
                "{} [{}]",
                message.id().bold(),
                streams.join(", ")
            )?;
            let lineage = message.lineage();
            if let Some(ref parent) = lineage.parent_id {
                writeln!(
                    w,
                    "  lineage: root {} parent {} clone {}",
                    lineage.root_id, parent, lineage.clone_count
                )?;
            }
            for (name, value) in message.fields() {
                let rendered = serde_json::to_string(value).unwrap_or_else(|_| "?".to_owned());
                writeln!(w, "  {name} = {rendered}")?;
            }
            for error in message.processing_errors() {
                writeln!(w, "  {} {}: {}", "error".red(), error.message, error.details)?;
            }
        }

        if !self.rules.is_empty() {
            writeln!(w)?;
            writeln!(
                w,
                "{:<25} {:>9} {:>8} {:>9} {:>7} {:>9}",
                "Rule", "Evaluated", "Matched", "Unmatched", "Failed", "Executed"
            )?;
            writeln!(w, "{}", "-".repeat(72))?;
            for rule in &self.rules {
                let failed = if rule.stats.failed > 0 {
                    rule.stats.failed.to_string().red()
                } else {
                    rule.stats.failed.to_string().normal()
                };
                writeln!(
                    w,
                    "{:<25} {:>9} {:>8} {:>9} {:>7} {:>9}",
                    rule.id,
                    rule.stats.evaluated,
                    rule.stats.matched,
                    rule.stats.not_matched,
                    failed,
                    rule.stats.executed
                )?;
            }
        }

        if let Some(ref metrics) = self.metrics {
            writeln!(w)?;
            write!(w, "{metrics}")?;
        }

        Ok(())
    }
}
