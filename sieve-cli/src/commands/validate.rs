//! `sieve validate` command handler
//!
//! Checks every definition file individually. Unlike the state updater, which
//! skips broken files, this reports each failure.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use sieve_pipeline::store::DefinitionLoader;
use sieve_pipeline::{
    ConfigurationStore, FileStore, FunctionRegistry, PipelineDefinition, Rule, RuleDefinition,
};

use crate::cli::ValidateArgs;
use crate::commands::{definition_dir, load_config};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const RULES_DIR: &str = "rules";
const PIPELINES_DIR: &str = "pipelines";

/// Execute the `validate` command.
pub async fn execute(
    args: ValidateArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let config_dir = definition_dir(&config, args.config_dir);

    info!(config_dir = %config_dir.display(), "validating definitions");

    let report = validate_dir(&config_dir).await?;
    writer.render(&report)?;

    if !report.errors.is_empty() {
        return Err(CliError::Validation(format!(
            "{} invalid definition(s)",
            report.errors.len()
        )));
    }

    Ok(())
}

/// Validate rules, pipelines and connections under `config_dir`.
///
/// Fails only when a definition directory cannot be read at all.
pub async fn validate_dir(config_dir: &Path) -> Result<ValidationReport, CliError> {
    let registry = FunctionRegistry::builtin();
    let mut report = ValidationReport {
        config_dir: config_dir.display().to_string(),
        ..ValidationReport::default()
    };

    // Rules: parse, validate, compile
    let mut rule_ids = BTreeSet::new();
    for path in yaml_files(&config_dir.join(RULES_DIR)).await? {
        let file = path.display().to_string();
        let definition = match DefinitionLoader::load_file::<RuleDefinition>(&path).await {
            Ok(definition) => definition,
            Err(e) => {
                report.error(&file, e.to_string());
                continue;
            }
        };
        if let Err(e) = Rule::compile(&definition, &registry) {
            report.error(&file, e.to_string());
            continue;
        }
        if !rule_ids.insert(definition.id.clone()) {
            report.error(&file, format!("duplicate rule id '{}'", definition.id));
            continue;
        }
        report.rules += 1;
    }

    // Pipelines: parse, validate, check rule references
    let mut pipeline_ids = BTreeSet::new();
    for path in yaml_files(&config_dir.join(PIPELINES_DIR)).await? {
        let file = path.display().to_string();
        let definition = match DefinitionLoader::load_file::<PipelineDefinition>(&path).await {
            Ok(definition) => definition,
            Err(e) => {
                report.error(&file, e.to_string());
                continue;
            }
        };
        if !pipeline_ids.insert(definition.id.clone()) {
            report.error(&file, format!("duplicate pipeline id '{}'", definition.id));
            continue;
        }
        for stage in &definition.stages {
            for rule_id in stage.rules.iter().filter(|id| !rule_ids.contains(*id)) {
                report.warning(
                    &file,
                    format!("stage {} references unknown rule '{rule_id}'", stage.stage),
                );
            }
        }
        report.pipelines += 1;
    }

    // Connections
    let connections_file = config_dir.join("connections.yml").display().to_string();
    match FileStore::new(config_dir).load_connections().await {
        Ok(connections) => {
            for record in &connections {
                for pipeline_id in record
                    .pipeline_ids
                    .iter()
                    .filter(|id| !pipeline_ids.contains(*id))
                {
                    report.warning(
                        &connections_file,
                        format!(
                            "stream '{}' references unknown pipeline '{pipeline_id}'",
                            record.stream_id
                        ),
                    );
                }
            }
            report.connections = connections.len();
        }
        Err(e) => report.error(&connections_file, e.to_string()),
    }

    Ok(report)
}

/// `.yml`/`.yaml` files of a directory, sorted by path.
async fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        CliError::Command(format!("failed to read {}: {e}", dir.display()))
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml")
        {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Definition validation report.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub config_dir: String,
    /// Valid rule files
    pub rules: usize,
    /// Valid pipeline files
    pub pipelines: usize,
    /// Connection records
    pub connections: usize,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

#[derive(Debug, Serialize)]
pub struct Issue {
    pub file: String,
    pub message: String,
}

impl ValidationReport {
    fn error(&mut self, file: &str, message: String) {
        self.errors.push(Issue {
            file: file.to_owned(),
            message,
        });
    }

    fn warning(&mut self, file: &str, message: String) {
        self.warnings.push(Issue {
            file: file.to_owned(),
            message,
        });
    }
}

impl Render for ValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Definition Validation: {}", self.config_dir.bold())?;
        writeln!(
            w,
            "  Rules: {}, Pipelines: {}, Connections: {}",
            self.rules, self.pipelines, self.connections
        )?;

        if self.errors.is_empty() {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
        }

        for issue in &self.errors {
            writeln!(w, "  {} {}: {}", "Error".red(), issue.file, issue.message)?;
        }
        for issue in &self.warnings {
            writeln!(w, "  {} {}: {}", "Warning".yellow(), issue.file, issue.message)?;
        }

        Ok(())
    }
}
