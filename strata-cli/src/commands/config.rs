//! `strata config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use strata_core::config::StrataConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: &[&str] = &["general", "scan", "output"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

fn source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_owned())
}

/// Load and validate the configuration, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails.
async fn execute_validate(
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(source = %source_label(config_path), "validating configuration");

    let report = match StrataConfig::load_or_default(config_path).await {
        Ok(_) => ConfigValidationReport {
            source: source_label(config_path),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: source_label(config_path),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Display the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Core` if loading fails or `CliError::Command` for an unknown section.
async fn execute_show(
    config_path: Option<&Path>,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = StrataConfig::load_or_default(config_path).await?;
    let report = build_config_report(&config, source_label(config_path), section)?;
    writer.render(&report)
}

fn build_config_report(
    config: &StrataConfig,
    source: String,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let rendered = match section.as_deref() {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("scan") => toml::to_string_pretty(&config.scan),
        Some("output") => toml::to_string_pretty(&config.output),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source,
        section,
        config: serde_json::to_value(config)?,
        config_toml: rendered.unwrap_or_else(|e| format!("(serialization error: {e})")),
    })
}

/// Configuration display report.
///
/// JSON output carries the full structured config; text output prints TOML.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration source
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Effective configuration
    pub config: serde_json::Value,
    /// Serialized TOML (text output only)
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration source
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
