//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// strata -- attribute container layer files to packages and export SBOMs.
///
/// Use `strata <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
pub struct Cli {
    /// Path to a strata.toml configuration file (defaults are used when omitted).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan extracted layer directories and write reports.
    Scan(ScanArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

/// Scan one or more extracted layer directories, in layer order.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Layer root directories, lowest layer first.
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,

    /// Layer identifier for each directory, in the same order (default: directory name).
    #[arg(long = "layer-id")]
    pub layer_ids: Vec<String>,

    /// Enable version sniffing over executable strings.
    #[arg(long)]
    pub analyze_binaries: bool,

    /// Drop symlink aliases of files already in the layer before extraction.
    #[arg(long)]
    pub accurate: bool,

    /// Image name used for the SBOM and report file names.
    #[arg(long, default_value = "image")]
    pub image: String,

    /// Report output directory (overrides `output.dir`).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Write the `product,version,vendor` CSV.
    #[arg(long)]
    pub csv: bool,

    /// Write the per-layer JSON report.
    #[arg(long)]
    pub json: bool,

    /// Write the SPDX 2.3 document.
    #[arg(long)]
    pub spdx: bool,
}

// ---- config ----

/// Manage strata configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, scan, output).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_scan_defaults() {
        let cli = Cli::try_parse_from(["strata", "scan", "/layers/0"]).expect("parse succeeded");
        assert!(cli.config.is_none());
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.dirs, vec![PathBuf::from("/layers/0")]);
                assert!(args.layer_ids.is_empty());
                assert!(!args.analyze_binaries);
                assert!(!args.accurate);
                assert_eq!(args.image, "image");
                assert!(args.out.is_none());
                assert!(!args.csv && !args.json && !args.spdx);
            }
            _ => panic!("expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parse_scan_full() {
        let cli = Cli::try_parse_from([
            "strata",
            "scan",
            "/l/0",
            "/l/1",
            "--layer-id",
            "base",
            "--layer-id",
            "app",
            "--analyze-binaries",
            "--accurate",
            "--image",
            "nginx:1.25",
            "--out",
            "/tmp/out",
            "--csv",
            "--json",
            "--spdx",
            "--output",
            "json",
        ])
        .expect("parse succeeded");
        assert!(matches!(cli.output, OutputFormat::Json));
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.dirs.len(), 2);
                assert_eq!(args.layer_ids, ["base", "app"]);
                assert!(args.analyze_binaries && args.accurate);
                assert_eq!(args.image, "nginx:1.25");
                assert_eq!(args.out, Some(PathBuf::from("/tmp/out")));
                assert!(args.csv && args.json && args.spdx);
            }
            _ => panic!("expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parse_scan_requires_a_directory() {
        assert!(Cli::try_parse_from(["strata", "scan"]).is_err());
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from([
            "strata",
            "-c",
            "strata.toml",
            "config",
            "show",
            "--section",
            "scan",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.config, Some(PathBuf::from("strata.toml")));
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("scan")),
            _ => panic!("expected Config Show command"),
        }
    }

    #[test]
    fn test_cli_parse_invalid_output_format() {
        let result = Cli::try_parse_from(["strata", "--output", "yaml", "config", "validate"]);
        assert!(result.is_err(), "unknown output format should be rejected");
    }
}
