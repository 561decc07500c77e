//! `strata scan` command handler

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use strata_core::config::StrataConfig;
use strata_layer_scanner::{
    LayerInput, LayeredInventory, ReportSelection, ReportWriter, ScanConfig, Scanner,
};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    config: StrataConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let layers = build_layer_inputs(&args.dirs, &args.layer_ids)?;

    let mut scan_config = ScanConfig::from_core(&config.scan);
    scan_config.analyze_binaries |= args.analyze_binaries;
    scan_config.accurate |= args.accurate;
    let scanner = Arc::new(Scanner::new(scan_config)?);

    let selection = merge_selection(&args, &config);
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));

    info!(
        image = %args.image,
        layers = layers.len(),
        out = %out_dir.display(),
        extractors = scanner.extractor_names().len(),
        "starting layer scan"
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing running layers");
                cancel.cancel();
            }
        })
    };

    let start = Instant::now();
    let inventory = scanner.scan_layers(layers, Some(cancel)).await;
    let elapsed = start.elapsed();
    ctrl_c.abort();

    if inventory.layers().is_empty() {
        let report = build_scan_report(&args.image, &inventory, Vec::new(), elapsed.as_millis());
        writer.render(&report)?;
        return Err(CliError::Scan("no layer could be scanned".to_owned()));
    }

    let report_writer = ReportWriter::new(out_dir, args.image.clone());
    let written = report_writer.write_all(&inventory, selection, elapsed)?;

    let report = build_scan_report(&args.image, &inventory, written, elapsed.as_millis());
    writer.render(&report)
}

/// Pair each directory with its layer id.
///
/// Without `--layer-id` the directory's final component is used.
fn build_layer_inputs(dirs: &[PathBuf], ids: &[String]) -> Result<Vec<LayerInput>, CliError> {
    if !ids.is_empty() && ids.len() != dirs.len() {
        return Err(CliError::Command(format!(
            "got {} --layer-id values for {} directories",
            ids.len(),
            dirs.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut layers = Vec::with_capacity(dirs.len());
    for (index, dir) in dirs.iter().enumerate() {
        let id = match ids.get(index) {
            Some(id) => id.clone(),
            None => dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("layer-{index}")),
        };
        if !seen.insert(id.clone()) {
            return Err(CliError::Command(format!(
                "duplicate layer id: {id} (use --layer-id to disambiguate)"
            )));
        }
        layers.push(LayerInput::new(id, dir.clone()));
    }
    Ok(layers)
}

/// CLI flags add to the formats enabled in `[output]`.
fn merge_selection(args: &ScanArgs, config: &StrataConfig) -> ReportSelection {
    let configured = ReportSelection::from_core(&config.output);
    ReportSelection {
        csv: args.csv || configured.csv,
        json: args.json || configured.json,
        spdx: args.spdx || configured.spdx,
    }
}

fn build_scan_report(
    image: &str,
    inventory: &LayeredInventory,
    written: Vec<PathBuf>,
    elapsed_ms: u128,
) -> ScanReport {
    let layers = inventory
        .layers()
        .iter()
        .map(|(id, ledger)| {
            let summary = ledger.summary();
            LayerRow {
                id: id.clone(),
                total_files: summary.total_files,
                attributed_files: summary.attributed_files,
                remaining_files: summary.remaining_files,
                packages: summary.packages,
                diagnostics: summary.diagnostics,
            }
        })
        .collect();

    let failures = inventory
        .failures()
        .iter()
        .map(|f| FailureRow {
            layer: f.layer.clone(),
            reason: f.reason.clone(),
        })
        .collect();

    ScanReport {
        image: image.to_owned(),
        os: inventory.os_info().map(|os| os.to_string()),
        packages: inventory.packages().len(),
        layers,
        failures,
        reports: written.iter().map(|p| p.display().to_string()).collect(),
        elapsed_ms: u64::try_from(elapsed_ms).unwrap_or(u64::MAX),
    }
}

#[derive(Serialize)]
pub struct ScanReport {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    pub packages: usize,
    pub layers: Vec<LayerRow>,
    pub failures: Vec<FailureRow>,
    pub reports: Vec<String>,
    pub elapsed_ms: u64,
}

#[derive(Serialize)]
pub struct LayerRow {
    pub id: String,
    pub total_files: usize,
    pub attributed_files: usize,
    pub remaining_files: usize,
    pub packages: usize,
    pub diagnostics: usize,
}

#[derive(Serialize)]
pub struct FailureRow {
    pub layer: String,
    pub reason: String,
}

impl Render for ScanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Image: {}", self.image.bold())?;
        writeln!(w, "OS: {}", self.os.as_deref().unwrap_or("unknown"))?;
        writeln!(w, "Packages: {}", self.packages.to_string().bold())?;
        writeln!(w, "Elapsed: {} ms", self.elapsed_ms)?;
        writeln!(w)?;

        if self.layers.is_empty() {
            writeln!(w, "{}", "No layer was scanned.".yellow())?;
        } else {
            writeln!(
                w,
                "{:<24} {:>8} {:>10} {:>10} {:>9} {:>6}",
                "Layer", "Files", "Attributed", "Remaining", "Packages", "Diags"
            )?;
            writeln!(w, "{}", "-".repeat(72))?;
            for layer in &self.layers {
                let diags = if layer.diagnostics > 0 {
                    layer.diagnostics.to_string().yellow()
                } else {
                    layer.diagnostics.to_string().normal()
                };
                writeln!(
                    w,
                    "{:<24} {:>8} {:>10} {:>10} {:>9} {:>6}",
                    layer.id,
                    layer.total_files,
                    layer.attributed_files,
                    layer.remaining_files,
                    layer.packages,
                    diags
                )?;
            }
        }

        if !self.failures.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "Failed layers:".red().bold())?;
            for failure in &self.failures {
                writeln!(w, "  {}: {}", failure.layer, failure.reason.red())?;
            }
        }

        if !self.reports.is_empty() {
            writeln!(w)?;
            writeln!(w, "Reports:")?;
            for path in &self.reports {
                writeln!(w, "  {}", path.green())?;
            }
        }

        Ok(())
    }
}
