//! yomu CLI: merge a sequence of GENESIS log files into one table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use yomu_core::{
    merge_logs, storage, FileReport, LogDialect, LogInput, MergeOptions, OutputFormat,
    OutputSpec,
};

#[derive(Parser, Debug)]
#[command(
    name = "yomu",
    about = "Merge a sequence of GENESIS log files into one table",
    version
)]
struct Cli {
    /// GENESIS log files, in chronological order
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Output file name, without extension
    #[arg(long, value_name = "NAME", default_value = "out")]
    out_name: String,

    /// Output directory (created if absent)
    #[arg(long, value_name = "PATH", default_value = "./")]
    out_path: PathBuf,

    /// Per-file labels, matched positionally to FILE (default: file stem)
    #[arg(long, value_name = "NAME", num_args = 1..)]
    log_names: Option<Vec<String>>,

    /// Add TIMESTEP, FORCEFIELD and ENSEMBLE columns read from each log
    #[arg(long)]
    metadata: bool,

    /// Output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Prefix of the lines holding tabular output
    #[arg(long, default_value = "INFO")]
    marker: String,

    /// Name of the column holding each row's source label
    #[arg(long, default_value = "NAME")]
    label_column: String,

    /// Also write the per-file merge report as YAML
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Print the resolved merge plan and exit without reading any log
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors; no summary table
    #[arg(short, long)]
    quiet: bool,
}

/// Everything a run will do, as printed by `--dry-run`.
#[derive(Debug, Serialize)]
struct MergePlan {
    inputs: Vec<LogInput>,
    options: MergeOptions,
    output: OutputSpec,
    output_file: PathBuf,
}

impl Cli {
    fn plan(&self) -> Result<MergePlan> {
        let inputs = LogInput::pair(&self.inputs, self.log_names.as_deref())?;
        let output = OutputSpec::new(&self.out_path, &self.out_name).with_format(self.format);
        let options = MergeOptions {
            dialect: LogDialect::default()
                .with_marker(&self.marker)
                .with_label_column(&self.label_column),
            with_metadata: self.metadata,
        };
        Ok(MergePlan {
            inputs,
            options,
            output_file: output.path(),
            output,
        })
    }

    fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let plan = cli.plan()?;
    tracing::debug!(?plan, "resolved merge plan");

    if cli.dry_run {
        print!("{}", serde_yaml::to_string(&plan)?);
        return Ok(());
    }

    cmd_merge(&plan, cli.report.as_deref(), cli.quiet)
}

// ─── Command implementation ──────────────────────────────────────────────────

fn cmd_merge(plan: &MergePlan, report_path: Option<&std::path::Path>, quiet: bool) -> Result<()> {
    let outcome = merge_logs(&plan.inputs, &plan.options).context("Merge aborted")?;

    let path = storage::write_table(&plan.output, &outcome.table)
        .with_context(|| format!("Failed to write {}", plan.output_file.display()))?;

    if let Some(report_path) = report_path {
        storage::save_yaml(report_path, &outcome.reports)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    }

    if !quiet {
        println!("{}", summary_table(&outcome.reports));
        println!(
            "Wrote {} rows x {} columns to {}",
            outcome.total_rows(),
            outcome.table.column_names().len(),
            path.display()
        );
    }

    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn summary_table(reports: &[FileReport]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Label", "File", "Rows", "Step offset", "Time offset"]);

    for report in reports {
        let file = report
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row([
            report.label.clone(),
            file,
            report.rows.to_string(),
            format_offset(report.step_offset),
            format_offset(report.time_offset),
        ]);
    }
    table
}

fn format_offset<T: std::fmt::Display>(offset: Option<T>) -> String {
    offset
        .map(|o| format!("+{o}"))
        .unwrap_or_else(|| "-".to_string())
}
