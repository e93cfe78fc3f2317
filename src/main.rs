// SPDX-License-Identifier: PMPL-1.0-or-later
//! Audit Relay CLI - inspect, filter, and export captured audit results
//!
//! Operates on a captured scanning-engine results file (the raw JSON the
//! engine resolves with) and runs it through the same normalization,
//! aggregation, and export pipeline the live surfaces use.

use anyhow::{Context, Result};
use audit_relay::coordinator::{AuditRequest, TabId};
use audit_relay::engine::RawEngineResults;
use audit_relay::presenter::{Presenter, Surface};
use audit_relay::violation::{Impact, ImpactFilter, ScanOutcome};
use audit_relay::{AuditConfiguration, ExportReport};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Accessibility audit results pipeline
#[derive(Parser)]
#[command(name = "audit-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a captured engine results file as a report
    Report {
        /// Path to the raw engine results JSON
        input: PathBuf,

        /// Which surface style to render
        #[arg(short, long, value_enum, default_value_t = SurfaceArg::Panel)]
        surface: SurfaceArg,

        /// Show only violations of this impact
        #[arg(short, long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
    },

    /// Write the JSON export projection for a captured results file
    Export {
        /// Path to the raw engine results JSON
        input: PathBuf,

        /// Directory to write the artifact into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print the built-in audit configuration presets
    Presets,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SurfaceArg {
    Panel,
    Popup,
}

impl From<SurfaceArg> for Surface {
    fn from(arg: SurfaceArg) -> Surface {
        match arg {
            SurfaceArg::Panel => Surface::Panel,
            SurfaceArg::Popup => Surface::Popup,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    All,
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl From<FilterArg> for ImpactFilter {
    fn from(arg: FilterArg) -> ImpactFilter {
        match arg {
            FilterArg::All => ImpactFilter::All,
            FilterArg::Critical => ImpactFilter::Only(Impact::Critical),
            FilterArg::Serious => ImpactFilter::Only(Impact::Serious),
            FilterArg::Moderate => ImpactFilter::Only(Impact::Moderate),
            FilterArg::Minor => ImpactFilter::Only(Impact::Minor),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Report { input, surface, filter } => report(input, surface.into(), filter.into()),
        Commands::Export { input, output } => export(input, output),
        Commands::Presets => presets(),
    }
}

fn load_outcome(input: &PathBuf) -> Result<ScanOutcome> {
    let body = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let raw: RawEngineResults =
        serde_json::from_str(&body).context("results file is not engine-shaped JSON")?;
    Ok(ScanOutcome::from_raw(raw))
}

fn report(input: PathBuf, surface: Surface, filter: ImpactFilter) -> Result<()> {
    let outcome = load_outcome(&input)?;

    let mut presenter = Presenter::new(surface);
    let request = AuditRequest::new(TabId(0));
    presenter.begin_audit(&request);
    presenter.on_audit_complete(&request, outcome);
    presenter.set_filter(filter);

    println!("{}", presenter.render());
    Ok(())
}

fn export(input: PathBuf, output: PathBuf) -> Result<()> {
    let outcome = load_outcome(&input)?;
    let export = ExportReport::from_outcome(&outcome).context("outcome is not exportable")?;
    let path = export.write_to(&output)?;
    println!("{} {}", "Exported:".green().bold(), path.display());
    Ok(())
}

fn presets() -> Result<()> {
    println!("{}", "wcag-aa".bold());
    println!("{}", serde_json::to_string_pretty(&AuditConfiguration::wcag_aa())?);
    println!();
    println!("{}", "curated".bold());
    println!("{}", serde_json::to_string_pretty(&AuditConfiguration::curated())?);
    Ok(())
}
