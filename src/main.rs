//! CLI entry point for signal-graph
//!
//! Provides command-line interface for:
//! - Importing one S-parameter from a Touchstone file and printing it
//! - Running every filter of a graph configuration once
//!
//! # Usage
//!
//! Import S21 of a two-port file as CSV:
//! ```bash
//! signal-graph import cable.s2p --src 1 --dst 2
//! ```
//!
//! Evaluate a graph:
//! ```bash
//! signal-graph run --config config/graph.toml
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use signal_graph::config::GraphConfig;
use signal_graph::filter::{Filter, RefreshStatus};
use signal_graph::filters::touchstone_import::{DEST_PORT_PARAM, FILE_PARAM, SOURCE_PORT_PARAM};
use signal_graph::filters::TouchstoneImportFilter;
use signal_graph::logging::{self, OutputFormat, TracingConfig};
use signal_graph::registry::FilterRegistry;
use signal_graph::{export, waveform::WaveformData};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "signal-graph")]
#[command(about = "Filter-graph waveform processing with Touchstone import", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "compact", global = true)]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one S-parameter and print both streams
    Import {
        /// Path to a .sNp file
        file: PathBuf,

        /// Stimulus port (1-based)
        #[arg(long, default_value_t = 1)]
        src: i64,

        /// Response port (1-based)
        #[arg(long, default_value_t = 2)]
        dst: i64,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: DumpFormat,
    },

    /// Build and refresh every enabled filter of a graph
    Run {
        /// Graph configuration file
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DumpFormat {
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            file,
            src,
            dst,
            format,
        } => {
            logging::init(TracingConfig::default().with_format(cli.log_format)).map_err(|e| anyhow!(e))?;
            import(file, src, dst, format)
        }
        Commands::Run { config } => run_graph(config, cli.log_format),
    }
}

fn import(file: PathBuf, src: i64, dst: i64, format: DumpFormat) -> Result<()> {
    let mut filter = TouchstoneImportFilter::new();
    filter.set_parameter(FILE_PARAM, file.to_string_lossy().into_owned().into())?;
    filter.set_parameter(SOURCE_PORT_PARAM, src.into())?;
    filter.set_parameter(DEST_PORT_PARAM, dst.into())?;
    filter.set_default_name();

    if let RefreshStatus::Aborted(err) = filter.refresh() {
        return Err(err).with_context(|| format!("Failed to import {}", file.display()));
    }

    match format {
        DumpFormat::Csv => export::write_csv(&filter, io::stdout().lock())?,
        DumpFormat::Json => {
            serde_json::to_writer_pretty(io::stdout().lock(), &export::to_json(&filter))?;
            println!();
        }
    }
    Ok(())
}

fn run_graph(path: PathBuf, log_format: OutputFormat) -> Result<()> {
    let config = GraphConfig::load_from(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    config.validate().map_err(|e| anyhow!(e))?;

    let tracing_config = TracingConfig::from_graph_config(&config).map_err(|e| anyhow!(e))?;
    logging::init(tracing_config.with_format(log_format)).map_err(|e| anyhow!(e))?;

    info!(name = %config.application.name, "Running graph");

    let registry = FilterRegistry::new();
    let mut built: Vec<(String, Box<dyn Filter>)> = Vec::new();
    let mut failures = 0;

    for def in config.enabled_filters() {
        let mut filter = registry
            .create(&def.r#type, &def.parameters)
            .with_context(|| format!("Failed to create filter '{}'", def.id))?;

        if let Some(binding) = &def.input {
            let upstream = built
                .iter()
                .find(|(id, _)| *id == binding.filter)
                .ok_or_else(|| anyhow!("Filter '{}' reads from disabled filter '{}'", def.id, binding.filter))?;
            let descriptor = upstream.1.descriptor(binding.stream).ok_or_else(|| {
                anyhow!("Filter '{}' has no stream {}", binding.filter, binding.stream)
            })?;
            filter.set_input(0, descriptor)?;
        }

        if filter.needs_config() {
            warn!(filter = %def.id, "Filter needs configuration before it can produce output");
        }

        match filter.refresh() {
            RefreshStatus::Aborted(_) => failures += 1,
            status => info!(filter = %def.id, %status, "Refreshed"),
        }
        summarize(&def.id, filter.as_ref());
        built.push((def.id.clone(), filter));
    }

    if failures > 0 {
        bail!("{failures} filter(s) failed to refresh");
    }
    Ok(())
}

fn summarize(id: &str, filter: &dyn Filter) {
    let x_unit = filter.x_axis_unit();
    for (index, stream) in filter.base().streams().iter().enumerate() {
        let Some(data) = stream.data() else {
            info!(filter = %id, stream = index, name = stream.name(), "No data");
            continue;
        };
        let (first, last) = match data {
            WaveformData::Analog(w) => (w.x_at(0), w.len().checked_sub(1).and_then(|i| w.x_at(i))),
            WaveformData::Digital(w) => (w.x_at(0), w.len().checked_sub(1).and_then(|i| w.x_at(i))),
        };
        info!(
            filter = %id,
            stream = index,
            name = stream.name(),
            unit = %stream.unit(),
            points = data.len(),
            from = %first.map(|x| x_unit.pretty_print(x as f64)).unwrap_or_default(),
            to = %last.map(|x| x_unit.pretty_print(x as f64)).unwrap_or_default(),
            "Stream summary"
        );
    }
}
