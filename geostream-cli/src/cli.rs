//! Définition et implémentation des commandes CLI
//!
//! - `convert`: GeoJSON → GeoJSON normalisé
//! - `inspect`: rapport de normalisation, sans écriture

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};
use geostream_cli::config::PipelineConfig;
use geostream_cli::convert::{collect_inputs, convert_file, inspect_file, output_path, run_batch};
use geostream_cli::report::{ConversionReport, ConversionStatus};
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize GeoJSON files and write them to an output directory
    Convert {
        /// Path to a GeoJSON file or a directory
        #[arg(short, long)]
        path: PathBuf,

        /// Output directory for normalized files
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Maximum number of files processed concurrently
        #[arg(long, alias = "threads")]
        jobs: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Save the JSON report to a file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Report what normalization would do, without writing anything
    Inspect {
        /// Path to a GeoJSON file or a directory
        #[arg(short, long)]
        path: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Maximum number of files processed concurrently
        #[arg(long, alias = "threads")]
        jobs: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Options du pipeline communes aux commandes
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Path to a JSON config (défaut : env GEOSTREAM_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Repair invalid geometries
    #[arg(long)]
    pub repair: bool,

    /// Keep structural attributes (boundedBy, metaDataProperty, description, location)
    #[arg(long)]
    pub no_sanitize: bool,

    /// Skip CRS resolution and axis-order correction
    #[arg(long)]
    pub no_axis: bool,
}

impl PipelineArgs {
    /// Configuration chargée puis surchargée par les options de la ligne de commande
    pub fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::resolve(self.config.as_deref())?;
        if self.repair {
            config.repair = true;
        }
        if self.no_sanitize {
            config.sanitize = false;
        }
        if self.no_axis {
            config.axis_correction = false;
        }
        Ok(config)
    }
}

/// Exécute la commande convert
pub fn cmd_convert(
    path: &Path,
    output: &Path,
    args: &PipelineArgs,
    jobs: Option<usize>,
    json: bool,
    report_file: Option<&Path>,
) -> Result<()> {
    let config = args.config()?;
    let pipeline = config.pipeline()?;
    let inputs = find_inputs(path)?;

    std::fs::create_dir_all(output)?;
    info!(files = inputs.len(), repair = config.repair, "Converting files");

    let report = run_batch(&inputs, jobs, |input| {
        convert_file(&pipeline, config.repair, input, &output_path(input, path, output))
    })?;

    if let Some(report_file) = report_file {
        report.save_to_file(report_file)?;
    }
    print_report(&report, json)
}

/// Exécute la commande inspect
pub fn cmd_inspect(path: &Path, args: &PipelineArgs, jobs: Option<usize>, json: bool) -> Result<()> {
    let config = args.config()?;
    let pipeline = config.pipeline()?;
    let inputs = find_inputs(path)?;

    info!(files = inputs.len(), "Inspecting files");

    let report = run_batch(&inputs, jobs, |input| {
        inspect_file(&pipeline, config.repair, input)
    })?;

    print_report(&report, json)
}

fn find_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    let inputs = collect_inputs(path)?;
    if inputs.is_empty() {
        anyhow::bail!("No GeoJSON files found in {}", path.display());
    }
    Ok(inputs)
}

fn print_report(report: &ConversionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        report.display();
    }

    if report.status == ConversionStatus::Failed {
        anyhow::bail!("No file could be processed ({})", report.summary());
    }
    Ok(())
}
