#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI orchestrator for the nitrogen map toolchain.
//!
//! `run` executes the batch pipeline, `serve` starts the HTTP API. Without
//! a subcommand the user picks a tool from an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`nitrogen_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod config;
mod pipeline;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dialoguer::{Input, Select};
use nitrogen_map_cli_utils::MultiProgress;
use nitrogen_map_field_models::Crs;
use nitrogen_map_server::ServerConfig;

use crate::config::PipelineConfig;
use crate::pipeline::PipelineOptions;

#[derive(Parser)]
#[command(name = "nitrogen_map_cli", about = "Nitrogen load mapping toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a workspace, analyze its fields and write the dataset
    Run {
        /// Directory searched for field and water layers
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Output directory for `fields_n_loads.csv` and `.geojson`
        #[arg(long, default_value = "out")]
        out: PathBuf,
        /// Optional TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Planar CRS in meters used for distances and areas (e.g. "EPSG:25832")
        #[arg(long)]
        metric_crs: Option<Crs>,
        /// Fraction of applied nitrogen assumed to reach water (0 to 1)
        #[arg(long)]
        runoff_coefficient: Option<f64>,
        /// Directory of management PDFs (defaults to `<root>/Bewirtschaftungsdokumentation-PDF`)
        #[arg(long)]
        documents_dir: Option<PathBuf>,
    },
    /// Start the area-check API server
    Serve {
        /// Dataset written by `run` (overrides `NITROGEN_MAP_DATASET`)
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Interface to bind (overrides `BIND_ADDR`)
        #[arg(long)]
        bind_addr: Option<String>,
        /// TCP port (overrides `PORT`)
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Top-level tool selection for the interactive menu.
enum Tool {
    RunPipeline,
    Server,
}

impl Tool {
    const ALL: &[Self] = &[Self::RunPipeline, Self::Server];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunPipeline => "Run pipeline",
            Self::Server => "Start server",
        }
    }
}

/// Loads the configuration file, if any, and applies flag overrides.
fn resolve_config(
    path: Option<&Path>,
    metric_crs: Option<Crs>,
    runoff_coefficient: Option<f64>,
    documents_dir: Option<PathBuf>,
) -> Result<PipelineConfig, config::ConfigError> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(crs) = metric_crs {
        config.analysis.metric_crs = crs;
    }
    if let Some(coefficient) = runoff_coefficient {
        config.analysis.runoff_coefficient = coefficient;
    }
    if documents_dir.is_some() {
        config.ingest.documents_dir = documents_dir;
    }

    Ok(config)
}

fn serve(config: ServerConfig) -> std::io::Result<()> {
    actix_web::rt::System::new().block_on(nitrogen_map_server::serve(config))
}

/// Prompts for the pipeline inputs and runs it.
fn interactive_pipeline(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let root: String = Input::new()
        .with_prompt("Workspace directory")
        .default(".".to_string())
        .interact_text()?;

    let out: String = Input::new()
        .with_prompt("Output directory")
        .default("out".to_string())
        .interact_text()?;

    let config_path: String = Input::new()
        .with_prompt("Configuration file (leave empty for defaults)")
        .allow_empty(true)
        .interact_text()?;

    let config_path = config_path.trim();
    let config = resolve_config(
        (!config_path.is_empty()).then(|| Path::new(config_path)),
        None,
        None,
        None,
    )?;

    pipeline::run(
        &PipelineOptions {
            root: PathBuf::from(root),
            out_dir: PathBuf::from(out),
            config,
        },
        multi,
    )?;

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = nitrogen_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            root,
            out,
            config,
            metric_crs,
            runoff_coefficient,
            documents_dir,
        }) => {
            let config = resolve_config(
                config.as_deref(),
                metric_crs,
                runoff_coefficient,
                documents_dir,
            )?;
            pipeline::run(
                &PipelineOptions {
                    root,
                    out_dir: out,
                    config,
                },
                &multi,
            )?;
        }
        Some(Commands::Serve {
            dataset,
            bind_addr,
            port,
        }) => {
            let defaults = ServerConfig::from_env();
            serve(ServerConfig {
                bind_addr: bind_addr.unwrap_or(defaults.bind_addr),
                port: port.unwrap_or(defaults.port),
                dataset_path: dataset.unwrap_or(defaults.dataset_path),
            })?;
        }
        None => {
            println!("Nitrogen Map Toolchain");
            println!();

            let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

            let idx = Select::new()
                .with_prompt("What would you like to do?")
                .items(&labels)
                .default(0)
                .interact()?;

            match Tool::ALL[idx] {
                Tool::RunPipeline => interactive_pipeline(&multi)?,
                Tool::Server => actix_web::rt::System::new()
                    .block_on(nitrogen_map_server::interactive::run())?,
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "nitrogen_map_cli",
            "run",
            "--root",
            "data",
            "--metric-crs",
            "EPSG:25832",
            "--runoff-coefficient",
            "0.2",
        ])
        .unwrap();

        let Some(Commands::Run {
            root,
            out,
            metric_crs,
            runoff_coefficient,
            ..
        }) = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(root, PathBuf::from("data"));
        assert_eq!(out, PathBuf::from("out"));
        assert_eq!(metric_crs, Some(Crs::from_epsg(25832)));
        assert_eq!(runoff_coefficient, Some(0.2));
    }

    #[test]
    fn rejects_unknown_crs_flag() {
        assert!(Cli::try_parse_from(["nitrogen_map_cli", "run", "--metric-crs", "ESRI:1"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let path = std::env::temp_dir().join(format!(
            "nitrogen_map_cli_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[analysis]\nmetric_crs = \"EPSG:25832\"\nrunoff_coefficient = 0.3\n\n[ingest]\ndocuments_dir = \"docs\"\n",
        )
        .unwrap();

        let config = resolve_config(Some(&path), None, Some(0.05), None).unwrap();
        assert_eq!(config.analysis.metric_crs, Crs::from_epsg(25832));
        assert!((config.analysis.runoff_coefficient - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.ingest.documents_dir, Some(PathBuf::from("docs")));

        let config = resolve_config(Some(&path), Some(Crs::from_epsg(25833)), None, None).unwrap();
        assert_eq!(config.analysis.metric_crs, Crs::from_epsg(25833));
        assert!((config.analysis.runoff_coefficient - 0.3).abs() < f64::EPSILON);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn no_file_means_defaults() {
        let config = resolve_config(None, None, None, None).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
