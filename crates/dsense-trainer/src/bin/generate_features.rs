//! Generate feature files for a named experiment.
//!
//! Usage: `generate_features <experiment> <mapping_file> <dir>...`. The first
//! directory is the training set; pruned experiments prune only its files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dsense_core::{Experiment, ResourcePaths, EXPERIMENT_NAMES};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "generate_features")]
#[command(about = "Extract discourse-relation features into feature files")]
#[command(version)]
struct Cli {
    /// Experiment name
    experiment: String,

    /// JSON sense mapping (`{dimension: {sense: label}}`)
    mapping_file: PathBuf,

    /// CoNLL data directories, training set first
    #[arg(required = true)]
    dirs: Vec<PathBuf>,

    /// Brown cluster file
    #[arg(long, env = "DSENSE_BROWN_CLUSTERS")]
    brown_clusters: Option<PathBuf>,

    /// General Inquirer lexicon
    #[arg(long, env = "DSENSE_INQUIRER")]
    inquirer: Option<PathBuf>,

    /// MPQA subjectivity lexicon
    #[arg(long, env = "DSENSE_MPQA")]
    mpqa: Option<PathBuf>,

    /// Levin verb class lexicon
    #[arg(long, env = "DSENSE_LEVIN")]
    levin: Option<PathBuf>,
}

impl Cli {
    fn resources(&self) -> ResourcePaths {
        let mut resources = ResourcePaths::default();
        if let Some(path) = &self.brown_clusters {
            resources = resources.with_brown_clusters(path);
        }
        if let Some(path) = &self.inquirer {
            resources = resources.with_inquirer(path);
        }
        if let Some(path) = &self.mpqa {
            resources = resources.with_mpqa(path);
        }
        if let Some(path) = &self.levin {
            resources = resources.with_levin(path);
        }
        resources
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let experiment = Experiment::build(&cli.experiment, &cli.mapping_file, &cli.resources())
        .with_context(|| {
            format!(
                "cannot set up experiment {} (known: {})",
                cli.experiment,
                EXPERIMENT_NAMES.join(", ")
            )
        })?;

    let written = experiment
        .run(&cli.dirs)
        .with_context(|| format!("experiment {} failed", experiment.name))?;
    for path in &written {
        info!(path = %path.display(), "feature file");
    }
    Ok(())
}
