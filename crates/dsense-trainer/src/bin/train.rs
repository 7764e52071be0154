//! Train a sense classifier on a saved data triplet or on synthetic data.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use candle_core::Device;
use clap::{Parser, ValueEnum};
use dsense_trainer::data::{synthetic_bilinear, synthetic_linear, DataTriplet};
use dsense_trainer::model::{
    Activation, BilinearLayer, GlueLayer, Layer, LinearLayer, MixtureOfExperts, Model, ParamInit,
};
use dsense_trainer::{LossKind, OptimizerKind, RateSchedule, Trainer, TrainerConfig, TrainingOutcome};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum ModelKind {
    /// One linear layer over every input
    Linear,
    /// Bilinear layer over exactly two inputs
    Bilinear,
    /// Linear plus bilinear layers, summed
    Glue,
    /// Two linear experts behind a softmax gate
    Mixture,
}

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a discourse-sense classifier with minibatch adagrad")]
#[command(version)]
struct Cli {
    /// Directory holding train/dev/test.safetensors; synthetic data otherwise
    #[arg(long, env = "DSENSE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ModelKind::Linear)]
    model: ModelKind,

    /// hinge or crossentropy
    #[arg(long, default_value = "hinge")]
    loss: LossKind,

    /// adagrad or sgd
    #[arg(long, default_value = "adagrad")]
    optimizer: OptimizerKind,

    /// accumulating, sequential or standard adagrad step size
    #[arg(long, default_value = "accumulating")]
    rate_schedule: RateSchedule,

    #[arg(long, default_value_t = 100)]
    minibatch_size: usize,

    #[arg(long, default_value_t = 20)]
    epochs: usize,

    #[arg(long, default_value_t = 0.01)]
    learning_rate: f64,

    #[arg(long, default_value_t = 0.01)]
    lr_smoother: f64,

    #[arg(long, default_value_t = 5000)]
    patience: usize,

    /// Number of classes (synthetic data only)
    #[arg(long, default_value_t = 3)]
    classes: usize,

    /// Width of the first input (synthetic data only)
    #[arg(long, default_value_t = 40)]
    features: usize,

    /// Total rows, half used for training (synthetic data only)
    #[arg(long, default_value_t = 4000)]
    rows: usize,

    #[arg(long, env = "DSENSE_SEED", default_value_t = 12)]
    seed: u64,

    /// Write trained parameters to this safetensors file
    #[arg(long)]
    save_params: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report {
    model: ModelKind,
    config: TrainerConfig,
    outcome: TrainingOutcome,
}

impl Cli {
    fn config(&self) -> TrainerConfig {
        TrainerConfig::new()
            .with_minibatch_size(self.minibatch_size)
            .with_epochs(self.epochs)
            .with_learning_rate(self.learning_rate)
            .with_lr_smoother(self.lr_smoother)
            .with_patience(self.patience)
            .with_loss(self.loss)
            .with_optimizer(self.optimizer)
            .with_rate_schedule(self.rate_schedule)
            .with_seed(self.seed)
    }

    fn data(&self, device: &Device) -> Result<DataTriplet> {
        if let Some(dir) = &self.data_dir {
            return DataTriplet::load_dir(dir, device)
                .with_context(|| format!("failed to load data from {}", dir.display()));
        }
        let data = match self.model {
            ModelKind::Bilinear => {
                synthetic_bilinear(self.features, self.classes, self.rows, self.seed, device)?
            }
            _ => synthetic_linear(
                &[self.features, (self.features / 2).max(1)],
                self.classes,
                self.rows,
                self.seed,
                device,
            )?,
        };
        info!(rows = self.rows, features = self.features, classes = self.classes, "generated synthetic data");
        Ok(data)
    }
}

fn n_classes(data: &DataTriplet) -> Result<usize> {
    let labels = data
        .training
        .labels
        .first()
        .context("training partition has no labels")?;
    let max = labels.max(0)?.to_scalar::<u32>()?;
    Ok(max as usize + 1)
}

fn build_model(kind: ModelKind, dims: &[usize], n_out: usize, init: &mut ParamInit) -> Result<Model> {
    let model = match kind {
        ModelKind::Linear => Model::single(LinearLayer::new(init, dims, n_out, Activation::Identity)?),
        ModelKind::Bilinear => {
            let [n_in1, n_in2] = dims else {
                bail!("bilinear model needs exactly two inputs, data has {}", dims.len());
            };
            Model::single(BilinearLayer::new(init, *n_in1, *n_in2, n_out, Activation::Tanh)?)
        }
        ModelKind::Glue => {
            if dims.len() < 2 {
                bail!("glue model needs at least two inputs, data has {}", dims.len());
            }
            let linear = LinearLayer::new(init, dims, n_out, Activation::Identity)?;
            let bilinear = BilinearLayer::new(init, dims[0], dims[1], n_out, Activation::Identity)?;
            let glue = GlueLayer::new(dims.len(), Activation::Tanh)
                .with_part(linear, (0..dims.len()).collect())?
                .with_part(bilinear, vec![0, 1])?;
            Model::single(glue)
        }
        ModelKind::Mixture => {
            let experts = (0..2)
                .map(|_| -> Result<Box<dyn Layer>> {
                    Ok(Box::new(LinearLayer::new(init, dims, n_out, Activation::Tanh)?))
                })
                .collect::<Result<Vec<_>>>()?;
            Model::single(MixtureOfExperts::new(init, dims, experts)?)
        }
    };
    Ok(model)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let device = Device::Cpu;
    let config = cli.config();
    let data = cli.data(&device)?;
    let dims = data.input_dimensions()?;
    let n_out = match cli.data_dir {
        Some(_) => n_classes(&data)?,
        None => cli.classes,
    };

    let mut init = ParamInit::new(config.seed, device);
    let model = build_model(cli.model, &dims, n_out, &mut init)?;
    info!(model = ?cli.model, ?dims, n_out, params = model.params().len(), "built model");

    let mut trainer = Trainer::new(model, config.clone());
    let outcome = trainer
        .train_minibatch_triplet(&data)
        .context("training failed")?;

    if let Some(path) = &cli.save_params {
        trainer
            .model()
            .save(path)
            .with_context(|| format!("failed to save parameters to {}", path.display()))?;
    }

    let report = Report {
        model: cli.model,
        config,
        outcome,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
