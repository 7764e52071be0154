//! Trainer configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::optim::RateSchedule;

/// Which training objective to minimise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    /// Multiclass hinge loss, summed over rows.
    #[default]
    Hinge,
    /// Mean negative log activation of the gold class.
    CrossEntropy,
}

impl FromStr for LossKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hinge" => Ok(Self::Hinge),
            "crossentropy" | "cross-entropy" | "cross_entropy" => Ok(Self::CrossEntropy),
            other => Err(format!("unknown loss {other:?}, expected hinge or crossentropy")),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hinge => write!(f, "hinge"),
            Self::CrossEntropy => write!(f, "crossentropy"),
        }
    }
}

/// Which update rule drives the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adagrad,
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adagrad" => Ok(Self::Adagrad),
            "sgd" => Ok(Self::Sgd),
            other => Err(format!("unknown optimizer {other:?}, expected adagrad or sgd")),
        }
    }
}

/// Configuration for minibatch training with patience-based early stopping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Rows per minibatch; a trailing partial block is dropped.
    pub minibatch_size: usize,
    /// Maximum passes over the training partition.
    pub n_epochs: usize,
    pub learning_rate: f64,
    /// Added to `sqrt(sum of squared gradients)` by adagrad.
    pub lr_smoother: f64,
    /// Initial iteration budget.
    pub patience: usize,
    /// Factor applied to the iteration count when patience is extended.
    pub patience_increase: f64,
    /// Relative improvement needed to extend patience.
    pub improvement_threshold: f64,
    pub loss: LossKind,
    pub optimizer: OptimizerKind,
    pub rate_schedule: RateSchedule,
    /// Seed for parameter initialisation.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            minibatch_size: 100,
            n_epochs: 20,
            learning_rate: 0.01,
            lr_smoother: 0.01,
            patience: 5000,
            patience_increase: 2.5,
            improvement_threshold: 0.9975,
            loss: LossKind::Hinge,
            optimizer: OptimizerKind::Adagrad,
            rate_schedule: RateSchedule::Accumulating,
            seed: 12,
        }
    }
}

impl TrainerConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_minibatch_size(mut self, size: usize) -> Self {
        self.minibatch_size = size;
        self
    }

    pub fn with_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_lr_smoother(mut self, smoother: f64) -> Self {
        self.lr_smoother = smoother;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_patience_increase(mut self, increase: f64) -> Self {
        self.patience_increase = increase;
        self
    }

    pub fn with_improvement_threshold(mut self, threshold: f64) -> Self {
        self.improvement_threshold = threshold;
        self
    }

    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_rate_schedule(mut self, schedule: RateSchedule) -> Self {
        self.rate_schedule = schedule;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
