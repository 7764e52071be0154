//! # dsense Trainer
//!
//! Small neural sense classifiers (linear, bilinear, glue, mixture of
//! experts) over dense feature matrices, trained with minibatch adagrad and
//! patience-based early stopping.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use candle_core::Device;
//! use dsense_trainer::data::synthetic_linear;
//! use dsense_trainer::model::{Activation, LinearLayer, Model, ParamInit};
//! use dsense_trainer::{Trainer, TrainerConfig};
//!
//! let data = synthetic_linear(&[40, 20], 3, 2000, 7, &Device::Cpu).unwrap();
//! let mut init = ParamInit::new(12, Device::Cpu);
//! let layer = LinearLayer::new(&mut init, &[40, 20], 3, Activation::Identity).unwrap();
//! let mut trainer = Trainer::new(Model::single(layer), TrainerConfig::default());
//! let outcome = trainer.train_minibatch_triplet(&data).unwrap();
//! println!("best dev accuracy {}", outcome.best_dev_accuracy);
//! ```
pub mod config;
pub mod data;
pub mod error;
pub mod loss;
pub mod model;
pub mod optim;
pub mod trainer;

// Re-export primary API
pub use config::{LossKind, OptimizerKind, TrainerConfig};
pub use data::{DataTriplet, Partition};
pub use error::{Result, TrainerError};
pub use model::{Activation, Layer, Model};
pub use optim::{Adagrad, RateSchedule, Sgd, UpdateRule};
pub use trainer::{EarlyStopping, Trainer, TrainingOutcome};
