//! Minibatch training loop with patience-based early stopping.

use candle_core::Tensor;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{OptimizerKind, TrainerConfig};
use crate::data::{DataTriplet, Partition};
use crate::error::{Result, TrainerError};
use crate::model::Model;
use crate::optim::{Adagrad, Sgd, UpdateRule};

/// Metrics recorded at the best development checkpoint.
///
/// Parameters are left at their final values, not rolled back to
/// `best_iteration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingOutcome {
    pub best_iteration: usize,
    pub best_dev_accuracy: f32,
    pub best_test_accuracy: f32,
    /// Minibatch steps taken.
    pub iterations_run: usize,
    pub final_patience: f64,
}

/// Patience bookkeeping for early stopping.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStopping {
    patience: f64,
    patience_increase: f64,
    improvement_threshold: f64,
    best_dev_accuracy: f32,
    best_test_accuracy: f32,
    best_iteration: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, patience_increase: f64, improvement_threshold: f64) -> Self {
        Self {
            patience: patience as f64,
            patience_increase,
            improvement_threshold,
            best_dev_accuracy: 0.0,
            best_test_accuracy: 0.0,
            best_iteration: 0,
        }
    }

    pub fn from_config(config: &TrainerConfig) -> Self {
        Self::new(
            config.patience,
            config.patience_increase,
            config.improvement_threshold,
        )
    }

    /// Validate every `min(blocks, patience / 2)` iterations, at least every
    /// iteration.
    pub fn validation_frequency(&self, blocks: usize) -> usize {
        blocks.min(self.patience as usize / 2).max(1)
    }

    /// Record an evaluation; returns whether dev accuracy improved.
    pub fn record(&mut self, iteration: usize, dev_accuracy: f32, test_accuracy: f32) -> bool {
        if dev_accuracy <= self.best_dev_accuracy {
            return false;
        }
        if dev_accuracy as f64 * self.improvement_threshold > self.best_dev_accuracy as f64 {
            self.patience = self
                .patience
                .max(iteration as f64 * self.patience_increase);
        }
        self.best_dev_accuracy = dev_accuracy;
        self.best_test_accuracy = test_accuracy;
        self.best_iteration = iteration;
        true
    }

    pub fn should_stop(&self, iteration: usize) -> bool {
        self.patience <= iteration as f64
    }

    pub fn patience(&self) -> f64 {
        self.patience
    }

    pub fn best_dev_accuracy(&self) -> f32 {
        self.best_dev_accuracy
    }

    pub fn best_test_accuracy(&self) -> f32 {
        self.best_test_accuracy
    }

    pub fn best_iteration(&self) -> usize {
        self.best_iteration
    }
}

/// Trains a [`Model`] with minibatch steps of an [`UpdateRule`].
pub struct Trainer {
    model: Model,
    update_rule: Box<dyn UpdateRule>,
    config: TrainerConfig,
}

impl Trainer {
    /// Build the update rule named by `config.optimizer`.
    pub fn new(model: Model, config: TrainerConfig) -> Self {
        let update_rule: Box<dyn UpdateRule> = match config.optimizer {
            OptimizerKind::Adagrad => Box::new(
                Adagrad::new(config.learning_rate, config.lr_smoother)
                    .with_schedule(config.rate_schedule),
            ),
            OptimizerKind::Sgd => Box::new(Sgd::new(config.learning_rate)),
        };
        Self::with_update_rule(model, config, update_rule)
    }

    pub fn with_update_rule(
        model: Model,
        config: TrainerConfig,
        update_rule: Box<dyn UpdateRule>,
    ) -> Self {
        Self {
            model,
            update_rule,
            config,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train a single-output model; each partition is `[x1, ..., xn, y]`.
    pub fn train_minibatch(
        &mut self,
        training: Vec<Tensor>,
        dev: Vec<Tensor>,
        test: Vec<Tensor>,
    ) -> Result<TrainingOutcome> {
        let triplet = DataTriplet::new(
            Partition::from_single_output(training)?,
            Partition::from_single_output(dev)?,
            Partition::from_single_output(test)?,
        );
        self.train_minibatch_triplet(&triplet)
    }

    /// One gradient step on a minibatch; returns its loss.
    fn step(&mut self, batch: &Partition) -> Result<f32> {
        let loss = self
            .model
            .loss(&batch.inputs, &batch.labels, self.config.loss)?;
        let grads = loss.backward()?;
        self.update_rule.step(&self.model.params(), &grads)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn check_arity(&self, data: &DataTriplet) -> Result<()> {
        data.assert_data_same_length()?;
        let n_in = data.num_input_variables()?;
        let n_out = data.num_output_variables()?;
        if self.model.num_inputs() != n_in || self.model.num_outputs() != n_out {
            return Err(TrainerError::ArityMismatch(format!(
                "model has {} inputs and {} outputs, data has {n_in} and {n_out}",
                self.model.num_inputs(),
                self.model.num_outputs()
            )));
        }
        Ok(())
    }

    /// Train until the epoch budget or patience runs out.
    pub fn train_minibatch_triplet(&mut self, data: &DataTriplet) -> Result<TrainingOutcome> {
        self.check_arity(data)?;
        let minibatch_size = self.config.minibatch_size;
        let rows = data.training.num_rows()?;
        let blocks = rows.checked_div(minibatch_size).unwrap_or(0);
        if blocks == 0 {
            return Err(TrainerError::EmptyTrainingSet {
                rows,
                minibatch_size,
            });
        }

        let mut stopping = EarlyStopping::from_config(&self.config);
        let validation_frequency = stopping.validation_frequency(blocks);
        info!(
            rows,
            blocks,
            minibatch_size,
            epochs = self.config.n_epochs,
            validation_frequency,
            loss = %self.config.loss,
            "starting training"
        );

        let mut iterations_run = 0;
        'epochs: for epoch in 0..self.config.n_epochs {
            for block in 0..blocks {
                let iteration = epoch * blocks + block;
                let batch = data.training.rows(block * minibatch_size, minibatch_size)?;
                let cost = self.step(&batch)?;
                iterations_run += 1;
                debug!(iteration, cost, "minibatch step");

                if (iteration + 1) % validation_frequency == 0 {
                    let dev = self.model.evaluate(&data.dev, self.config.loss)?;
                    info!(iteration, accuracy = dev.accuracy, cost = dev.loss, "DEV");
                    let test = self.model.evaluate(&data.test, self.config.loss)?;
                    info!(iteration, accuracy = test.accuracy, cost = test.loss, "TEST");
                    if stopping.record(iteration, dev.accuracy, test.accuracy) {
                        debug!(iteration, patience = stopping.patience(), "new best dev accuracy");
                    }
                }

                if stopping.should_stop(iteration) {
                    break 'epochs;
                }
            }
        }

        let outcome = TrainingOutcome {
            best_iteration: stopping.best_iteration(),
            best_dev_accuracy: stopping.best_dev_accuracy(),
            best_test_accuracy: stopping.best_test_accuracy(),
            iterations_run,
            final_patience: stopping.patience(),
        };
        info!(?outcome, "training finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};

    use super::*;
    use crate::config::LossKind;
    use crate::data::synthetic_linear;
    use crate::model::{Activation, LinearLayer, ParamInit};
    use crate::optim::RateSchedule;

    fn linear_model(input_dims: &[usize], n_out: usize) -> Model {
        let mut init = ParamInit::new(12, Device::Cpu);
        Model::single(LinearLayer::new(&mut init, input_dims, n_out, Activation::Identity).unwrap())
    }

    #[test]
    fn test_improvement_extends_patience() {
        let mut stopping = EarlyStopping::new(10, 2.5, 0.9975);
        assert!(stopping.record(8, 0.5, 0.4));
        assert_eq!(stopping.patience(), 20.0);
        assert_eq!(stopping.best_iteration(), 8);
        assert_eq!(stopping.best_test_accuracy(), 0.4);
    }

    #[test]
    fn test_stale_evaluation_changes_nothing() {
        let mut stopping = EarlyStopping::new(10, 2.5, 0.9975);
        stopping.record(3, 0.6, 0.55);
        let before = stopping.clone();
        assert!(!stopping.record(7, 0.6, 0.9));
        assert!(!stopping.record(9, 0.3, 0.9));
        assert_eq!(stopping, before);
    }

    #[test]
    fn test_small_improvement_keeps_patience() {
        let mut stopping = EarlyStopping::new(10, 2.5, 0.9975);
        stopping.record(2, 0.8, 0.7);
        let patience = stopping.patience();
        // 0.8001 * 0.9975 < 0.8: recorded but patience not extended
        assert!(stopping.record(100, 0.8001, 0.75));
        assert_eq!(stopping.patience(), patience);
        assert_eq!(stopping.best_test_accuracy(), 0.75);
        assert_eq!(stopping.best_iteration(), 100);
    }

    #[test]
    fn test_validation_frequency() {
        let stopping = EarlyStopping::new(5000, 2.5, 0.9975);
        assert_eq!(stopping.validation_frequency(50), 50);
        assert_eq!(stopping.validation_frequency(10_000), 2500);
        assert_eq!(EarlyStopping::new(1, 2.5, 0.9975).validation_frequency(10), 1);
    }

    #[test]
    fn test_should_stop() {
        let stopping = EarlyStopping::new(4, 2.5, 0.9975);
        assert!(!stopping.should_stop(3));
        assert!(stopping.should_stop(4));
    }

    #[test]
    fn test_learns_separable_data() {
        let data = synthetic_linear(&[8, 6], 3, 1200, 3, &Device::Cpu).unwrap();
        let config = TrainerConfig::new()
            .with_minibatch_size(50)
            .with_epochs(20)
            .with_learning_rate(0.1)
            .with_rate_schedule(RateSchedule::Standard);
        let mut trainer = Trainer::new(linear_model(&[8, 6], 3), config);
        let outcome = trainer.train_minibatch_triplet(&data).unwrap();

        assert!(outcome.best_dev_accuracy > 0.7, "{outcome:?}");
        assert_eq!(outcome.best_dev_accuracy, outcome.best_test_accuracy);
        assert!(outcome.iterations_run <= 20 * 12);
    }

    #[test]
    fn test_patience_stops_early() {
        let data = synthetic_linear(&[5], 2, 400, 9, &Device::Cpu).unwrap();
        let config = TrainerConfig::new()
            .with_minibatch_size(10)
            .with_epochs(50)
            .with_patience(6);
        let mut trainer = Trainer::new(linear_model(&[5], 2), config);
        let outcome = trainer.train_minibatch_triplet(&data).unwrap();

        let budget = 50 * 20;
        assert!(outcome.iterations_run <= budget);
        let last_iteration = outcome.iterations_run - 1;
        assert!(
            outcome.iterations_run == budget
                || last_iteration == outcome.final_patience.ceil() as usize,
            "{outcome:?}"
        );
        assert!(outcome.best_iteration <= last_iteration);
    }

    #[test]
    fn test_last_iteration_equals_patience() {
        let data = synthetic_linear(&[3], 2, 400, 4, &Device::Cpu).unwrap();
        let config = TrainerConfig::new()
            .with_minibatch_size(10)
            .with_epochs(10)
            .with_patience(4)
            .with_optimizer(crate::config::OptimizerKind::Sgd)
            .with_learning_rate(0.0);
        let mut trainer = Trainer::new(linear_model(&[3], 2), config);
        let outcome = trainer.train_minibatch_triplet(&data).unwrap();

        // iterations 0..=4 run, then patience <= iteration stops the loop
        assert_eq!(outcome.iterations_run, 5);
        assert_eq!(outcome.final_patience, 4.0);
    }

    #[test]
    fn test_single_output_lists() {
        let data = synthetic_linear(&[4, 4], 2, 200, 5, &Device::Cpu).unwrap();
        let as_list = |p: &Partition| {
            let mut list = p.inputs.clone();
            list.push(p.labels[0].clone());
            list
        };
        let config = TrainerConfig::new().with_minibatch_size(20).with_epochs(2);
        let mut trainer = Trainer::new(linear_model(&[4, 4], 2), config);
        let outcome = trainer
            .train_minibatch(as_list(&data.training), as_list(&data.dev), as_list(&data.test))
            .unwrap();
        assert_eq!(outcome.iterations_run, 2 * 5);
    }

    #[test]
    fn test_fails_fast_on_arity() {
        let data = synthetic_linear(&[4, 4], 2, 200, 5, &Device::Cpu).unwrap();
        let mut trainer = Trainer::new(linear_model(&[4], 2), TrainerConfig::new());
        assert!(matches!(
            trainer.train_minibatch_triplet(&data),
            Err(TrainerError::ArityMismatch(_))
        ));
    }

    #[test]
    fn test_too_few_rows() {
        let data = synthetic_linear(&[4], 2, 100, 5, &Device::Cpu).unwrap();
        let mut trainer = Trainer::new(linear_model(&[4], 2), TrainerConfig::new());
        assert!(matches!(
            trainer.train_minibatch_triplet(&data),
            Err(TrainerError::EmptyTrainingSet { rows: 50, minibatch_size: 100 })
        ));
    }

    #[test]
    fn test_crossentropy_on_mixture() {
        use crate::model::MixtureOfExperts;

        let data = synthetic_linear(&[4], 2, 200, 11, &Device::Cpu).unwrap();
        let mut init = ParamInit::new(12, Device::Cpu);
        let experts: Vec<Box<dyn crate::model::Layer>> = (0..2)
            .map(|_| {
                let expert = LinearLayer::new(&mut init, &[4], 2, Activation::Identity).unwrap();
                Box::new(SoftmaxHead(expert)) as Box<dyn crate::model::Layer>
            })
            .collect();
        let moe = MixtureOfExperts::new(&init, &[4], experts).unwrap();
        let config = TrainerConfig::new()
            .with_minibatch_size(20)
            .with_epochs(3)
            .with_loss(LossKind::CrossEntropy)
            .with_rate_schedule(RateSchedule::Standard);
        let mut trainer = Trainer::new(Model::single(moe), config);
        let outcome = trainer.train_minibatch_triplet(&data).unwrap();
        assert!(outcome.best_dev_accuracy > 0.0);

        let eval = trainer
            .model()
            .evaluate(&data.dev, LossKind::CrossEntropy)
            .unwrap();
        assert!(eval.loss.is_finite());
    }

    /// Linear expert normalised into class probabilities.
    struct SoftmaxHead(LinearLayer);

    impl crate::model::Layer for SoftmaxHead {
        fn num_inputs(&self) -> usize {
            self.0.num_inputs()
        }

        fn n_out(&self) -> usize {
            self.0.n_out()
        }

        fn forward(&self, inputs: &[Tensor]) -> Result<Tensor> {
            crate::model::mixture::softmax(&self.0.forward(inputs)?)
        }

        fn params(&self) -> Vec<candle_core::Var> {
            self.0.params()
        }
    }

    #[test]
    fn test_zero_labels_partition_is_rejected() {
        let x = Tensor::zeros((10, 2), DType::F32, &Device::Cpu).unwrap();
        let p = Partition::new(vec![x], Vec::new());
        let data = DataTriplet::new(p.clone(), p.clone(), p);
        let mut trainer = Trainer::new(linear_model(&[2], 2), TrainerConfig::new());
        assert!(trainer.train_minibatch_triplet(&data).is_err());
    }
}
