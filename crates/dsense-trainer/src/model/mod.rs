//! # Models
//!
//! Layers map a list of `(rows, n_in)` inputs to a `(rows, n_out)`
//! activation. A [`Model`] binds one or more layers (heads) to subsets of its
//! inputs; each head predicts one label vector. Composition is additive:
//! parameters are concatenated and head losses summed.

pub mod bilinear;
pub mod glue;
pub mod linear;
pub mod mixture;

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Shape, Tensor, Var};
use tracing::info;

use crate::config::LossKind;
use crate::data::Partition;
use crate::error::{Result, TrainerError};
use crate::loss;

pub use bilinear::BilinearLayer;
pub use glue::GlueLayer;
pub use linear::LinearLayer;
pub use mixture::MixtureOfExperts;

/// Element-wise nonlinearity applied to a layer's net input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Identity,
    Tanh,
}

impl Activation {
    pub fn apply(&self, net: Tensor) -> Result<Tensor> {
        match self {
            Self::Identity => Ok(net),
            Self::Tanh => Ok(net.tanh()?),
        }
    }
}

/// A differentiable layer with trainable parameters.
pub trait Layer {
    /// Number of input matrices `forward` expects.
    fn num_inputs(&self) -> usize;

    /// Activation width.
    fn n_out(&self) -> usize;

    /// `(rows, n_out)` activation.
    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor>;

    /// Trainable parameters, in a stable order.
    fn params(&self) -> Vec<Var>;
}

/// Seeded parameter initialisation.
pub struct ParamInit {
    rng: oorandom::Rand32,
    device: Device,
}

impl ParamInit {
    pub fn new(seed: u64, device: Device) -> Self {
        Self {
            rng: oorandom::Rand32::new(seed),
            device,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Uniform in `[-bound, bound)`.
    pub fn uniform(&mut self, shape: impl Into<Shape>, bound: f64) -> Result<Var> {
        let shape = shape.into();
        let bound = bound as f32;
        let values: Vec<f32> = (0..shape.elem_count())
            .map(|_| (self.rng.rand_float() * 2.0 - 1.0) * bound)
            .collect();
        Ok(Var::from_tensor(&Tensor::from_vec(values, shape, &self.device)?)?)
    }

    pub fn zeros(&self, shape: impl Into<Shape>) -> Result<Var> {
        Ok(Var::zeros(shape, DType::F32, &self.device)?)
    }
}

/// Glorot-uniform bound `sqrt(6 / fan)`.
pub fn glorot_bound(fan: usize) -> f64 {
    (6.0 / fan as f64).sqrt()
}

/// Validate that `indices` can feed `layer` from `available` inputs.
pub(crate) fn check_binding(available: usize, layer: &dyn Layer, indices: &[usize]) -> Result<()> {
    if indices.len() != layer.num_inputs() {
        return Err(TrainerError::ArityMismatch(format!(
            "layer takes {} inputs, bound to {}",
            layer.num_inputs(),
            indices.len()
        )));
    }
    if let Some(bad) = indices.iter().find(|&&i| i >= available) {
        return Err(TrainerError::ArityMismatch(format!(
            "input index {bad} out of range for {available} inputs"
        )));
    }
    Ok(())
}

/// The bound subset of `inputs`.
pub(crate) fn select(inputs: &[Tensor], indices: &[usize]) -> Vec<Tensor> {
    indices.iter().map(|&i| inputs[i].clone()).collect()
}

pub(crate) fn check_input_count(expected: usize, inputs: &[Tensor]) -> Result<()> {
    if inputs.len() != expected {
        return Err(TrainerError::ArityMismatch(format!(
            "expected {expected} inputs, got {}",
            inputs.len()
        )));
    }
    Ok(())
}

/// Output head: a layer bound to a subset of the model inputs.
struct Head {
    layer: Box<dyn Layer>,
    inputs: Vec<usize>,
}

/// Accuracy and loss over one partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Mean over heads of each head's accuracy.
    pub accuracy: f32,
    /// Summed head losses.
    pub loss: f32,
}

/// One or more output heads over a shared list of inputs.
pub struct Model {
    num_inputs: usize,
    heads: Vec<Head>,
}

impl Model {
    /// A model over `num_inputs` inputs with no heads yet.
    pub fn new(num_inputs: usize) -> Self {
        Self {
            num_inputs,
            heads: Vec::new(),
        }
    }

    /// A single-output model feeding every input to `layer`.
    pub fn single(layer: impl Layer + 'static) -> Self {
        let num_inputs = layer.num_inputs();
        Self {
            num_inputs,
            heads: vec![Head {
                layer: Box::new(layer),
                inputs: (0..num_inputs).collect(),
            }],
        }
    }

    /// Add an output head reading the given model inputs.
    pub fn with_head(mut self, layer: impl Layer + 'static, inputs: Vec<usize>) -> Result<Self> {
        check_binding(self.num_inputs, &layer, &inputs)?;
        self.heads.push(Head {
            layer: Box::new(layer),
            inputs,
        });
        Ok(self)
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.heads.len()
    }

    /// Parameters of every head, concatenated.
    pub fn params(&self) -> Vec<Var> {
        self.heads.iter().flat_map(|h| h.layer.params()).collect()
    }

    /// One activation per head.
    pub fn activations(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        check_input_count(self.num_inputs, inputs)?;
        self.heads
            .iter()
            .map(|h| h.layer.forward(&select(inputs, &h.inputs)))
            .collect()
    }

    /// Predicted class per row, one vector per head.
    pub fn predict(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        self.activations(inputs)?
            .iter()
            .map(loss::predict)
            .collect()
    }

    fn check_label_count(&self, labels: &[Tensor]) -> Result<()> {
        if labels.len() != self.heads.len() {
            return Err(TrainerError::ArityMismatch(format!(
                "model has {} outputs, got {} label vectors",
                self.heads.len(),
                labels.len()
            )));
        }
        Ok(())
    }

    /// Sum of head losses.
    pub fn loss(&self, inputs: &[Tensor], labels: &[Tensor], kind: LossKind) -> Result<Tensor> {
        self.check_label_count(labels)?;
        let mut total: Option<Tensor> = None;
        for (activation, y) in self.activations(inputs)?.iter().zip(labels) {
            let head_loss = loss::loss(kind, activation, y)?;
            total = Some(match total {
                None => head_loss,
                Some(t) => t.add(&head_loss)?,
            });
        }
        total.ok_or_else(|| TrainerError::InvalidConfig("model has no output heads".into()))
    }

    /// Accuracy and loss over a whole partition.
    pub fn evaluate(&self, data: &Partition, kind: LossKind) -> Result<Evaluation> {
        self.check_label_count(&data.labels)?;
        let activations = self.activations(&data.inputs)?;
        let (mut accuracy, mut total_loss) = (0.0, 0.0);
        for (activation, y) in activations.iter().zip(&data.labels) {
            accuracy += loss::accuracy(activation, y)?;
            total_loss += loss::loss(kind, activation, y)?.to_scalar::<f32>()?;
        }
        Ok(Evaluation {
            accuracy: accuracy / activations.len().max(1) as f32,
            loss: total_loss,
        })
    }

    /// Save parameters as `param.<i>`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let tensors: HashMap<String, Tensor> = self
            .params()
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("param.{i}"), p.as_tensor().clone()))
            .collect();
        candle_core::safetensors::save(&tensors, path.as_ref())?;
        info!(path = %path.as_ref().display(), params = tensors.len(), "saved model");
        Ok(())
    }

    /// Overwrite parameters with those saved by [`Model::save`].
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let params = self.params();
        let device = params
            .first()
            .map(|p| p.device().clone())
            .unwrap_or(Device::Cpu);
        let mut tensors = candle_core::safetensors::load(path, &device)?;
        for (i, param) in params.iter().enumerate() {
            let name = format!("param.{i}");
            let saved = tensors.remove(&name).ok_or_else(|| TrainerError::MissingTensor {
                name: name.clone(),
                path: path.to_path_buf(),
            })?;
            if saved.dims() != param.dims() {
                return Err(TrainerError::ArityMismatch(format!(
                    "{name} has shape {:?}, model expects {:?}",
                    saved.dims(),
                    param.dims()
                )));
            }
            param.set(&saved)?;
        }
        Ok(())
    }
}
