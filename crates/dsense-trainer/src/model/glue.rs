//! Sum of sub-layer activations.

use candle_core::{Tensor, Var};

use super::{check_binding, check_input_count, select, Activation, Layer};
use crate::error::{Result, TrainerError};

struct Part {
    layer: Box<dyn Layer>,
    inputs: Vec<usize>,
}

/// Glues layers together by adding their activations, each sub-layer reading
/// its own subset of the glue's inputs.
pub struct GlueLayer {
    num_inputs: usize,
    parts: Vec<Part>,
    activation: Activation,
}

impl GlueLayer {
    pub fn new(num_inputs: usize, activation: Activation) -> Self {
        Self {
            num_inputs,
            parts: Vec::new(),
            activation,
        }
    }

    /// Add a sub-layer reading the given glue inputs.
    pub fn with_part(mut self, layer: impl Layer + 'static, inputs: Vec<usize>) -> Result<Self> {
        check_binding(self.num_inputs, &layer, &inputs)?;
        if let Some(first) = self.parts.first() {
            if first.layer.n_out() != layer.n_out() {
                return Err(TrainerError::ArityMismatch(format!(
                    "glued layers disagree on width: {} vs {}",
                    first.layer.n_out(),
                    layer.n_out()
                )));
            }
        }
        self.parts.push(Part {
            layer: Box::new(layer),
            inputs,
        });
        Ok(self)
    }
}

impl Layer for GlueLayer {
    fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    fn n_out(&self) -> usize {
        self.parts.first().map(|p| p.layer.n_out()).unwrap_or(0)
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor> {
        check_input_count(self.num_inputs, inputs)?;
        let mut net: Option<Tensor> = None;
        for part in &self.parts {
            let activation = part.layer.forward(&select(inputs, &part.inputs))?;
            net = Some(match net {
                None => activation,
                Some(sum) => sum.add(&activation)?,
            });
        }
        let net = net.ok_or_else(|| TrainerError::InvalidConfig("glue layer is empty".into()))?;
        self.activation.apply(net)
    }

    fn params(&self) -> Vec<Var> {
        self.parts.iter().flat_map(|p| p.layer.params()).collect()
    }
}
