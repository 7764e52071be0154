//! Mixture of experts with a softmax gate.

use candle_core::{Tensor, Var, D};

use super::{check_input_count, Layer, ParamInit};
use crate::error::{Result, TrainerError};

/// Row-wise softmax over the last dimension.
pub fn softmax(net: &Tensor) -> Result<Tensor> {
    Ok(candle_nn::ops::softmax(net, D::Minus1)?)
}

/// `Σ_i expert_i(x) · g_i(x)` with `g = softmax(b + Σ x_j G_j)`.
///
/// Every expert reads all of the mixture's inputs.
pub struct MixtureOfExperts {
    gate_weights: Vec<Var>,
    gate_bias: Var,
    experts: Vec<Box<dyn Layer>>,
}

impl MixtureOfExperts {
    /// Gating weights start at zero, so the initial gate is uniform.
    pub fn new(init: &ParamInit, n_in_list: &[usize], experts: Vec<Box<dyn Layer>>) -> Result<Self> {
        let Some(first) = experts.first() else {
            return Err(TrainerError::InvalidConfig("mixture needs at least one expert".into()));
        };
        let n_out = first.n_out();
        for expert in &experts {
            if expert.num_inputs() != n_in_list.len() {
                return Err(TrainerError::ArityMismatch(format!(
                    "expert takes {} inputs, mixture has {}",
                    expert.num_inputs(),
                    n_in_list.len()
                )));
            }
            if expert.n_out() != n_out {
                return Err(TrainerError::ArityMismatch(format!(
                    "experts disagree on width: {} vs {n_out}",
                    expert.n_out()
                )));
            }
        }

        let n_experts = experts.len();
        let gate_weights = n_in_list
            .iter()
            .map(|&n_in| init.zeros((n_in, n_experts)))
            .collect::<Result<Vec<_>>>()?;
        let gate_bias = init.zeros(n_experts)?;
        Ok(Self {
            gate_weights,
            gate_bias,
            experts,
        })
    }

    /// `(rows, n_experts)` gate activations.
    pub fn gate(&self, inputs: &[Tensor]) -> Result<Tensor> {
        check_input_count(self.gate_weights.len(), inputs)?;
        let mut net = self.gate_bias.as_tensor().unsqueeze(0)?;
        for (x, g) in inputs.iter().zip(&self.gate_weights) {
            net = net.broadcast_add(&x.matmul(g.as_tensor())?)?;
        }
        softmax(&net)
    }
}

impl Layer for MixtureOfExperts {
    fn num_inputs(&self) -> usize {
        self.gate_weights.len()
    }

    fn n_out(&self) -> usize {
        self.experts.first().map(|e| e.n_out()).unwrap_or(0)
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor> {
        let gate = self.gate(inputs)?;
        let mut activation: Option<Tensor> = None;
        for (i, expert) in self.experts.iter().enumerate() {
            let weighted = expert
                .forward(inputs)?
                .broadcast_mul(&gate.narrow(1, i, 1)?)?;
            activation = Some(match activation {
                None => weighted,
                Some(sum) => sum.add(&weighted)?,
            });
        }
        activation.ok_or_else(|| TrainerError::InvalidConfig("mixture has no experts".into()))
    }

    fn params(&self) -> Vec<Var> {
        let mut params = self.gate_weights.clone();
        params.push(self.gate_bias.clone());
        params.extend(self.experts.iter().flat_map(|e| e.params()));
        params
    }
}
