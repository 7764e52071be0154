//! Bilinear layer over two dense inputs.

use candle_core::{Tensor, Var};

use super::{check_input_count, glorot_bound, Activation, Layer, ParamInit};
use crate::error::{Result, TrainerError};

/// `a[r, k] = x1[r] W_k x2[r]ᵀ` for `W` of shape `(n_out, n_in1, n_in2)`.
pub fn bilinear_form(x1: &Tensor, w: &Tensor, x2: &Tensor) -> Result<Tensor> {
    let (n_out, n_in1, n_in2) = w.dims3()?;
    let rows = x1.dim(0)?;
    let w = w.transpose(0, 1)?.contiguous()?.reshape((n_in1, n_out * n_in2))?;
    let projected = x1.matmul(&w)?.reshape((rows, n_out, n_in2))?;
    Ok(projected.broadcast_mul(&x2.unsqueeze(1)?)?.sum(2)?)
}

/// `activation(x1 W x2ᵀ + b)`, one `n_in1 × n_in2` slice of `W` per output.
pub struct BilinearLayer {
    weight: Var,
    bias: Var,
    activation: Activation,
}

impl BilinearLayer {
    /// Glorot-uniform weights in `±sqrt(6 / (n_in1 + n_in2 + n_out))`, zero
    /// bias.
    pub fn new(
        init: &mut ParamInit,
        n_in1: usize,
        n_in2: usize,
        n_out: usize,
        activation: Activation,
    ) -> Result<Self> {
        if n_in1 == 0 || n_in2 == 0 || n_out == 0 {
            return Err(TrainerError::InvalidConfig(
                "bilinear layer dimensions must be positive".into(),
            ));
        }
        let weight = init.uniform((n_out, n_in1, n_in2), glorot_bound(n_in1 + n_in2 + n_out))?;
        let bias = init.zeros(n_out)?;
        Ok(Self {
            weight,
            bias,
            activation,
        })
    }

    pub fn weight(&self) -> &Var {
        &self.weight
    }
}

impl Layer for BilinearLayer {
    fn num_inputs(&self) -> usize {
        2
    }

    fn n_out(&self) -> usize {
        self.bias.dims()[0]
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor> {
        check_input_count(2, inputs)?;
        let net = bilinear_form(&inputs[0], self.weight.as_tensor(), &inputs[1])?
            .broadcast_add(self.bias.as_tensor())?;
        self.activation.apply(net)
    }

    fn params(&self) -> Vec<Var> {
        vec![self.weight.clone(), self.bias.clone()]
    }
}
