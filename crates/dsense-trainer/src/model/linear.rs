//! Linear layer over one or more input matrices.

use candle_core::{Tensor, Var};

use super::{check_input_count, glorot_bound, Activation, Layer, ParamInit};
use crate::error::{Result, TrainerError};

/// `activation(b + Σ x_i W_i)` with one weight matrix per input.
pub struct LinearLayer {
    weights: Vec<Var>,
    bias: Var,
    n_out: usize,
    activation: Activation,
}

impl LinearLayer {
    /// Glorot-uniform weights in `±sqrt(6 / (Σ n_in + n_out))`, zero bias.
    pub fn new(
        init: &mut ParamInit,
        n_in_list: &[usize],
        n_out: usize,
        activation: Activation,
    ) -> Result<Self> {
        if n_in_list.is_empty() || n_out == 0 {
            return Err(TrainerError::InvalidConfig(
                "linear layer needs at least one input and one output".into(),
            ));
        }
        let bound = glorot_bound(n_in_list.iter().sum::<usize>() + n_out);
        let weights = n_in_list
            .iter()
            .map(|&n_in| init.uniform((n_in, n_out), bound))
            .collect::<Result<Vec<_>>>()?;
        let bias = init.zeros(n_out)?;
        Ok(Self {
            weights,
            bias,
            n_out,
            activation,
        })
    }

    pub fn weights(&self) -> &[Var] {
        &self.weights
    }
}

impl Layer for LinearLayer {
    fn num_inputs(&self) -> usize {
        self.weights.len()
    }

    fn n_out(&self) -> usize {
        self.n_out
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor> {
        check_input_count(self.weights.len(), inputs)?;
        let mut net = inputs[0].matmul(self.weights[0].as_tensor())?;
        for (x, w) in inputs.iter().zip(&self.weights).skip(1) {
            net = net.add(&x.matmul(w.as_tensor())?)?;
        }
        let net = net.broadcast_add(self.bias.as_tensor())?;
        self.activation.apply(net)
    }

    fn params(&self) -> Vec<Var> {
        let mut params = self.weights.clone();
        params.push(self.bias.clone());
        params
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};

    use super::*;

    #[test]
    fn test_shapes_and_bound() {
        let mut init = ParamInit::new(12, Device::Cpu);
        let layer = LinearLayer::new(&mut init, &[10, 4], 3, Activation::Identity).unwrap();
        assert_eq!(layer.num_inputs(), 2);
        assert_eq!(layer.params().len(), 3);
        assert_eq!(layer.weights()[0].dims(), &[10, 3]);
        assert_eq!(layer.weights()[1].dims(), &[4, 3]);

        let bound = (6.0f32 / 17.0).sqrt();
        for w in layer.weights() {
            let values = w.as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap();
            assert!(values.iter().all(|v| v.abs() <= bound));
        }
    }

    #[test]
    fn test_forward_sums_inputs() {
        let mut init = ParamInit::new(3, Device::Cpu);
        let layer = LinearLayer::new(&mut init, &[2, 2], 2, Activation::Identity).unwrap();
        let x = Tensor::new(&[[1f32, 0.0]], &Device::Cpu).unwrap();
        let zero = Tensor::zeros((1, 2), DType::F32, &Device::Cpu).unwrap();

        let only_first = layer.forward(&[x.clone(), zero.clone()]).unwrap();
        let w0_row = layer.weights()[0].as_tensor().get(0).unwrap().unsqueeze(0).unwrap();
        let diff = only_first.sub(&w0_row).unwrap().abs().unwrap().sum_all().unwrap();
        assert!(diff.to_scalar::<f32>().unwrap() < 1e-6);

        let both = layer.forward(&[x.clone(), x]).unwrap();
        assert_eq!(both.dims(), &[1, 2]);
    }

    #[test]
    fn test_tanh_bounded() {
        let mut init = ParamInit::new(5, Device::Cpu);
        let layer = LinearLayer::new(&mut init, &[3], 4, Activation::Tanh).unwrap();
        let x = Tensor::new(&[[100f32, -50.0, 80.0]], &Device::Cpu).unwrap();
        let out = layer.forward(&[x]).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(out.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_rejects_empty() {
        let mut init = ParamInit::new(5, Device::Cpu);
        assert!(LinearLayer::new(&mut init, &[], 4, Activation::Tanh).is_err());
        let layer = LinearLayer::new(&mut init, &[3], 4, Activation::Tanh).unwrap();
        assert!(layer.forward(&[]).is_err());
    }
}
