//! Training objectives and evaluation metrics over `(rows, n_out)`
//! activations and `(rows,)` u32 labels.

use candle_core::{DType, Tensor};

use crate::config::LossKind;
use crate::error::Result;

fn gold_activation(activation: &Tensor, labels: &Tensor) -> Result<Tensor> {
    Ok(activation.gather(&labels.unsqueeze(1)?, 1)?)
}

/// `Σ_rows (Σ_j max(0, 1 - a[y] + a[j]) - 1)`.
///
/// The `- 1` cancels the gold class's own margin term.
pub fn hinge_loss(activation: &Tensor, labels: &Tensor) -> Result<Tensor> {
    let rows = activation.dim(0)?;
    let gold = gold_activation(activation, labels)?;
    let margins = activation.broadcast_sub(&gold)?.affine(1.0, 1.0)?.relu()?;
    Ok(margins.sum_all()?.affine(1.0, -(rows as f64))?)
}

/// `-mean(log a[row, y])`; expects activations in `(0, 1]`.
pub fn crossentropy(activation: &Tensor, labels: &Tensor) -> Result<Tensor> {
    Ok(gold_activation(activation, labels)?
        .log()?
        .mean_all()?
        .neg()?)
}

pub fn loss(kind: LossKind, activation: &Tensor, labels: &Tensor) -> Result<Tensor> {
    match kind {
        LossKind::Hinge => hinge_loss(activation, labels),
        LossKind::CrossEntropy => crossentropy(activation, labels),
    }
}

/// Row-wise argmax.
pub fn predict(activation: &Tensor) -> Result<Tensor> {
    Ok(activation.argmax(1)?)
}

/// Fraction of rows whose argmax equals the label.
pub fn accuracy(activation: &Tensor, labels: &Tensor) -> Result<f32> {
    let correct = predict(activation)?.eq(labels)?;
    Ok(correct.to_dtype(DType::F32)?.mean_all()?.to_scalar::<f32>()?)
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    fn labels(ys: &[u32]) -> Tensor {
        Tensor::new(ys, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_hinge_loss() {
        let a = Tensor::new(&[[1f32, 0.0, 0.0], [0.0, 1.0, 0.0]], &Device::Cpu).unwrap();
        // row 0 is separated by exactly the margin; row 1 scores the gold class lowest
        let loss = hinge_loss(&a, &labels(&[0, 0])).unwrap().to_scalar::<f32>().unwrap();
        assert!((loss - 3.0).abs() < 1e-6);

        let perfect = Tensor::new(&[[5f32, 0.0], [0.0, 5.0]], &Device::Cpu).unwrap();
        let loss = hinge_loss(&perfect, &labels(&[0, 1])).unwrap().to_scalar::<f32>().unwrap();
        assert!(loss.abs() < 1e-6);
    }

    #[test]
    fn test_crossentropy() {
        let a = Tensor::new(&[[0.5f32, 0.25, 0.25], [0.1, 0.8, 0.1]], &Device::Cpu).unwrap();
        let loss = crossentropy(&a, &labels(&[0, 1])).unwrap().to_scalar::<f32>().unwrap();
        let expected = -(0.5f32.ln() + 0.8f32.ln()) / 2.0;
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_accuracy_and_predict() {
        let a = Tensor::new(&[[0.9f32, 0.1], [0.2, 0.8], [0.6, 0.4], [0.3, 0.7]], &Device::Cpu)
            .unwrap();
        assert_eq!(predict(&a).unwrap().to_vec1::<u32>().unwrap(), vec![0, 1, 0, 1]);
        let acc = accuracy(&a, &labels(&[0, 1, 1, 1])).unwrap();
        assert!((acc - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_hinge_gradient_flows() {
        let w = candle_core::Var::new(&[[0.0f32, 0.0]], &Device::Cpu).unwrap();
        let loss = hinge_loss(w.as_tensor(), &labels(&[0])).unwrap();
        let grads = loss.backward().unwrap();
        let g = grads.get(w.as_tensor()).unwrap().to_vec2::<f32>().unwrap();
        // margin of the other class is active: d/da0 = -1, d/da1 = +1
        assert_eq!(g, vec![vec![-1.0, 1.0]]);
    }
}
