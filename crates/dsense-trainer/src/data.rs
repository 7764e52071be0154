//! Train/dev/test partitions of dense feature matrices.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use tracing::info;

use crate::error::{Result, TrainerError};

/// Input matrices and label vectors of one partition.
///
/// Inputs are `(rows, dim)` f32 matrices; labels are `(rows,)` u32 vectors.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub inputs: Vec<Tensor>,
    pub labels: Vec<Tensor>,
}

impl Partition {
    pub fn new(inputs: Vec<Tensor>, labels: Vec<Tensor>) -> Self {
        Self { inputs, labels }
    }

    /// Split `[x1, ..., xn, y]` into inputs and a single label vector.
    pub fn from_single_output(mut data: Vec<Tensor>) -> Result<Self> {
        let labels = data
            .pop()
            .ok_or_else(|| TrainerError::ArityMismatch("empty data list".into()))?;
        Ok(Self::new(data, vec![labels]))
    }

    /// Row count, taken from the first input (or label).
    pub fn num_rows(&self) -> Result<usize> {
        let first = self
            .inputs
            .first()
            .or_else(|| self.labels.first())
            .ok_or_else(|| TrainerError::ArityMismatch("partition holds no data".into()))?;
        Ok(first.dim(0)?)
    }

    /// Rows `start..start + len` of every matrix.
    pub fn rows(&self, start: usize, len: usize) -> Result<Self> {
        let slice = |ts: &[Tensor]| -> Result<Vec<Tensor>> {
            ts.iter()
                .map(|t| -> Result<Tensor> { Ok(t.narrow(0, start, len)?) })
                .collect()
        };
        Ok(Self::new(slice(&self.inputs)?, slice(&self.labels)?))
    }

    fn check_num_rows(&self, partition: &'static str) -> Result<()> {
        let inputs = self.inputs.iter().enumerate().map(|(i, t)| (format!("x{i}"), t));
        let labels = self.labels.iter().enumerate().map(|(i, t)| (format!("y{i}"), t));
        let row_counts = inputs
            .chain(labels)
            .map(|(name, t)| -> Result<(String, usize)> { Ok((name, t.dim(0)?)) })
            .collect::<Result<Vec<_>>>()?;

        if let Some((first, n)) = row_counts.first() {
            if let Some((name, rows)) = row_counts.iter().find(|(_, rows)| rows != n) {
                return Err(TrainerError::ShapeMismatch {
                    partition,
                    detail: format!("{name} has {rows} rows, {first} has {n}"),
                });
            }
        }
        Ok(())
    }

    /// Load `x0..xn` and `y0..ym` from a safetensors file.
    pub fn load<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        let mut tensors = candle_core::safetensors::load(path, device)?;
        let mut take_series = |prefix: &str, dtype: DType| -> Result<Vec<Tensor>> {
            let mut series = Vec::new();
            while let Some(t) = tensors.remove(&format!("{prefix}{}", series.len())) {
                series.push(t.to_dtype(dtype)?);
            }
            Ok(series)
        };
        let inputs = take_series("x", DType::F32)?;
        let labels = take_series("y", DType::U32)?;
        if inputs.is_empty() {
            return Err(TrainerError::MissingTensor {
                name: "x0".into(),
                path: path.to_path_buf(),
            });
        }
        Ok(Self::new(inputs, labels))
    }

    /// Save as `x0..xn`, `y0..ym`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut tensors = HashMap::new();
        for (i, t) in self.inputs.iter().enumerate() {
            tensors.insert(format!("x{i}"), t.clone());
        }
        for (i, t) in self.labels.iter().enumerate() {
            tensors.insert(format!("y{i}"), t.clone());
        }
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }
}

/// Parallel training, development and test partitions.
#[derive(Debug, Clone, Default)]
pub struct DataTriplet {
    pub training: Partition,
    pub dev: Partition,
    pub test: Partition,
}

impl DataTriplet {
    pub fn new(training: Partition, dev: Partition, test: Partition) -> Self {
        Self {
            training,
            dev,
            test,
        }
    }

    /// Check that partitions agree on arity and each partition agrees on
    /// row count.
    pub fn assert_data_same_length(&self) -> Result<()> {
        let arities = [
            ("train", self.training.inputs.len(), self.training.labels.len()),
            ("dev", self.dev.inputs.len(), self.dev.labels.len()),
            ("test", self.test.inputs.len(), self.test.labels.len()),
        ];
        let (_, n_in, n_out) = arities[0];
        for (name, inputs, labels) in &arities[1..] {
            if *inputs != n_in || *labels != n_out {
                return Err(TrainerError::ArityMismatch(format!(
                    "train has {n_in} inputs and {n_out} outputs, {name} has {inputs} and {labels}"
                )));
            }
        }

        self.training.check_num_rows("train")?;
        self.dev.check_num_rows("dev")?;
        self.test.check_num_rows("test")?;
        Ok(())
    }

    pub fn num_input_variables(&self) -> Result<usize> {
        self.assert_data_same_length()?;
        Ok(self.training.inputs.len())
    }

    pub fn num_output_variables(&self) -> Result<usize> {
        self.assert_data_same_length()?;
        Ok(self.training.labels.len())
    }

    /// Column count of each training input.
    pub fn input_dimensions(&self) -> Result<Vec<usize>> {
        self.training
            .inputs
            .iter()
            .map(|t| -> Result<usize> { Ok(t.dim(1)?) })
            .collect()
    }

    /// Load `train.safetensors`, `dev.safetensors` and `test.safetensors`.
    pub fn load_dir<P: AsRef<Path>>(dir: P, device: &Device) -> Result<Self> {
        let dir = dir.as_ref();
        let triplet = Self::new(
            Partition::load(dir.join("train.safetensors"), device)?,
            Partition::load(dir.join("dev.safetensors"), device)?,
            Partition::load(dir.join("test.safetensors"), device)?,
        );
        triplet.assert_data_same_length()?;
        info!(
            dir = %dir.display(),
            inputs = triplet.training.inputs.len(),
            outputs = triplet.training.labels.len(),
            "loaded data triplet"
        );
        Ok(triplet)
    }

    pub fn save_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        self.training.save(dir.join("train.safetensors"))?;
        self.dev.save(dir.join("dev.safetensors"))?;
        self.test.save(dir.join("test.safetensors"))?;
        Ok(())
    }
}

/// Standard normal samples from a seeded generator.
pub fn gaussian(rng: &mut oorandom::Rand32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|_| {
            let u1 = rng.rand_float().max(f32::MIN_POSITIVE);
            let u2 = rng.rand_float();
            (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
        })
        .collect()
}

/// Linearly separable multi-input data: `y = argmax(Σ x_i w_i)` with random
/// gaussian `x_i` and `w_i`. The first half of the rows becomes the training
/// partition; the second half is used for both dev and test.
pub fn synthetic_linear(
    input_dims: &[usize],
    n_out: usize,
    rows: usize,
    seed: u64,
    device: &Device,
) -> Result<DataTriplet> {
    let mut rng = oorandom::Rand32::new(seed);
    let mut inputs = Vec::with_capacity(input_dims.len());
    let mut scores = Tensor::zeros((rows, n_out), DType::F32, device)?;
    for &dim in input_dims {
        let x = Tensor::from_vec(gaussian(&mut rng, rows * dim), (rows, dim), device)?;
        let w = Tensor::from_vec(gaussian(&mut rng, dim * n_out), (dim, n_out), device)?;
        scores = scores.add(&x.matmul(&w)?)?;
        inputs.push(x);
    }
    let labels = scores.argmax(1)?;
    split_halves(Partition::new(inputs, vec![labels]), rows)
}

/// Two-input data labelled by a random bilinear form `y = argmax_k x1 W_k x2ᵀ`.
pub fn synthetic_bilinear(
    n_in: usize,
    n_out: usize,
    rows: usize,
    seed: u64,
    device: &Device,
) -> Result<DataTriplet> {
    let mut rng = oorandom::Rand32::new(seed);
    let x1 = Tensor::from_vec(gaussian(&mut rng, rows * n_in), (rows, n_in), device)?;
    let x2 = Tensor::from_vec(gaussian(&mut rng, rows * n_in), (rows, n_in), device)?;
    let w = Tensor::from_vec(
        gaussian(&mut rng, n_out * n_in * n_in),
        (n_out, n_in, n_in),
        device,
    )?;
    let scores = crate::model::bilinear::bilinear_form(&x1, &w, &x2)?;
    let labels = scores.argmax(1)?;
    split_halves(Partition::new(vec![x1, x2], vec![labels]), rows)
}

fn split_halves(all: Partition, rows: usize) -> Result<DataTriplet> {
    let half = rows / 2;
    let training = all.rows(0, half)?;
    let held_out = all.rows(half, rows - half)?;
    Ok(DataTriplet::new(training, held_out.clone(), held_out))
}
