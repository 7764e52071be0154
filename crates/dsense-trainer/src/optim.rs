//! Parameter update rules.

use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Applies one gradient step to a list of parameters.
pub trait UpdateRule {
    /// Update every parameter in `params`. Parameters absent from `grads`
    /// take a zero gradient.
    fn step(&mut self, params: &[Var], grads: &GradStore) -> Result<()>;
}

fn gradient(param: &Var, grads: &GradStore) -> Result<Tensor> {
    match grads.get(param.as_tensor()) {
        Some(g) => Ok(g.clone()),
        None => Ok(param.as_tensor().zeros_like()?),
    }
}

/// `p -= lr * g`.
#[derive(Debug, Clone)]
pub struct Sgd {
    learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl UpdateRule for Sgd {
    fn step(&mut self, params: &[Var], grads: &GradStore) -> Result<()> {
        for param in params {
            let g = gradient(param, grads)?;
            param.set(&param.as_tensor().sub(&g.affine(self.learning_rate, 0.0)?)?)?;
        }
        Ok(())
    }
}

/// How adagrad turns the squared-gradient sum into a step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSchedule {
    /// `p -= r * g`, `r += lr / (smoother + sqrt(s))`, `s += g²`, all read
    /// from the values held before the step. The per-parameter rate is a
    /// running sum lagging one step behind, so the first step leaves the
    /// parameters unchanged.
    #[default]
    Accumulating,
    /// Same running-sum rate, applied in order: `s` is updated first, then
    /// `r` from the new `s`, then `p` from the new `r`.
    Sequential,
    /// `p -= lr * g / (smoother + sqrt(s))`.
    Standard,
}

impl std::str::FromStr for RateSchedule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accumulating" => Ok(Self::Accumulating),
            "sequential" => Ok(Self::Sequential),
            "standard" => Ok(Self::Standard),
            other => Err(format!(
                "unknown rate schedule {other:?}, expected accumulating, sequential or standard"
            )),
        }
    }
}

/// Adagrad with per-parameter squared-gradient sums.
#[derive(Debug, Clone)]
pub struct Adagrad {
    learning_rate: f64,
    smoother: f64,
    schedule: RateSchedule,
    sum_gradient_squared: Vec<Tensor>,
    rates: Vec<Tensor>,
}

impl Adagrad {
    pub fn new(learning_rate: f64, smoother: f64) -> Self {
        Self {
            learning_rate,
            smoother,
            schedule: RateSchedule::default(),
            sum_gradient_squared: Vec::new(),
            rates: Vec::new(),
        }
    }

    pub fn with_schedule(mut self, schedule: RateSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Current per-parameter rates (running-sum schedules only).
    pub fn rates(&self) -> &[Tensor] {
        &self.rates
    }

    /// `lr / (smoother + sqrt(s))`.
    fn rate_increment(&self, sum_gradient_squared: &Tensor) -> Result<Tensor> {
        Ok(sum_gradient_squared
            .sqrt()?
            .affine(1.0, self.smoother)?
            .recip()?
            .affine(self.learning_rate, 0.0)?)
    }

    fn ensure_state(&mut self, params: &[Var]) -> Result<()> {
        if self.sum_gradient_squared.is_empty() {
            for param in params {
                self.sum_gradient_squared.push(param.as_tensor().zeros_like()?);
                self.rates.push(param.as_tensor().zeros_like()?);
            }
        }
        if self.sum_gradient_squared.len() != params.len() {
            return Err(TrainerError::ArityMismatch(format!(
                "adagrad tracks {} parameters, got {}",
                self.sum_gradient_squared.len(),
                params.len()
            )));
        }
        Ok(())
    }
}

impl UpdateRule for Adagrad {
    fn step(&mut self, params: &[Var], grads: &GradStore) -> Result<()> {
        self.ensure_state(params)?;
        for (i, param) in params.iter().enumerate() {
            let g = gradient(param, grads)?;
            let s_old = &self.sum_gradient_squared[i];
            let s = s_old.add(&g.sqr()?)?;
            let (delta, rate) = match self.schedule {
                RateSchedule::Accumulating => {
                    let delta = self.rates[i].mul(&g)?;
                    let rate = self.rates[i].add(&self.rate_increment(s_old)?)?;
                    (delta, Some(rate))
                }
                RateSchedule::Sequential => {
                    let rate = self.rates[i].add(&self.rate_increment(&s)?)?;
                    (rate.mul(&g)?, Some(rate))
                }
                RateSchedule::Standard => {
                    let scale = s.sqrt()?.affine(1.0, self.smoother)?.recip()?;
                    (g.mul(&scale)?.affine(self.learning_rate, 0.0)?, None)
                }
            };
            param.set(&param.as_tensor().sub(&delta)?)?;
            if let Some(rate) = rate {
                self.rates[i] = rate;
            }
            self.sum_gradient_squared[i] = s;
        }
        Ok(())
    }
}
