//! Feed-forward classifier over a prepared feature/label dataset.
//!
//! Two ReLU hidden layers feed a softmax head. The layers are candle-nn
//! `Linear` modules held in a `VarMap` and trained with sparse
//! cross-entropy under AdamW with weight decay off. The split, the
//! per-epoch shuffle and the weight initialisation all draw from one
//! ChaCha stream seeded from config, so a run is reproducible for a
//! given seed.

use crate::domain::error::SigstatsError;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{AdamW, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn validate(&self) -> Result<(), SigstatsError> {
        if self.features.is_empty() {
            return Err(SigstatsError::Dataset {
                reason: "no samples".into(),
            });
        }
        if self.features.len() != self.labels.len() {
            return Err(SigstatsError::Dataset {
                reason: format!(
                    "{} feature rows but {} labels",
                    self.features.len(),
                    self.labels.len()
                ),
            });
        }
        let width = self.width();
        if width == 0 {
            return Err(SigstatsError::Dataset {
                reason: "feature rows are empty".into(),
            });
        }
        if let Some(row) = self.features.iter().position(|r| r.len() != width) {
            return Err(SigstatsError::Dataset {
                reason: format!(
                    "row {} has {} features, expected {}",
                    row,
                    self.features[row].len(),
                    width
                ),
            });
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.features.first().map(Vec::len).unwrap_or(0)
    }

    pub fn class_count(&self) -> usize {
        self.labels.iter().max().map(|m| m + 1).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub test_size: f64,
    pub seed: u64,
    pub hidden_units: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            test_size: 0.3,
            seed: 42,
            hidden_units: 96,
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub train_size: usize,
    pub test_size: usize,
    pub classes: usize,
    pub epoch_losses: Vec<f64>,
    pub test_loss: f64,
    pub test_accuracy: f64,
}

/// Shuffled (train, test) index split; the test side gets `ceil(n * test_size)`.
pub fn train_test_split(
    n: usize,
    test_size: f64,
    rng: &mut ChaCha8Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let n_test = ((n as f64) * test_size).ceil() as usize;
    let n_test = n_test.min(n);
    let test = indices.split_off(n - n_test);
    (indices, test)
}

/// Fully connected network with ReLU hidden layers and a softmax head.
pub struct Classifier {
    varmap: VarMap,
    hidden1: Linear,
    hidden2: Linear,
    output: Linear,
    inputs: usize,
    device: Device,
}

impl Classifier {
    pub fn new(
        inputs: usize,
        hidden_units: usize,
        classes: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self, SigstatsError> {
        let device = Device::Cpu;
        let mut varmap = VarMap::new();
        let (hidden1, hidden2, output) = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            (
                candle_nn::linear(inputs, hidden_units, vb.pp("hidden1"))?,
                candle_nn::linear(hidden_units, hidden_units, vb.pp("hidden2"))?,
                candle_nn::linear(hidden_units, classes, vb.pp("output"))?,
            )
        };

        // candle's own initialiser is not seedable on CPU; overwrite every
        // layer with Glorot-uniform weights and zero biases from `rng`.
        let shapes = [
            ("hidden1", inputs, hidden_units),
            ("hidden2", hidden_units, hidden_units),
            ("output", hidden_units, classes),
        ];
        for (name, fan_in, fan_out) in shapes {
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let weights: Vec<f32> = (0..fan_in * fan_out)
                .map(|_| rng.gen_range(-limit..limit) as f32)
                .collect();
            varmap.set_one(
                format!("{name}.weight"),
                Tensor::from_vec(weights, (fan_out, fan_in), &device)?,
            )?;
            varmap.set_one(
                format!("{name}.bias"),
                Tensor::zeros(fan_out, DType::F32, &device)?,
            )?;
        }

        Ok(Self {
            varmap,
            hidden1,
            hidden2,
            output,
            inputs,
            device,
        })
    }

    fn features(&self, rows: &[&[f64]]) -> Result<Tensor, SigstatsError> {
        let flat: Vec<f32> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect();
        Ok(Tensor::from_vec(flat, (rows.len(), self.inputs), &self.device)?)
    }

    /// Feature matrix and `u32` label vector for a batch of samples.
    fn batch(&self, samples: &[(&[f64], usize)]) -> Result<(Tensor, Tensor), SigstatsError> {
        let rows: Vec<&[f64]> = samples.iter().map(|(row, _)| *row).collect();
        let labels: Vec<u32> = samples.iter().map(|(_, label)| *label as u32).collect();
        let ys = Tensor::from_vec(labels, samples.len(), &self.device)?;
        Ok((self.features(&rows)?, ys))
    }

    pub fn probabilities(&self, input: &[f64]) -> Result<Vec<f64>, SigstatsError> {
        let logits = self.forward(&self.features(&[input])?)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;
        Ok(probs.into_iter().map(f64::from).collect())
    }

    pub fn predict(&self, input: &[f64]) -> Result<usize, SigstatsError> {
        let logits = self.forward(&self.features(&[input])?)?;
        let class = logits.argmax(D::Minus1)?.squeeze(0)?.to_scalar::<u32>()?;
        Ok(class as usize)
    }

    /// Mean cross-entropy and accuracy over the given samples.
    pub fn evaluate(&self, samples: &[(&[f64], usize)]) -> Result<(f64, f64), SigstatsError> {
        if samples.is_empty() {
            return Ok((f64::NAN, f64::NAN));
        }
        let (xs, ys) = self.batch(samples)?;
        let logits = self.forward(&xs)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &ys)?.to_scalar::<f32>()?;
        let predicted = logits.argmax(D::Minus1)?.to_vec1::<u32>()?;
        let correct = predicted
            .iter()
            .zip(samples)
            .filter(|(class, (_, label))| **class as usize == *label)
            .count();
        Ok((f64::from(loss), correct as f64 / samples.len() as f64))
    }
}

impl Module for Classifier {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.hidden1.forward(xs)?.relu()?;
        let xs = self.hidden2.forward(&xs)?.relu()?;
        self.output.forward(&xs)
    }
}

/// Split, train, and score a classifier on `dataset`.
pub fn train_and_evaluate(
    dataset: &Dataset,
    config: &ClassifierConfig,
) -> Result<(Classifier, TrainingReport), SigstatsError> {
    dataset.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let (train_idx, test_idx) =
        train_test_split(dataset.features.len(), config.test_size, &mut rng);
    if train_idx.is_empty() {
        return Err(SigstatsError::Dataset {
            reason: format!(
                "test_size {} leaves no training samples out of {}",
                config.test_size,
                dataset.features.len()
            ),
        });
    }

    let sample = |i: &usize| (dataset.features[*i].as_slice(), dataset.labels[*i]);
    let mut train: Vec<(&[f64], usize)> = train_idx.iter().map(sample).collect();
    let test: Vec<(&[f64], usize)> = test_idx.iter().map(sample).collect();

    let classes = dataset.class_count();
    let model = Classifier::new(dataset.width(), config.hidden_units, classes, &mut rng)?;
    let params = ParamsAdamW {
        lr: config.learning_rate,
        beta1: ADAM_BETA1,
        beta2: ADAM_BETA2,
        eps: ADAM_EPSILON,
        weight_decay: 0.0,
    };
    let mut optimizer = AdamW::new(model.varmap.all_vars(), params)?;

    let batch_size = config.batch_size.max(1);
    let mut epoch_losses = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        train.shuffle(&mut rng);
        let mut total = 0.0;
        for batch in train.chunks(batch_size) {
            let (xs, ys) = model.batch(batch)?;
            let loss = candle_nn::loss::cross_entropy(&model.forward(&xs)?, &ys)?;
            optimizer.backward_step(&loss)?;
            total += f64::from(loss.to_scalar::<f32>()?) * batch.len() as f64;
        }
        let epoch_loss = total / train.len() as f64;
        tracing::debug!(epoch = epoch + 1, loss = epoch_loss, "epoch complete");
        epoch_losses.push(epoch_loss);
    }

    let (test_loss, test_accuracy) = model.evaluate(&test)?;

    let report = TrainingReport {
        train_size: train.len(),
        test_size: test.len(),
        classes,
        epoch_losses,
        test_loss,
        test_accuracy,
    };
    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(n: usize) -> Dataset {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let x = (i as f64 / (n - 1) as f64) * 2.0 - 1.0;
            if x.abs() < 0.1 {
                continue;
            }
            let y = ((i * 37) % 100) as f64 / 100.0 - 0.5;
            features.push(vec![x, y]);
            labels.push(if x > 0.0 { 1 } else { 0 });
        }
        Dataset { features, labels }
    }

    #[test]
    fn split_sizes_round_test_up() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (train, test) = train_test_split(10, 0.3, &mut rng);
        assert_eq!(train.len(), 7);
        assert_eq!(test.len(), 3);

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (train, test) = train_test_split(11, 0.3, &mut rng);
        assert_eq!(train.len(), 7);
        assert_eq!(test.len(), 4);
    }

    #[test]
    fn split_is_a_permutation_and_deterministic() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        let first = train_test_split(20, 0.25, &mut a);
        let second = train_test_split(20, 0.25, &mut b);
        assert_eq!(first, second);

        let mut all: Vec<usize> = first.0.iter().chain(first.1.iter()).copied().collect();
        all.sort();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn validate_rejects_mismatched_lengths() {
        let ds = Dataset {
            features: vec![vec![1.0], vec![2.0]],
            labels: vec![0],
        };
        assert!(matches!(ds.validate(), Err(SigstatsError::Dataset { .. })));
    }

    #[test]
    fn validate_rejects_ragged_rows() {
        let ds = Dataset {
            features: vec![vec![1.0, 2.0], vec![2.0]],
            labels: vec![0, 1],
        };
        let err = ds.validate().unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn validate_rejects_empty() {
        let ds = Dataset {
            features: vec![],
            labels: vec![],
        };
        assert!(ds.validate().is_err());
    }

    #[test]
    fn probabilities_sum_to_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let model = Classifier::new(3, 8, 4, &mut rng).unwrap();
        let probs = model.probabilities(&[0.5, -1.0, 2.0]).unwrap();
        assert_eq!(probs.len(), 4);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn initialisation_follows_the_seed() {
        let input = [0.3, -0.7, 1.1];
        let a = Classifier::new(3, 8, 2, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        let b = Classifier::new(3, 8, 2, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        let c = Classifier::new(3, 8, 2, &mut ChaCha8Rng::seed_from_u64(6)).unwrap();
        let pa = a.probabilities(&input).unwrap();
        assert_eq!(pa, b.probabilities(&input).unwrap());
        assert_ne!(pa, c.probabilities(&input).unwrap());
    }

    #[test]
    fn wrong_input_width_is_a_training_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let model = Classifier::new(3, 8, 2, &mut rng).unwrap();
        assert!(matches!(
            model.predict(&[1.0, 2.0]),
            Err(SigstatsError::Training(_))
        ));
    }

    #[test]
    fn evaluate_on_no_samples_is_nan() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let model = Classifier::new(2, 4, 2, &mut rng).unwrap();
        let (loss, accuracy) = model.evaluate(&[]).unwrap();
        assert!(loss.is_nan());
        assert!(accuracy.is_nan());
    }

    #[test]
    fn learns_separable_data() {
        let ds = separable(200);
        let config = ClassifierConfig {
            hidden_units: 16,
            epochs: 60,
            batch_size: 16,
            learning_rate: 0.01,
            ..Default::default()
        };
        let (model, report) = train_and_evaluate(&ds, &config).unwrap();
        assert_eq!(model.predict(&[0.9, 0.0]).unwrap(), 1);
        assert_eq!(model.predict(&[-0.9, 0.0]).unwrap(), 0);
        assert_eq!(report.classes, 2);
        assert_eq!(report.train_size + report.test_size, ds.features.len());
        assert!(report.test_accuracy > 0.9, "accuracy {}", report.test_accuracy);
        assert!(report.epoch_losses.last().unwrap() < report.epoch_losses.first().unwrap());
    }

    #[test]
    fn training_is_reproducible() {
        let ds = separable(60);
        let config = ClassifierConfig {
            hidden_units: 4,
            epochs: 3,
            ..Default::default()
        };
        let (_, a) = train_and_evaluate(&ds, &config).unwrap();
        let (_, b) = train_and_evaluate(&ds, &config).unwrap();
        assert_eq!(a.train_size, b.train_size);
        assert_eq!(a.test_size, b.test_size);
        assert_eq!(a.epoch_losses.len(), b.epoch_losses.len());
        for (x, y) in a.epoch_losses.iter().zip(&b.epoch_losses) {
            approx::assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
        }
        approx::assert_abs_diff_eq!(a.test_loss, b.test_loss, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(a.test_accuracy, b.test_accuracy);
    }

    #[test]
    fn all_test_split_is_an_error() {
        let ds = separable(20);
        let config = ClassifierConfig {
            test_size: 1.0,
            ..Default::default()
        };
        assert!(train_and_evaluate(&ds, &config).is_err());
    }
}
