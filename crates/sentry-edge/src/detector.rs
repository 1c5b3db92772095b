//! Streaming Ensemble Autoencoder anomaly detector (§4.4). Grounded on
//! `kitnet_detector.py`'s `Autoencoder` and `KitNETDetector`: tanh
//! single-hidden-layer autoencoders over overlapping feature groups,
//! online gradient descent, max-of-per-autoencoder-MSE ensemble score.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SentryError};

/// Learning rate (§4.4).
const LEARNING_RATE: f64 = 0.01;
/// Gaussian weight-init standard deviation (§4.4).
const INIT_SIGMA: f64 = 0.1;
/// Recent-score window cap (§3 Detector State).
const SCORE_HISTORY_CAP: usize = 1000;

fn gauss(rng: &mut impl Rng, sigma: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * sigma
}

/// Partition `dim` feature indices into overlapping groups of size
/// `G = max(3, dim/3)` with stride `G/2`, every group size >= 2 (§4.4).
pub fn create_feature_groups(dim: usize) -> Vec<Vec<usize>> {
    if dim == 0 {
        return Vec::new();
    }
    let group_size = (dim / 3).max(3);
    let stride = (group_size / 2).max(1);
    let mut groups = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + group_size).min(dim);
        if end.saturating_sub(start) >= 2 {
            groups.push((start..end).collect::<Vec<_>>());
        }
        if end >= dim {
            break;
        }
        start += stride;
    }
    if groups.is_empty() {
        groups.push((0..dim).collect());
    }
    groups
}

/// A single small tanh autoencoder trained over one feature group.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Autoencoder {
    input_dim: usize,
    hidden_dim: usize,
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    w2: Vec<Vec<f64>>,
    b2: Vec<f64>,
}

impl Autoencoder {
    fn new(input_dim: usize, rng: &mut impl Rng) -> Self {
        let hidden_dim = (input_dim / 2).max(1);
        let w1 = (0..hidden_dim)
            .map(|_| (0..input_dim).map(|_| gauss(rng, INIT_SIGMA)).collect())
            .collect();
        let w2 = (0..input_dim)
            .map(|_| (0..hidden_dim).map(|_| gauss(rng, INIT_SIGMA)).collect())
            .collect();
        Self {
            input_dim,
            hidden_dim,
            w1,
            b1: vec![0.0; hidden_dim],
            w2,
            b2: vec![0.0; input_dim],
        }
    }

    fn forward(&self, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let hidden: Vec<f64> = (0..self.hidden_dim)
            .map(|h| {
                let z: f64 = (0..self.input_dim).map(|i| self.w1[h][i] * x[i]).sum::<f64>() + self.b1[h];
                z.tanh()
            })
            .collect();
        let recon: Vec<f64> = (0..self.input_dim)
            .map(|i| {
                let z: f64 = (0..self.hidden_dim).map(|h| self.w2[i][h] * hidden[h]).sum::<f64>() + self.b2[i];
                z.tanh()
            })
            .collect();
        (hidden, recon)
    }

    fn mse(x: &[f64], recon: &[f64]) -> f64 {
        x.iter().zip(recon).map(|(a, b)| (a - b).powi(2)).sum::<f64>() / x.len() as f64
    }

    /// One gradient step of MSE reconstruction loss; returns the
    /// pre-update loss.
    fn train_step(&mut self, x: &[f64]) -> f64 {
        let (hidden, recon) = self.forward(x);
        let loss = Self::mse(x, &recon);
        let n = x.len() as f64;

        let d_out: Vec<f64> = (0..self.input_dim)
            .map(|i| (2.0 / n) * (recon[i] - x[i]) * (1.0 - recon[i] * recon[i]))
            .collect();

        let d_hidden: Vec<f64> = (0..self.hidden_dim)
            .map(|h| {
                let upstream: f64 = (0..self.input_dim).map(|i| d_out[i] * self.w2[i][h]).sum();
                upstream * (1.0 - hidden[h] * hidden[h])
            })
            .collect();

        for i in 0..self.input_dim {
            for h in 0..self.hidden_dim {
                self.w2[i][h] -= LEARNING_RATE * d_out[i] * hidden[h];
            }
            self.b2[i] -= LEARNING_RATE * d_out[i];
        }
        for h in 0..self.hidden_dim {
            for i in 0..self.input_dim {
                self.w1[h][i] -= LEARNING_RATE * d_hidden[h] * x[i];
            }
            self.b1[h] -= LEARNING_RATE * d_hidden[h];
        }

        loss
    }

    fn reconstruction_mse(&self, x: &[f64]) -> f64 {
        let (_, recon) = self.forward(x);
        Self::mse(x, &recon)
    }
}

/// Running per-feature mean/variance (Welford's online algorithm).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Standardizer {
    mean: Vec<f64>,
    m2: Vec<f64>,
    count: u64,
}

impl Standardizer {
    fn new(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
            count: 0,
        }
    }

    fn update(&mut self, x: &[f64]) {
        self.count += 1;
        for i in 0..x.len() {
            let delta = x[i] - self.mean[i];
            self.mean[i] += delta / self.count as f64;
            let delta2 = x[i] - self.mean[i];
            self.m2[i] += delta * delta2;
        }
    }

    fn variance(&self, i: usize) -> f64 {
        if self.count > 1 {
            self.m2[i] / (self.count as f64 - 1.0)
        } else {
            1.0
        }
    }

    fn standardize(&self, x: &[f64]) -> Vec<f64> {
        (0..x.len())
            .map(|i| {
                let std_dev = self.variance(i).max(1e-8).sqrt();
                (x[i] - self.mean[i]) / std_dev
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Calibrate,
    Train,
    Detect,
}

/// The serialized model blob (§4.4 Persistence): feature map,
/// per-autoencoder weights, standardizer state.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelState {
    dim: usize,
    feature_groups: Vec<Vec<usize>>,
    autoencoders: Vec<Autoencoder>,
    standardizer: Standardizer,
    threshold: f64,
}

/// Owns the detector's entire lifecycle. One instance per edge
/// process, driven by a single task (§5).
pub struct EnsembleDetector {
    dim: Option<usize>,
    feature_groups: Vec<Vec<usize>>,
    autoencoders: Vec<Autoencoder>,
    standardizer: Standardizer,
    training_count: u64,
    max_training_samples: u64,
    phase: Phase,
    score_history: VecDeque<f64>,
    threshold: f64,
    model_path: PathBuf,
}

impl EnsembleDetector {
    /// Construct a detector. If `model_path` exists, the persisted
    /// model is loaded and the detector enters DETECT directly
    /// (§4.4 Persistence).
    pub fn new(model_path: impl Into<PathBuf>, max_training_samples: u64, threshold: f64) -> Self {
        let model_path = model_path.into();
        if let Some(state) = Self::load(&model_path) {
            info!(path = %model_path.display(), "loaded persisted detector model, entering DETECT");
            return Self {
                dim: Some(state.dim),
                feature_groups: state.feature_groups,
                autoencoders: state.autoencoders,
                standardizer: state.standardizer,
                training_count: max_training_samples,
                max_training_samples,
                phase: Phase::Detect,
                score_history: VecDeque::new(),
                threshold: state.threshold,
                model_path,
            };
        }
        Self {
            dim: None,
            feature_groups: Vec::new(),
            autoencoders: Vec::new(),
            standardizer: Standardizer::new(0),
            training_count: 0,
            max_training_samples,
            phase: Phase::Calibrate,
            score_history: VecDeque::new(),
            threshold,
            model_path,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn recent_scores(&self) -> &VecDeque<f64> {
        &self.score_history
    }

    fn calibrate(&mut self, dim: usize, rng: &mut impl Rng) {
        self.dim = Some(dim);
        self.feature_groups = create_feature_groups(dim);
        self.autoencoders = self
            .feature_groups
            .iter()
            .map(|g| Autoencoder::new(g.len(), rng))
            .collect();
        self.standardizer = Standardizer::new(dim);
        self.phase = Phase::Train;
    }

    /// Process one feature vector, returning a normalized score in
    /// [0,1]. First call establishes D and transitions CALIBRATE→TRAIN.
    pub fn process(&mut self, features: &[f64]) -> f64 {
        self.process_with_rng(features, &mut rand::thread_rng())
    }

    fn process_with_rng(&mut self, features: &[f64], rng: &mut impl Rng) -> f64 {
        if self.dim.is_none() {
            self.calibrate(features.len(), rng);
        }
        assert_eq!(
            Some(features.len()),
            self.dim,
            "feature vector dimension changed after CALIBRATE"
        );

        match self.phase {
            Phase::Calibrate => unreachable!("calibrate() always advances to Train"),
            Phase::Train => {
                self.standardizer.update(features);
                let standardized = self.standardizer.standardize(features);

                let mut total_loss = 0.0;
                for (ae, group) in self.autoencoders.iter_mut().zip(&self.feature_groups) {
                    let slice: Vec<f64> = group.iter().map(|&i| standardized[i]).collect();
                    total_loss += ae.train_step(&slice);
                }
                self.training_count += 1;
                let avg_loss = total_loss / self.autoencoders.len().max(1) as f64;
                let score = (avg_loss / 10.0).min(1.0);

                if self.training_count >= self.max_training_samples {
                    if let Err(err) = self.persist() {
                        tracing::warn!(%err, "failed to persist detector model at TRAIN->DETECT transition");
                    }
                    self.phase = Phase::Detect;
                    info!(samples = self.training_count, "detector phase TRAIN -> DETECT");
                }
                score
            }
            Phase::Detect => {
                let standardized = self.standardizer.standardize(features);
                let ensemble = self
                    .autoencoders
                    .iter()
                    .zip(&self.feature_groups)
                    .map(|(ae, group)| {
                        let slice: Vec<f64> = group.iter().map(|&i| standardized[i]).collect();
                        ae.reconstruction_mse(&slice)
                    })
                    .fold(0.0_f64, f64::max);
                let normalized = (ensemble / 5.0).min(1.0);

                if self.score_history.len() >= SCORE_HISTORY_CAP {
                    self.score_history.pop_front();
                }
                self.score_history.push_back(normalized);
                normalized
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let dim = self.dim.ok_or_else(|| SentryError::Detector("persist called before calibration".into()))?;
        let state = ModelState {
            dim,
            feature_groups: self.feature_groups.clone(),
            autoencoders: self.autoencoders.clone(),
            standardizer: self.standardizer.clone(),
            threshold: self.threshold,
        };
        let json = serde_json::to_vec_pretty(&state)?;
        write_atomic(&self.model_path, &json)?;
        Ok(())
    }

    fn load(path: &Path) -> Option<ModelState> {
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Write-to-temp + rename, so a crash mid-write never leaves a
/// truncated model file on disk (§4.4 Persistence).
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn seeded() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(42)
    }

    #[test]
    fn feature_groups_are_overlapping_and_at_least_size_two() {
        let groups = create_feature_groups(17);
        assert!(groups.len() > 1);
        assert!(groups.iter().all(|g| g.len() >= 2));
        // every index is covered by at least one group
        let covered: std::collections::HashSet<usize> = groups.iter().flatten().copied().collect();
        assert_eq!(covered.len(), 17);
    }

    #[test]
    fn dimension_stability_after_calibration() {
        let mut d = EnsembleDetector::new("/tmp/does-not-exist-detector.json", 1000, 0.95);
        let mut rng = seeded();
        let first = vec![0.0_f64; 17];
        d.process_with_rng(&first, &mut rng);
        assert_eq!(d.dim, Some(17));
    }

    #[test]
    #[should_panic(expected = "dimension changed")]
    fn mismatched_dimension_panics() {
        let mut d = EnsembleDetector::new("/tmp/does-not-exist-detector-2.json", 1000, 0.95);
        let mut rng = seeded();
        d.process_with_rng(&vec![0.0; 17], &mut rng);
        d.process_with_rng(&vec![0.0; 12], &mut rng);
    }

    #[test]
    fn phase_transitions_and_persists_at_cap() {
        let path = std::env::temp_dir().join(format!("sentry-detector-test-{}.json", uuid::Uuid::new_v4()));
        let mut d = EnsembleDetector::new(&path, 100, 0.95);
        let mut rng = seeded();
        for i in 0..100 {
            let v: Vec<f64> = (0..17).map(|j| ((i + j) as f64).sin()).collect();
            d.process_with_rng(&v, &mut rng);
        }
        assert_eq!(d.phase(), Phase::Detect);
        assert!(path.exists());

        let score = d.process_with_rng(&vec![0.5; 17], &mut rng);
        assert!((0.0..=1.0).contains(&score));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reloading_persisted_model_enters_detect_directly() {
        let path = std::env::temp_dir().join(format!("sentry-detector-reload-{}.json", uuid::Uuid::new_v4()));
        {
            let mut d = EnsembleDetector::new(&path, 5, 0.95);
            let mut rng = seeded();
            for i in 0..5 {
                d.process_with_rng(&vec![i as f64; 17], &mut rng);
            }
            assert_eq!(d.phase(), Phase::Detect);
        }
        let reloaded = EnsembleDetector::new(&path, 5, 0.95);
        assert_eq!(reloaded.phase(), Phase::Detect);
        let _ = std::fs::remove_file(&path);
    }
}
