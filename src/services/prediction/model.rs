//! Short-horizon price regressor with its own normalization state.

use super::network::FeedForward;
use crate::error::{AppError, Result};
use crate::types::{Candle, ConfidenceInterval};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Closes per input row.
pub const WINDOW_SIZE: usize = 10;
/// Steps past the end of the window that the target sits at.
pub const PREDICTION_HORIZON: usize = 3;
/// Trailing closes used for a training pass.
pub const TRAINING_CLOSES: usize = 50;
/// Candles required before training.
pub const MIN_TRAINING_CANDLES: usize = 20;
pub const EPOCHS: usize = 20;
pub const BATCH_SIZE: usize = 16;
pub const LEARNING_RATE: f64 = 0.01;
pub const HIDDEN_LAYERS: [usize; 2] = [32, 16];
/// Half-width of the confidence band, in standard deviations.
pub const CONFIDENCE_MULTIPLIER: f64 = 0.5;

/// Result of a training request.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    /// Training completed and the new state was committed.
    Trained { loss: f64 },
    /// Another pass was already running on this instance.
    InFlight,
    /// Fewer than `MIN_TRAINING_CANDLES` candles.
    InsufficientData,
    /// Training failed; the previous state is still in place.
    Failed(String),
}

impl TrainOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, TrainOutcome::Trained { .. })
    }
}

/// Standardization statistics of a training window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: f64,
    pub std: f64,
}

impl Normalization {
    /// Population mean and standard deviation.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(AppError::Training("empty training window".to_string()));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        if !mean.is_finite() || !std.is_finite() {
            return Err(AppError::Training("non-finite training window".to_string()));
        }
        if std == 0.0 {
            return Err(AppError::Training(
                "training window has zero standard deviation".to_string(),
            ));
        }

        Ok(Self { mean, std })
    }

    pub fn standardize(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }

    pub fn restore(&self, value: f64) -> f64 {
        value * self.std + self.mean
    }
}

/// Committed model state. Weights and statistics always change together.
#[derive(Debug, Clone)]
struct ModelState {
    network: FeedForward,
    normalization: Normalization,
}

/// Releases the training flag on drop, including during unwinding.
struct TrainingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TrainingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Feed-forward price regressor owned by one analysis context.
///
/// Training runs on a private copy of the committed state and swaps it in
/// under the write lock, so `predict` never observes new weights paired
/// with old statistics.
pub struct PredictionModel {
    state: RwLock<Option<ModelState>>,
    training: AtomicBool,
    rng: Mutex<StdRng>,
}

impl Default for PredictionModel {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PredictionModel {
    /// Create an untrained model. A seed makes initialization and
    /// shuffling reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: RwLock::new(None),
            training: AtomicBool::new(false),
            rng: Mutex::new(rng),
        }
    }

    /// Whether a training pass is currently running.
    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    pub fn is_trained(&self) -> bool {
        self.read_state(|state| state.is_some())
    }

    /// Statistics from the most recent completed training.
    pub fn normalization(&self) -> Option<Normalization> {
        self.read_state(|state| state.as_ref().map(|s| s.normalization))
    }

    fn read_state<T>(&self, f: impl FnOnce(&Option<ModelState>) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    /// Train on the trailing closes of `candles`. Blocking; run it on a
    /// blocking worker.
    pub fn train(&self, candles: &[Candle]) -> TrainOutcome {
        if candles.len() < MIN_TRAINING_CANDLES {
            debug!(
                "Skipping training: {} candles, need {}",
                candles.len(),
                MIN_TRAINING_CANDLES
            );
            return TrainOutcome::InsufficientData;
        }

        let Some(_guard) = TrainingGuard::acquire(&self.training) else {
            debug!("Training already in flight, skipping");
            return TrainOutcome::InFlight;
        };

        match self.try_train(candles) {
            Ok(loss) => {
                info!("Prediction model trained (loss {:.6})", loss);
                TrainOutcome::Trained { loss }
            }
            Err(e) => {
                warn!("Prediction model training failed: {}", e);
                TrainOutcome::Failed(e.to_string())
            }
        }
    }

    fn try_train(&self, candles: &[Candle]) -> Result<f64> {
        let start = candles.len().saturating_sub(TRAINING_CLOSES);
        let closes: Vec<f64> = candles[start..].iter().map(|c| c.close).collect();

        let normalization = Normalization::fit(&closes)?;
        let standardized: Vec<f64> = closes.iter().map(|c| normalization.standardize(*c)).collect();
        let (x_train, y_train) = supervised_pairs(&standardized)?;

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Warm start from the committed weights and optimizer moments
        let committed = self.read_state(|state| state.as_ref().map(|s| s.network.clone()));
        let mut network = match committed {
            Some(network) => network,
            None => {
                let network =
                    FeedForward::regressor(WINDOW_SIZE, &HIDDEN_LAYERS, LEARNING_RATE, &mut rng);
                debug!(
                    "Initialized regressor: {} layers, {} parameters",
                    network.layers().len(),
                    network.num_parameters()
                );
                network
            }
        };

        let mut loss = f64::NAN;
        for epoch in 0..EPOCHS {
            loss = network.train_epoch(&x_train, &y_train, BATCH_SIZE, &mut rng);
            if !loss.is_finite() {
                return Err(AppError::Training(format!(
                    "non-finite loss at epoch {}",
                    epoch + 1
                )));
            }
        }

        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = Some(ModelState {
            network,
            normalization,
        });

        Ok(loss)
    }

    /// Predict the next value from the trailing `WINDOW_SIZE` closes.
    ///
    /// Returns an empty vector when the model is untrained or fewer than
    /// `WINDOW_SIZE` candles are given.
    pub fn predict(&self, candles: &[Candle]) -> Vec<f64> {
        if candles.len() < WINDOW_SIZE {
            return Vec::new();
        }

        self.read_state(|state| {
            let Some(state) = state.as_ref() else {
                return Vec::new();
            };

            let window: Vec<f64> = candles[candles.len() - WINDOW_SIZE..]
                .iter()
                .map(|c| state.normalization.standardize(c.close))
                .collect();

            let Ok(input) = Array2::from_shape_vec((1, WINDOW_SIZE), window) else {
                return Vec::new();
            };

            state
                .network
                .predict(&input)
                .iter()
                .map(|v| state.normalization.restore(*v))
                .filter(|v| v.is_finite())
                .collect()
        })
    }

    /// Symmetric band of `CONFIDENCE_MULTIPLIER` standard deviations around
    /// each prediction.
    pub fn confidence_interval(&self, predictions: &[f64]) -> Vec<ConfidenceInterval> {
        let half_width = self.volatility_estimate() * CONFIDENCE_MULTIPLIER;
        predictions
            .iter()
            .map(|p| ConfidenceInterval {
                upper: p + half_width,
                lower: p - half_width,
            })
            .collect()
    }

    /// Full band width: the standard deviation of the last training window.
    /// Zero before the first successful training.
    pub fn volatility_estimate(&self) -> f64 {
        self.normalization().map(|n| n.std).unwrap_or(0.0)
    }
}

/// Slide a `WINDOW_SIZE` window over the series; each target sits
/// `PREDICTION_HORIZON` steps past the window's end.
fn supervised_pairs(series: &[f64]) -> Result<(Array2<f64>, Array2<f64>)> {
    let span = WINDOW_SIZE + PREDICTION_HORIZON;
    if series.len() < span {
        return Err(AppError::Training(format!(
            "need at least {} closes for one training pair, have {}",
            span,
            series.len()
        )));
    }

    let count = series.len() - span + 1;
    let mut inputs = Vec::with_capacity(count * WINDOW_SIZE);
    let mut targets = Vec::with_capacity(count);
    for i in 0..count {
        inputs.extend_from_slice(&series[i..i + WINDOW_SIZE]);
        targets.push(series[i + WINDOW_SIZE + PREDICTION_HORIZON - 1]);
    }

    let x = Array2::from_shape_vec((count, WINDOW_SIZE), inputs)
        .map_err(|e| AppError::Training(e.to_string()))?;
    let y = Array2::from_shape_vec((count, 1), targets)
        .map_err(|e| AppError::Training(e.to_string()))?;
    Ok((x, y))
}
