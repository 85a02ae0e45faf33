//! Small feed-forward regressor built on ndarray.

use super::optimizer::Adam;
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Layer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    fn forward(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Linear => z.clone(),
        }
    }

    fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => Array2::ones(z.dim()),
        }
    }
}

/// Dense layer: `output = activation(input . weights + biases)`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    /// Weight matrix (input_size x output_size)
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
    pub activation: Activation,
    last_input: Option<Array2<f64>>,
    last_z: Option<Array2<f64>>,
}

impl DenseLayer {
    /// Glorot-uniform weights, zero biases.
    pub fn new(input_size: usize, output_size: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        Self {
            weights: Array2::random_using(
                (input_size, output_size),
                Uniform::new_inclusive(-limit, limit),
                rng,
            ),
            biases: Array1::zeros(output_size),
            activation,
            last_input: None,
            last_z: None,
        }
    }

    fn linear(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.biases
    }

    /// Inference pass, no caching.
    pub fn infer(&self, input: &Array2<f64>) -> Array2<f64> {
        self.activation.forward(&self.linear(input))
    }

    /// Training pass, caches what backward needs.
    fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        let z = self.linear(input);
        let output = self.activation.forward(&z);
        self.last_input = Some(input.clone());
        self.last_z = Some(z);
        output
    }

    /// Returns (input_gradient, weight_gradient, bias_gradient), or None
    /// when called without a preceding forward pass.
    fn backward(&self, output_grad: &Array2<f64>) -> Option<(Array2<f64>, Array2<f64>, Array1<f64>)> {
        let z = self.last_z.as_ref()?;
        let input = self.last_input.as_ref()?;

        let delta = output_grad * &self.activation.derivative(z);
        let weight_grad = input.t().dot(&delta);
        let bias_grad = delta.sum_axis(Axis(0));
        let input_grad = delta.dot(&self.weights.t());

        Some((input_grad, weight_grad, bias_grad))
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

/// Feed-forward network with per-layer Adam state.
#[derive(Debug, Clone)]
pub struct FeedForward {
    layers: Vec<DenseLayer>,
    optimizers: Vec<Adam>,
}

impl FeedForward {
    /// Build `input -> hidden... -> 1` with ReLU hidden layers and a linear output.
    pub fn regressor(input_size: usize, hidden: &[usize], learning_rate: f64, rng: &mut StdRng) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut fan_in = input_size;

        for &size in hidden {
            layers.push(DenseLayer::new(fan_in, size, Activation::Relu, rng));
            fan_in = size;
        }
        layers.push(DenseLayer::new(fan_in, 1, Activation::Linear, rng));

        let optimizers = layers.iter().map(|_| Adam::new(learning_rate)).collect();
        Self { layers, optimizers }
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(DenseLayer::num_parameters).sum()
    }

    /// Inference over a batch of rows.
    pub fn predict(&self, input: &Array2<f64>) -> Array2<f64> {
        self.layers
            .iter()
            .fold(input.clone(), |acc, layer| layer.infer(&acc))
    }

    fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        let mut output = input.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output);
        }
        output
    }

    /// Mean squared error.
    pub fn mse(predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let diff = predictions - targets;
        (&diff * &diff).sum() / predictions.len().max(1) as f64
    }

    fn backward(&mut self, predictions: &Array2<f64>, targets: &Array2<f64>) {
        let n = predictions.nrows().max(1) as f64;
        let mut gradient = 2.0 * (predictions - targets) / n;

        for i in (0..self.layers.len()).rev() {
            let Some((input_grad, weight_grad, bias_grad)) = self.layers[i].backward(&gradient) else {
                return;
            };
            let layer = &mut self.layers[i];
            self.optimizers[i].step(&mut layer.weights, &mut layer.biases, &weight_grad, &bias_grad);
            gradient = input_grad;
        }
    }

    /// One shuffled pass over the data. Returns the mean batch loss.
    pub fn train_epoch(
        &mut self,
        x_train: &Array2<f64>,
        y_train: &Array2<f64>,
        batch_size: usize,
        rng: &mut StdRng,
    ) -> f64 {
        let n_samples = x_train.nrows();
        if n_samples == 0 {
            return f64::NAN;
        }
        let batch_size = batch_size.max(1);

        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(rng);

        let mut total_loss = 0.0;
        let mut batches = 0;
        for batch_indices in indices.chunks(batch_size) {
            let x_batch = x_train.select(Axis(0), batch_indices);
            let y_batch = y_train.select(Axis(0), batch_indices);

            let predictions = self.forward(&x_batch);
            total_loss += Self::mse(&predictions, &y_batch);
            self.backward(&predictions, &y_batch);
            batches += 1;
        }

        total_loss / batches as f64
    }
}
