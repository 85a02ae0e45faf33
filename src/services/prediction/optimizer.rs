//! Adam optimizer (Adaptive Moment Estimation).

use ndarray::{Array1, Array2};

/// Adam state for one dense layer.
///
/// Moments are created lazily on the first step and carried across
/// training passes.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
    m_w: Option<Array2<f64>>,
    v_w: Option<Array2<f64>>,
    m_b: Option<Array1<f64>>,
    v_b: Option<Array1<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m_w: None,
            v_w: None,
            m_b: None,
            v_b: None,
        }
    }

    /// Apply one update to a layer's weights and biases.
    pub fn step(
        &mut self,
        weights: &mut Array2<f64>,
        biases: &mut Array1<f64>,
        weight_grad: &Array2<f64>,
        bias_grad: &Array1<f64>,
    ) {
        self.t = self.t.saturating_add(1);
        let correction1 = 1.0 - self.beta1.powi(self.t);
        let correction2 = 1.0 - self.beta2.powi(self.t);

        let m = self.m_w.get_or_insert_with(|| Array2::zeros(weights.dim()));
        let v = self.v_w.get_or_insert_with(|| Array2::zeros(weights.dim()));
        *m = &*m * self.beta1 + weight_grad * (1.0 - self.beta1);
        *v = &*v * self.beta2 + &(weight_grad * weight_grad) * (1.0 - self.beta2);
        let m_hat = &*m / correction1;
        let v_hat = &*v / correction2;
        *weights -= &(&m_hat * self.learning_rate / &(v_hat.mapv(f64::sqrt) + self.epsilon));

        let m = self.m_b.get_or_insert_with(|| Array1::zeros(biases.len()));
        let v = self.v_b.get_or_insert_with(|| Array1::zeros(biases.len()));
        *m = &*m * self.beta1 + bias_grad * (1.0 - self.beta1);
        *v = &*v * self.beta2 + &(bias_grad * bias_grad) * (1.0 - self.beta2);
        let m_hat = &*m / correction1;
        let v_hat = &*v / correction2;
        *biases -= &(&m_hat * self.learning_rate / &(v_hat.mapv(f64::sqrt) + self.epsilon));
    }
}
