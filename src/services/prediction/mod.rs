//! Price prediction: a small feed-forward regressor retrained on recent closes.

pub mod model;
pub mod network;
pub mod optimizer;

pub use model::{Normalization, PredictionModel, TrainOutcome};
pub use network::FeedForward;
pub use optimizer::Adam;
