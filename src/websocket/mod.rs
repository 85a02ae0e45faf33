//! Live per-symbol update stream.

pub mod handler;

pub use handler::ws_handler;
