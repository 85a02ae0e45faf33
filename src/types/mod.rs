pub mod chart;
pub mod prediction;
pub mod signals;
pub mod ws;

pub use chart::*;
pub use prediction::*;
pub use signals::*;
pub use ws::*;
