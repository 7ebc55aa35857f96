//! Built-in signal producers

mod autoregressive;
mod band;
mod contrarian;
mod model;
mod trend;

pub use autoregressive::Autoregressive;
pub use band::BandBreakout;
pub use contrarian::Contrarian;
pub use model::ModelProducer;
pub use trend::TrendFollowing;
