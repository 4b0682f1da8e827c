// Market data value types
pub mod timeframe;
pub mod types;

pub use timeframe::Timeframe;
pub use types::{Bar, Tick};
