// Preprocessing value types shared by the engine, calculators and consumers
pub mod context;
pub mod indicator;
pub mod options;
pub mod snapshot;

pub use context::{Metadata, PreprocessingContext};
pub use indicator::{IndicatorResult, IndicatorResults};
pub use options::PreprocessorOptions;
pub use snapshot::{EngineState, EngineStatus, PreprocessorEvent, Snapshot, TickOutcome};
