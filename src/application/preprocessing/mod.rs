// Tick-to-snapshot engine and its host-facing runtime
pub mod engine;
pub mod runtime;

pub use engine::PreprocessingEngine;
pub use runtime::PreprocessorRuntime;
