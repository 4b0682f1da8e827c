pub mod event_bus;
pub mod observability;
pub mod tick_source;

pub use event_bus::{EventBus, LoggingListener};
pub use tick_source::{ManualTickSource, RandomWalk, SimulatedTickSource};
