// Market data processing modules
pub mod bar_aggregator;
pub mod bar_cache;
pub mod circular_history;
pub mod tick_cache;
pub mod tick_cleaner;

pub use bar_aggregator::{AggregateOutcome, BarAggregator};
pub use bar_cache::BarCache;
pub use circular_history::CircularHistory;
pub use tick_cache::TickCache;
pub use tick_cleaner::TickCleaner;
