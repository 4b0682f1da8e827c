// Indicator calculators, factory and orchestration
pub mod indicators;

// Tick cleaning, bar aggregation and caches
pub mod market_data;

// Tick-to-snapshot pipeline
pub mod preprocessing;
