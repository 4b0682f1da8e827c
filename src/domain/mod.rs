// Market data value types
pub mod market;

// Preprocessing results, context and options
pub mod preprocessing;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
