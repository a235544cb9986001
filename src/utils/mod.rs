//! # Utility Modules
//!
//! Supporting utilities used throughout the protocol implementation.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters

pub mod logging;
pub mod metrics;
