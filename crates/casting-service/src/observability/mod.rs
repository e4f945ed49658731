//! Observability for the casting service.

pub mod metrics;
