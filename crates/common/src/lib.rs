//! Common utilities and types shared across the casting catalog crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT structural helpers (segment decoding, size limits, clock skew)
pub mod jwt;
