//! Casting Service Library
//!
//! A permission-guarded catalog of performers and works. Every catalog
//! route is protected by bearer-token authorization:
//!
//! - Tokens are compact JWS access tokens from an external issuer
//! - Signatures are verified against a cached JWKS key set
//! - Each operation requires exactly one named permission
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> repositories/*.rs
//!                        |
//!                  auth/gate.rs (extract -> verify -> enforce)
//! ```
//!
//! # Modules
//!
//! - `auth` - Token extraction, key set cache, verification and permissions
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Per-route authorization and HTTP metrics
//! - `models` - Catalog data models
//! - `observability` - Prometheus metrics
//! - `repositories` - Catalog storage (PostgreSQL and in-memory)
//! - `routes` - Axum router setup
//! - `tasks` - Key set refresh tasks

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod tasks;
