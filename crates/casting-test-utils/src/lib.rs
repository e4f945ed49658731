//! # Casting Test Utilities
//!
//! Shared test utilities for the casting service.
//!
//! This crate provides:
//! - Deterministic Ed25519 signing keys (`TestKeypair`)
//! - Claim set builders (`TestClaimsBuilder`)
//! - A mock JWKS endpoint (`MockJwksServer`)
//! - Server test harness (`TestCastingServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casting_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let keypair = TestKeypair::new(1, "key-1");
//!     let server = TestCastingServer::spawn(&[&keypair]).await?;
//!     let token = keypair.sign(&server.claims().permissions(&["read:works"]).build());
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/works", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 404); // empty catalog
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use server_harness::*;
pub use token_builders::*;
