//! Authorization for the casting API.
//!
//! Bearer tokens are issued elsewhere; this module only verifies them.
//!
//! ```text
//! Authorization header
//!   -> extractor::extract_bearer_token
//!   -> jwt::TokenVerifier (keys from jwks::KeySetCache)
//!   -> permissions::enforce
//! ```
//!
//! `gate::AuthorizationGate` runs the chain; `middleware::auth` binds it to
//! routes.

pub mod claims;
pub mod extractor;
pub mod gate;
pub mod jwks;
pub mod jwt;
pub mod permissions;

pub use claims::{Audience, ClaimSet};
pub use gate::{AuthorizationGate, GateStage};
pub use jwks::{KeySet, KeySetCache, KeySetError, SigningKey};
pub use jwt::{TokenVerifier, VerifierSettings};
pub use permissions::{Operation, Permission};
