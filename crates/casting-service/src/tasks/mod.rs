//! Background tasks for the casting service.
//!
//! # Tasks
//!
//! - `key_set_refresh` - Reloads the verification key set on a fixed interval
//!   and on `SIGHUP`

pub mod key_set_refresh;

pub use key_set_refresh::{start_key_set_refresh, start_sighup_reload};
