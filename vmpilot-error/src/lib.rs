//! # vmpilot-error
//!
//! One error type shared by the instance client, the model providers and the
//! agent.
//!
//! An [`Error`] records what failed ([`ErrorKind`]), where it failed (the
//! operation name plus key/value context such as tool, instance or company)
//! and, when there is one, the underlying error it wraps.
//!
//! ```rust
//! use vmpilot_error::{Error, ErrorKind};
//!
//! fn start() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::InstanceFailed, "instance did not start")
//!         .with_operation("scrapybara::start")
//!         .with_context("instance_type", "browser"))
//! }
//!
//! assert_eq!(start().unwrap_err().kind(), ErrorKind::InstanceFailed);
//! ```
//!
//! Errors are handled once, where they happen; callers further up only add
//! context. Foreign error types are attached with `set_source` instead of a
//! blanket `From` so they never leak through the public API.

mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

/// Result type alias using the vmpilot Error
pub type Result<T> = std::result::Result<T, Error>;
