//! # pantry-error
//!
//! Unified error handling for the PantryVision recipe agent.
//!
//! ## Design
//!
//! - **ErrorKind**: what went wrong (e.g. ProfileNotFound, MalformedResponse)
//! - **ErrorStatus**: how to react (Permanent, Temporary, Persistent)
//! - **Error Context**: key/value pairs locating the cause
//! - **Error Source**: the wrapped underlying error, never leaked as a raw type
//!
//! ## Usage
//!
//! ```rust
//! use pantry_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ProfileNotFound, "no profile saved yet")
//!         .with_operation("profile_store::load")
//!         .with_context("path", "data/profile.json"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, pantry_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, later layers only append context
//! - Transport failures are `Temporary`; the user decides whether to retry

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the pantry Error
pub type Result<T> = std::result::Result<T, Error>;
