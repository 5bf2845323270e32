//! Core error helpers
//!
//! Re-exports pantry-error and provides core-specific conveniences.

pub use pantry_error::{Error, ErrorKind, ErrorStatus, Result};

/// Create a StorageFailed error for a failed write of `what`
pub fn write_failed(what: impl Into<String>, reason: impl std::fmt::Display) -> Error {
    let what = what.into();
    Error::storage_failed(format!("failed to write {}: {}", what, reason))
        .with_context("target", what)
}

/// Create a SerializationFailed error
pub fn serialization_error(message: impl Into<String>) -> Error {
    Error::serialization_failed(message)
}

/// Create an Unexpected error for a poisoned lock
pub fn lock_poisoned(name: &'static str) -> Error {
    Error::unexpected(format!("lock '{}' poisoned", name)).with_context("lock", name)
}
