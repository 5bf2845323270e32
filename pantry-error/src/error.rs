//! The main Error type for the recipe agent

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// The unified error type for all recipe agent operations.
///
/// This error type provides:
/// - `kind`: What type of error occurred
/// - `message`: Human-readable description
/// - `status`: Whether the error is retryable
/// - `operation`: What operation caused the error
/// - `context`: Key-value pairs for debugging
/// - `source`: The underlying error (if any)
///
/// # Example
///
/// ```rust
/// use pantry_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::Timeout, "no answer within 60s")
///     .with_operation("generator::generate")
///     .with_context("model", "gpt-4o-mini");
///
/// assert_eq!(err.kind(), ErrorKind::Timeout);
/// assert_eq!(err.status(), ErrorStatus::Temporary);
/// assert!(err.is_retryable());
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = if kind.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        };

        Self {
            kind,
            message: message.into(),
            status,
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Get the operation that caused this error
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Get the source error (if any)
    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    // =========================================================================
    // Builders (chainable)
    // =========================================================================

    /// Set the operation that caused this error.
    ///
    /// If an operation was already set, the previous one is moved to context
    /// as "called" to preserve the call chain.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set the source error.
    ///
    /// # Panics (debug only)
    /// Panics in debug mode if source was already set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    // =========================================================================
    // Status helpers
    // =========================================================================

    /// Mark as persistent after failed retries
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    /// True for network, timeout and rate-limit failures of the generation call
    pub fn is_transport(&self) -> bool {
        self.kind.is_transport()
    }
}

// =============================================================================
// Display - compact, single-line format for logs
// =============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.status)?;

        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }

        if !self.context.is_empty() {
            write!(f, ", context {{ ")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", key, value)?;
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        Ok(())
    }
}

// =============================================================================
// Debug - verbose, multi-line format for debugging
// =============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.message.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Message: {}", self.message)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Context:")?;
            for (key, value) in &self.context {
                writeln!(f, "        {}: {}", key, value)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "    Source: {:?}", source)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// Conversions (careful not to leak raw errors)
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

// =============================================================================
// Convenience constructors
// =============================================================================

impl Error {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a ProfileNotFound error
    pub fn profile_not_found(location: impl Into<String>) -> Self {
        let location = location.into();
        Self::new(ErrorKind::ProfileNotFound, "no profile has been saved yet")
            .with_context("location", location)
    }

    pub fn profile_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProfileInvalid, message)
    }

    pub fn profile_corrupt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProfileCorrupt, message)
    }

    pub fn storage_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageFailed, message)
    }

    pub fn storage_corrupt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageCorrupt, message)
    }

    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationFailed, message)
    }

    /// Create a RequestRejected error
    pub fn request_rejected(utterance: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestRejected, reason).with_context("utterance", utterance)
    }

    /// Create a Timeout error
    pub fn timeout(after_ms: u128) -> Self {
        Self::new(ErrorKind::Timeout, format!("no response within {}ms", after_ms))
            .with_context("timeout_ms", after_ms.to_string())
    }

    pub fn network_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkFailed, message)
    }

    /// Create a MalformedResponse error
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::new(ErrorKind::ProfileNotFound, "no profile");
        assert_eq!(err.kind(), ErrorKind::ProfileNotFound);
        assert_eq!(err.message(), "no profile");
        assert_eq!(err.status(), ErrorStatus::Permanent);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::new(ErrorKind::NetworkFailed, "connection reset")
            .with_operation("provider::complete")
            .with_context("model", "gpt-4o")
            .with_context("base_url", "https://api.openai.com/v1");

        assert_eq!(err.operation(), "provider::complete");
        assert_eq!(err.context().len(), 2);
        assert_eq!(err.context()[0], ("model", "gpt-4o".to_string()));
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::StorageFailed, "write failed")
            .with_operation("file_backend::write")
            .with_operation("history_store::append");

        assert_eq!(err.operation(), "history_store::append");
        assert_eq!(err.context().len(), 1);
        assert_eq!(err.context()[0], ("called", "file_backend::write".to_string()));
    }

    #[test]
    fn test_transport_errors_are_temporary() {
        let err = Error::timeout(60_000);
        assert!(err.is_retryable());
        assert!(err.is_transport());

        let err = Error::malformed_response("no ingredients");
        assert!(!err.is_retryable());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_persist() {
        let err = Error::network_failed("connection refused");
        assert!(err.is_retryable());

        let err = err.persist();
        assert!(!err.is_retryable());
        assert_eq!(err.status(), ErrorStatus::Persistent);
    }

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::MalformedResponse, "missing instructions")
            .with_operation("generator::parse")
            .with_context("model", "gpt-4o-mini");

        let display = format!("{}", err);
        assert!(display.contains("MalformedResponse"));
        assert!(display.contains("permanent"));
        assert!(display.contains("generator::parse"));
        assert!(display.contains("model: gpt-4o-mini"));
        assert!(display.contains("missing instructions"));
    }

    #[test]
    fn test_convenience_constructors() {
        let err = Error::request_rejected("?!", "no food intent");
        assert_eq!(err.kind(), ErrorKind::RequestRejected);
        assert_eq!(err.context()[0], ("utterance", "?!".to_string()));

        let err = Error::profile_not_found("data/profile.json");
        assert_eq!(err.kind(), ErrorKind::ProfileNotFound);
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(err.source_ref().is_some());

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }
}
