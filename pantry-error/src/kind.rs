//! Error kinds for recipe agent operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on `ErrorKind` to decide what to tell the user: re-run
/// onboarding, ask for a clearer request, or suggest trying again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid configuration
    ConfigInvalid,

    /// Invalid argument passed to a function or command
    InvalidArgument,

    // =========================================================================
    // Profile errors
    // =========================================================================
    /// No profile has been saved yet
    ProfileNotFound,

    /// Profile violates an invariant (e.g. an allergen is also liked)
    ProfileInvalid,

    /// Profile file exists but cannot be parsed
    ProfileCorrupt,

    // =========================================================================
    // Storage errors
    // =========================================================================
    /// Writing persisted state failed
    StorageFailed,

    /// Persisted state exists but cannot be parsed
    StorageCorrupt,

    /// Serialization/deserialization failed
    SerializationFailed,

    // =========================================================================
    // Request errors
    // =========================================================================
    /// Utterance contained no extractable food intent
    RequestRejected,

    // =========================================================================
    // Generation errors
    // =========================================================================
    /// Network error talking to the generation service
    NetworkFailed,

    /// The generation call did not finish in time
    Timeout,

    /// Rate limit exceeded
    RateLimited,

    /// Service reported a server-side failure
    ProviderUnavailable,

    /// Credential rejected by the service
    AuthenticationFailed,

    /// Service refused the request (bad model, bad parameters)
    ProviderRejected,

    /// Service answered, but not with a usable recipe
    MalformedResponse,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Profile
            ErrorKind::ProfileNotFound => "ProfileNotFound",
            ErrorKind::ProfileInvalid => "ProfileInvalid",
            ErrorKind::ProfileCorrupt => "ProfileCorrupt",

            // Storage
            ErrorKind::StorageFailed => "StorageFailed",
            ErrorKind::StorageCorrupt => "StorageCorrupt",
            ErrorKind::SerializationFailed => "SerializationFailed",

            // Request
            ErrorKind::RequestRejected => "RequestRejected",

            // Generation
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::ProviderRejected => "ProviderRejected",
            ErrorKind::MalformedResponse => "MalformedResponse",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        self.is_transport()
    }

    /// Transport failures: the request may never have reached the service,
    /// or its answer never came back.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkFailed
                | ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::ProviderUnavailable
        )
    }

    /// Failures of the persistence layer
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            ErrorKind::StorageFailed
                | ErrorKind::StorageCorrupt
                | ErrorKind::SerializationFailed
                | ErrorKind::IoFailed
                | ErrorKind::PermissionDenied
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::ProfileNotFound.to_string(), "ProfileNotFound");
        assert_eq!(ErrorKind::MalformedResponse.to_string(), "MalformedResponse");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::MalformedResponse.is_retryable());
        assert!(!ErrorKind::RequestRejected.is_retryable());
        assert!(!ErrorKind::AuthenticationFailed.is_retryable());
    }

    #[test]
    fn test_is_storage() {
        assert!(ErrorKind::StorageFailed.is_storage());
        assert!(!ErrorKind::Timeout.is_storage());
    }
}
