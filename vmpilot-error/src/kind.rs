//! What went wrong, independent of where

use std::fmt;

/// The kind of error that occurred.
///
/// Tool kinds stay inside one call; configuration kinds stop the process
/// before any instance is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Invalid configuration or parameters
    ConfigInvalid,
    /// A required credential (API key) is absent
    MissingCredential,
    /// Invalid argument passed to function
    InvalidArgument,

    /// The remote instance API rejected or failed a request
    InstanceFailed,

    /// Tool arguments did not match the tool's declared shape
    InvalidToolInput,
    /// Tool set declared twice or declared empty
    ToolConflict,

    /// The model API returned an error
    InferenceFailed,
    /// The model client could not be built
    ProviderUnavailable,
    RateLimited,
    /// A remote API rejected the key
    AuthenticationFailed,

    /// A session panicked or was torn down before completing
    SessionAborted,

    FileNotFound,
    PermissionDenied,
    IoFailed,
    NetworkFailed,
    /// A remote response could not be decoded
    ParseFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::MissingCredential => "MissingCredential",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InstanceFailed => "InstanceFailed",
            ErrorKind::InvalidToolInput => "InvalidToolInput",
            ErrorKind::ToolConflict => "ToolConflict",
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::SessionAborted => "SessionAborted",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::InstanceFailed.to_string(), "InstanceFailed");
        assert_eq!(ErrorKind::InvalidToolInput.to_string(), "InvalidToolInput");
    }
}
