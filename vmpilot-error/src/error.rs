//! The shared error value

use crate::ErrorKind;
use std::fmt;

/// An error from any vmpilot operation.
///
/// Besides its kind and message an error carries the operation it came from
/// and ordered context pairs. Re-tagging an error with a new operation keeps
/// the previous one in context under `called`.
///
/// ```rust
/// use vmpilot_error::{Error, ErrorKind};
///
/// let err = Error::instance_failed("xdotool exited with status 1")
///     .with_operation("scrapybara::computer")
///     .with_context("instance", "s-1f2e")
///     .with_context("action", "left_click");
///
/// assert_eq!(err.kind(), ErrorKind::InstanceFailed);
/// assert_eq!(
///     err.to_string(),
///     "InstanceFailed at scrapybara::computer [instance=s-1f2e, action=left_click]: xdotool exited with status 1"
/// );
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Names the environment variable that was expected
    pub fn missing_credential(var: impl Into<String>) -> Self {
        let var = var.into();
        Self::new(ErrorKind::MissingCredential, format!("{} is required to continue", var))
            .with_context("variable", var)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn instance_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InstanceFailed, message)
    }

    pub fn session_aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionAborted, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying error. Only one source is kept.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }
}

/// Single line, for logs and the console
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }
        if !self.context.is_empty() {
            let pairs: Vec<String> = self.context.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, " [{}]", pairs.join(", "))?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self)?;
        if let Some(source) = &self.source {
            writeln!(f, "  caused by: {:?}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Maps the io kinds callers distinguish; the rest are `IoFailed`
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string()).set_source(err)
    }
}
