use super::{ErrorBag, TransportError};
use std::error::Error;

/// Error type built over ErrorBag, carrying source code location and an
/// optional message. Construct through the err_* macros so the location is
/// captured at the call site.
#[derive(Debug)]
pub struct ApprovalError {
    pub inner: ErrorBag,
    pub msg: Option<String>,
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl ApprovalError {
    /// The classified transport failure, if that is what is wrapped here.
    pub fn transport(&self) -> Option<&TransportError> {
        match &self.inner {
            ErrorBag::Transport(transport_error) => Some(transport_error),
            _ => None,
        }
    }
}

impl Error for ApprovalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.inner)
    }
}

impl std::fmt::Display for ApprovalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(msg) = &self.msg {
            write!(
                f,
                "{}, {}, {}:{}:{}",
                msg, self.inner, self.file, self.line, self.column
            )
        } else {
            write!(
                f,
                "{}, {}:{}:{}",
                self.inner, self.file, self.line, self.column
            )
        }
    }
}
