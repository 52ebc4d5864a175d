use std::fmt;

use crate::error::fixture_error_enums::*;

#[derive(Debug)]
pub struct FixtureServerError {
    pub kind: FixtureServerErrorKind,
    pub message: String,
}

impl FixtureServerError {
    pub fn new(kind: FixtureServerErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn tls(error: TlsError, message: impl Into<String>) -> Self {
        Self::new(FixtureServerErrorKind::Tls(error), message)
    }

    pub fn is_await_cancelled(&self) -> bool {
        matches!(self.kind, FixtureServerErrorKind::AwaitCancelled)
    }
}

impl fmt::Display for FixtureServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FixtureServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<MultipartError> for FixtureServerError {
    fn from(error: MultipartError) -> Self {
        let message = error.to_string();
        Self::new(FixtureServerErrorKind::Multipart(error), message)
    }
}
