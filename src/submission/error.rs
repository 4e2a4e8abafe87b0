use thiserror::Error;

/// The only error that crosses the submission core boundary.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

pub type Result<T> = std::result::Result<T, SubmissionError>;

pub(crate) fn malformed(message: impl Into<String>) -> SubmissionError {
    SubmissionError::MalformedRequest(message.into())
}

/// Why a whole report was skipped. Never surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidReport {
    #[error("report has no latitude/longitude")]
    MissingPosition,
    #[error("report position is outside valid bounds")]
    OutOfBounds,
    #[error("report has no usable cell or wifi entries")]
    Empty,
}

/// Why a single cell or wifi entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidEntry {
    #[error("entry is not an object")]
    NotAnObject,
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{0}' has the wrong type")]
    WrongType(&'static str),
    #[error("field '{0}' is out of range")]
    OutOfRange(&'static str),
    #[error("unrecognized radio type")]
    UnknownRadio,
    #[error("no radio type on entry or report")]
    NoRadio,
    #[error("invalid access point identifier")]
    InvalidMac,
}
