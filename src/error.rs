//! Error kinds for document processing
//!
//! Inside the pipeline, recoverable stage errors (bad selectors, serialization)
//! are recorded as `StageFailure` and the next stage runs. Every other kind is
//! fatal for the document it was raised on and ends up in `PageResult::Failure`.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The document has no raw markup to work on
    #[error("raw markup is missing or empty")]
    MissingInput,

    /// A single pipeline stage failed; the rest of the pipeline still runs
    #[error("stage `{stage}` failed: {reason}")]
    StageFailure { stage: &'static str, reason: String },

    /// Trimming removed every record before the payload fit the budget
    #[error("node tree is empty, cannot trim further")]
    EmptySequence,

    /// The oracle call failed or its answer was unusable
    #[error("boundary resolution failed: {0}")]
    BoundaryResolutionFailed(String),

    /// The resolved path matched nothing in the original tree
    #[error("main content nodes not found for path `{path}`")]
    ContentNotFound { path: String },

    #[error("invalid path expression `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The fetch collaborator handed over a page that must not enter the pipeline
    #[error("fetch rejected with status {status}")]
    FetchRejected { status: u16 },

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error, raised by a pipeline stage, aborts the current document
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::StageFailure { .. } | Error::Selector(_) | Error::Serialization(_)
        )
    }
}

impl From<crate::document::StageFailure> for Error {
    fn from(failure: crate::document::StageFailure) -> Self {
        Error::StageFailure {
            stage: failure.stage,
            reason: failure.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_local_errors_are_recoverable() {
        let stage = Error::StageFailure {
            stage: "markdown",
            reason: "boom".to_string(),
        };
        assert!(!stage.is_fatal());
        assert!(!Error::Selector("p[".to_string()).is_fatal());
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!Error::Serialization(json).is_fatal());

        assert!(Error::MissingInput.is_fatal());
        assert!(Error::EmptySequence.is_fatal());
        assert!(Error::ContentNotFound { path: "/html".into() }.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = Error::StageFailure {
            stage: "sanitize",
            reason: "bad selector".to_string(),
        };
        assert_eq!(err.to_string(), "stage `sanitize` failed: bad selector");

        let err = Error::ContentNotFound {
            path: "/html/body/main".to_string(),
        };
        assert!(err.to_string().contains("/html/body/main"));
    }
}
