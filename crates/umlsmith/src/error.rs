//! Error types for umlsmith operations.
//!
//! [`UmlsmithError`] is the crate-level taxonomy. Inside the pipeline every
//! variant is folded into a failed [`ResultEnvelope`](crate::ResultEnvelope);
//! it only reaches callers directly from
//! [`Pipeline::build_records_from_source`](crate::Pipeline::build_records_from_source)
//! and from the CLI.

use std::io;

use thiserror::Error;

use umlsmith_parser::ParseError;

use crate::{generate::GenerationError, render::RenderError};

/// The main error type for umlsmith operations.
#[derive(Debug, Error)]
pub enum UmlsmithError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: Option<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    /// The renderer rejected the diagram source, even after repair and fallback.
    #[error("Diagram syntax error: {0}")]
    Syntax(String),

    /// The renderer or the generation service is missing or unreachable.
    #[error("Environment error: {0}")]
    Environment(String),

    /// The generation service answered with content of the wrong shape.
    #[error("Unexpected generation output: {0}")]
    GenerationFormat(String),

    #[error("no records were supplied")]
    NoRecords,

    #[error("Serialization error: {0}")]
    Serialize(String),

    /// A failed pipeline envelope, surfaced as an error by a caller.
    #[error("{0}")]
    Generation(String),
}

impl UmlsmithError {
    /// Creates a `Parse` error that keeps the input text for diagnostics.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: Some(src.into()),
        }
    }
}

impl From<ParseError> for UmlsmithError {
    fn from(err: ParseError) -> Self {
        Self::Parse { err, src: None }
    }
}

impl From<RenderError> for UmlsmithError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Syntax(detail) => Self::Syntax(detail),
            RenderError::Environment(detail) => Self::Environment(detail),
        }
    }
}

impl From<GenerationError> for UmlsmithError {
    fn from(err: GenerationError) -> Self {
        Self::Environment(err.to_string())
    }
}

impl From<serde_json::Error> for UmlsmithError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

impl From<csv::Error> for UmlsmithError {
    fn from(err: csv::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}
