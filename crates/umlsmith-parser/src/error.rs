//! Error type for reading input media.
//!
//! Normalization only fails when the medium itself cannot be read or decoded.
//! Missing or unrecognized structure is never an error; it is handled by the
//! normalizer's fallback heuristics.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The input medium could not be opened or decoded.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{name}` is not valid UTF-8 (invalid byte at offset {offset})")]
    Encoding { name: String, offset: usize },

    #[error("malformed CSV in `{name}`: {message}")]
    Csv {
        name: String,
        message: String,
        offset: Option<usize>,
    },
}

impl ParseError {
    /// Byte offset into the input where decoding failed, when known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::Io { .. } => None,
            ParseError::Encoding { offset, .. } => Some(*offset),
            ParseError::Csv { offset, .. } => *offset,
        }
    }

    pub(crate) fn from_csv(name: &str, err: csv::Error) -> Self {
        let offset = err
            .position()
            .and_then(|position| usize::try_from(position.byte()).ok());
        ParseError::Csv {
            name: name.to_string(),
            message: err.to_string(),
            offset,
        }
    }
}
