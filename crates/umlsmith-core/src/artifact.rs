//! Accepted diagrams and the result contract returned to callers.
//!
//! [`ResultEnvelope`] is the only value the pipeline hands back. It is either
//! an accepted [`DiagramArtifact`] or an error message, never both, and its
//! serialized form always carries `components` and `relations` lists so
//! callers do not have to special-case failures.

use std::{fmt, path::PathBuf};

use serde::{Serialize, Serializer};

use crate::graph::{DiagramGraph, Edge};

/// A diagram whose source rendered successfully at least once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramArtifact {
    source_text: String,
    source_path: PathBuf,
    image_path: PathBuf,
    #[serde(flatten)]
    graph: DiagramGraph,
}

impl DiagramArtifact {
    /// Creates an artifact.
    ///
    /// # Arguments
    ///
    /// * `source_text` - The accepted diagram source.
    /// * `source_path` - Location of the written source, relative to the output directory.
    /// * `image_path` - Location of the rendered image, relative to the output directory.
    /// * `graph` - Components and relations extracted from `source_text`.
    pub fn new(
        source_text: impl Into<String>,
        source_path: impl Into<PathBuf>,
        image_path: impl Into<PathBuf>,
        graph: DiagramGraph,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            source_path: source_path.into(),
            image_path: image_path.into(),
            graph,
        }
    }

    /// Returns the accepted diagram source.
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Returns the source file path relative to the output directory.
    pub fn source_path(&self) -> &PathBuf {
        &self.source_path
    }

    /// Returns the image path relative to the output directory.
    pub fn image_path(&self) -> &PathBuf {
        &self.image_path
    }

    /// Returns the extracted components and relations.
    pub fn graph(&self) -> &DiagramGraph {
        &self.graph
    }
}

/// Uniform success/error contract returned by every pipeline entry point.
///
/// `success()` is `true` exactly when an artifact is present and no error is.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope {
    outcome: Result<DiagramArtifact, String>,
}

impl ResultEnvelope {
    /// Wraps an accepted artifact.
    pub fn accepted(artifact: DiagramArtifact) -> Self {
        Self {
            outcome: Ok(artifact),
        }
    }

    /// Wraps a failure message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            outcome: Err(error.into()),
        }
    }

    /// Returns `true` when the envelope carries an artifact.
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the artifact on success.
    pub fn artifact(&self) -> Option<&DiagramArtifact> {
        self.outcome.as_ref().ok()
    }

    /// Returns the error message on failure.
    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    /// Returns the artifact's components, or an empty slice on failure.
    pub fn components(&self) -> &[String] {
        self.artifact()
            .map(|artifact| artifact.graph().components())
            .unwrap_or_default()
    }

    /// Returns the artifact's relations, or an empty slice on failure.
    pub fn relations(&self) -> &[Edge] {
        self.artifact()
            .map(|artifact| artifact.graph().relations())
            .unwrap_or_default()
    }

    /// Converts the envelope back into a `Result`.
    pub fn into_result(self) -> Result<DiagramArtifact, String> {
        self.outcome
    }
}

impl<E: fmt::Display> From<Result<DiagramArtifact, E>> for ResultEnvelope {
    fn from(result: Result<DiagramArtifact, E>) -> Self {
        match result {
            Ok(artifact) => Self::accepted(artifact),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}

/// Wire form of a [`ResultEnvelope`].
#[derive(Serialize)]
struct EnvelopeRepr<'a> {
    success: bool,
    artifact: Option<&'a DiagramArtifact>,
    error: Option<&'a str>,
    components: &'a [String],
    relations: &'a [Edge],
}

impl Serialize for ResultEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EnvelopeRepr {
            success: self.success(),
            artifact: self.artifact(),
            error: self.error(),
            components: self.components(),
            relations: self.relations(),
        }
        .serialize(serializer)
    }
}
