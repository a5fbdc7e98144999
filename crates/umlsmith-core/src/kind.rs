//! Diagram families produced by the pipeline.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The diagram family requested by a caller.
///
/// Test-case input becomes sequence diagrams; CMDB input becomes
/// component/deployment architecture diagrams. The kind selects prompts,
/// default record kinds, default filename stems and the fallback skeleton
/// style.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    /// Sequence diagrams describing test-case steps between actors.
    #[default]
    Sequence,

    /// Component/deployment diagrams describing infrastructure items.
    Architecture,
}

impl DiagramKind {
    /// Kind assigned to normalized records when the input does not name one.
    pub fn default_record_kind(&self) -> &'static str {
        match self {
            DiagramKind::Sequence => "test_case",
            DiagramKind::Architecture => crate::record::DEFAULT_RECORD_KIND,
        }
    }

    /// Filename stem used when the caller does not supply one.
    pub fn default_filename_stem(&self) -> &'static str {
        match self {
            DiagramKind::Sequence => "test_case_diagram",
            DiagramKind::Architecture => "cmdb_diagram",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagramKind::Sequence => write!(f, "sequence"),
            DiagramKind::Architecture => write!(f, "architecture"),
        }
    }
}

/// Error returned when parsing an unknown diagram kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown diagram kind `{0}` (expected `sequence` or `architecture`)")]
pub struct UnknownDiagramKind(String);

impl FromStr for DiagramKind {
    type Err = UnknownDiagramKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" | "test-case" | "testcase" => Ok(DiagramKind::Sequence),
            "architecture" | "cmdb" | "component" => Ok(DiagramKind::Architecture),
            other => Err(UnknownDiagramKind(other.to_string())),
        }
    }
}
