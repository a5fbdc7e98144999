//! Components and edges read back out of diagram source.

use serde::{Deserialize, Serialize};

/// A directed, optionally labeled edge between two diagram elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    source: String,
    target: String,
    #[serde(default)]
    label: String,
}

impl Edge {
    /// Creates an edge. An empty label means the edge is unlabeled.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        }
    }

    /// Returns the element the edge leaves from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the element the edge points at.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the label, empty when the edge carries none.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Named nodes and directed edges of a diagram, used for structured display.
///
/// Components are deduplicated and sorted; relations keep source-line order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramGraph {
    components: Vec<String>,
    relations: Vec<Edge>,
}

impl DiagramGraph {
    /// Creates a graph from already-ordered parts.
    pub fn new(components: Vec<String>, relations: Vec<Edge>) -> Self {
        Self {
            components,
            relations,
        }
    }

    /// Returns the component names.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns the directed edges.
    pub fn relations(&self) -> &[Edge] {
        &self.relations
    }

    /// Returns `true` when the graph has neither components nor relations.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.relations.is_empty()
    }
}
