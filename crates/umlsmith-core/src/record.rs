//! Normalized entity records.
//!
//! A [`Record`] is the uniform shape every input medium is reduced to before
//! diagram generation: an identity, a display name, a kind, an open map of
//! caller-supplied attributes and a list of directed [`Relation`]s.
//!
//! # Example
//!
//! ```
//! # use umlsmith_core::record::{Record, Relation};
//! let record = Record::new("api", "service")
//!     .with_name("Public API")
//!     .with_attribute("owner", "payments")
//!     .with_relation(Relation::depends_on("db"));
//!
//! assert_eq!(record.name(), "Public API");
//! assert_eq!(record.relations()[0].target(), "db");
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relation type assigned when the input does not name one.
pub const DEFAULT_RELATION_TYPE: &str = "depends_on";

/// Record kind assigned when the input does not name one.
pub const DEFAULT_RECORD_KIND: &str = "component";

/// Record kind for input the normalizer could not classify.
pub const UNSTRUCTURED_KIND: &str = "unstructured";

/// Open, insertion-ordered map of attribute values.
///
/// Values are opaque JSON-like data so arbitrary caller keys survive unmodified
/// into the diagram prompt.
pub type AttributeMap = IndexMap<String, Value>;

/// A directed relation from the owning [`Record`] to a target.
///
/// The target is an id or a name and does not need to resolve to an existing
/// record; diagram generation may synthesize the missing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    target: String,

    #[serde(
        rename = "type",
        alias = "relation_type",
        alias = "relationType",
        default = "default_relation_type"
    )]
    relation_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl Relation {
    /// Creates a relation of the given type.
    pub fn new(target: impl Into<String>, relation_type: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            relation_type: relation_type.into(),
            reason: None,
        }
    }

    /// Creates a `depends_on` relation.
    pub fn depends_on(target: impl Into<String>) -> Self {
        Self::new(target, DEFAULT_RELATION_TYPE)
    }

    /// Attaches a human-readable reason, typically supplied by enrichment.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the id or name this relation points at.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the relation type, e.g. `depends_on`.
    pub fn relation_type(&self) -> &str {
        &self.relation_type
    }

    /// Returns the reason, if one was recorded.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

fn default_relation_type() -> String {
    DEFAULT_RELATION_TYPE.to_string()
}

/// A normalized entity with identity, type, attributes and relations.
///
/// Records are owned by the caller and borrowed by the pipeline, which never
/// mutates them. When deserialized without a `name`, the name defaults to the
/// id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordRepr")]
pub struct Record {
    id: String,
    name: String,
    kind: String,
    attributes: AttributeMap,
    relations: Vec<Relation>,
}

impl Record {
    /// Creates a record whose name equals its id.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: kind.into(),
            attributes: AttributeMap::new(),
            relations: Vec::new(),
        }
    }

    /// Creates a record of kind `unstructured` that preserves `raw` under the
    /// `raw` attribute.
    pub fn unstructured(id: impl Into<String>, raw: impl Into<Value>) -> Self {
        Self::new(id, UNSTRUCTURED_KIND).with_attribute("raw", raw)
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds or replaces an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_attribute(key, value);
        self
    }

    /// Appends a relation.
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Adds or replaces an attribute in place.
    pub fn insert_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Appends a relation in place.
    pub fn push_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    /// Replaces the id, keeping the name in step when it mirrored the old id.
    pub fn rename_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.name == self.id {
            self.name = id.clone();
        }
        self.id = id;
    }

    /// Returns the identity, unique within one normalization pass.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind, e.g. `component`, `database` or `test_case`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the attribute map.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Returns a single attribute value.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns the outgoing relations.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }
}

/// Serialized shape of a [`Record`] where everything but the id is optional.
#[derive(Deserialize)]
struct RecordRepr {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "type")]
    kind: Option<String>,
    #[serde(default)]
    attributes: AttributeMap,
    #[serde(default)]
    relations: Vec<Relation>,
}

impl From<RecordRepr> for Record {
    fn from(repr: RecordRepr) -> Self {
        let name = repr
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| repr.id.clone());
        Self {
            id: repr.id,
            name,
            kind: repr.kind.unwrap_or_else(|| DEFAULT_RECORD_KIND.to_string()),
            attributes: repr.attributes,
            relations: repr.relations,
        }
    }
}
