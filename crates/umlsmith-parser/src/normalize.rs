//! Reduction of heterogeneous input into canonical records.
//!
//! The [`Normalizer`] accepts three shapes of input:
//!
//! - **Tabular** (CSV): columns are matched against candidate header lists to
//!   find the identity, name, type and relation columns. Rows that share an
//!   identity value collapse into one record whose rows become ordered
//!   `steps`.
//! - **Document** (JSON/YAML): a list of objects, or an object holding a
//!   `components`/`resources` list. Each object contributes one record.
//! - **Free text**: anything that is not structured, including a degenerate
//!   one-cell table, comes back as [`Normalized::Prose`] so the caller can
//!   have it synthesized into records.
//!
//! Elements that cannot be classified become records of kind `unstructured`
//! with the raw payload kept under the `raw` attribute. Record ids are unique
//! within one pass; collisions get a `_k` suffix.

use std::collections::HashSet;

use log::{debug, info, warn};
use serde_json::Value;

use umlsmith_core::{
    kind::DiagramKind,
    record::{DEFAULT_RECORD_KIND, Record},
};

use crate::{
    error::ParseError,
    input::{InputFormat, RawInput},
};

mod document;
mod tabular;

/// The outcome of normalizing one input medium.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Structured records, possibly empty.
    Records(Vec<Record>),
    /// Unstructured text that needs synthesis before it can become records.
    Prose(String),
}

impl Normalized {
    /// Returns the records, or `None` for prose.
    pub fn into_records(self) -> Option<Vec<Record>> {
        match self {
            Normalized::Records(records) => Some(records),
            Normalized::Prose(_) => None,
        }
    }
}

/// Turns raw input into [`Record`]s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    default_kind: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_KIND)
    }
}

impl Normalizer {
    /// Creates a normalizer that assigns `default_kind` to records without a type column.
    pub fn new(default_kind: impl Into<String>) -> Self {
        Self {
            default_kind: default_kind.into(),
        }
    }

    /// Creates a normalizer with the default record kind of a diagram family.
    pub fn for_kind(kind: DiagramKind) -> Self {
        Self::new(kind.default_record_kind())
    }

    /// Returns the kind given to records that do not name one.
    pub fn default_kind(&self) -> &str {
        &self.default_kind
    }

    /// Normalizes one input medium.
    ///
    /// Empty input yields an empty record list. A JSON or YAML medium that
    /// fails to parse is treated as free text rather than as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Csv`] only when the CSV reader itself cannot
    /// decode the medium.
    pub fn normalize(&self, input: &RawInput) -> Result<Normalized, ParseError> {
        let text = input.text();
        if text.trim().is_empty() {
            debug!(name = input.name(); "Input is empty");
            return Ok(Normalized::Records(Vec::new()));
        }

        let normalized = match input.format() {
            InputFormat::Csv => self.normalize_table(input)?,
            InputFormat::Json => match serde_json::from_str::<Value>(text) {
                Ok(value) => self.normalize_document(value),
                Err(err) => {
                    debug!(name = input.name(), err:% = err; "JSON did not parse, treating as text");
                    Normalized::Prose(text.trim().to_string())
                }
            },
            InputFormat::Yaml => match serde_yaml::from_str::<Value>(text) {
                Ok(value) => self.normalize_document(value),
                Err(err) => {
                    debug!(name = input.name(), err:% = err; "YAML did not parse, treating as text");
                    Normalized::Prose(text.trim().to_string())
                }
            },
            InputFormat::Text => match serde_json::from_str::<Value>(text.trim()) {
                Ok(value @ (Value::Array(_) | Value::Object(_))) => self.normalize_document(value),
                _ => Normalized::Prose(text.trim().to_string()),
            },
        };

        match &normalized {
            Normalized::Records(records) => {
                info!(name = input.name(), format:% = input.format(), records = records.len(); "Normalized input");
            }
            Normalized::Prose(prose) => {
                info!(name = input.name(), chars = prose.chars().count(); "Input is free text");
            }
        }
        Ok(normalized)
    }

    /// Normalizes an already-parsed document, such as model output.
    ///
    /// A bare string becomes a single `unstructured` record with id `TEXT_1`.
    pub fn normalize_value(&self, value: Value) -> Vec<Record> {
        match self.normalize_document(value) {
            Normalized::Records(records) => records,
            Normalized::Prose(text) => vec![Record::unstructured("TEXT_1", text)],
        }
    }

    fn normalize_document(&self, value: Value) -> Normalized {
        match value {
            Value::String(text) if text.trim().is_empty() => Normalized::Records(Vec::new()),
            Value::String(text) => Normalized::Prose(text.trim().to_string()),
            value => {
                let mut records = document::records_from_value(value, &self.default_kind);
                ensure_unique_ids(&mut records);
                Normalized::Records(records)
            }
        }
    }

    fn normalize_table(&self, input: &RawInput) -> Result<Normalized, ParseError> {
        let table = tabular::Table::parse(input.name(), input.text())?;
        if table.is_free_text() {
            return Ok(Normalized::Prose(input.text().trim().to_string()));
        }

        let mut records = table.into_records(&self.default_kind);
        ensure_unique_ids(&mut records);
        Ok(Normalized::Records(records))
    }
}

/// Renames later duplicates to `{id}_{k}` with the smallest free `k >= 2`.
fn ensure_unique_ids(records: &mut [Record]) {
    let taken: HashSet<String> = records.iter().map(|record| record.id().to_string()).collect();
    let mut assigned: HashSet<String> = HashSet::with_capacity(records.len());

    for record in records.iter_mut() {
        if assigned.insert(record.id().to_string()) {
            continue;
        }

        let original = record.id().to_string();
        let unique = (2..)
            .map(|k| format!("{original}_{k}"))
            .find(|candidate| !taken.contains(candidate) && !assigned.contains(candidate))
            .unwrap_or_else(|| format!("{original}_dup"));
        warn!(id = original.as_str(), renamed = unique.as_str(); "Duplicate record id");
        record.rename_id(unique.clone());
        assigned.insert(unique);
    }
}
