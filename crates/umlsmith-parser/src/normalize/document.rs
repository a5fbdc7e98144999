//! JSON and YAML documents.

use log::debug;
use serde_json::{Map, Value};

use umlsmith_core::record::{Record, Relation};

use super::tabular::split_targets;

/// Keys whose list value holds the elements of a wrapping object.
const CONTAINER_KEYS: &[&str] = &["components", "resources", "items", "records", "test_cases"];

const ID_KEYS: &[&str] = &[
    "id",
    "name",
    "component",
    "hostname",
    "uid",
    "key",
    "test_case_id",
    "title",
];

const NAME_KEYS: &[&str] = &["name", "title", "label"];

const KIND_KEYS: &[&str] = &["type", "kind", "role", "category"];

const RELATION_KEYS: &[&str] = &[
    "depends_on",
    "depends",
    "relations",
    "relation",
    "links",
    "connected_to",
];

/// Key holding nested attributes in the serialized record shape.
const ATTRIBUTES_KEY: &str = "attributes";

/// Flattens a parsed document into records.
pub(super) fn records_from_value(value: Value, default_kind: &str) -> Vec<Record> {
    let elements = match value {
        Value::Array(items) => items,
        Value::Object(map) => unwrap_container(map),
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    };

    elements
        .into_iter()
        .enumerate()
        .filter_map(|(idx, element)| {
            let fallback_id = format!("ITEM_{}", idx + 1);
            match element {
                Value::Null => None,
                Value::Object(map) => Some(record_from_object(fallback_id, map, default_kind)),
                other => {
                    debug!(id = fallback_id.as_str(); "Keeping unclassifiable element as unstructured");
                    Some(Record::unstructured(fallback_id, other))
                }
            }
        })
        .collect()
}

fn unwrap_container(mut map: Map<String, Value>) -> Vec<Value> {
    let key = map
        .iter()
        .find(|(key, value)| {
            value.is_array() && CONTAINER_KEYS.contains(&key.to_ascii_lowercase().as_str())
        })
        .map(|(key, _)| key.clone());

    match key.and_then(|key| map.remove(&key)) {
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
        None => vec![Value::Object(map)],
    }
}

fn record_from_object(fallback_id: String, map: Map<String, Value>, default_kind: &str) -> Record {
    let id = find_scalar(&map, ID_KEYS);
    let name = find_scalar(&map, NAME_KEYS);
    let kind = find_scalar(&map, KIND_KEYS);

    let consumed: Vec<&str> = [&id, &name, &kind]
        .into_iter()
        .flatten()
        .map(|(key, _)| key.as_str())
        .collect();

    let record_id = id.as_ref().map_or(fallback_id, |(_, value)| value.clone());
    let mut record = Record::new(
        record_id.clone(),
        kind.as_ref().map_or(default_kind, |(_, value)| value.as_str()),
    )
    .with_name(name.as_ref().map_or(record_id, |(_, value)| value.clone()));

    for (key, value) in &map {
        let lowered = key.to_ascii_lowercase();
        if RELATION_KEYS.contains(&lowered.as_str()) {
            for relation in relations_from_value(value) {
                record.push_relation(relation);
            }
        } else if let (ATTRIBUTES_KEY, Value::Object(nested)) = (lowered.as_str(), value) {
            // Canonical record shape: attributes are nested one level down.
            for (nested_key, nested_value) in nested {
                record.insert_attribute(nested_key.clone(), nested_value.clone());
            }
        } else if !consumed.contains(&key.as_str()) {
            record.insert_attribute(key.clone(), value.clone());
        }
    }
    record
}

/// First candidate key (case-insensitive) holding a non-empty scalar, as `(key, text)`.
fn find_scalar(map: &Map<String, Value>, candidates: &[&str]) -> Option<(String, String)> {
    candidates.iter().find_map(|candidate| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(candidate))
            .and_then(|(key, value)| scalar_text(value).map(|text| (key.clone(), text)))
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn relations_from_value(value: &Value) -> Vec<Relation> {
    match value {
        Value::String(text) => split_targets(text)
            .into_iter()
            .map(Relation::depends_on)
            .collect(),
        Value::Array(items) => items.iter().flat_map(relations_from_value).collect(),
        Value::Object(_) => match serde_json::from_value::<Relation>(value.clone()) {
            Ok(relation) if !relation.target().trim().is_empty() => vec![relation],
            Ok(_) | Err(_) => {
                debug!(value:% = value; "Skipping relation without a target");
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}
