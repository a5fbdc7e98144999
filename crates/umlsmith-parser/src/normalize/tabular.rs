//! CSV tables.

use indexmap::IndexMap;
use log::debug;
use serde_json::{Map, Value};

use umlsmith_core::record::{Record, Relation};

use crate::error::ParseError;

/// Header names that identify a row, in priority order.
const ID_COLUMNS: &[&str] = &[
    "id",
    "test_case_id",
    "name",
    "component",
    "hostname",
    "uid",
    "key",
    "test_case",
    "scenario",
    "title",
    "feature",
];

const NAME_COLUMNS: &[&str] = &["name", "title", "label", "hostname"];

const TYPE_COLUMNS: &[&str] = &["type", "kind", "role", "category"];

const RELATION_COLUMNS: &[&str] = &[
    "depends_on",
    "depends",
    "relations",
    "relation",
    "relationship",
    "links",
    "connected_to",
];

/// A column repeating this often (distinct/rows below the ratio) groups rows.
const GROUPING_RATIO: f64 = 0.8;

/// Resolved column roles for one table.
#[derive(Debug, Default)]
struct Columns {
    id: Option<usize>,
    name: Option<usize>,
    kind: Option<usize>,
    relation: Option<usize>,
}

impl Columns {
    fn is_attribute(&self, idx: usize) -> bool {
        ![self.id, self.name, self.kind, self.relation].contains(&Some(idx))
    }
}

/// A parsed CSV medium. Every row has exactly `headers.len()` cells.
#[derive(Debug)]
pub(super) struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Reads a CSV medium. Ragged rows are padded, and cells past the header
    /// get synthesized `column_n` headers.
    pub(super) fn parse(name: &str, text: &str) -> Result<Self, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut headers: Vec<String> = reader
            .headers()
            .map_err(|err| ParseError::from_csv(name, err))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|err| ParseError::from_csv(name, err))?;
            let row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.iter().all(String::is_empty) {
                continue;
            }
            rows.push(row);
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(headers.len());
        while headers.len() < width {
            headers.push(format!("column_{}", headers.len() + 1));
        }
        for row in &mut rows {
            row.resize(width, String::new());
        }

        debug!(name = name, columns = headers.len(), rows = rows.len(); "Parsed CSV table");
        Ok(Self { headers, rows })
    }

    /// Returns `true` for a degenerate table holding a single free-text blob.
    ///
    /// A lone column still counts as structured when its header is one the
    /// normalizer recognizes.
    pub(super) fn is_free_text(&self) -> bool {
        self.headers.len() <= 1
            && self.rows.len() <= 1
            && self.headers.first().is_none_or(|header| !is_known_header(header))
    }

    /// Groups rows into records.
    pub(super) fn into_records(self, default_kind: &str) -> Vec<Record> {
        let columns = self.resolve_columns();
        debug!(
            id:? = columns.id.map(|idx| &self.headers[idx]),
            name:? = columns.name.map(|idx| &self.headers[idx]),
            kind:? = columns.kind.map(|idx| &self.headers[idx]),
            relation:? = columns.relation.map(|idx| &self.headers[idx]);
            "Resolved table columns"
        );

        self.group_rows(&columns)
            .into_iter()
            .map(|(id, rows)| self.build_record(id, &rows, &columns, default_kind))
            .collect()
    }

    fn resolve_columns(&self) -> Columns {
        let lowered: Vec<String> = self
            .headers
            .iter()
            .map(|header| header.trim().to_ascii_lowercase())
            .collect();

        let mut columns = Columns {
            id: find_column(&lowered, ID_COLUMNS, &[]),
            ..Columns::default()
        };
        columns.name = find_column(&lowered, NAME_COLUMNS, &[columns.id]);
        columns.kind = find_column(&lowered, TYPE_COLUMNS, &[columns.id, columns.name]);
        columns.relation = find_column(
            &lowered,
            RELATION_COLUMNS,
            &[columns.id, columns.name, columns.kind],
        );
        if columns.id.is_none() {
            columns.id = self.grouping_column(&[columns.name, columns.kind, columns.relation]);
        }
        columns
    }

    /// First column whose values repeat enough to act as a grouping key.
    fn grouping_column(&self, exclude: &[Option<usize>]) -> Option<usize> {
        if self.rows.len() < 2 {
            return None;
        }
        let threshold = GROUPING_RATIO * self.rows.len() as f64;

        (0..self.headers.len())
            .filter(|idx| !exclude.contains(&Some(*idx)))
            .find(|&idx| {
                let mut distinct: Vec<&str> = self
                    .rows
                    .iter()
                    .map(|row| row[idx].as_str())
                    .filter(|cell| !cell.is_empty())
                    .collect();
                distinct.sort_unstable();
                distinct.dedup();
                !distinct.is_empty() && (distinct.len() as f64) < threshold
            })
    }

    /// Row indices per record, in first-appearance order.
    ///
    /// Rows with no identity value each get their own `ROW_n` group, kept
    /// apart from explicit values even when the text is the same.
    fn group_rows(&self, columns: &Columns) -> Vec<(String, Vec<usize>)> {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut by_value: IndexMap<&str, usize> = IndexMap::new();

        for (idx, row) in self.rows.iter().enumerate() {
            let value = columns.id.map(|col| row[col].as_str()).unwrap_or_default();
            if value.is_empty() {
                groups.push((format!("ROW_{}", idx + 1), vec![idx]));
                continue;
            }
            match by_value.get(value) {
                Some(&group) => groups[group].1.push(idx),
                None => {
                    by_value.insert(value, groups.len());
                    groups.push((value.to_string(), vec![idx]));
                }
            }
        }
        groups
    }

    fn build_record(
        &self,
        id: String,
        rows: &[usize],
        columns: &Columns,
        default_kind: &str,
    ) -> Record {
        let first = &self.rows[rows[0]];
        let name = cell(first, columns.name).unwrap_or(&id).to_string();
        let kind = cell(first, columns.kind).unwrap_or(default_kind).to_string();
        let mut record = Record::new(id, kind).with_name(name);

        for (key, value) in self.attribute_cells(rows[0], columns) {
            record.insert_attribute(key, value);
        }
        if rows.len() > 1 {
            let steps: Vec<Value> = rows
                .iter()
                .enumerate()
                .map(|(number, &row)| {
                    let mut step = Map::new();
                    step.insert("step_number".to_string(), Value::from(number + 1));
                    for (key, value) in self.attribute_cells(row, columns) {
                        step.insert(key.to_string(), Value::String(value.to_string()));
                    }
                    Value::Object(step)
                })
                .collect();
            record.insert_attribute("steps", steps);
        }

        for &row in rows {
            let Some(targets) = cell(&self.rows[row], columns.relation) else {
                continue;
            };
            for target in split_targets(targets) {
                if !record.relations().iter().any(|rel| rel.target() == target) {
                    record.push_relation(Relation::depends_on(target));
                }
            }
        }
        record
    }

    fn attribute_cells<'a>(
        &'a self,
        row: usize,
        columns: &'a Columns,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.headers
            .iter()
            .zip(&self.rows[row])
            .enumerate()
            .filter(move |(idx, (_, value))| columns.is_attribute(*idx) && !value.is_empty())
            .map(|(_, (header, value))| (header.as_str(), value.as_str()))
    }
}

fn is_known_header(header: &str) -> bool {
    let lowered = header.trim().to_ascii_lowercase();
    [ID_COLUMNS, NAME_COLUMNS, TYPE_COLUMNS, RELATION_COLUMNS]
        .iter()
        .any(|candidates| candidates.contains(&lowered.as_str()))
}

fn find_column(lowered: &[String], candidates: &[&str], exclude: &[Option<usize>]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        lowered
            .iter()
            .position(|header| header.as_str() == *candidate)
            .filter(|idx| !exclude.contains(&Some(*idx)))
    })
}

fn cell(row: &[String], column: Option<usize>) -> Option<&str> {
    column
        .map(|idx| row[idx].as_str())
        .filter(|value| !value.is_empty())
}

/// Splits a relation cell: a JSON list, or comma/semicolon separated ids.
pub(super) fn split_targets(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    if cell.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(cell) {
            return items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|target| !target.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    cell.split([',', ';'])
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(str::to_string)
        .collect()
}
