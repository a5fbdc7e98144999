//! Component and relation extraction from PlantUML source.
//!
//! This is a line-oriented scan, not a PlantUML parser. Components come from
//! declaration lines (`component`, `node`, `database`, `participant`, ...)
//! and from `[Name]`, `(Name)` and `() Name` shorthands. Relations come from
//! lines matching the grammar in the relation module.
//!
//! Known blind spots: relations split over several lines, elements declared
//! only inside nested grouping headers, class-diagram multiplicities
//! (`A "1" *-- "n" B`) and aliases, which are reported as written.

use std::{collections::BTreeMap, sync::LazyLock};

use log::debug;
use regex::{Captures, Regex};

use umlsmith_core::graph::{DiagramGraph, Edge};

use crate::relation::parse_relation;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*(?:component|node|database|package|actor|participant|entity|cloud|queue|container|collections|boundary|control|storage)\s+(?:"([^"]+)"|\[([^\]]+)\]|([\p{L}_][\p{L}\p{N}_.]*))"#,
    )
    .expect("declaration pattern is valid")
});

static BRACKET_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s>])\[([^\]\n#]+)\]").expect("bracket pattern is valid")
});

static PAREN_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s>])\(([^()*\n]+)\)").expect("paren pattern is valid")
});

static INTERFACE_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\(\)\s+(?:"([^"]+)"|([\p{L}_][\p{L}\p{N}_.]*))"#)
        .expect("interface pattern is valid")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"\n]*""#).expect("quoted pattern is valid"));

/// Leading words of lines that never declare elements or relations.
const IGNORED_KEYWORDS: &[&str] = &[
    "title", "caption", "header", "footer", "legend", "skinparam", "hide", "show", "note",
    "rnote", "hnote", "autonumber", "scale",
];

/// Block openers whose body is free text until a matching `end ...` line.
const TEXT_BLOCKS: &[&str] = &["note", "rnote", "hnote", "legend"];

/// Extracts components and relations from diagram source.
///
/// Components are deduplicated case-insensitively (the lexicographically
/// smallest spelling wins) and sorted, so the result does not depend on
/// declaration order. Relations keep source-line order.
///
/// # Example
///
/// ```
/// # use umlsmith_parser::extract_graph;
/// let graph = extract_graph("@startuml\ncomponent \"Alpha\" as A\n[Beta]\nA --> Beta : uses\n@enduml");
/// assert_eq!(graph.components(), ["Alpha", "Beta"]);
/// assert_eq!(graph.relations()[0].label(), "uses");
/// ```
pub fn extract_graph(source: &str) -> DiagramGraph {
    let mut components: BTreeMap<String, String> = BTreeMap::new();
    let mut relations = Vec::new();
    let mut in_text_block = false;

    for line in source.lines() {
        let trimmed = line.trim();
        let first_word = trimmed
            .split(|c: char| c.is_whitespace() || c == ':')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if in_text_block {
            if first_word.starts_with("end") {
                in_text_block = false;
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with(['\'', '@', '!']) {
            continue;
        }
        if IGNORED_KEYWORDS.contains(&first_word.as_str()) {
            in_text_block = TEXT_BLOCKS.contains(&first_word.as_str()) && !trimmed.contains(':');
            continue;
        }

        for name in declared_names(trimmed) {
            add_component(&mut components, name);
        }
        if let Some(relation) = parse_relation(trimmed) {
            relations.push(Edge::new(relation.source, relation.target, relation.label));
        }
    }

    let components: Vec<String> = components.into_values().collect();
    debug!(components = components.len(), relations = relations.len(); "Extracted diagram graph");
    DiagramGraph::new(components, relations)
}

fn declared_names(line: &str) -> Vec<&str> {
    let mut names = Vec::new();

    for regex in [&*DECLARATION, &*INTERFACE_SHORTHAND] {
        if let Some(name) = regex
            .captures(line)
            .and_then(|captures| captures.iter().skip(1).flatten().next())
        {
            names.push(name.as_str());
        }
    }

    // Quoted text is masked byte-for-byte so match offsets still index `line`.
    let masked = QUOTED.replace_all(strip_label(line), |captures: &Captures<'_>| {
        format!("\"{}\"", "x".repeat(captures[0].len().saturating_sub(2)))
    });
    for regex in [&*BRACKET_SHORTHAND, &*PAREN_SHORTHAND] {
        for captures in regex.captures_iter(&masked) {
            if let Some(original) = captures.get(1).and_then(|name| line.get(name.range())) {
                names.push(original);
            }
        }
    }
    names
}

/// The line up to its first `:` outside quotes and brackets.
fn strip_label(line: &str) -> &str {
    let mut in_quotes = false;
    let mut depth = 0usize;
    for (idx, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes => depth = depth.saturating_sub(1),
            ':' if !in_quotes && depth == 0 => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn add_component(components: &mut BTreeMap<String, String>, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    components
        .entry(name.to_lowercase())
        .and_modify(|existing| {
            if name < existing.as_str() {
                *existing = name.to_string();
            }
        })
        .or_insert_with(|| name.to_string());
}
