//! Prompt construction for every generation call the pipeline makes.
//!
//! Each builder returns a [`Prompt`] whose system message frames the task for
//! the given [`DiagramKind`] and whose user message carries the payload.

use umlsmith_core::{kind::DiagramKind, record::Record};

use crate::error::UmlsmithError;

use super::Prompt;

/// Longest renderer error passed back to the model in a repair prompt.
const REPAIR_ERROR_LIMIT: usize = 500;

const SYNTAX_RULES: &str = "Use ONLY standard PlantUML syntax. \
Start with @startuml and end with @enduml. \
Do not use !include, !define, sprites or external libraries. \
Return ONLY a fenced ```plantuml``` code block.";

fn author_role(kind: DiagramKind) -> &'static str {
    match kind {
        DiagramKind::Sequence => {
            "You are an expert at analyzing test cases and creating PlantUML sequence diagrams. \
             Identify the actors, the steps and the interactions between them, \
             and draw each step as a message between participants."
        }
        DiagramKind::Architecture => {
            "You are an expert infrastructure architect creating PlantUML component diagrams \
             from CMDB data. Draw every item as a component, database or node, group items \
             by layer where it helps, and draw dependencies as labeled arrows."
        }
    }
}

/// Renders records as CSV with `id,name,type,attributes,relations` columns,
/// the last two as JSON.
fn records_as_csv(records: &[Record]) -> Result<String, UmlsmithError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["id", "name", "type", "attributes", "relations"])?;
    for record in records {
        let attributes = serde_json::to_string(record.attributes())?;
        let relations = serde_json::to_string(record.relations())?;
        writer.write_record([
            record.id(),
            record.name(),
            record.kind(),
            attributes.as_str(),
            relations.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| UmlsmithError::Serialize(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| UmlsmithError::Serialize(err.to_string()))
}

/// Builds the initial generation prompt embedding the full record list.
pub(crate) fn generation_prompt(
    kind: DiagramKind,
    records: &[Record],
) -> Result<Prompt, UmlsmithError> {
    let table = records_as_csv(records)?;
    let task = match kind {
        DiagramKind::Sequence => "Analyze the test cases below and create a PlantUML sequence diagram.",
        DiagramKind::Architecture => {
            "Analyze the CMDB records below and create a PlantUML component diagram. \
             Keep every record id as a node and draw every relation."
        }
    };

    Ok(Prompt::new(
        format!("{} {SYNTAX_RULES}", author_role(kind)),
        format!("{task}\n\nRECORDS (CSV):\n{table}"),
    ))
}

/// Builds the narrowly scoped repair prompt: the invalid source and the
/// renderer's complaint, nothing else.
pub(crate) fn repair_prompt(kind: DiagramKind, source: &str, error: &str) -> Prompt {
    let error: String = error.chars().take(REPAIR_ERROR_LIMIT).collect();
    let diagram = match kind {
        DiagramKind::Sequence => "sequence diagram",
        DiagramKind::Architecture => "component diagram",
    };

    Prompt::new(
        format!(
            "You fix PlantUML {diagram} syntax. Change only what is needed to make the \
             code render, keeping every element and relation. {SYNTAX_RULES}"
        ),
        format!(
            "The renderer rejected this PlantUML code.\n\nERROR: {error}\n\n\
             INVALID CODE:\n```plantuml\n{source}\n```"
        ),
    )
}

/// Builds a refinement prompt from prior source and a user instruction.
pub(crate) fn refine_prompt(kind: DiagramKind, prior: &str, instruction: &str) -> Prompt {
    Prompt::new(
        format!(
            "{} Modify the provided PlantUML code according to the user request. {SYNTAX_RULES}",
            author_role(kind)
        ),
        format!("```plantuml\n{prior}\n```\n\nUser request: {instruction}"),
    )
}

/// Builds the prose-to-records synthesis prompt.
pub(crate) fn synthesis_prompt(kind: DiagramKind, prose: &str) -> Prompt {
    let (system, shape) = match kind {
        DiagramKind::Sequence => (
            "You are a QA engineer who turns feature descriptions into test cases. \
             Consider different user roles, error handling and edge cases.",
            "Each test case must have: id (string), name (string), type \"test_case\", \
             and attributes with description (string), actors (array of strings) and \
             steps (array of objects with step_number, actor, action, expected).",
        ),
        DiagramKind::Architecture => (
            "You are an infrastructure architect who turns system descriptions into \
             CMDB records.",
            "Each record must have: id (string), name (string), type (string such as \
             service, database, server or queue), attributes (object) and relations \
             (array of objects with target, type and reason).",
        ),
    };

    Prompt::new(
        system,
        format!(
            "DESCRIPTION:\n{prose}\n\nIMPORTANT: Return ONLY a valid JSON array. {shape}"
        ),
    )
}

/// Builds the enrichment prompt over already-normalized records.
pub(crate) fn enrichment_prompt(
    kind: DiagramKind,
    records: &[Record],
) -> Result<Prompt, UmlsmithError> {
    let json = serde_json::to_string_pretty(records)?;
    let goal = match kind {
        DiagramKind::Sequence => {
            "Add missing actors, alternative and error paths to the test cases, and add \
             relations between test cases that depend on each other."
        }
        DiagramKind::Architecture => {
            "Infer missing relations between components, add a `layer` attribute \
             (presentation, application, data or infrastructure) to every record, and \
             add any clearly implied components."
        }
    };

    Ok(Prompt::new(
        "You enrich structured records for diagram generation. Keep every existing id \
         unchanged. Prefix the id of every record you add with NEW_.",
        format!(
            "RECORDS:\n{json}\n\n{goal}\n\nIMPORTANT: Return ONLY a valid JSON array of \
             objects with id, name, type, attributes and relations \
             (each relation an object with target, type and reason)."
        ),
    ))
}

#[cfg(test)]
mod tests {
    use umlsmith_core::record::Relation;

    use super::*;

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new("A", "service")
                .with_name("Alpha")
                .with_attribute("owner", "team, one")
                .with_relation(Relation::depends_on("B")),
            Record::new("B", "database").with_name("Beta"),
        ]
    }

    #[test]
    fn test_records_as_csv_quotes_json_columns() {
        let table = records_as_csv(&sample_records()).unwrap();
        let mut reader = csv::Reader::from_reader(table.as_bytes());

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "A");
        assert_eq!(&rows[0][3], r#"{"owner":"team, one"}"#);
        assert!(rows[0][4].contains(r#""target":"B""#));
        assert_eq!(&rows[1][4], "[]");
    }

    #[test]
    fn test_generation_prompt_embeds_records() {
        let prompt = generation_prompt(DiagramKind::Architecture, &sample_records()).unwrap();
        assert!(prompt.system().contains("component diagrams"));
        assert!(prompt.system().contains("```plantuml```"));
        assert!(prompt.user().contains("A,Alpha,service"));
    }

    #[test]
    fn test_repair_prompt_truncates_error() {
        let long_error = "x".repeat(2 * REPAIR_ERROR_LIMIT);
        let prompt = repair_prompt(DiagramKind::Sequence, "@startuml\nA -> \n@enduml", &long_error);

        assert!(prompt.user().contains(&"x".repeat(REPAIR_ERROR_LIMIT)));
        assert!(!prompt.user().contains(&"x".repeat(REPAIR_ERROR_LIMIT + 1)));
        assert!(prompt.user().contains("INVALID CODE:\n```plantuml\n@startuml"));
    }

    #[test]
    fn test_refine_prompt_carries_instruction() {
        let prompt = refine_prompt(DiagramKind::Sequence, "@startuml\n@enduml", "add a title");
        assert!(prompt.user().ends_with("User request: add a title"));
    }

    #[test]
    fn test_enrichment_prompt_lists_ids() {
        let prompt = enrichment_prompt(DiagramKind::Architecture, &sample_records()).unwrap();
        assert!(prompt.user().contains(r#""id": "A""#));
        assert!(prompt.user().contains("layer"));
    }
}
