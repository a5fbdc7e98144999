use std::{
    cell::RefCell,
    collections::VecDeque,
    path::{Path, PathBuf},
    time::Duration,
};

use umlsmith::{
    InputFormat, OutputTarget, Pipeline, RawInput,
    config::{AppConfig, GeneratorConfig, RendererConfig, RepairConfig},
    generate::{Credential, GenerationError, Prompt, TextGenerator},
    kind::DiagramKind,
    record::{Record, Relation},
    render::{RenderError, Renderer},
};

/// Replays canned replies and records every prompt it receives.
#[derive(Default)]
struct ScriptedGenerator {
    replies: RefCell<VecDeque<Result<String, GenerationError>>>,
    prompts: RefCell<Vec<Prompt>>,
}

impl ScriptedGenerator {
    fn replying(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            prompts: RefCell::default(),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn complete(
        &self,
        _credential: Option<&Credential>,
        prompt: &Prompt,
    ) -> Result<String, GenerationError> {
        self.prompts.borrow_mut().push(prompt.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

/// Replays canned render outcomes, succeeding once the script runs out.
#[derive(Default)]
struct ScriptedRenderer {
    outcomes: RefCell<VecDeque<RenderError>>,
    sources: RefCell<Vec<String>>,
}

impl ScriptedRenderer {
    fn failing(outcomes: Vec<RenderError>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            sources: RefCell::default(),
        }
    }

    fn calls(&self) -> usize {
        self.sources.borrow().len()
    }
}

impl Renderer for ScriptedRenderer {
    fn render(
        &self,
        source: &str,
        output_dir: &Path,
        filename_base: &str,
    ) -> Result<PathBuf, RenderError> {
        self.sources.borrow_mut().push(source.to_string());
        match self.outcomes.borrow_mut().pop_front() {
            Some(err) => Err(err),
            None => Ok(output_dir.join(format!("{filename_base}.png"))),
        }
    }
}

fn config(max_retries: u32) -> AppConfig {
    AppConfig::new(
        GeneratorConfig::default(),
        RendererConfig::default(),
        RepairConfig::new(max_retries, None, 10, 20),
    )
}

fn fenced(source: &str) -> Result<String, GenerationError> {
    Ok(format!("Here you go:\n```plantuml\n{source}\n```\nAnything else?"))
}

fn syntax(line: usize) -> RenderError {
    RenderError::Syntax(format!("Error line {line} in file: diagram.puml"))
}

fn credential() -> Credential {
    Credential::new("sk-test")
}

fn alpha_beta() -> Vec<Record> {
    vec![
        Record::new("A", "service")
            .with_name("Alpha")
            .with_relation(Relation::depends_on("B")),
        Record::new("B", "database").with_name("Beta"),
    ]
}

const BROKEN: &str = "@startuml\ncomponent \"Alpha\" as A\nA --> \n@enduml";
const REPAIRED: &str = "@startuml\ncomponent \"Alpha\" as A\ncomponent \"Beta\" as B\nA --> B : depends_on\n@enduml";

#[test]
fn test_repair_succeeds_on_second_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "cmdb_diagram");
    let generator = ScriptedGenerator::replying(vec![fenced(BROKEN), fenced(REPAIRED)]);
    let renderer = ScriptedRenderer::failing(vec![syntax(3)]);
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let envelope = pipeline.generate_diagram(
        Some(&credential()),
        &alpha_beta(),
        DiagramKind::Architecture,
        &target,
    );

    assert!(envelope.success(), "{:?}", envelope.error());
    let artifact = envelope.artifact().unwrap();
    assert_eq!(artifact.source_text(), REPAIRED);
    assert_eq!(artifact.image_path(), &PathBuf::from("cmdb_diagram.png"));
    assert_eq!(artifact.source_path(), &PathBuf::from("cmdb_diagram.puml"));
    assert_eq!(envelope.components(), ["Alpha", "Beta"]);
    assert_eq!(envelope.relations().len(), 1);

    assert_eq!(generator.calls(), 2);
    let repair = &generator.prompts.borrow()[1];
    assert!(repair.user().contains("ERROR: Error line 3"));
    assert!(repair.user().contains(BROKEN));
}

#[test]
fn test_environment_error_is_not_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "cmdb_diagram");
    let generator = ScriptedGenerator::replying(vec![fenced(REPAIRED)]);
    let renderer = ScriptedRenderer::failing(vec![RenderError::Environment(
        "failed to start renderer `java`: No such file or directory".to_string(),
    )]);
    let pipeline = Pipeline::new(config(3), &generator, &renderer);

    let envelope = pipeline.generate_diagram(
        Some(&credential()),
        &alpha_beta(),
        DiagramKind::Architecture,
        &target,
    );

    assert!(!envelope.success());
    assert!(envelope.error().unwrap().contains("failed to start renderer"));
    assert!(envelope.components().is_empty());
    assert!(envelope.relations().is_empty());
    // Only the initial generation call; the repair path never ran.
    assert_eq!(generator.calls(), 1);
    assert_eq!(renderer.calls(), 1);
}

#[test]
fn test_repair_budget_is_bounded_then_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "cmdb_diagram");
    let generator =
        ScriptedGenerator::replying(vec![fenced(BROKEN), fenced(BROKEN), fenced(BROKEN), fenced(BROKEN)]);
    let renderer = ScriptedRenderer::failing(vec![syntax(1), syntax(2), syntax(3)]);
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let input = RawInput::new(
        "records.csv",
        InputFormat::Csv,
        "id,name,depends_on\nA,Alpha,B\nB,Beta,\n",
    );
    let records = pipeline
        .build_records_from_source(None, &input, DiagramKind::Architecture)
        .unwrap();
    let envelope =
        pipeline.generate_diagram(Some(&credential()), &records, DiagramKind::Architecture, &target);

    assert!(envelope.success(), "{:?}", envelope.error());
    // One initial call plus exactly `max_retries` repair calls.
    assert_eq!(generator.calls(), 3);
    assert_eq!(renderer.calls(), 4);

    let artifact = envelope.artifact().unwrap();
    assert!(artifact.source_text().contains("A --> B : depends_on"));
    assert_eq!(envelope.components(), ["Alpha", "Beta"]);
    assert_eq!(envelope.relations().len(), 1);
    assert_eq!(envelope.relations()[0].source(), "A");
    assert_eq!(envelope.relations()[0].target(), "B");
}

#[test]
fn test_rejected_fallback_reports_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "cmdb_diagram");
    let generator = ScriptedGenerator::replying(vec![fenced(BROKEN), fenced(BROKEN)]);
    let renderer = ScriptedRenderer::failing(vec![syntax(1), syntax(2), syntax(9)]);
    let pipeline = Pipeline::new(config(1), &generator, &renderer);

    let envelope = pipeline.generate_diagram(
        Some(&credential()),
        &alpha_beta(),
        DiagramKind::Architecture,
        &target,
    );

    assert!(!envelope.success());
    let error = envelope.error().unwrap();
    assert!(error.contains("Error line 2"), "{error}");
    assert_eq!(generator.calls(), 2);
}

#[test]
fn test_empty_records_report_clear_error() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "test_case_diagram");
    let generator = ScriptedGenerator::default();
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let envelope =
        pipeline.generate_diagram(Some(&credential()), &[], DiagramKind::Sequence, &target);

    assert!(!envelope.success());
    assert_eq!(envelope.error(), Some("no records were supplied"));
    assert_eq!(generator.calls(), 0);
    assert_eq!(renderer.calls(), 0);
}

#[test]
fn test_missing_credential_is_environment_failure() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "cmdb_diagram");
    let generator = ScriptedGenerator::replying(vec![fenced(REPAIRED)]);
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let envelope = pipeline.generate_diagram(None, &alpha_beta(), DiagramKind::Architecture, &target);

    assert!(!envelope.success());
    assert!(envelope.error().unwrap().contains("no credential"));
    assert_eq!(generator.calls(), 0);
    assert_eq!(renderer.calls(), 0);
}

#[test]
fn test_service_failure_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "cmdb_diagram");
    let generator = ScriptedGenerator::replying(vec![Err(GenerationError::Status {
        status: 503,
        body: "overloaded".to_string(),
    })]);
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(3), &generator, &renderer);

    let envelope = pipeline.generate_diagram(
        Some(&credential()),
        &alpha_beta(),
        DiagramKind::Architecture,
        &target,
    );

    assert!(!envelope.success());
    assert!(envelope.error().unwrap().contains("503"));
    assert_eq!(generator.calls(), 1);
    assert_eq!(renderer.calls(), 0);
}

#[test]
fn test_refine_applies_instruction() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "test_case_diagram");
    let refined = "@startuml\ntitle Login\nparticipant User\nparticipant System\nUser -> System : login\n@enduml";
    let generator = ScriptedGenerator::replying(vec![fenced(refined)]);
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let envelope = pipeline.refine_diagram(
        Some(&credential()),
        "@startuml\nUser -> System : login\n@enduml",
        "add a title",
        DiagramKind::Sequence,
        &target,
    );

    assert!(envelope.success(), "{:?}", envelope.error());
    assert_eq!(envelope.artifact().unwrap().source_text(), refined);
    assert_eq!(envelope.components(), ["System", "User"]);
    assert!(generator.prompts.borrow()[0].user().ends_with("User request: add a title"));
}

#[test]
fn test_refine_has_no_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "test_case_diagram");
    let generator = ScriptedGenerator::replying(vec![fenced(BROKEN), fenced(BROKEN), fenced(BROKEN)]);
    let renderer = ScriptedRenderer::failing(vec![syntax(1), syntax(2), syntax(3)]);
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let envelope = pipeline.refine_diagram(
        Some(&credential()),
        "@startuml\nA -> B\n@enduml",
        "break it",
        DiagramKind::Sequence,
        &target,
    );

    assert!(!envelope.success());
    assert!(envelope.error().unwrap().contains("Error line 3"));
    assert_eq!(generator.calls(), 3);
    assert_eq!(renderer.calls(), 3);
}

#[test]
fn test_elapsed_budget_skips_to_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "cmdb_diagram");
    let generator = ScriptedGenerator::replying(vec![fenced(BROKEN)]);
    let renderer = ScriptedRenderer::failing(vec![syntax(1)]);
    let config = AppConfig::new(
        GeneratorConfig::default(),
        RendererConfig::default(),
        RepairConfig::new(3, Some(Duration::ZERO), 10, 20),
    );
    let pipeline = Pipeline::new(config, &generator, &renderer);

    let envelope = pipeline.generate_diagram(
        Some(&credential()),
        &alpha_beta(),
        DiagramKind::Architecture,
        &target,
    );

    assert!(envelope.success());
    assert_eq!(generator.calls(), 1);
}

#[test]
fn test_prose_is_synthesized_into_records() {
    let generator = ScriptedGenerator::replying(vec![Ok(
        "```json\n[{\"id\": \"TC-1\", \"name\": \"Login\", \"type\": \"test_case\", \"attributes\": {\"actors\": [\"User\"]}}]\n```"
            .to_string(),
    )]);
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);
    let input = RawInput::new("story.txt", InputFormat::Text, "Users log in with a password.");

    let records = pipeline
        .build_records_from_source(Some(&credential()), &input, DiagramKind::Sequence)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), "TC-1");
    assert_eq!(records[0].attribute("actors"), Some(&serde_json::json!(["User"])));
    assert!(generator.prompts.borrow()[0].user().contains("Users log in with a password."));
}

#[test]
fn test_unparsable_synthesis_becomes_descriptive_record() {
    let generator =
        ScriptedGenerator::replying(vec![Ok("I could not produce test cases for this.".to_string())]);
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);
    let input = RawInput::new("story.txt", InputFormat::Text, "Something vague.");

    let records = pipeline
        .build_records_from_source(Some(&credential()), &input, DiagramKind::Sequence)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), "AI_GENERATED_1");
    assert_eq!(records[0].kind(), "unstructured");
    assert_eq!(
        records[0].attribute("raw"),
        Some(&serde_json::json!("I could not produce test cases for this."))
    );
}

#[test]
fn test_prose_without_credential_stays_text() {
    let generator = ScriptedGenerator::default();
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);
    let input = RawInput::new("story.txt", InputFormat::Text, "Checkout calls payments.");

    let records = pipeline
        .build_records_from_source(None, &input, DiagramKind::Architecture)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), "TEXT_1");
    assert_eq!(records[0].kind(), "unstructured");
    assert_eq!(generator.calls(), 0);
}

#[test]
fn test_enrichment_keeps_every_original_id() {
    let generator = ScriptedGenerator::replying(vec![Ok(
        "[{\"id\": \"A\", \"name\": \"Alpha\", \"type\": \"service\", \"attributes\": {\"layer\": \"application\"}, \"relations\": [{\"target\": \"NEW_cache\", \"type\": \"uses\", \"reason\": \"sessions\"}]},\
          {\"id\": \"NEW_cache\", \"name\": \"Cache\", \"type\": \"cache\"}]"
            .to_string(),
    )]);
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let enriched = pipeline.enrich_records(Some(&credential()), &alpha_beta(), DiagramKind::Architecture);

    let ids: Vec<&str> = enriched.iter().map(Record::id).collect();
    assert_eq!(ids, ["A", "NEW_cache", "B"]);
    assert_eq!(enriched[0].attribute("layer"), Some(&serde_json::json!("application")));
    assert_eq!(enriched[0].relations()[0].reason(), Some("sessions"));
}

#[test]
fn test_enrichment_recovers_from_bad_output() {
    let generator = ScriptedGenerator::replying(vec![
        Ok("Sorry, I cannot help with that.".to_string()),
        Err(GenerationError::Unavailable("connection reset".to_string())),
    ]);
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let enriched = pipeline.enrich_records(Some(&credential()), &alpha_beta(), DiagramKind::Architecture);
    let ids: Vec<&str> = enriched.iter().map(Record::id).collect();
    assert_eq!(ids, ["A", "B", "AI_ENRICH_FALLBACK"]);
    assert_eq!(enriched[2].kind(), "note");

    let unchanged = pipeline.enrich_records(Some(&credential()), &alpha_beta(), DiagramKind::Architecture);
    assert_eq!(unchanged, alpha_beta());

    let skipped = pipeline.enrich_records(None, &alpha_beta(), DiagramKind::Architecture);
    assert_eq!(skipped, alpha_beta());
    assert_eq!(generator.calls(), 2);
}

#[test]
fn test_envelope_serializes_for_callers() {
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::new(dir.path(), "cmdb_diagram");
    let generator = ScriptedGenerator::replying(vec![fenced(REPAIRED)]);
    let renderer = ScriptedRenderer::default();
    let pipeline = Pipeline::new(config(2), &generator, &renderer);

    let envelope = pipeline.generate_diagram(
        Some(&credential()),
        &alpha_beta(),
        DiagramKind::Architecture,
        &target,
    );
    let value = serde_json::to_value(&envelope).unwrap();

    assert_eq!(value["success"], true);
    assert_eq!(value["error"], serde_json::Value::Null);
    assert_eq!(value["artifact"]["image_path"], "cmdb_diagram.png");
    assert_eq!(value["components"], serde_json::json!(["Alpha", "Beta"]));
    assert_eq!(
        value["relations"],
        serde_json::json!([{"source": "A", "target": "B", "label": "depends_on"}])
    );
}
