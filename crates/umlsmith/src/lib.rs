//! umlsmith - Model-driven PlantUML generation from test-case and CMDB data.
//!
//! The pipeline normalizes tabular or semi-structured input into records,
//! asks a text-generation service for diagram source, renders it with an
//! external engine, repairs syntax errors with narrowly scoped follow-up
//! calls, falls back to a deterministic skeleton when repair runs out, and
//! reads components and relations back out of whatever was accepted.

pub mod config;
pub mod generate;
pub mod render;

mod error;
mod repair;
mod skeleton;
mod target;

pub use umlsmith_core::{artifact, graph, kind, record};
pub use umlsmith_parser::{InputFormat, ParseError, RawInput, extract_code, extract_graph};

pub use error::UmlsmithError;
pub use target::OutputTarget;

use log::{debug, info, warn};
use serde_json::Value;

use umlsmith_core::{
    artifact::{DiagramArtifact, ResultEnvelope},
    kind::DiagramKind,
    record::Record,
};
use umlsmith_parser::{Normalized, Normalizer, extract_json};

use config::AppConfig;
use generate::{Credential, GenerationError, OpenAiClient, Prompt, TextGenerator, prompt};
use render::{PlantUmlRenderer, Renderer};
use repair::{CODE_HINT, RepairLoop};

/// Longest model reply kept in a recovery record.
const PREVIEW_LIMIT: usize = 500;

/// Id of the record standing in for unparsable synthesis output.
const SYNTHESIS_FALLBACK_ID: &str = "AI_GENERATED_1";

/// Id of the record standing in for unparsable enrichment output.
const ENRICH_FALLBACK_ID: &str = "AI_ENRICH_FALLBACK";

/// Id of the record wrapping prose that could not be synthesized.
const TEXT_FALLBACK_ID: &str = "TEXT_1";

/// Orchestrates generation, rendering, repair and graph extraction.
///
/// Every diagram entry point returns a [`ResultEnvelope`]; no error escapes
/// past it. The credential for the text-generation service is passed to each
/// call and never stored.
///
/// # Examples
///
/// ```rust,no_run
/// use umlsmith::{
///     OutputTarget, Pipeline, RawInput, config::AppConfig, generate::Credential,
///     kind::DiagramKind,
/// };
///
/// let pipeline = Pipeline::from_config(AppConfig::default())
///     .expect("Failed to build pipeline");
/// let credential = Credential::new("sk-...");
///
/// let input = RawInput::from_path("cmdb.csv").expect("Failed to read input");
/// let records = pipeline
///     .build_records_from_source(Some(&credential), &input, DiagramKind::Architecture)
///     .expect("Failed to normalize");
///
/// let target = OutputTarget::unique("static", "cmdb_diagram");
/// let envelope =
///     pipeline.generate_diagram(Some(&credential), &records, DiagramKind::Architecture, &target);
/// println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
/// ```
pub struct Pipeline<G, R> {
    config: AppConfig,
    generator: G,
    renderer: R,
}

impl Pipeline<OpenAiClient, PlantUmlRenderer> {
    /// Builds a pipeline talking to the configured service and engine.
    ///
    /// # Errors
    ///
    /// Returns `UmlsmithError::Config` when the configuration is out of range
    /// and `UmlsmithError::Environment` when the HTTP client cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self, UmlsmithError> {
        config.validate().map_err(UmlsmithError::Config)?;
        let generator = OpenAiClient::new(config.generator())?;
        let renderer = PlantUmlRenderer::new(config.renderer().clone());
        Ok(Self::new(config, generator, renderer))
    }
}

impl<G: TextGenerator, R: Renderer> Pipeline<G, R> {
    /// Creates a pipeline from explicit collaborators.
    ///
    /// # Arguments
    ///
    /// * `config` - Repair budget and fallback caps are read from here
    /// * `generator` - Text-generation service
    /// * `renderer` - Rendering engine adapter
    pub fn new(config: AppConfig, generator: G, renderer: R) -> Self {
        Self {
            config,
            generator,
            renderer,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Turns raw input into records.
    ///
    /// Structured input is normalized directly. Free text is synthesized into
    /// records by the text-generation service when a credential is supplied;
    /// without one, or when the service fails, the text is wrapped as a
    /// single unstructured record.
    ///
    /// # Errors
    ///
    /// Returns `UmlsmithError::Parse` only when the medium cannot be decoded.
    pub fn build_records_from_source(
        &self,
        credential: Option<&Credential>,
        input: &RawInput,
        kind: DiagramKind,
    ) -> Result<Vec<Record>, UmlsmithError> {
        info!(input = input.name(), format:% = input.format(), kind:% = kind; "Building records");
        let normalizer = Normalizer::for_kind(kind);
        let normalized = normalizer
            .normalize(input)
            .map_err(|err| UmlsmithError::new_parse_error(err, input.text()))?;

        let records = match normalized {
            Normalized::Records(records) => records,
            Normalized::Prose(text) => self.synthesize_records(credential, &normalizer, &text, kind),
        };
        info!(records = records.len(); "Records ready");
        Ok(records)
    }

    /// Asks the service to add inferred relations and attributes.
    ///
    /// Never fails: every original id survives, unparsable output adds one
    /// `note` record describing it, and a missing credential or service
    /// failure returns the originals unchanged.
    pub fn enrich_records(
        &self,
        credential: Option<&Credential>,
        records: &[Record],
        kind: DiagramKind,
    ) -> Vec<Record> {
        if records.is_empty() {
            return Vec::new();
        }
        if credential.is_none() {
            info!("No credential supplied, skipping enrichment");
            return records.to_vec();
        }

        let request = match prompt::enrichment_prompt(kind, records) {
            Ok(request) => request,
            Err(err) => {
                warn!(error:% = err; "Failed to build enrichment prompt");
                return records.to_vec();
            }
        };
        let reply = match self.ask(credential, &request) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error:% = err; "Enrichment unavailable, keeping original records");
                return records.to_vec();
            }
        };

        let Some(value) = parse_json_reply(&reply) else {
            warn!(error:% = format_error(&reply); "Enrichment reply was not JSON");
            let mut kept = records.to_vec();
            kept.push(
                Record::new(ENRICH_FALLBACK_ID, "note")
                    .with_name("AI enrichment output")
                    .with_attribute("raw", preview(&reply)),
            );
            return kept;
        };

        let mut enriched = Normalizer::for_kind(kind).normalize_value(value);
        let missing: Vec<Record> = records
            .iter()
            .filter(|original| !enriched.iter().any(|record| record.id() == original.id()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            debug!(missing = missing.len(); "Restoring records dropped by enrichment");
        }
        enriched.extend(missing);

        info!(before = records.len(), after = enriched.len(); "Records enriched");
        enriched
    }

    /// Generates, renders and validates a diagram for `records`.
    ///
    /// Syntax errors go through the repair loop and, once its budget is
    /// spent, the deterministic skeleton. Missing credentials, service
    /// failures and renderer environment failures are reported immediately.
    pub fn generate_diagram(
        &self,
        credential: Option<&Credential>,
        records: &[Record],
        kind: DiagramKind,
        target: &OutputTarget,
    ) -> ResultEnvelope {
        info!(records = records.len(), kind:% = kind, base = target.filename_base(); "Generating diagram");
        self.generate(credential, records, kind, target).into()
    }

    /// Applies a user instruction to existing diagram source.
    ///
    /// The refined candidate goes through the repair loop. There is no record
    /// list, so there is no skeleton fallback.
    pub fn refine_diagram(
        &self,
        credential: Option<&Credential>,
        prior_source: &str,
        instruction: &str,
        kind: DiagramKind,
        target: &OutputTarget,
    ) -> ResultEnvelope {
        info!(kind:% = kind, base = target.filename_base(); "Refining diagram");
        self.refine(credential, prior_source, instruction, kind, target)
            .into()
    }

    fn generate(
        &self,
        credential: Option<&Credential>,
        records: &[Record],
        kind: DiagramKind,
        target: &OutputTarget,
    ) -> Result<DiagramArtifact, UmlsmithError> {
        if records.is_empty() {
            return Err(UmlsmithError::NoRecords);
        }
        let credential = credential.ok_or(GenerationError::MissingCredential)?;

        let request = prompt::generation_prompt(kind, records)?;
        let reply = self.ask(Some(credential), &request)?;
        let candidate = extract_code(&reply, Some(CODE_HINT));

        self.accept(Some(credential), candidate, Some(records), kind, target)
    }

    fn refine(
        &self,
        credential: Option<&Credential>,
        prior_source: &str,
        instruction: &str,
        kind: DiagramKind,
        target: &OutputTarget,
    ) -> Result<DiagramArtifact, UmlsmithError> {
        if prior_source.trim().is_empty() {
            return Err(UmlsmithError::Generation(
                "no prior diagram source was supplied".to_string(),
            ));
        }
        let credential = credential.ok_or(GenerationError::MissingCredential)?;

        let request = prompt::refine_prompt(kind, prior_source, instruction);
        let reply = self.ask(Some(credential), &request)?;
        let candidate = extract_code(&reply, Some(CODE_HINT));

        self.accept(Some(credential), candidate, None, kind, target)
    }

    /// Runs the repair loop and packages the accepted source.
    fn accept(
        &self,
        credential: Option<&Credential>,
        candidate: String,
        records: Option<&[Record]>,
        kind: DiagramKind,
        target: &OutputTarget,
    ) -> Result<DiagramArtifact, UmlsmithError> {
        let repair = RepairLoop::new(
            &self.generator,
            &self.renderer,
            credential,
            self.config.repair(),
            kind,
            target,
        );
        let accepted = repair.run(candidate, records)?;

        let graph = extract_graph(&accepted.source);
        debug!(
            components = graph.components().len(),
            relations = graph.relations().len();
            "Extracted diagram graph"
        );

        Ok(DiagramArtifact::new(
            accepted.source,
            PlantUmlRenderer::source_file_name(target.filename_base()),
            target.relative(&accepted.image),
            graph,
        ))
    }

    fn synthesize_records(
        &self,
        credential: Option<&Credential>,
        normalizer: &Normalizer,
        text: &str,
        kind: DiagramKind,
    ) -> Vec<Record> {
        let unstructured = || vec![Record::unstructured(TEXT_FALLBACK_ID, text)];
        if credential.is_none() {
            info!("No credential supplied, keeping free text as one record");
            return unstructured();
        }

        let reply = match self.ask(credential, &prompt::synthesis_prompt(kind, text)) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error:% = err; "Synthesis unavailable, keeping free text as one record");
                return unstructured();
            }
        };

        let records = parse_json_reply(&reply)
            .map(|value| normalizer.normalize_value(value))
            .unwrap_or_default();
        if records.is_empty() {
            warn!(error:% = format_error(&reply); "Synthesis reply held no records");
            return vec![
                Record::unstructured(SYNTHESIS_FALLBACK_ID, preview(&reply))
                    .with_name("AI generated content"),
            ];
        }
        records
    }

    fn ask(&self, credential: Option<&Credential>, request: &Prompt) -> Result<String, UmlsmithError> {
        self.generator
            .complete(credential, request)
            .map_err(UmlsmithError::from)
    }
}

fn parse_json_reply(reply: &str) -> Option<Value> {
    serde_json::from_str(&extract_json(reply)).ok()
}

fn preview(reply: &str) -> String {
    reply.trim().chars().take(PREVIEW_LIMIT).collect()
}

fn format_error(reply: &str) -> UmlsmithError {
    UmlsmithError::GenerationFormat(format!(
        "expected a JSON array of records, got {} characters of text",
        reply.trim().chars().count()
    ))
}
