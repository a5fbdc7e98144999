//! umlsmith CLI library
//!
//! This module contains the command-line logic: it loads configuration, reads
//! input files and maps each subcommand onto one pipeline entry point.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command, GenerateArgs, NormalizeArgs, RefineArgs, TargetArgs};

use std::{
    fs,
    io::{self, Write as _},
    path::Path,
};

use log::{info, warn};
use serde::Serialize;

use umlsmith::{
    OutputTarget, ParseError, Pipeline, RawInput, UmlsmithError,
    artifact::ResultEnvelope,
    generate::{Credential, TextGenerator},
    kind::DiagramKind,
    record::Record,
    render::Renderer,
};

/// Run the umlsmith CLI application
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `UmlsmithError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Undecodable input
/// - A failed result envelope, after the envelope has been written
pub fn run(args: &Args) -> Result<(), UmlsmithError> {
    let app_config = config::load_config(args.config.as_ref())?;
    let pipeline = Pipeline::from_config(app_config)?;
    let credential = args.api_key.as_ref();

    match &args.command {
        Command::Normalize(normalize) => {
            info!(input:? = normalize.input, kind:% = normalize.kind; "Normalizing input");
            let input = read_input(&normalize.input)?;
            let records = pipeline.build_records_from_source(credential, &input, normalize.kind)?;
            emit(&records, normalize.output.as_deref())?;
            info!(records = records.len(); "Records written");
            Ok(())
        }
        Command::Generate(generate) => {
            info!(input:? = generate.input, kind:% = generate.kind; "Generating diagram");
            let records = load_records(&pipeline, credential, generate)?;
            let records = if generate.enrich {
                pipeline.enrich_records(credential, &records, generate.kind)
            } else {
                records
            };

            let target = output_target(&generate.target, generate.kind);
            let envelope = pipeline.generate_diagram(credential, &records, generate.kind, &target);
            finish(&envelope, generate.output.as_deref())
        }
        Command::Refine(refine) => {
            info!(source:? = refine.source, kind:% = refine.kind; "Refining diagram");
            let prior = fs::read_to_string(&refine.source)?;

            let target = output_target(&refine.target, refine.kind);
            let envelope =
                pipeline.refine_diagram(credential, &prior, &refine.message, refine.kind, &target);
            finish(&envelope, refine.output.as_deref())
        }
    }
}

/// Reads an input file, keeping a lossy copy of undecodable text for diagnostics.
fn read_input(path: &Path) -> Result<RawInput, UmlsmithError> {
    match RawInput::from_path(path) {
        Ok(input) => Ok(input),
        Err(err @ ParseError::Encoding { .. }) => {
            let lossy = String::from_utf8_lossy(&fs::read(path)?).into_owned();
            Err(UmlsmithError::new_parse_error(err, lossy))
        }
        Err(err) => Err(err.into()),
    }
}

fn load_records<G, R>(
    pipeline: &Pipeline<G, R>,
    credential: Option<&Credential>,
    generate: &GenerateArgs,
) -> Result<Vec<Record>, UmlsmithError>
where
    G: TextGenerator,
    R: Renderer,
{
    if generate.records {
        let text = fs::read_to_string(&generate.input)?;
        return Ok(serde_json::from_str(&text)?);
    }
    let input = read_input(&generate.input)?;
    pipeline.build_records_from_source(credential, &input, generate.kind)
}

fn output_target(target: &TargetArgs, kind: DiagramKind) -> OutputTarget {
    let stem = target
        .name
        .as_deref()
        .unwrap_or_else(|| kind.default_filename_stem());
    if target.unique {
        OutputTarget::unique(target.out_dir.clone(), stem)
    } else {
        OutputTarget::new(target.out_dir.clone(), stem)
    }
}

/// Writes the envelope and turns a failed one into an error.
fn finish(envelope: &ResultEnvelope, output: Option<&Path>) -> Result<(), UmlsmithError> {
    emit(envelope, output)?;
    match envelope.error() {
        Some(error) => {
            warn!(error; "Diagram generation failed");
            Err(UmlsmithError::Generation(error.to_string()))
        }
        None => {
            if let Some(artifact) = envelope.artifact() {
                info!(image:? = artifact.image_path(); "Diagram generated");
            }
            Ok(())
        }
    }
}

/// Serializes `value` as pretty JSON to `output`, or to stdout.
fn emit<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<(), UmlsmithError> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, format!("{json}\n"))?;
            info!(output:? = path; "Wrote JSON output");
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}
