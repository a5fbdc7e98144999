//! Render-validate-repair state machine.
//!
//! # Overview
//!
//! A candidate diagram moves through these states:
//!
//! - `Candidate` - render it. Success is terminal (`Accepted`). A syntax
//!   error moves to `Repairing` while the budget lasts, otherwise to
//!   `FallbackCandidate`. An environment error is terminal (`Failed`).
//! - `Repairing` - one generation call whose only input is the invalid source
//!   and the renderer's complaint. Its reply becomes the next `Candidate`.
//! - `FallbackCandidate` - render the deterministic skeleton built from the
//!   records, without any generation call. If that fails too, the syntax
//!   error that led here is reported.
//!
//! Requests without records (refinement) have no fallback: an exhausted
//! budget fails with the last syntax error.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use log::{info, warn};
use umlsmith_core::{kind::DiagramKind, record::Record};
use umlsmith_parser::extract_code;

use crate::{
    config::RepairConfig,
    error::UmlsmithError,
    generate::{Credential, TextGenerator, prompt},
    render::{RenderError, Renderer},
    skeleton::{self, SkeletonCaps},
    target::OutputTarget,
};

/// Fence tag requested from the model and used to extract its code.
pub(crate) const CODE_HINT: &str = "plantuml";

/// A candidate the renderer accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Accepted {
    pub(crate) source: String,
    pub(crate) image: PathBuf,
    pub(crate) fallback: bool,
}

enum State {
    Candidate(String),
    Repairing { source: String, error: String },
    FallbackCandidate { error: String },
    Accepted(Accepted),
    Failed(UmlsmithError),
}

/// Drives one candidate to acceptance or failure.
pub(crate) struct RepairLoop<'a, G, R> {
    generator: &'a G,
    renderer: &'a R,
    credential: Option<&'a Credential>,
    config: &'a RepairConfig,
    kind: DiagramKind,
    target: &'a OutputTarget,
}

impl<'a, G: TextGenerator, R: Renderer> RepairLoop<'a, G, R> {
    pub(crate) fn new(
        generator: &'a G,
        renderer: &'a R,
        credential: Option<&'a Credential>,
        config: &'a RepairConfig,
        kind: DiagramKind,
        target: &'a OutputTarget,
    ) -> Self {
        Self {
            generator,
            renderer,
            credential,
            config,
            kind,
            target,
        }
    }

    /// Runs the state machine from `candidate`.
    ///
    /// `records` enables the skeleton fallback; `None` disables it.
    pub(crate) fn run(
        &self,
        candidate: String,
        records: Option<&[Record]>,
    ) -> Result<Accepted, UmlsmithError> {
        let started = Instant::now();
        let deadline = self.config.max_elapsed();
        let mut repairs = 0;
        let mut state = State::Candidate(candidate);

        loop {
            state = match state {
                State::Candidate(source) => match self.render(&source) {
                    Ok(image) => State::Accepted(Accepted {
                        source,
                        image,
                        fallback: false,
                    }),
                    Err(RenderError::Syntax(error)) => {
                        let out_of_time = deadline.is_some_and(|budget| started.elapsed() >= budget);
                        if repairs < self.config.max_retries() && !out_of_time {
                            State::Repairing { source, error }
                        } else if records.is_some() {
                            if out_of_time {
                                warn!(repairs = repairs; "Repair time budget exhausted, using fallback diagram");
                            } else {
                                warn!(repairs = repairs; "Repair budget exhausted, using fallback diagram");
                            }
                            State::FallbackCandidate { error }
                        } else {
                            State::Failed(UmlsmithError::Syntax(error))
                        }
                    }
                    Err(RenderError::Environment(error)) => {
                        State::Failed(UmlsmithError::Environment(error))
                    }
                },
                State::Repairing { source, error } => {
                    repairs += 1;
                    info!(attempt = repairs, max = self.config.max_retries(); "Requesting diagram repair");
                    let request = prompt::repair_prompt(self.kind, &source, &error);
                    match self.generator.complete(self.credential, &request) {
                        Ok(reply) => State::Candidate(extract_code(&reply, Some(CODE_HINT))),
                        Err(err) => State::Failed(err.into()),
                    }
                }
                State::FallbackCandidate { error } => {
                    let records = records.unwrap_or_default();
                    let caps = SkeletonCaps::new(
                        self.config.fallback_node_cap(),
                        self.config.fallback_edge_cap(),
                    );
                    let source = skeleton::fallback_source(self.kind, records, caps);
                    match self.render(&source) {
                        Ok(image) => State::Accepted(Accepted {
                            source,
                            image,
                            fallback: true,
                        }),
                        Err(RenderError::Syntax(fallback_error)) => {
                            warn!(error = fallback_error.as_str(); "Fallback diagram was rejected");
                            State::Failed(UmlsmithError::Syntax(error))
                        }
                        Err(RenderError::Environment(detail)) => {
                            State::Failed(UmlsmithError::Environment(detail))
                        }
                    }
                }
                State::Accepted(accepted) => {
                    info!(
                        repairs = repairs,
                        fallback = accepted.fallback,
                        elapsed_ms = duration_ms(started.elapsed());
                        "Diagram accepted"
                    );
                    return Ok(accepted);
                }
                State::Failed(err) => {
                    warn!(repairs = repairs, error:% = err; "Diagram generation failed");
                    return Err(err);
                }
            };
        }
    }

    fn render(&self, source: &str) -> Result<PathBuf, RenderError> {
        self.renderer
            .render(source, self.target.dir(), self.target.filename_base())
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        path::Path,
    };

    use umlsmith_core::record::Relation;

    use super::*;
    use crate::generate::{GenerationError, Prompt};

    struct ScriptedGenerator {
        replies: RefCell<VecDeque<Result<String, GenerationError>>>,
        calls: Cell<usize>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn complete(
            &self,
            _credential: Option<&Credential>,
            _prompt: &Prompt,
        ) -> Result<String, GenerationError> {
            self.calls.set(self.calls.get() + 1);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(GenerationError::EmptyResponse))
        }
    }

    /// Accepts sources containing `@enduml` and rejects everything else.
    struct StrictRenderer {
        rendered: RefCell<Vec<String>>,
        reject_all: bool,
    }

    impl StrictRenderer {
        fn new() -> Self {
            Self {
                rendered: RefCell::new(Vec::new()),
                reject_all: false,
            }
        }
    }

    impl Renderer for StrictRenderer {
        fn render(
            &self,
            source: &str,
            output_dir: &Path,
            filename_base: &str,
        ) -> Result<PathBuf, RenderError> {
            self.rendered.borrow_mut().push(source.to_string());
            if self.reject_all || !source.contains("@enduml") {
                return Err(RenderError::Syntax(format!(
                    "Error line {} in file",
                    self.rendered.borrow().len()
                )));
            }
            Ok(output_dir.join(format!("{filename_base}.png")))
        }
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new("A", "service")
                .with_name("Alpha")
                .with_relation(Relation::depends_on("B")),
            Record::new("B", "database").with_name("Beta"),
        ]
    }

    fn target() -> OutputTarget {
        OutputTarget::new("/out", "diagram")
    }

    #[test]
    fn test_accepts_valid_candidate_without_repair() {
        let generator = ScriptedGenerator::new(Vec::new());
        let renderer = StrictRenderer::new();
        let config = RepairConfig::default();
        let target = target();
        let repair = RepairLoop::new(&generator, &renderer, None, &config, DiagramKind::Sequence, &target);

        let accepted = repair
            .run("@startuml\nA -> B\n@enduml".to_string(), Some(&records()))
            .unwrap();

        assert!(!accepted.fallback);
        assert_eq!(accepted.image, PathBuf::from("/out/diagram.png"));
        assert_eq!(generator.calls.get(), 0);
    }

    #[test]
    fn test_repair_reply_becomes_candidate() {
        let generator = ScriptedGenerator::new(vec![Ok(
            "Fixed:\n```plantuml\n@startuml\nA -> B : fixed\n@enduml\n```".to_string(),
        )]);
        let renderer = StrictRenderer::new();
        let config = RepairConfig::default();
        let target = target();
        let repair = RepairLoop::new(&generator, &renderer, None, &config, DiagramKind::Sequence, &target);

        let accepted = repair.run("@startuml\nA -> B".to_string(), None).unwrap();

        assert_eq!(accepted.source, "@startuml\nA -> B : fixed\n@enduml");
        assert_eq!(generator.calls.get(), 1);
    }

    #[test]
    fn test_exhausted_budget_uses_fallback() {
        let generator = ScriptedGenerator::new(vec![Ok("still broken".into()), Ok("nope".into())]);
        let renderer = StrictRenderer::new();
        let config = RepairConfig::new(2, None, 10, 20);
        let target = target();
        let repair = RepairLoop::new(&generator, &renderer, None, &config, DiagramKind::Architecture, &target);

        let accepted = repair.run("broken".to_string(), Some(&records())).unwrap();

        assert!(accepted.fallback);
        assert!(accepted.source.contains("component \"Alpha\" as A"));
        assert_eq!(generator.calls.get(), 2);
        assert_eq!(renderer.rendered.borrow().len(), 4);
    }

    #[test]
    fn test_without_records_exhausted_budget_fails() {
        let generator = ScriptedGenerator::new(vec![Ok("still broken".into())]);
        let renderer = StrictRenderer::new();
        let config = RepairConfig::new(1, None, 10, 20);
        let target = target();
        let repair = RepairLoop::new(&generator, &renderer, None, &config, DiagramKind::Sequence, &target);

        let err = repair.run("broken".to_string(), None).unwrap_err();

        match err {
            UmlsmithError::Syntax(detail) => assert_eq!(detail, "Error line 2 in file"),
            other => panic!("Expected syntax error, got {other:?}"),
        }
        assert_eq!(generator.calls.get(), 1);
    }

    #[test]
    fn test_rejected_fallback_reports_candidate_error() {
        let generator = ScriptedGenerator::new(vec![Ok("still broken".into())]);
        let renderer = StrictRenderer {
            rendered: RefCell::new(Vec::new()),
            reject_all: true,
        };
        let config = RepairConfig::new(1, None, 10, 20);
        let target = target();
        let repair = RepairLoop::new(&generator, &renderer, None, &config, DiagramKind::Sequence, &target);

        let err = repair.run("broken".to_string(), Some(&records())).unwrap_err();

        match err {
            UmlsmithError::Syntax(detail) => assert_eq!(detail, "Error line 2 in file"),
            other => panic!("Expected syntax error, got {other:?}"),
        }
        assert_eq!(renderer.rendered.borrow().len(), 3);
    }

    #[test]
    fn test_generation_failure_during_repair_is_environment() {
        let generator = ScriptedGenerator::new(vec![Err(GenerationError::Unavailable(
            "connection refused".into(),
        ))]);
        let renderer = StrictRenderer::new();
        let config = RepairConfig::default();
        let target = target();
        let repair = RepairLoop::new(&generator, &renderer, None, &config, DiagramKind::Sequence, &target);

        let err = repair.run("broken".to_string(), Some(&records())).unwrap_err();

        assert!(matches!(err, UmlsmithError::Environment(_)));
        assert_eq!(generator.calls.get(), 1);
    }

    #[test]
    fn test_zero_time_budget_skips_repair() {
        let generator = ScriptedGenerator::new(Vec::new());
        let renderer = StrictRenderer::new();
        let config = RepairConfig::new(3, Some(Duration::ZERO), 10, 20);
        let target = target();
        let repair = RepairLoop::new(&generator, &renderer, None, &config, DiagramKind::Sequence, &target);

        let accepted = repair.run("broken".to_string(), Some(&records())).unwrap();

        assert!(accepted.fallback);
        assert_eq!(generator.calls.get(), 0);
    }
}
