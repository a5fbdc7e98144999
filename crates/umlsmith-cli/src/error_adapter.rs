//! Error adapter for converting UmlsmithError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI. Input decoding
//! errors that carry a byte offset are rendered with a labeled snippet of the
//! offending input.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};

use umlsmith::{ParseError, UmlsmithError};

/// Adapter for an input error located inside its source text.
pub struct DiagnosticAdapter<'a> {
    err: &'a ParseError,
    src: &'a str,
    offset: usize,
}

impl<'a> DiagnosticAdapter<'a> {
    /// Create a new diagnostic adapter, or `None` if `err` has no location.
    pub fn new(err: &'a ParseError, src: &'a str) -> Option<Self> {
        let offset = err.offset()?.min(src.len());
        Some(Self { err, src, offset })
    }
}

impl fmt::Debug for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticAdapter")
            .field("err", &self.err)
            .field("offset", &self.offset)
            .finish()
    }
}

impl fmt::Display for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.err, f)
    }
}

impl std::error::Error for DiagnosticAdapter<'_> {}

impl MietteDiagnostic for DiagnosticAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("umlsmith::input"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(
            "tabular input must be UTF-8 CSV; convert spreadsheets before loading them",
        ))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let len = self
            .src
            .get(self.offset..)
            .and_then(|rest| rest.chars().next())
            .map_or(0, char::len_utf8);
        let span = SourceSpan::new(self.offset.into(), len);
        Some(Box::new(std::iter::once(LabeledSpan::new_primary_with_span(
            Some("decoding stopped here".to_string()),
            span,
        ))))
    }
}

/// Adapter for [`UmlsmithError`] variants without a source location.
pub struct ErrorAdapter<'a>(pub &'a UmlsmithError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            UmlsmithError::Io(_) => "umlsmith::io",
            UmlsmithError::Parse { .. } => "umlsmith::input",
            UmlsmithError::Config(_) => "umlsmith::config",
            UmlsmithError::Syntax(_) => "umlsmith::render::syntax",
            UmlsmithError::Environment(_) => "umlsmith::environment",
            UmlsmithError::GenerationFormat(_) => "umlsmith::generation::format",
            UmlsmithError::NoRecords => "umlsmith::input::empty",
            UmlsmithError::Serialize(_) => "umlsmith::serialize",
            UmlsmithError::Generation(_) => "umlsmith::generation",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            UmlsmithError::Config(_) => {
                "check the [generator], [renderer] and [repair] sections of the configuration file"
            }
            UmlsmithError::Syntax(_) => {
                "the generated diagram, its repairs and the fallback were all rejected; inspect the .puml file in the output directory"
            }
            UmlsmithError::Environment(_) => {
                "make sure the renderer command runs and that --api-key or OPENAI_API_KEY is set"
            }
            UmlsmithError::NoRecords => "the input produced no records; check that it is not empty",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        None
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}

/// A reportable error that can be rendered by miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// An input error with source location information.
    Diagnostic(DiagnosticAdapter<'a>),
    /// A simple error without source location.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Diagnostic(d) => fmt::Display::fmt(d, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Diagnostic(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Diagnostic(d) => d.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Diagnostic(d) => d.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

/// Convert an [`UmlsmithError`] into a list of reportable errors.
///
/// A located [`UmlsmithError::Parse`] becomes a [`Reportable::Diagnostic`];
/// everything else is a single [`Reportable::Error`].
pub fn to_reportables(err: &UmlsmithError) -> Vec<Reportable<'_>> {
    if let UmlsmithError::Parse {
        err: parse_err,
        src: Some(src),
    } = err
    {
        if let Some(adapter) = DiagnosticAdapter::new(parse_err, src) {
            return vec![Reportable::Diagnostic(adapter)];
        }
    }
    vec![Reportable::Error(ErrorAdapter(err))]
}
