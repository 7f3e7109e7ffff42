//! The unified error type for every phase of the pipeline (spec §7).
//!
//! `HqlError` is a single concrete struct, not an error-per-phase enum of
//! types: `kind` carries what went wrong, `source_info` carries where, and
//! `diagnostic_info` carries how to help and (optionally) a cause chain.
//! Rendering goes through `miette`, matching the rest of the pipeline's
//! reliance on it for diagnostics rather than a hand-rolled formatter.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

use crate::sexpr::Span;

/// Which pipeline phase raised the error. Mirrors spec §2's stage list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SyntaxTransform,
    ImportResolution,
    MacroExpansion,
    Lowering,
    PurityCheck,
    CodeGen,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::SyntaxTransform => "syntax transform",
            Phase::ImportResolution => "import resolution",
            Phase::MacroExpansion => "macro expansion",
            Phase::Lowering => "lowering",
            Phase::PurityCheck => "purity check",
            Phase::CodeGen => "code generation",
        };
        write!(f, "{s}")
    }
}

/// The six error kinds from spec §7. Each carries the data needed to render
/// a precise message; the offending form's text and expected/received
/// shapes live in the message fields rather than a separate struct, since
/// every kind's rendering needs is different (this mirrors the teacher's
/// `ErrorKind` in its own `errors.rs`).
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Text → SExpr failed.
    Parse { message: String },
    /// Missing file, cycle, or bad import form.
    Import { message: String },
    /// Expansion failure or depth exceeded.
    Macro { message: String, macro_name: Option<String> },
    /// Shape violation: wrong arity, wrong node kind, unsupported type,
    /// placeholder without default, unknown named argument, mixed
    /// positional/named, duplicate rest parameter.
    Validation {
        message: String,
        expected: Option<String>,
        found: Option<String>,
    },
    /// Lowering failure not attributable to shape: null sub-result, unknown
    /// head symbol in a context requiring one.
    Transform { message: String },
    /// IR construction or printing failed.
    CodeGen { message: String },
}

impl ErrorKind {
    pub fn phase(&self) -> Phase {
        match self {
            ErrorKind::Parse { .. } => Phase::SyntaxTransform,
            ErrorKind::Import { .. } => Phase::ImportResolution,
            ErrorKind::Macro { .. } => Phase::MacroExpansion,
            ErrorKind::Validation { .. } => Phase::Lowering,
            ErrorKind::Transform { .. } => Phase::Lowering,
            ErrorKind::CodeGen { .. } => Phase::CodeGen,
        }
    }

    fn code_suffix(&self) -> &'static str {
        match self {
            ErrorKind::Parse { .. } => "parse_error",
            ErrorKind::Import { .. } => "import_error",
            ErrorKind::Macro { .. } => "macro_error",
            ErrorKind::Validation { .. } => "validation_error",
            ErrorKind::Transform { .. } => "transform_error",
            ErrorKind::CodeGen { .. } => "codegen_error",
        }
    }
}

/// Where the error happened: the source text plus the offending span.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub span: SourceSpan,
}

impl SourceInfo {
    pub fn new(source_name: impl Into<String>, source_text: impl Into<String>, span: Span) -> Self {
        SourceInfo {
            source: Arc::new(NamedSource::new(source_name, source_text.into())),
            span: to_source_span(span),
        }
    }
}

pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::new(span.start.into(), span.end.saturating_sub(span.start))
}

/// Help text, a stable error code, and an optional cause chain.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub cause: Option<Arc<HqlError>>,
}

/// The single error type produced by every phase of the pipeline.
#[derive(Debug, Clone)]
pub struct HqlError {
    pub kind: ErrorKind,
    pub source_info: SourceInfo,
    pub diagnostic_info: DiagnosticInfo,
}

impl HqlError {
    pub fn new(kind: ErrorKind, source_info: SourceInfo) -> Self {
        HqlError {
            kind,
            source_info,
            diagnostic_info: DiagnosticInfo::default(),
        }
    }

    pub fn with_suggestion(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    pub fn with_cause(mut self, cause: HqlError) -> Self {
        self.diagnostic_info.cause = Some(Arc::new(cause));
        self
    }

    pub fn phase(&self) -> Phase {
        self.kind.phase()
    }

    fn error_code(&self) -> String {
        format!("hql::{}", self.kind.code_suffix())
    }

    fn primary_label(&self) -> &'static str {
        match &self.kind {
            ErrorKind::Parse { .. } => "here",
            ErrorKind::Import { .. } => "this import",
            ErrorKind::Macro { .. } => "this macro call",
            ErrorKind::Validation { .. } => "this form",
            ErrorKind::Transform { .. } => "while lowering this",
            ErrorKind::CodeGen { .. } => "while emitting this",
        }
    }
}

impl fmt::Display for HqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse { message } => write!(f, "parse error: {message}"),
            ErrorKind::Import { message } => write!(f, "import error: {message}"),
            ErrorKind::Macro { message, macro_name: Some(name) } => {
                write!(f, "macro error in '{name}': {message}")
            }
            ErrorKind::Macro { message, macro_name: None } => write!(f, "macro error: {message}"),
            ErrorKind::Validation { message, expected, found } => {
                write!(f, "validation error: {message}")?;
                if let (Some(expected), Some(found)) = (expected, found) {
                    write!(f, " (expected {expected}, found {found})")?;
                }
                Ok(())
            }
            ErrorKind::Transform { message } => write!(f, "transform error: {message}"),
            ErrorKind::CodeGen { message } => write!(f, "code generation error: {message}"),
        }
    }
}

impl std::error::Error for HqlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.diagnostic_info
            .cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl Diagnostic for HqlError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.error_code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label().to_string()),
            self.source_info.span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

/// The outcome of compiling one file: the propagation policy from spec §7.
/// If at least one top-level form succeeds, the file is partially
/// successful and carries the failure count plus up to three detailed
/// errors; if every form fails, callers should treat the phase as fatal for
/// that file.
#[derive(Debug, Default)]
pub struct CompileOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<HqlError>,
}

impl<T> CompileOutcome<T> {
    pub fn is_total_failure(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// The first three detailed errors, per spec §7's reporting policy.
    pub fn detailed_failures(&self) -> &[HqlError] {
        &self.failed[..self.failed.len().min(3)]
    }
}
