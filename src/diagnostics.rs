//! Diagnostic rendering and the `HQL_DEBUG` verbosity switch (spec §6).
//!
//! `HQL_DEBUG=1` is the only environment variable that influences behavior;
//! it does not change semantics, only how much context gets printed when an
//! [`HqlError`] is reported.

use miette::Report;

use crate::errors::{DiagnosticInfo, ErrorKind, HqlError, Phase, SourceInfo};

/// A reusable per-phase error factory, so call sites never construct
/// `HqlError` by hand — they go through the phase's context, which already
/// knows the source text and which phase it's in.
pub struct PhaseContext {
    pub phase: Phase,
    source_name: String,
    source_text: String,
}

impl PhaseContext {
    pub fn new(phase: Phase, source_name: impl Into<String>, source_text: impl Into<String>) -> Self {
        PhaseContext {
            phase,
            source_name: source_name.into(),
            source_text: source_text.into(),
        }
    }

    pub fn error(&self, kind: ErrorKind, span: crate::sexpr::Span) -> HqlError {
        HqlError {
            source_info: SourceInfo::new(self.source_name.clone(), self.source_text.clone(), span),
            diagnostic_info: DiagnosticInfo::default(),
            kind,
        }
    }
}

/// Returns whether verbose diagnostics are enabled via `HQL_DEBUG=1`.
pub fn debug_enabled() -> bool {
    std::env::var("HQL_DEBUG").map(|v| v == "1").unwrap_or(false)
}

/// Renders an error to a string for CLI/test output. With `HQL_DEBUG=1` this
/// includes the full miette multi-line report (source snippet, label, help,
/// and cause chain); otherwise a single-line summary.
pub fn render_error(error: &HqlError) -> String {
    if debug_enabled() {
        format!("{:?}", Report::new(error.clone()))
    } else {
        format!("{}: {}", error.phase(), error)
    }
}
