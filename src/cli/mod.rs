//! The CLI (spec §6, external interface): flag parsing and invocation of the
//! core pipeline, plus `HQL_DEBUG`-aware error rendering. Concrete argument
//! parsing and terminal output belong to a binary crate that depends on
//! this one; what lives here is the seam a frontend drives the pipeline
//! through and the shared error-rendering helper every frontend needs.

use crate::errors::HqlError;

/// One resolved unit of work for a frontend to drive: compile a single
/// entry file through the pipeline. A frontend (CLI flags, a build-tool
/// plugin, …) constructs one of these however it likes; the pipeline only
/// needs the two facts below.
pub trait CompileRequest {
    /// Path to the entry `.hql` file.
    fn entry_path(&self) -> &str;
    /// Whether `HQL_DEBUG=1` verbose diagnostics were requested explicitly,
    /// overriding the environment variable (spec §6).
    fn debug(&self) -> bool;
}

/// Renders an [`HqlError`] for terminal output, honoring `HQL_DEBUG` (spec
/// §6) the same way every other frontend would.
pub fn render(error: &HqlError) -> String {
    crate::diagnostics::render_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::PhaseContext;
    use crate::errors::{ErrorKind, Phase};
    use crate::sexpr::Span;

    struct StubRequest {
        path: String,
        debug: bool,
    }

    impl CompileRequest for StubRequest {
        fn entry_path(&self) -> &str {
            &self.path
        }
        fn debug(&self) -> bool {
            self.debug
        }
    }

    #[test]
    fn compile_request_exposes_entry_path_and_debug_flag() {
        let req = StubRequest { path: "main.hql".into(), debug: true };
        assert_eq!(req.entry_path(), "main.hql");
        assert!(req.debug());
    }

    #[test]
    fn render_delegates_to_diagnostics() {
        let ctx = PhaseContext::new(Phase::SyntaxTransform, "main.hql", "(foo)");
        let err = ctx.error(ErrorKind::Parse { message: "bad".into() }, Span::default());
        assert!(render(&err).contains("syntax transform"));
    }
}
