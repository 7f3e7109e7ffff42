//! The Import Resolver (spec §4.2): discovers every reachable `import`/
//! `js-import` form and recursively processes `.hql` dependencies before
//! handing control back to the caller.
//!
//! File IO is injected through [`SourceLoader`] rather than called
//! directly — per spec §1 the file/IO layer is an external collaborator,
//! so this module only depends on the narrow interface it actually needs,
//! which also makes the recursive-cycle and missing-file failure modes
//! trivially testable without touching a real filesystem.

use std::path::{Path, PathBuf};

use crate::diagnostics::PhaseContext;
use crate::environment::{CurrentFileGuard, Environment};
use crate::errors::{ErrorKind, HqlError, Phase};
use crate::sexpr::{CanonicalSExpr, SExpr, Span, Symbol};
use crate::syntax::VECTOR_MARKER;

/// Reads HQL source text given a path. The reference loader
/// ([`FsSourceLoader`]) reads the real filesystem; tests substitute an
/// in-memory map.
pub trait SourceLoader {
    fn load(&self, path: &Path) -> Result<String, HqlError>;
}

/// Reads files from disk, resolving relative paths against the importing
/// file's directory.
pub struct FsSourceLoader;

impl SourceLoader for FsSourceLoader {
    fn load(&self, path: &Path) -> Result<String, HqlError> {
        std::fs::read_to_string(path).map_err(|e| {
            let ctx = PhaseContext::new(Phase::ImportResolution, path.display().to_string(), "");
            ctx.error(
                ErrorKind::Import { message: format!("failed to read '{}': {e}", path.display()) },
                Span::default(),
            )
        })
    }
}

/// One resolved import specifier: the local binding name and, if aliased,
/// the name it was imported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportSpecifier {
    /// The name code in this file should bind to.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An import/js-import form as discovered from canonical syntax, before any
/// dependency has actually been loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportForm {
    /// `(import (%vector a (alias b c)) "path")`
    HqlVector { specifiers: Vec<ImportSpecifier>, path: String, span: Span },
    /// `(import name "path")` — namespace import, values only (spec §6).
    HqlNamespace { name: String, path: String, span: Span },
    /// `(js-import name "path")` / `(js-import "path")` — host namespace.
    JsNamespace { name: Option<String>, path: String, span: Span },
}

impl ImportForm {
    pub fn path(&self) -> &str {
        match self {
            ImportForm::HqlVector { path, .. }
            | ImportForm::HqlNamespace { path, .. }
            | ImportForm::JsNamespace { path, .. } => path,
        }
    }

    pub fn is_hql(&self) -> bool {
        self.path().ends_with(".hql")
    }
}

/// What an already-resolved import path exports, for the macro-vs-value
/// classification the expander needs at use sites.
#[derive(Debug, Clone)]
pub enum ResolvedModule {
    /// A `.hql` module: its exported macro names, recorded in the
    /// `Environment`, plus everything else it exports is a runtime value.
    Hql { exported_macros: Vec<String> },
    /// A non-HQL module: every export is a value (spec §4.2).
    Js,
}

/// Scans a canonicalized top-level program for import forms. Imports are
/// recognized only at the top level, matching every module system's usual
/// surface convention and spec §6's examples, which are all top-level.
pub fn discover_imports(program: &[CanonicalSExpr]) -> Result<Vec<ImportForm>, HqlError> {
    let mut forms = Vec::new();
    for form in program {
        if let Some(import) = try_parse_import(&form.0)? {
            forms.push(import);
        }
    }
    Ok(forms)
}

fn try_parse_import(expr: &SExpr) -> Result<Option<ImportForm>, HqlError> {
    let Some(items) = expr.as_list() else { return Ok(None) };
    let Some(head) = items.first().and_then(SExpr::as_symbol) else { return Ok(None) };

    match head.as_str() {
        "import" if items.len() == 3 => {
            let span = expr.span();
            match &items[1] {
                SExpr::List(inner, _)
                    if inner.first().and_then(SExpr::as_symbol).map(Symbol::as_str) == Some(VECTOR_MARKER) =>
                {
                    let specifiers = parse_vector_specifiers(inner, span)?;
                    let path = expect_string_literal(&items[2], span)?;
                    Ok(Some(ImportForm::HqlVector { specifiers, path, span }))
                }
                SExpr::Symbol(name, _) => {
                    let path = expect_string_literal(&items[2], span)?;
                    Ok(Some(ImportForm::HqlNamespace { name: name.to_string(), path, span }))
                }
                _ => Err(malformed_import(span)),
            }
        }
        "js-import" => {
            let span = expr.span();
            match items.len() {
                2 => {
                    let path = expect_string_literal(&items[1], span)?;
                    Ok(Some(ImportForm::JsNamespace { name: None, path, span }))
                }
                3 => {
                    let name = items[1].as_symbol().map(Symbol::to_string).ok_or_else(|| malformed_import(span))?;
                    let path = expect_string_literal(&items[2], span)?;
                    Ok(Some(ImportForm::JsNamespace { name: Some(name), path, span }))
                }
                _ => Err(malformed_import(span)),
            }
        }
        _ => Ok(None),
    }
}

fn parse_vector_specifiers(inner: &[SExpr], span: Span) -> Result<Vec<ImportSpecifier>, HqlError> {
    inner[1..]
        .iter()
        .map(|item| match item {
            SExpr::Symbol(name, _) => Ok(ImportSpecifier { name: name.to_string(), alias: None }),
            SExpr::List(alias_items, _)
                if alias_items.len() == 3
                    && alias_items[0].as_symbol().map(Symbol::as_str) == Some("alias") =>
            {
                let name = alias_items[1].as_symbol().ok_or_else(|| malformed_import(span))?.to_string();
                let alias = alias_items[2].as_symbol().ok_or_else(|| malformed_import(span))?.to_string();
                Ok(ImportSpecifier { name, alias: Some(alias) })
            }
            _ => Err(malformed_import(span)),
        })
        .collect()
}

fn expect_string_literal(expr: &SExpr, span: Span) -> Result<String, HqlError> {
    match expr {
        SExpr::Literal(crate::sexpr::Literal::String(s), _) => Ok(s.clone()),
        _ => Err(malformed_import(span)),
    }
}

fn malformed_import(span: Span) -> HqlError {
    let ctx = PhaseContext::new(Phase::ImportResolution, "<import>", "");
    ctx.error(ErrorKind::Import { message: "malformed import form".into() }, span)
}

/// Resolves a (possibly relative) import path against the importing file's
/// directory, per spec §4.2: "relative paths are resolved against the
/// current file." The result is normalized (`.`/`..` components collapsed)
/// so that the same dependency reached through different-looking relative
/// paths compares equal for cycle detection and the processed-file set.
pub fn resolve_path(base_dir: &Path, import_path: &str) -> PathBuf {
    let candidate = Path::new(import_path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Recursively resolves and processes every `.hql` dependency reachable
/// from `program`, depositing each one's exported-macro set into `env`, and
/// classifies every import form so the macro expander can later tell
/// macro-position uses from value-position uses.
///
/// `process_dependency` recursively runs parse → canonicalize → resolve →
/// expand on a dependency file and returns its exported macro names; it's
/// injected (rather than this module calling the parser/expander directly)
/// so importer and dependency-processor stay decoupled, matching spec §9's
/// instruction to thread compilation context explicitly rather than reach
/// for a hidden global.
pub fn resolve_imports(
    program: &[CanonicalSExpr],
    current_file: &Path,
    base_dir: &Path,
    env: &mut Environment,
    loader: &dyn SourceLoader,
    process_dependency: &mut dyn FnMut(&Path, &str, &mut Environment, &dyn SourceLoader) -> Result<Vec<String>, HqlError>,
) -> Result<Vec<(ImportForm, ResolvedModule)>, HqlError> {
    let forms = discover_imports(program)?;
    let mut resolved = Vec::with_capacity(forms.len());

    for form in forms {
        let abs_path = resolve_path(base_dir, form.path());

        if !form.is_hql() {
            resolved.push((form, ResolvedModule::Js));
            continue;
        }

        if env.is_being_processed(&abs_path) {
            return Err(cyclic_import(current_file, &abs_path, form.path()));
        }

        if !env.is_processed(&abs_path) {
            let mut guard = CurrentFileGuard::enter(env, abs_path.clone());
            let source = loader.load(&abs_path)?;
            let exported = process_dependency(&abs_path, &source, &mut guard, loader)?;
            for name in &exported {
                guard.record_exported_macro(&abs_path, name.clone());
            }
            guard.mark_processed(abs_path.clone());
        }

        let exported_macros = env.exported_macros(&abs_path).iter().cloned().collect();
        resolved.push((form, ResolvedModule::Hql { exported_macros }));
    }

    Ok(resolved)
}

fn cyclic_import(current_file: &Path, dep: &Path, import_text: &str) -> HqlError {
    let ctx = PhaseContext::new(
        Phase::ImportResolution,
        current_file.display().to_string(),
        "",
    );
    ctx.error(
        ErrorKind::Import {
            message: format!(
                "cyclic import: '{}' is already being processed (imported as \"{}\")",
                dep.display(),
                import_text
            ),
        },
        Span::default(),
    )
    .with_suggestion("break the cycle by moving the shared code into a third module")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap as StdMap;
    use crate::syntax::canonicalize_program;
    use crate::sexpr::Literal;

    struct MapLoader(StdMap<PathBuf, String>);
    impl SourceLoader for MapLoader {
        fn load(&self, path: &Path) -> Result<String, HqlError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| malformed_import(Span::default()))
        }
    }

    fn program_with_import(path: &str) -> Vec<CanonicalSExpr> {
        let span = Span::default();
        let vector = SExpr::list(
            vec![
                SExpr::symbol(VECTOR_MARKER, span),
                SExpr::symbol("a", span),
            ],
            span,
        );
        let form = SExpr::list(
            vec![
                SExpr::symbol("import", span),
                vector,
                SExpr::Literal(Literal::String(path.into()), span),
            ],
            span,
        );
        canonicalize_program(vec![form])
    }

    #[test]
    fn discovers_vector_import() {
        let program = program_with_import("./dep.hql");
        let forms = discover_imports(&program).unwrap();
        assert_eq!(forms.len(), 1);
        match &forms[0] {
            ImportForm::HqlVector { specifiers, path, .. } => {
                assert_eq!(path, "./dep.hql");
                assert_eq!(specifiers[0].name, "a");
            }
            other => panic!("unexpected form: {other:?}"),
        }
    }

    #[test]
    fn cyclic_dependency_is_fatal() {
        let program = program_with_import("./a.hql");
        let mut env = Environment::new();
        let current = PathBuf::from("/root/a.hql");
        env.push_current_file(current.clone());
        // The dependency resolves to itself: already on the stack => cycle.
        env.push_current_file(PathBuf::from("/root/a.hql"));
        let calls = RefCell::new(0);
        let mut process = |_p: &Path, _s: &str, _e: &mut Environment, _l: &dyn SourceLoader| {
            *calls.borrow_mut() += 1;
            Ok(vec![])
        };
        let loader = MapLoader(StdMap::new());
        let result = resolve_imports(&program, &current, Path::new("/root"), &mut env, &loader, &mut process);
        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn hql_dependency_is_processed_once_and_exports_recorded() {
        let program = program_with_import("./dep.hql");
        let mut env = Environment::new();
        let current = PathBuf::from("/root/main.hql");
        let mut loader_map = StdMap::new();
        loader_map.insert(PathBuf::from("/root/dep.hql"), "(defmacro noop (x) x)".to_string());
        let loader = MapLoader(loader_map);
        let calls = RefCell::new(0);
        let mut process = |_p: &Path, _s: &str, _e: &mut Environment, _l: &dyn SourceLoader| {
            *calls.borrow_mut() += 1;
            Ok(vec!["noop".to_string()])
        };
        let resolved = resolve_imports(&program, &current, Path::new("/root"), &mut env, &loader, &mut process).unwrap();
        assert_eq!(*calls.borrow(), 1);
        match &resolved[0].1 {
            ResolvedModule::Hql { exported_macros } => assert_eq!(exported_macros, &["noop".to_string()]),
            ResolvedModule::Js => panic!("expected Hql module"),
        }
        assert!(env.is_processed(Path::new("/root/dep.hql")));
    }
}
