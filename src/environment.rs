//! The Global Environment (spec §3, §5): the process-wide registry the
//! import resolver and macro expander share.
//!
//! `im::HashMap`/`im::HashSet` back the registries rather than
//! `std::collections` so that [`Environment::snapshot`] is O(1) with
//! structural sharing — the mechanism spec §5 requires for processing
//! independent files concurrently: each worker thread clones a snapshot,
//! does its work against it, and the driver merges results back
//! deterministically by path.

use std::path::{Path, PathBuf};

use im::{HashMap, HashSet};
use sha2::{Digest, Sha256};

use crate::sexpr::{CanonicalSExpr, SExpr};

/// A macro name as it appears in `defmacro`/`macro` forms.
pub type MacroName = String;

/// Memoization key for macro expansion: the form's structural hash paired
/// with the file it was encountered in (spec §4.3: "memoized on (form,
/// file)").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpansionCacheKey {
    file: PathBuf,
    form_hash: [u8; 32],
}

impl ExpansionCacheKey {
    pub fn new(file: &Path, form: &SExpr) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(form.pretty().as_bytes());
        let digest = hasher.finalize();
        let mut form_hash = [0u8; 32];
        form_hash.copy_from_slice(&digest);
        ExpansionCacheKey {
            file: file.to_path_buf(),
            form_hash,
        }
    }
}

/// The process-wide registry described in spec §3.
///
/// Every method that mutates the environment documents, in its own name,
/// which invariant it upholds; nothing outside this module writes to the
/// underlying maps directly (spec §5: "the Environment is mutated only
/// through its own methods").
#[derive(Debug, Clone, Default)]
pub struct Environment {
    module_macros: HashMap<PathBuf, HashSet<MacroName>>,
    exported_macros: HashMap<PathBuf, HashSet<MacroName>>,
    processed_files: HashSet<PathBuf>,
    current_file: Vec<PathBuf>,
    macro_cache: HashMap<ExpansionCacheKey, CanonicalSExpr>,
    gensym_counter: usize,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the macro-expansion cache. Spec §3: "Caches are cleared at the
    /// start of each top-level compilation." The module/exported-macro maps
    /// and processed-file set are *not* cleared here — those persist across
    /// a single compilation's recursive import walk, which is the scope this
    /// environment is created for (spec §3: "created once per compilation").
    pub fn reset_caches(&mut self) {
        self.macro_cache = HashMap::new();
        self.gensym_counter = 0;
    }

    /// Returns a fresh, process-unique suffix for alpha-renaming a macro
    /// template's own bound variables (spec §4.3 hygiene). Each call to a
    /// macro gets its own suffix, so two expansions of the same macro in the
    /// same lexical scope never redeclare the same renamed binder.
    pub fn next_gensym(&mut self) -> usize {
        let n = self.gensym_counter;
        self.gensym_counter += 1;
        n
    }

    /// Pushes a file onto the current-file stack on entry. Must be paired
    /// with [`Environment::pop_current_file`] on every exit path, including
    /// thrown errors (spec §5).
    pub fn push_current_file(&mut self, path: PathBuf) {
        self.current_file.push(path);
    }

    pub fn pop_current_file(&mut self) -> Option<PathBuf> {
        self.current_file.pop()
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.last().map(PathBuf::as_path)
    }

    /// A file already being processed is a cycle (spec §4.2, §5: "recursive
    /// re-entry on the same file path is a fatal cycle").
    pub fn is_being_processed(&self, path: &Path) -> bool {
        self.current_file.iter().any(|f| f == path)
    }

    pub fn mark_processed(&mut self, path: PathBuf) {
        self.processed_files.insert(path);
    }

    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed_files.contains(path)
    }

    pub fn record_module_macro(&mut self, file: &Path, macro_name: MacroName) {
        self.module_macros
            .entry(file.to_path_buf())
            .or_default()
            .insert(macro_name);
    }

    pub fn record_exported_macro(&mut self, file: &Path, macro_name: MacroName) {
        self.exported_macros
            .entry(file.to_path_buf())
            .or_default()
            .insert(macro_name);
    }

    pub fn module_macros(&self, file: &Path) -> HashSet<MacroName> {
        self.module_macros.get(file).cloned().unwrap_or_default()
    }

    pub fn exported_macros(&self, file: &Path) -> HashSet<MacroName> {
        self.exported_macros.get(file).cloned().unwrap_or_default()
    }

    /// Testable property 2 (spec §8): `exportedMacros(f) ⊆ moduleMacros(f)`.
    pub fn exported_macros_subset_of_module_macros(&self, file: &Path) -> bool {
        self.exported_macros(file)
            .iter()
            .all(|m| self.module_macros(file).contains(m))
    }

    /// The macro cache is write-once per key (spec §5): a second write for
    /// the same key is a no-op rather than an overwrite, since expansion is
    /// supposed to be deterministic — a differing second result would
    /// indicate a bug, not a legitimate update.
    pub fn cache_expansion(&mut self, key: ExpansionCacheKey, expanded: CanonicalSExpr) {
        self.macro_cache.entry(key).or_insert(expanded);
    }

    pub fn cached_expansion(&self, key: &ExpansionCacheKey) -> Option<CanonicalSExpr> {
        self.macro_cache.get(key).cloned()
    }

    /// An O(1), structurally-shared clone for handing to a worker thread
    /// (spec §5).
    pub fn snapshot(&self) -> Environment {
        self.clone()
    }

    /// Merges another environment's registries into `self`, keyed by path.
    /// Used by the driver to fold per-thread snapshots back together
    /// deterministically after concurrent file processing (spec §5).
    pub fn merge_from(&mut self, other: &Environment) {
        for (path, macros) in other.module_macros.iter() {
            let entry = self.module_macros.entry(path.clone()).or_default();
            for m in macros.iter() {
                entry.insert(m.clone());
            }
        }
        for (path, macros) in other.exported_macros.iter() {
            let entry = self.exported_macros.entry(path.clone()).or_default();
            for m in macros.iter() {
                entry.insert(m.clone());
            }
        }
        for path in other.processed_files.iter() {
            self.processed_files.insert(path.clone());
        }
    }
}

/// Pushes a file onto the current-file stack for the duration of the guard
/// and pops it on drop — including on an early `?` return from a failing
/// phase, which is exactly the "restored on every exit path" guarantee spec
/// §5 asks for from the current-file stack.
pub struct CurrentFileGuard<'a> {
    env: &'a mut Environment,
}

impl<'a> CurrentFileGuard<'a> {
    pub fn enter(env: &'a mut Environment, path: PathBuf) -> Self {
        env.push_current_file(path);
        CurrentFileGuard { env }
    }
}

impl std::ops::Deref for CurrentFileGuard<'_> {
    type Target = Environment;
    fn deref(&self) -> &Environment {
        self.env
    }
}

impl std::ops::DerefMut for CurrentFileGuard<'_> {
    fn deref_mut(&mut self) -> &mut Environment {
        self.env
    }
}

impl Drop for CurrentFileGuard<'_> {
    fn drop(&mut self) {
        self.env.pop_current_file();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::Span;

    fn dummy_form() -> SExpr {
        SExpr::symbol("foo", Span::default())
    }

    #[test]
    fn exported_macros_subset_invariant_holds_after_recording() {
        let mut env = Environment::new();
        let file = PathBuf::from("a.hql");
        env.record_module_macro(&file, "priv-macro".into());
        env.record_module_macro(&file, "pub-macro".into());
        env.record_exported_macro(&file, "pub-macro".into());
        assert!(env.exported_macros_subset_of_module_macros(&file));
    }

    #[test]
    fn current_file_guard_pops_on_early_return() {
        fn fallible(env: &mut Environment) -> Result<(), ()> {
            let guard = CurrentFileGuard::enter(env, PathBuf::from("dep.hql"));
            let _ = &guard;
            Err(())
        }
        let mut env = Environment::new();
        env.push_current_file(PathBuf::from("root.hql"));
        let _ = fallible(&mut env);
        assert_eq!(env.current_file(), Some(Path::new("root.hql")));
    }

    #[test]
    fn current_file_stack_is_lifo() {
        let mut env = Environment::new();
        env.push_current_file(PathBuf::from("a.hql"));
        env.push_current_file(PathBuf::from("b.hql"));
        assert_eq!(env.current_file(), Some(Path::new("b.hql")));
        assert_eq!(env.pop_current_file(), Some(PathBuf::from("b.hql")));
        assert_eq!(env.current_file(), Some(Path::new("a.hql")));
    }

    #[test]
    fn macro_cache_is_write_once() {
        let mut env = Environment::new();
        let file = PathBuf::from("a.hql");
        let key = ExpansionCacheKey::new(&file, &dummy_form());
        let first = CanonicalSExpr::assume_canonical(SExpr::symbol("first", Span::default()));
        let second = CanonicalSExpr::assume_canonical(SExpr::symbol("second", Span::default()));
        env.cache_expansion(key.clone(), first.clone());
        env.cache_expansion(key.clone(), second);
        assert_eq!(env.cached_expansion(&key), Some(first));
    }

    #[test]
    fn snapshot_and_merge_are_deterministic_by_path() {
        let mut a = Environment::new();
        a.record_module_macro(&PathBuf::from("a.hql"), "m1".into());
        let mut b = Environment::new();
        b.record_module_macro(&PathBuf::from("b.hql"), "m2".into());

        let mut merged = a.snapshot();
        merged.merge_from(&b);
        assert!(merged.module_macros(&PathBuf::from("a.hql")).contains("m1"));
        assert!(merged.module_macros(&PathBuf::from("b.hql")).contains("m2"));
    }
}
