//! The macro-definition registry: maps a macro name to its template for the
//! duration of one compilation.
//!
//! This is distinct from [`crate::environment::Environment`]'s
//! `module_macros`/`exported_macros` sets, which only track *names* for
//! import-resolution bookkeeping (spec §3). The registry holds the actual
//! expansion bodies the expander substitutes into.

use std::collections::HashMap;

use crate::macros::types::MacroTemplate;

#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    defs: HashMap<String, MacroTemplate>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a macro definition. A later `defmacro` for the
    /// same name shadows an earlier one, matching ordinary top-level
    /// definition semantics elsewhere in the language.
    pub fn define(&mut self, template: MacroTemplate) {
        self.defs.insert(template.name.clone(), template);
    }

    pub fn lookup(&self, name: &str) -> Option<&MacroTemplate> {
        self.defs.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::types::MacroParams;
    use crate::sexpr::{SExpr, Span};

    fn template(name: &str) -> MacroTemplate {
        MacroTemplate {
            name: name.to_string(),
            params: MacroParams::default(),
            body: SExpr::symbol("x", Span::default()),
        }
    }

    #[test]
    fn later_definition_shadows_earlier() {
        let mut reg = MacroRegistry::new();
        reg.define(template("m"));
        let mut replacement = template("m");
        replacement.params = MacroParams { required: vec!["y".into()], rest: None };
        reg.define(replacement);
        assert_eq!(reg.lookup("m").unwrap().params.required, vec!["y".to_string()]);
    }

    #[test]
    fn unknown_name_is_not_defined() {
        let reg = MacroRegistry::new();
        assert!(!reg.is_defined("nope"));
    }
}
