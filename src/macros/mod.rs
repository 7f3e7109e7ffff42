//! The hygienic macro expander and its supporting registry (spec §4.3).

pub mod expander;
pub mod registry;
pub mod types;

pub use expander::{expand_form, expand_program};
pub use registry::MacroRegistry;
pub use types::{MacroParams, MacroTemplate, MAX_MACRO_RECURSION_DEPTH};
