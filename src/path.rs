//! A canonical, type-safe representation of a dotted access chain.
//!
//! Produced by the syntax transformer and the lowerer whenever a `Symbol`'s
//! embedded dots (spec §3) are split into segments, and reused by host
//! interop (`js-get`, `js-set`, member chains) so both sides of the pipeline
//! agree on what "the path `a.b.c`" means.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DotPath(pub Vec<String>);

impl DotPath {
    pub fn new(segments: Vec<String>) -> Self {
        DotPath(segments)
    }

    /// Parses `a.b.c` into `["a", "b", "c"]`. Returns `None` for a symbol
    /// with no dot, or one with an empty segment (`a..b`, `.a`, `a.`).
    pub fn parse(text: &str) -> Option<Self> {
        if !text.contains('.') {
            return None;
        }
        let segments: Vec<String> = text.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(DotPath(segments))
    }

    pub fn head(&self) -> &str {
        &self.0[0]
    }

    pub fn tail(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_segment_path() {
        let path = DotPath::parse("a.b.c").unwrap();
        assert_eq!(path.head(), "a");
        assert_eq!(path.tail(), ["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn rejects_single_segment_and_empty_segments() {
        assert_eq!(DotPath::parse("a"), None);
        assert_eq!(DotPath::parse("a..b"), None);
        assert_eq!(DotPath::parse(".a"), None);
    }
}
