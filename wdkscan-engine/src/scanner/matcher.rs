//! Window matchers
//!
//! A matcher decides whether a fixed-width window is a candidate. The
//! built-in matchers are byte-statistics heuristics: they say a window does
//! not look like padding, nothing more. None of them validates a window
//! against any real record schema.

use serde::{Deserialize, Serialize};

/// Predicate applied to each window
pub trait Matcher {
    fn matches(&self, window: &[u8]) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&[u8]) -> bool,
{
    fn matches(&self, window: &[u8]) -> bool {
        self(window)
    }
}

/// Accepts windows whose bytes are not all identical
///
/// All-zero windows are a special case of identical bytes, so they are
/// rejected too. This is the default, low-confidence heuristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonUniform;

impl Matcher for NonUniform {
    fn matches(&self, window: &[u8]) -> bool {
        match window.split_first() {
            Some((first, rest)) => rest.iter().any(|b| b != first),
            None => false,
        }
    }
}

/// Accepts windows containing at least one non-zero byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonZero;

impl Matcher for NonZero {
    fn matches(&self, window: &[u8]) -> bool {
        window.iter().any(|&b| b != 0)
    }
}

/// Accepts windows holding at least `n` distinct byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinDistinct(pub u16);

impl Matcher for MinDistinct {
    fn matches(&self, window: &[u8]) -> bool {
        let mut seen = [false; 256];
        let mut distinct = 0u16;
        for &b in window {
            if !seen[b as usize] {
                seen[b as usize] = true;
                distinct += 1;
                if distinct >= self.0 {
                    return true;
                }
            }
        }
        // An empty window never satisfies even MinDistinct(0)
        self.0 == 0 && !window.is_empty()
    }
}

/// Selectable built-in matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "n")]
pub enum MatcherKind {
    NonUniform,
    NonZero,
    MinDistinct(u16),
}

impl Default for MatcherKind {
    fn default() -> Self {
        MatcherKind::NonUniform
    }
}

impl Matcher for MatcherKind {
    fn matches(&self, window: &[u8]) -> bool {
        match *self {
            MatcherKind::NonUniform => NonUniform.matches(window),
            MatcherKind::NonZero => NonZero.matches(window),
            MatcherKind::MinDistinct(n) => MinDistinct(n).matches(window),
        }
    }
}

impl std::fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatcherKind::NonUniform => f.write_str("non-uniform"),
            MatcherKind::NonZero => f.write_str("non-zero"),
            MatcherKind::MinDistinct(n) => write!(f, "min-distinct({})", n),
        }
    }
}
