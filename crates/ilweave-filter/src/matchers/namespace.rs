//! Namespace pattern matcher

use crate::error::ParseResult;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

static MATCH_ALL: Lazy<NamespaceMatcher> =
    Lazy::new(|| NamespaceMatcher::parse("..").expect("multi-wildcard namespace pattern"));

/// One segment of a namespace pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// A literal segment with no wildcards.
    Literal(String),
    /// A segment containing `*`/`?` wildcards, matching within one segment.
    Wildcard(String),
    /// An empty segment (`..` in the pattern): matches zero or more whole
    /// segments.
    Multi,
}

impl Segment {
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 0,
            Segment::Wildcard(_) => 1,
            Segment::Multi => 2,
        }
    }
}

/// Compiled matcher for namespace paths.
///
/// Pattern segments are separated by `.`; `*` within a segment matches any
/// run of characters except the separator, and an empty segment (written
/// `..`) matches zero or more whole segments, giving a multi-level
/// wildcard: `My..Repositories` matches `My.Repositories`,
/// `My.Data.Repositories` and deeper.
#[derive(Debug, Clone)]
pub struct NamespaceMatcher {
    pattern: String,
    regex: Regex,
    segments: Vec<Segment>,
}

impl NamespaceMatcher {
    /// Parse a namespace pattern.
    pub fn parse(pattern: &str) -> ParseResult<Self> {
        let mut segments = Vec::new();
        for raw in pattern.split('.') {
            if raw.is_empty() {
                // Collapse runs of empty segments into one multi wildcard.
                if segments.last() != Some(&Segment::Multi) {
                    segments.push(Segment::Multi);
                }
            } else if raw.contains('*') || raw.contains('?') {
                segments.push(Segment::Wildcard(raw.to_string()));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }
        let regex = build_regex(&segments)?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            segments,
        })
    }

    /// A matcher accepting every namespace, including the empty one.
    pub fn match_all() -> Self {
        MATCH_ALL.clone()
    }

    /// The original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the namespace path matches. Case-insensitive.
    pub fn is_matching(&self, namespace: &str) -> bool {
        self.regex.is_match(namespace)
    }

    /// Most-specific-first ordering: at each position a present segment
    /// beats a wildcarded one; ties break toward the pattern with more
    /// segments.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            match a.rank().cmp(&b.rank()) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        other.segments.len().cmp(&self.segments.len())
    }
}

/// Translate segments to an anchored case-insensitive regex.
fn build_regex(segments: &[Segment]) -> ParseResult<Regex> {
    // A pattern that is nothing but the multi wildcard matches anything.
    if segments.iter().all(|s| *s == Segment::Multi) {
        return Ok(RegexBuilder::new("^.*$").case_insensitive(true).build()?);
    }

    let mut source = String::from("^");
    let mut need_separator = false;
    let mut pending_multi = false;
    for segment in segments {
        match segment {
            Segment::Multi => {
                if need_separator {
                    // Zero or more additional ".seg" runs after the
                    // previous segment.
                    source.push_str("(?:\\.[^.]+)*");
                } else {
                    // Leading multi: zero or more "seg." runs before the
                    // next segment.
                    pending_multi = true;
                }
            }
            Segment::Literal(text) | Segment::Wildcard(text) => {
                if pending_multi {
                    source.push_str("(?:[^.]+\\.)*");
                    pending_multi = false;
                } else if need_separator {
                    source.push_str("\\.");
                }
                for c in text.chars() {
                    match c {
                        '*' => source.push_str("[^.]*"),
                        '?' => source.push_str("[^.]"),
                        other => source.push_str(&regex::escape(&other.to_string())),
                    }
                }
                need_separator = true;
            }
        }
    }
    source.push('$');
    Ok(RegexBuilder::new(&source).case_insensitive(true).build()?)
}
