//! Class name matcher

use super::{compile_wildcard, literal_len, split_qualifiers};
use crate::error::{FilterParseError, ParseResult};
use ilweave_model::VisibilityLevel;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static MATCH_ALL: Lazy<ClassMatcher> =
    Lazy::new(|| ClassMatcher::parse("*").expect("wildcard-only class pattern"));

/// Visibility qualifiers recognized on class patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassQualifier {
    Public,
    NonPublic,
}

/// Compiled matcher for class names, with optional visibility qualifiers.
///
/// Filter string grammar: `[public]Name*`, `[nonpublic]*Repository`,
/// `Plain?Name`. An unqualified pattern matches classes of any visibility.
#[derive(Debug, Clone)]
pub struct ClassMatcher {
    pattern: String,
    name_regex: Regex,
    qualifiers: Vec<ClassQualifier>,
    star_count: usize,
    question_count: usize,
    literal_chars: usize,
}

impl ClassMatcher {
    /// Parse a class filter string.
    pub fn parse(filter: &str) -> ParseResult<Self> {
        let (raw_qualifiers, name) = split_qualifiers(filter)?;
        let mut qualifiers = Vec::new();
        for q in &raw_qualifiers {
            match q.as_str() {
                "public" => qualifiers.push(ClassQualifier::Public),
                "nonpublic" | "internal" => qualifiers.push(ClassQualifier::NonPublic),
                other => {
                    return Err(FilterParseError::UnknownQualifier {
                        qualifier: other.to_string(),
                        pattern: filter.to_string(),
                    })
                }
            }
        }
        Ok(Self {
            pattern: filter.to_string(),
            name_regex: compile_wildcard(name)?,
            qualifiers,
            star_count: name.matches('*').count(),
            question_count: name.matches('?').count(),
            literal_chars: literal_len(name),
        })
    }

    /// A matcher accepting every class.
    pub fn match_all() -> Self {
        MATCH_ALL.clone()
    }

    /// The original filter string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a class with the given name and visibility matches.
    pub fn is_matching(&self, class_name: &str, visibility: VisibilityLevel) -> bool {
        if !self.name_regex.is_match(class_name) {
            return false;
        }
        if self.qualifiers.is_empty() {
            return true;
        }
        self.qualifiers.iter().any(|q| match q {
            ClassQualifier::Public => visibility == VisibilityLevel::Public,
            ClassQualifier::NonPublic => visibility != VisibilityLevel::Public,
        })
    }

    /// Most-specific-first ordering: star-free patterns beat starred ones,
    /// then fewer `?`, then more literal characters, then more qualifiers.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        (self.star_count > 0)
            .cmp(&(other.star_count > 0))
            .then_with(|| self.question_count.cmp(&other.question_count))
            .then_with(|| other.literal_chars.cmp(&self.literal_chars))
            .then_with(|| other.qualifiers.len().cmp(&self.qualifiers.len()))
    }
}
