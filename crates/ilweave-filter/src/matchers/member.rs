//! Member name matcher

use super::{compile_wildcard, literal_len, split_qualifiers};
use crate::error::{FilterParseError, ParseResult};
use ilweave_model::{MethodSemantics, VisibilityLevel};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static MATCH_ALL: Lazy<MemberMatcher> =
    Lazy::new(|| MemberMatcher::parse("*").expect("wildcard-only member pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisibilityQualifier {
    Public,
    Private,
    Internal,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingQualifier {
    Instance,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindQualifier {
    Method,
    Getter,
    Setter,
    Constructor,
}

/// Compiled matcher for member (method) names.
///
/// Qualifiers fall into three independent axes: visibility
/// (`public|private|internal|protected`), binding (`instance|static`) and
/// kind (`method|get|set|constructor`). An axis with no qualifiers matches
/// everything on that axis; within an axis, qualifiers are alternatives.
#[derive(Debug, Clone)]
pub struct MemberMatcher {
    pattern: String,
    name_regex: Regex,
    visibility: Vec<VisibilityQualifier>,
    binding: Vec<BindingQualifier>,
    kind: Vec<KindQualifier>,
    star_count: usize,
    question_count: usize,
    literal_chars: usize,
    qualifier_count: usize,
}

impl MemberMatcher {
    /// Parse a member filter string such as `[public|method]Get*`.
    pub fn parse(filter: &str) -> ParseResult<Self> {
        let (raw_qualifiers, name) = split_qualifiers(filter)?;
        let mut visibility = Vec::new();
        let mut binding = Vec::new();
        let mut kind = Vec::new();
        for q in &raw_qualifiers {
            match q.as_str() {
                "public" => visibility.push(VisibilityQualifier::Public),
                "private" => visibility.push(VisibilityQualifier::Private),
                "internal" => visibility.push(VisibilityQualifier::Internal),
                "protected" => visibility.push(VisibilityQualifier::Protected),
                "instance" => binding.push(BindingQualifier::Instance),
                "static" => binding.push(BindingQualifier::Static),
                "method" => kind.push(KindQualifier::Method),
                "get" => kind.push(KindQualifier::Getter),
                "set" => kind.push(KindQualifier::Setter),
                "constructor" => kind.push(KindQualifier::Constructor),
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
            visibility,
            binding,
            kind,
            star_count: name.matches('*').count(),
            question_count: name.matches('?').count(),
            literal_chars: literal_len(name),
            qualifier_count: raw_qualifiers.len(),
        })
    }

    /// A matcher accepting every member.
    pub fn match_all() -> Self {
        MATCH_ALL.clone()
    }

    /// The original filter string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a member matches by name, visibility, binding and kind.
    pub fn is_matching(
        &self,
        name: &str,
        visibility: VisibilityLevel,
        is_static: bool,
        semantics: MethodSemantics,
    ) -> bool {
        if !self.name_regex.is_match(name) {
            return false;
        }
        if !self.visibility.is_empty() {
            let admitted = self.visibility.iter().any(|q| match q {
                VisibilityQualifier::Public => visibility == VisibilityLevel::Public,
                VisibilityQualifier::Private => visibility == VisibilityLevel::Private,
                VisibilityQualifier::Internal => visibility == VisibilityLevel::Internal,
                VisibilityQualifier::Protected => visibility == VisibilityLevel::Protected,
            });
            if !admitted {
                return false;
            }
        }
        if !self.binding.is_empty() {
            let admitted = self.binding.iter().any(|q| match q {
                BindingQualifier::Instance => !is_static,
                BindingQualifier::Static => is_static,
            });
            if !admitted {
                return false;
            }
        }
        if !self.kind.is_empty() {
            let admitted = self.kind.iter().any(|q| match q {
                KindQualifier::Method => semantics == MethodSemantics::Ordinary,
                KindQualifier::Getter => semantics == MethodSemantics::Getter,
                KindQualifier::Setter => semantics == MethodSemantics::Setter,
                KindQualifier::Constructor => matches!(
                    semantics,
                    MethodSemantics::Constructor | MethodSemantics::StaticConstructor
                ),
            });
            if !admitted {
                return false;
            }
        }
        true
    }

    /// Most-specific-first ordering for conflict resolution.
    ///
    /// Key order: star-free before starred, fewer `?`, longer literal run,
    /// more qualifiers.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        (self.star_count > 0)
            .cmp(&(other.star_count > 0))
            .then_with(|| self.question_count.cmp(&other.question_count))
            .then_with(|| other.literal_chars.cmp(&self.literal_chars))
            .then_with(|| other.qualifier_count.cmp(&self.qualifier_count))
    }
}
