//! Pattern matchers for namespaces, classes and members
//!
//! All three matchers compile their wildcard grammar down to anchored,
//! case-insensitive regexes once at parse time. `?` matches a single
//! character, `*` any run; class and member patterns additionally accept a
//! leading `[qualifier|qualifier]` bracket list. An empty bracket list means
//! "match all" for that axis.

mod class;
mod member;
mod namespace;

pub use class::ClassMatcher;
pub use member::MemberMatcher;
pub use namespace::NamespaceMatcher;

use crate::error::{FilterParseError, ParseResult};
use regex::{Regex, RegexBuilder};

/// Split an optional leading `[a|b|c]` qualifier list off a pattern.
///
/// Returns the lowercased qualifiers and the remaining name pattern.
/// Malformed bracket syntax is an error, never a silent default.
pub(crate) fn split_qualifiers(pattern: &str) -> ParseResult<(Vec<String>, &str)> {
    if let Some(rest) = pattern.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| FilterParseError::UnterminatedQualifier {
                pattern: pattern.to_string(),
            })?;
        let name = &rest[end + 1..];
        if name.contains('[') || name.contains(']') {
            return Err(FilterParseError::StrayBracket {
                pattern: pattern.to_string(),
            });
        }
        if name.is_empty() {
            return Err(FilterParseError::EmptyNamePattern {
                pattern: pattern.to_string(),
            });
        }
        let qualifiers = rest[..end]
            .split('|')
            .map(|q| q.trim().to_ascii_lowercase())
            .filter(|q| !q.is_empty())
            .collect();
        Ok((qualifiers, name))
    } else {
        if pattern.contains(']') {
            return Err(FilterParseError::StrayBracket {
                pattern: pattern.to_string(),
            });
        }
        if pattern.contains('[') {
            return Err(FilterParseError::UnterminatedQualifier {
                pattern: pattern.to_string(),
            });
        }
        if pattern.is_empty() {
            return Err(FilterParseError::EmptyNamePattern {
                pattern: pattern.to_string(),
            });
        }
        Ok((Vec::new(), pattern))
    }
}

/// Compile a `?`/`*` wildcard name into an anchored case-insensitive regex.
pub(crate) fn compile_wildcard(name: &str) -> ParseResult<Regex> {
    let mut source = String::with_capacity(name.len() + 2);
    source.push('^');
    for c in name.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Ok(RegexBuilder::new(&source).case_insensitive(true).build()?)
}

/// Count of literal (non-wildcard) characters in a name pattern.
pub(crate) fn literal_len(name: &str) -> usize {
    name.chars().filter(|&c| c != '*' && c != '?').count()
}
