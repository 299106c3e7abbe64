//! Namespace scopes for assembly-level rules
//!
//! A scope is a namespace prefix plus a match mode. Scope strings:
//!
//! - `My.Lib`: exact match
//! - `My.Lib.*`: children only (strict descendants)
//! - `My.Lib*`: self and children
//! - `` / `*`: everything, including the empty namespace
//!
//! Matching is case-insensitive. Scopes sort most-specific-first: more path
//! segments beat fewer, and at equal depth exact beats children-only beats
//! self-and-children.

use crate::error::{FilterParseError, ParseResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How a scope's namespace prefix is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScopeMatchMode {
    /// The namespace must equal the prefix.
    ExactMatch,
    /// The namespace must be a strict descendant of the prefix.
    OnlyChildren,
    /// The namespace must equal the prefix or descend from it.
    SelfAndChildren,
}

/// An immutable namespace scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceScope {
    namespace: String,
    mode: ScopeMatchMode,
}

impl NamespaceScope {
    /// Parse a scope string. See the module docs for the grammar.
    pub fn parse(scope: &str) -> ParseResult<Self> {
        let scope = scope.trim();
        if scope.is_empty() || scope == "*" {
            return Ok(Self {
                namespace: String::new(),
                mode: ScopeMatchMode::SelfAndChildren,
            });
        }

        let (namespace, mode) = if let Some(prefix) = scope.strip_suffix(".*") {
            (prefix, ScopeMatchMode::OnlyChildren)
        } else if let Some(prefix) = scope.strip_suffix('*') {
            (prefix, ScopeMatchMode::SelfAndChildren)
        } else {
            (scope, ScopeMatchMode::ExactMatch)
        };

        if namespace.is_empty() {
            return Err(FilterParseError::InvalidNamespaceScope {
                scope: scope.to_string(),
                reason: "empty namespace prefix".to_string(),
            });
        }
        for segment in namespace.split('.') {
            if segment.is_empty() {
                return Err(FilterParseError::InvalidNamespaceScope {
                    scope: scope.to_string(),
                    reason: "empty path segment".to_string(),
                });
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(FilterParseError::InvalidNamespaceScope {
                    scope: scope.to_string(),
                    reason: format!("invalid characters in segment '{}'", segment),
                });
            }
        }

        Ok(Self {
            namespace: namespace.to_string(),
            mode,
        })
    }

    /// The "match everything" scope.
    pub fn all() -> Self {
        Self {
            namespace: String::new(),
            mode: ScopeMatchMode::SelfAndChildren,
        }
    }

    /// The namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The match mode.
    pub fn mode(&self) -> ScopeMatchMode {
        self.mode
    }

    /// Number of path segments in the prefix; 0 for the all-scope.
    pub fn segment_count(&self) -> usize {
        if self.namespace.is_empty() {
            0
        } else {
            self.namespace.split('.').count()
        }
    }

    /// Whether `ns` falls under this scope. Case-insensitive.
    pub fn is_matching(&self, ns: &str) -> bool {
        if self.namespace.is_empty() {
            // The all-scope matches everything, including the empty
            // namespace.
            return true;
        }
        let equal = ns.eq_ignore_ascii_case(&self.namespace);
        let child = ns.len() > self.namespace.len() + 1
            && ns[..self.namespace.len()].eq_ignore_ascii_case(&self.namespace)
            && ns.as_bytes()[self.namespace.len()] == b'.';
        match self.mode {
            ScopeMatchMode::ExactMatch => equal,
            ScopeMatchMode::OnlyChildren => child,
            ScopeMatchMode::SelfAndChildren => equal || child,
        }
    }
}

impl PartialOrd for NamespaceScope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NamespaceScope {
    /// Most-specific-first total order: deeper prefixes sort before
    /// shallower ones; at equal depth, `ExactMatch < OnlyChildren <
    /// SelfAndChildren`.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .segment_count()
            .cmp(&self.segment_count())
            .then_with(|| self.mode.cmp(&other.mode))
            .then_with(|| self.namespace.cmp(&other.namespace))
    }
}
