//! Filter configuration errors
//!
//! All parse errors carry the offending configuration fragment. Nothing is
//! silently defaulted: a malformed scope or qualifier aborts configuration
//! loading.

use thiserror::Error;

/// Result alias for configuration parsing.
pub type ParseResult<T> = Result<T, FilterParseError>;

/// Errors raised while parsing filter configuration.
#[derive(Debug, Error)]
pub enum FilterParseError {
    /// A namespace scope string that fits none of the recognized shapes.
    #[error("invalid namespace scope '{scope}': {reason}")]
    InvalidNamespaceScope {
        /// The scope string as configured.
        scope: String,
        /// What made it unparseable.
        reason: String,
    },

    /// A visibility keyword outside the accepted vocabulary.
    #[error("unrecognized visibility keyword '{keyword}'")]
    UnknownVisibilityKeyword {
        /// The keyword as configured.
        keyword: String,
    },

    /// A `[` qualifier block with no closing bracket.
    #[error("unterminated '[' qualifier in pattern '{pattern}'")]
    UnterminatedQualifier {
        /// The pattern containing the open bracket.
        pattern: String,
    },

    /// A `]` with no matching open bracket.
    #[error("stray ']' in pattern '{pattern}'")]
    StrayBracket {
        /// The pattern containing the stray bracket.
        pattern: String,
    },

    /// A pattern segment whose name part is empty.
    #[error("empty name pattern in '{pattern}'")]
    EmptyNamePattern {
        /// The offending pattern.
        pattern: String,
    },

    /// A qualifier word outside the recognized axes.
    #[error("unknown qualifier '{qualifier}' in pattern '{pattern}'")]
    UnknownQualifier {
        /// The unrecognized qualifier word.
        qualifier: String,
        /// The pattern it appeared in.
        pattern: String,
    },

    /// A rule element missing an attribute its kind requires.
    #[error("rule element '{element}' is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// The rule element kind.
        element: String,
        /// The missing attribute name.
        attribute: String,
    },

    /// A wildcard pattern that compiled into an invalid regex.
    #[error("invalid wildcard pattern: {0}")]
    Regex(#[from] regex::Error),
}
