//! Rule definitions and their specificity comparators
//!
//! Two rule families exist: broad assembly-level visibility rules scoped by
//! namespace, and fine-grained dotted wildcard patterns. Both are sorted
//! most-specific-first once at configuration time; the engines then take
//! the first match. The comparators are explicit multi-key functions so
//! each tier can be tested on its own.

use crate::error::{FilterParseError, ParseResult};
use crate::matchers::{ClassMatcher, MemberMatcher, NamespaceMatcher};
use crate::scope::NamespaceScope;
use ilweave_model::TraceTargetVisibility;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A module-wide default rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssemblyLevelTraceDefinition {
    /// Enable tracing under a scope, bounded by visibility thresholds.
    TraceOn {
        /// Namespace scope the rule applies to.
        scope: NamespaceScope,
        /// Threshold the declaring class must fall under.
        class_visibility: TraceTargetVisibility,
        /// Threshold the method must fall under.
        method_visibility: TraceTargetVisibility,
    },
    /// Disable tracing under a scope.
    NoTrace {
        /// Namespace scope the rule applies to.
        scope: NamespaceScope,
    },
}

impl AssemblyLevelTraceDefinition {
    /// The rule's namespace scope.
    pub fn scope(&self) -> &NamespaceScope {
        match self {
            AssemblyLevelTraceDefinition::TraceOn { scope, .. } => scope,
            AssemblyLevelTraceDefinition::NoTrace { scope } => scope,
        }
    }

    fn kind_rank(&self) -> u8 {
        // NoTrace sorts before TraceOn at equal namespace specificity.
        match self {
            AssemblyLevelTraceDefinition::NoTrace { .. } => 0,
            AssemblyLevelTraceDefinition::TraceOn { .. } => 1,
        }
    }

    /// Most-specific-first comparator.
    ///
    /// Key order: namespace specificity, definition kind (NoTrace first),
    /// class threshold (narrower first), method threshold (narrower first).
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        self.scope()
            .cmp(other.scope())
            .then_with(|| self.kind_rank().cmp(&other.kind_rank()))
            .then_with(|| {
                let (a_class, a_method) = self.thresholds();
                let (b_class, b_method) = other.thresholds();
                a_class.cmp(&b_class).then(a_method.cmp(&b_method))
            })
    }

    fn thresholds(&self) -> (TraceTargetVisibility, TraceTargetVisibility) {
        match self {
            AssemblyLevelTraceDefinition::TraceOn {
                class_visibility,
                method_visibility,
                ..
            } => (*class_visibility, *method_visibility),
            AssemblyLevelTraceDefinition::NoTrace { .. } => {
                (TraceTargetVisibility::None, TraceTargetVisibility::None)
            }
        }
    }

    /// Sort a definition list most-specific-first, stably.
    pub fn sort_by_specificity(definitions: &mut [AssemblyLevelTraceDefinition]) {
        definitions.sort_by(|a, b| a.specificity_cmp(b));
    }
}

/// A fine-grained pattern rule: On/Off plus the three compiled matchers.
#[derive(Debug, Clone)]
pub struct PatternDefinition {
    /// Whether a match enables or disables tracing.
    pub trace_enabled: bool,
    /// Namespace matcher.
    pub namespace: NamespaceMatcher,
    /// Class matcher.
    pub class: ClassMatcher,
    /// Member matcher.
    pub member: MemberMatcher,
}

impl PatternDefinition {
    /// Parse a dotted pattern string.
    ///
    /// The last segment is the member pattern, the second-to-last the class
    /// pattern, everything before them the namespace pattern. A one-segment
    /// pattern constrains members only; a two-segment pattern constrains
    /// class and member. Qualifier brackets never contain dots, so a plain
    /// rightmost-split is safe.
    pub fn parse(trace_enabled: bool, pattern: &str) -> ParseResult<Self> {
        if pattern.is_empty() {
            return Err(FilterParseError::EmptyNamePattern {
                pattern: pattern.to_string(),
            });
        }
        let segments: Vec<&str> = pattern.split('.').collect();
        // Dots inside an accessor-style member name do not occur; `.ctor`
        // is addressed through the `constructor` qualifier instead.
        let (namespace, class, member) = match segments.len() {
            1 => (
                NamespaceMatcher::match_all(),
                ClassMatcher::match_all(),
                MemberMatcher::parse(segments[0])?,
            ),
            2 => (
                NamespaceMatcher::match_all(),
                ClassMatcher::parse(segments[0])?,
                MemberMatcher::parse(segments[1])?,
            ),
            n => (
                NamespaceMatcher::parse(&segments[..n - 2].join("."))?,
                ClassMatcher::parse(segments[n - 2])?,
                MemberMatcher::parse(segments[n - 1])?,
            ),
        };
        Ok(Self {
            trace_enabled,
            namespace,
            class,
            member,
        })
    }

    /// Most-specific-first comparator: namespace, then class, then member
    /// specificity.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        self.namespace
            .specificity_cmp(&other.namespace)
            .then_with(|| self.class.specificity_cmp(&other.class))
            .then_with(|| self.member.specificity_cmp(&other.member))
    }

    /// Sort a pattern list most-specific-first, stably, so declaration
    /// order only breaks exact ties.
    pub fn sort_by_specificity(definitions: &mut [PatternDefinition]) {
        definitions.sort_by(|a, b| a.specificity_cmp(b));
    }
}

/// One element of the declarative rule surface, as host build tooling
/// hands it over after loading a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleElement {
    /// Broad visibility-threshold rule, optionally namespace-scoped.
    TraceOn {
        /// Scope string; `None` means everything.
        namespace: Option<String>,
        /// Class visibility keyword (`public`, `internal`, `all`, ...).
        class: String,
        /// Method visibility keyword.
        method: String,
    },
    /// Broad disable rule, optionally namespace-scoped.
    NoTrace {
        /// Scope string; `None` means everything.
        namespace: Option<String>,
    },
    /// Fine-grained wildcard pattern rule.
    Pattern {
        /// `true` for On, `false` for Off.
        on: bool,
        /// The dotted pattern string.
        pattern: String,
    },
}

/// Parse the assembly-level subset of a rule sequence, sorted and ready for
/// the default filter.
pub fn parse_assembly_definitions(
    rules: &[RuleElement],
) -> ParseResult<Vec<AssemblyLevelTraceDefinition>> {
    let mut definitions = Vec::new();
    for rule in rules {
        match rule {
            RuleElement::TraceOn {
                namespace,
                class,
                method,
            } => {
                let scope = NamespaceScope::parse(namespace.as_deref().unwrap_or(""))?;
                let class_visibility = TraceTargetVisibility::parse_keyword(class).ok_or_else(
                    || FilterParseError::UnknownVisibilityKeyword {
                        keyword: class.clone(),
                    },
                )?;
                let method_visibility = TraceTargetVisibility::parse_keyword(method).ok_or_else(
                    || FilterParseError::UnknownVisibilityKeyword {
                        keyword: method.clone(),
                    },
                )?;
                definitions.push(AssemblyLevelTraceDefinition::TraceOn {
                    scope,
                    class_visibility,
                    method_visibility,
                });
            }
            RuleElement::NoTrace { namespace } => {
                let scope = NamespaceScope::parse(namespace.as_deref().unwrap_or(""))?;
                definitions.push(AssemblyLevelTraceDefinition::NoTrace { scope });
            }
            RuleElement::Pattern { .. } => {}
        }
    }
    AssemblyLevelTraceDefinition::sort_by_specificity(&mut definitions);
    Ok(definitions)
}

/// Parse the pattern subset of a rule sequence, sorted and ready for the
/// pattern filter.
pub fn parse_pattern_definitions(rules: &[RuleElement]) -> ParseResult<Vec<PatternDefinition>> {
    let mut definitions = Vec::new();
    for rule in rules {
        if let RuleElement::Pattern { on, pattern } = rule {
            if pattern.is_empty() {
                return Err(FilterParseError::MissingAttribute {
                    element: "Pattern".to_string(),
                    attribute: "pattern".to_string(),
                });
            }
            definitions.push(PatternDefinition::parse(*on, pattern)?);
        }
    }
    PatternDefinition::sort_by_specificity(&mut definitions);
    Ok(definitions)
}
