//! Ordered-pattern filter

use super::{FilterResult, TraceFilter};
use crate::definitions::{parse_pattern_definitions, PatternDefinition, RuleElement};
use crate::error::ParseResult;
use crate::target::MethodTarget;

/// The pattern filter: holds On/Off pattern definitions sorted
/// most-specific-first and returns the decision of the first definition
/// whose namespace, class and member matchers all match.
///
/// Matching is specificity-ordered, not declaration-ordered. Configuration
/// files commonly declare a broad rule first and narrow overrides later;
/// sorting by specificity makes the narrow rules win regardless of where
/// they appear in the file. This is intentional; do not "fix" it to
/// first-declared-wins.
#[derive(Debug)]
pub struct PatternTraceFilter {
    definitions: Vec<PatternDefinition>,
}

impl PatternTraceFilter {
    /// Build from definitions; sorts them by specificity.
    pub fn new(mut definitions: Vec<PatternDefinition>) -> Self {
        PatternDefinition::sort_by_specificity(&mut definitions);
        Self { definitions }
    }

    /// Build from the declarative rule surface.
    pub fn from_rules(rules: &[RuleElement]) -> ParseResult<Self> {
        Ok(Self {
            definitions: parse_pattern_definitions(rules)?,
        })
    }

    fn matches(definition: &PatternDefinition, target: &MethodTarget) -> bool {
        definition.namespace.is_matching(&target.namespace)
            && definition
                .class
                .is_matching(&target.class_name, target.class_visibility)
            && definition.member.is_matching(
                &target.method_name,
                target.method_visibility,
                target.is_static,
                target.semantics,
            )
    }
}

impl TraceFilter for PatternTraceFilter {
    fn should_trace(&self, target: &MethodTarget) -> FilterResult {
        match self
            .definitions
            .iter()
            .find(|d| Self::matches(d, target))
        {
            Some(definition) if definition.trace_enabled => FilterResult::trace(),
            Some(_) => FilterResult::skip(),
            None => FilterResult::skip(),
        }
    }
}
