//! Visibility-rule-based default filter

use super::{FilterResult, TraceFilter};
use crate::attrs::TraceAttributeHelper;
use crate::definitions::{parse_assembly_definitions, AssemblyLevelTraceDefinition, RuleElement};
use crate::error::ParseResult;
use crate::target::MethodTarget;

/// The default filter: a three-tier cascade where the first tier that
/// produces a decision wins.
///
/// 1. Explicit marker on the method (or owning property).
/// 2. Marker on the nearest enclosing type.
/// 3. Assembly-level definitions, pre-sorted most-specific-first; the
///    first whose scope matches the declaring namespace and whose class
///    threshold admits the declaring type decides.
///
/// No tier deciding means the method is not traced.
#[derive(Debug)]
pub struct DefaultTraceFilter {
    definitions: Vec<AssemblyLevelTraceDefinition>,
    attributes: TraceAttributeHelper,
}

impl DefaultTraceFilter {
    /// Build from definitions; sorts them by specificity.
    pub fn new(mut definitions: Vec<AssemblyLevelTraceDefinition>) -> Self {
        AssemblyLevelTraceDefinition::sort_by_specificity(&mut definitions);
        Self {
            definitions,
            attributes: TraceAttributeHelper::new(),
        }
    }

    /// Build from the declarative rule surface.
    pub fn from_rules(rules: &[RuleElement]) -> ParseResult<Self> {
        Ok(Self {
            definitions: parse_assembly_definitions(rules)?,
            attributes: TraceAttributeHelper::new(),
        })
    }

    fn assembly_decision(&self, target: &MethodTarget) -> Option<(bool, Vec<(String, String)>)> {
        let definition = self.definitions.iter().find(|d| {
            if !d.scope().is_matching(&target.namespace) {
                return false;
            }
            match d {
                AssemblyLevelTraceDefinition::TraceOn {
                    class_visibility, ..
                } => class_visibility.admits(target.class_visibility),
                AssemblyLevelTraceDefinition::NoTrace { .. } => true,
            }
        })?;
        match definition {
            AssemblyLevelTraceDefinition::NoTrace { .. } => Some((false, Vec::new())),
            AssemblyLevelTraceDefinition::TraceOn {
                method_visibility, ..
            } => Some((
                method_visibility.admits(target.method_visibility),
                Vec::new(),
            )),
        }
    }
}

impl TraceFilter for DefaultTraceFilter {
    fn should_trace(&self, target: &MethodTarget) -> FilterResult {
        let decision = self
            .attributes
            .method_override(target)
            .or_else(|| self.attributes.class_decision(target))
            .or_else(|| self.assembly_decision(target));
        match decision {
            Some((should_trace, parameters)) => {
                FilterResult::with_parameters(should_trace, parameters)
            }
            None => FilterResult::skip(),
        }
    }
}
