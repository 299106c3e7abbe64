//! Filter engines
//!
//! Two interchangeable strategies decide, per method, whether enter/leave
//! tracing applies: the visibility-rule-based default filter and the
//! ordered-pattern filter. Both answer through [`FilterResult`].

mod default;
mod pattern;

pub use default::DefaultTraceFilter;
pub use pattern::PatternTraceFilter;

use crate::target::MethodTarget;

/// Outcome of a filter decision.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FilterResult {
    /// Whether enter/leave tracing should be woven.
    pub should_trace: bool,
    /// Extra key/value configuration to append to the trace payload.
    pub parameters: Option<Vec<(String, String)>>,
}

impl FilterResult {
    /// Positive decision with no extras.
    pub fn trace() -> Self {
        Self {
            should_trace: true,
            parameters: None,
        }
    }

    /// Negative decision.
    pub fn skip() -> Self {
        Self {
            should_trace: false,
            parameters: None,
        }
    }

    /// Decision carrying configuration extras (dropped when empty).
    pub fn with_parameters(should_trace: bool, parameters: Vec<(String, String)>) -> Self {
        Self {
            should_trace,
            parameters: if parameters.is_empty() {
                None
            } else {
                Some(parameters)
            },
        }
    }
}

/// A per-method trace decision strategy.
pub trait TraceFilter: std::fmt::Debug {
    /// Decide whether to weave enter/leave tracing into `target`.
    fn should_trace(&self, target: &MethodTarget) -> FilterResult;
}

/// Filter that traces nothing; the configuration default until a real
/// filter is supplied.
#[derive(Debug, Default)]
pub struct NullTraceFilter;

impl TraceFilter for NullTraceFilter {
    fn should_trace(&self, _target: &MethodTarget) -> FilterResult {
        FilterResult::skip()
    }
}
