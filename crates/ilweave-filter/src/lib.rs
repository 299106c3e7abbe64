//! ilweave filter subsystem
//!
//! Decides, per method, whether trace instrumentation applies. Two filter
//! strategies are provided: a visibility-rule-based default filter driven
//! by assembly-level definitions and explicit markers, and a pattern filter
//! driven by dotted wildcard rules resolved by specificity. The weave
//! configuration (adapter assembly, target type names, candidate flags)
//! lives here too.

pub mod attrs;
pub mod config;
pub mod definitions;
pub mod engine;
pub mod error;
pub mod matchers;
pub mod scope;
pub mod target;

pub use attrs::TraceAttributeHelper;
pub use config::{TraceLoggingConfiguration, TraceLoggingConfigurationBuilder};
pub use definitions::{
    parse_assembly_definitions, parse_pattern_definitions, AssemblyLevelTraceDefinition,
    PatternDefinition, RuleElement,
};
pub use engine::{
    DefaultTraceFilter, FilterResult, NullTraceFilter, PatternTraceFilter, TraceFilter,
};
pub use error::FilterParseError;
pub use matchers::{ClassMatcher, MemberMatcher, NamespaceMatcher};
pub use scope::{NamespaceScope, ScopeMatchMode};
pub use target::{ClassScope, MethodTarget};
