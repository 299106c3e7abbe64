//! Custom attributes and decoded trace annotations
//!
//! Metadata attaches custom attributes to types, methods and parameters as
//! (attribute type name, constructor arguments, named arguments) triples.
//! The weaver recognizes a handful of them; they are decoded once into
//! [`TraceAnnotation`] variants so the filter subsystem never has to repeat
//! string comparisons against attribute names.

use crate::visibility::TraceTargetVisibility;

/// Fully-qualified name of the "always trace" marker attribute.
pub const TRACE_ON_ATTRIBUTE: &str = "Ilweave.Annotations.TraceOnAttribute";
/// Fully-qualified name of the "never trace" marker attribute.
pub const NO_TRACE_ATTRIBUTE: &str = "Ilweave.Annotations.NoTraceAttribute";
/// Fully-qualified name of the parameter-level "exclude from payload" marker.
pub const NO_TRACE_PARAMETER_ATTRIBUTE: &str = "Ilweave.Annotations.NoTraceParameterAttribute";
/// Compiler marker linking an async method to its generated state machine.
pub const ASYNC_STATE_MACHINE_ATTRIBUTE: &str =
    "System.Runtime.CompilerServices.AsyncStateMachineAttribute";
/// Compiler marker on generated types and members.
pub const COMPILER_GENERATED_ATTRIBUTE: &str =
    "System.Runtime.CompilerServices.CompilerGeneratedAttribute";

/// A custom-attribute argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Boolean argument
    Bool(bool),
    /// Integral argument (enum arguments are carried as their raw value)
    Int(i64),
    /// String argument
    Str(String),
    /// `typeof(...)` argument, carried as the type's full name
    TypeName(String),
}

impl AttrValue {
    /// Render the value the way it would appear in a configuration string.
    pub fn to_config_string(&self) -> String {
        match self {
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Int(i) => i.to_string(),
            AttrValue::Str(s) => s.clone(),
            AttrValue::TypeName(t) => t.clone(),
        }
    }
}

/// A raw custom attribute as read from metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// Fully-qualified name of the attribute type.
    pub type_full_name: String,
    /// Positional constructor arguments.
    pub ctor_args: Vec<AttrValue>,
    /// Named property/field arguments.
    pub named_args: Vec<(String, AttrValue)>,
}

impl CustomAttribute {
    /// Build an attribute with no arguments.
    pub fn marker(type_full_name: impl Into<String>) -> Self {
        Self {
            type_full_name: type_full_name.into(),
            ctor_args: Vec::new(),
            named_args: Vec::new(),
        }
    }
}

/// A trace-related annotation decoded from a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceAnnotation {
    /// Explicit "always trace" marker, optionally carrying a visibility
    /// threshold (meaningful on types) and free-form extras that flow into
    /// the emitted trace payload.
    TraceOn {
        /// Visibility threshold for members of the annotated scope.
        threshold: Option<TraceTargetVisibility>,
        /// Free-form key/value extras.
        parameters: Vec<(String, String)>,
    },
    /// Explicit "never trace" marker.
    NoTrace,
    /// Parameter-level "exclude this parameter from the payload" marker.
    NoTraceParameter,
    /// Compiler-generated state-machine marker on an async method.
    StateMachine {
        /// Full name of the generated state-machine type.
        type_name: String,
    },
    /// Compiler-generated member/type marker.
    CompilerGenerated,
}

impl TraceAnnotation {
    /// Decode one attribute, returning `None` for attributes the weaver
    /// does not recognize.
    pub fn decode(attr: &CustomAttribute) -> Option<Self> {
        match attr.type_full_name.as_str() {
            TRACE_ON_ATTRIBUTE => {
                let threshold = attr.ctor_args.first().and_then(|arg| match arg {
                    AttrValue::Int(i) => threshold_from_raw(*i),
                    AttrValue::Str(s) => TraceTargetVisibility::parse_keyword(s),
                    _ => None,
                });
                let parameters = attr
                    .named_args
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_config_string()))
                    .collect();
                Some(TraceAnnotation::TraceOn {
                    threshold,
                    parameters,
                })
            }
            NO_TRACE_ATTRIBUTE => Some(TraceAnnotation::NoTrace),
            NO_TRACE_PARAMETER_ATTRIBUTE => Some(TraceAnnotation::NoTraceParameter),
            ASYNC_STATE_MACHINE_ATTRIBUTE => {
                let type_name = attr.ctor_args.first().and_then(|arg| match arg {
                    AttrValue::TypeName(t) | AttrValue::Str(t) => Some(t.clone()),
                    _ => None,
                })?;
                Some(TraceAnnotation::StateMachine { type_name })
            }
            COMPILER_GENERATED_ATTRIBUTE => Some(TraceAnnotation::CompilerGenerated),
            _ => None,
        }
    }

    /// Decode every recognized annotation in an attribute list.
    pub fn decode_all(attrs: &[CustomAttribute]) -> Vec<Self> {
        attrs.iter().filter_map(Self::decode).collect()
    }
}

/// Map the raw enum value of a threshold constructor argument.
fn threshold_from_raw(raw: i64) -> Option<TraceTargetVisibility> {
    match raw {
        0 => Some(TraceTargetVisibility::None),
        1 => Some(TraceTargetVisibility::Public),
        2 => Some(TraceTargetVisibility::InternalOrMoreVisible),
        3 => Some(TraceTargetVisibility::ProtectedOrMoreVisible),
        4 => Some(TraceTargetVisibility::All),
        _ => None,
    }
}
