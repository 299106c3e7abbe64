//! Method definitions and references

use crate::annotations::{CustomAttribute, TraceAnnotation};
use crate::instr::MethodBody;
use crate::module::ModuleDef;
use crate::types::{CilType, TypeRef};
use crate::visibility::{MethodAccess, VisibilityLevel};

/// A generic parameter declared on a type or method.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    /// Parameter name (`T`).
    pub name: String,
    /// Declaration position.
    pub position: u16,
}

/// What role a method plays on its declaring type.
///
/// Accessors and constructors are distinguished for filtering only; the
/// rewriting strategy treats them like ordinary methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodSemantics {
    /// Plain method
    Ordinary,
    /// Property getter (`get_*`)
    Getter,
    /// Property setter (`set_*`)
    Setter,
    /// Instance constructor (`.ctor`)
    Constructor,
    /// Static constructor (`.cctor`)
    StaticConstructor,
}

/// Property information carried on accessor methods.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRef {
    /// Property name.
    pub name: String,
    /// Custom attributes declared on the property itself.
    pub attributes: Vec<CustomAttribute>,
}

/// A method parameter. Does not include the implicit `this`.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Parameter type; `out`/`ref` parameters are `CilType::ByRef`.
    pub ty: CilType,
    /// Whether the parameter is declared `out` (byref, output-only).
    pub is_out: bool,
    /// Custom attributes on the parameter.
    pub attributes: Vec<CustomAttribute>,
}

impl Parameter {
    /// Build a plain input parameter.
    pub fn new(name: impl Into<String>, ty: CilType) -> Self {
        Self {
            name: name.into(),
            ty,
            is_out: false,
            attributes: Vec::new(),
        }
    }

    /// Build an `out` parameter for the given pointee type.
    pub fn out(name: impl Into<String>, pointee: CilType) -> Self {
        Self {
            name: name.into(),
            ty: CilType::ByRef(Box::new(pointee)),
            is_out: true,
            attributes: Vec::new(),
        }
    }

    /// Whether the parameter carries the "exclude from payload" marker.
    pub fn is_no_trace(&self) -> bool {
        TraceAnnotation::decode_all(&self.attributes)
            .iter()
            .any(|a| matches!(a, TraceAnnotation::NoTraceParameter))
    }
}

/// A method definition in the module being woven.
///
/// This is the handle the body rewriters mutate: the declaration plus the
/// owned instruction stream.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Method name (`.ctor`/`.cctor` for constructors).
    pub name: String,
    /// Accessibility flags.
    pub access: MethodAccess,
    /// Whether the method is static.
    pub is_static: bool,
    /// Whether the method is abstract (no body).
    pub is_abstract: bool,
    /// Role on the declaring type.
    pub semantics: MethodSemantics,
    /// Owning property, for accessors.
    pub owning_property: Option<PropertyRef>,
    /// Parameters, excluding the implicit `this`.
    pub parameters: Vec<Parameter>,
    /// Return type.
    pub return_type: CilType,
    /// Method-level generic parameters.
    pub generic_params: Vec<GenericParam>,
    /// Raw custom attributes.
    pub attributes: Vec<CustomAttribute>,
    /// The body; `None` for abstract/extern methods.
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Create a method with an empty body.
    pub fn new(name: impl Into<String>, access: MethodAccess, return_type: CilType) -> Self {
        Self {
            name: name.into(),
            access,
            is_static: false,
            is_abstract: false,
            semantics: MethodSemantics::Ordinary,
            owning_property: None,
            parameters: Vec::new(),
            return_type,
            generic_params: Vec::new(),
            attributes: Vec::new(),
            body: Some(MethodBody::new()),
        }
    }

    /// Declared visibility of this method.
    pub fn visibility_level(&self) -> VisibilityLevel {
        self.access.visibility_level()
    }

    /// Whether the method has a body to rewrite.
    pub fn has_body(&self) -> bool {
        self.body.is_some() && !self.is_abstract
    }

    /// Argument slot of parameter `index`, accounting for the implicit
    /// `this` of instance methods.
    pub fn arg_index(&self, index: usize) -> u16 {
        let base = if self.is_static { 0 } else { 1 };
        (index + base) as u16
    }

    /// Whether the method returns a value.
    pub fn has_return_value(&self) -> bool {
        self.return_type != CilType::Void
    }

    /// Trace annotations decoded from the method's attributes.
    pub fn trace_annotations(&self) -> Vec<TraceAnnotation> {
        TraceAnnotation::decode_all(&self.attributes)
    }

    /// Trace annotations on the owning property, for accessors.
    pub fn property_annotations(&self) -> Vec<TraceAnnotation> {
        self.owning_property
            .as_ref()
            .map(|p| TraceAnnotation::decode_all(&p.attributes))
            .unwrap_or_default()
    }

    /// The state-machine type name if this is an async-transformed method.
    pub fn state_machine_type(&self) -> Option<String> {
        self.trace_annotations().into_iter().find_map(|a| match a {
            TraceAnnotation::StateMachine { type_name } => Some(type_name),
            _ => None,
        })
    }
}

/// Reference to a method, possibly in another assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    /// Declaring type.
    pub declaring_type: TypeRef,
    /// Method name.
    pub name: String,
    /// Parameter types, excluding `this`.
    pub param_types: Vec<CilType>,
    /// Return type.
    pub return_type: CilType,
    /// Whether the referenced method is static.
    pub is_static: bool,
    /// Generic arguments when this is a generic method instantiation.
    pub generic_args: Vec<CilType>,
}

impl MethodRef {
    /// Reference a static void method with no parameters; adjust with the
    /// builder methods.
    pub fn new(declaring_type: TypeRef, name: impl Into<String>) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            param_types: Vec::new(),
            return_type: CilType::Void,
            is_static: true,
            generic_args: Vec::new(),
        }
    }

    /// Set the parameter types.
    pub fn with_params(mut self, param_types: Vec<CilType>) -> Self {
        self.param_types = param_types;
        self
    }

    /// Set the return type.
    pub fn returning(mut self, return_type: CilType) -> Self {
        self.return_type = return_type;
        self
    }

    /// Mark the reference as an instance method.
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    /// `Ns.Type::Name`.
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type.full_name(), self.name)
    }
}

/// Resolve-or-fallback view over a [`MethodRef`].
///
/// Metadata resolution can fail for references into assemblies that are not
/// loaded; this wrapper prefers the resolved definition and degrades to
/// name-based inference so callers get uniform answers either way.
#[derive(Debug)]
pub struct MethodReferenceInfo<'a> {
    reference: &'a MethodRef,
    resolved: Option<&'a MethodDef>,
}

impl<'a> MethodReferenceInfo<'a> {
    /// Resolve `reference` against `module`. Resolution failure is not an
    /// error; the wrapper falls back to heuristics.
    pub fn resolve(reference: &'a MethodRef, module: &'a ModuleDef) -> Self {
        Self {
            reference,
            resolved: module.resolve_method(reference),
        }
    }

    /// Build an unresolved view (reference-only information).
    pub fn unresolved(reference: &'a MethodRef) -> Self {
        Self {
            reference,
            resolved: None,
        }
    }

    /// Whether full resolution succeeded.
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Method name.
    pub fn name(&self) -> &str {
        &self.reference.name
    }

    /// Declaring type reference.
    pub fn declaring_type(&self) -> &TypeRef {
        &self.reference.declaring_type
    }

    /// Whether the method is static.
    pub fn is_static(&self) -> bool {
        match self.resolved {
            Some(def) => def.is_static,
            None => self.reference.is_static,
        }
    }

    /// Accessor/constructor classification. Falls back to `get_`/`set_`/
    /// `.ctor` name sniffing when the definition is unavailable.
    pub fn semantics(&self) -> MethodSemantics {
        if let Some(def) = self.resolved {
            return def.semantics;
        }
        let name = self.reference.name.as_str();
        if name == ".ctor" {
            MethodSemantics::Constructor
        } else if name == ".cctor" {
            MethodSemantics::StaticConstructor
        } else if name.starts_with("get_") {
            MethodSemantics::Getter
        } else if name.starts_with("set_") {
            MethodSemantics::Setter
        } else {
            MethodSemantics::Ordinary
        }
    }

    /// Whether this is a property accessor.
    pub fn is_property_accessor(&self) -> bool {
        matches!(
            self.semantics(),
            MethodSemantics::Getter | MethodSemantics::Setter
        )
    }

    /// Generic arguments on the reference.
    pub fn generic_args(&self) -> &[CilType] {
        &self.reference.generic_args
    }

    /// The resolved definition, when available.
    pub fn definition(&self) -> Option<&'a MethodDef> {
        self.resolved
    }
}
