//! Types, type references and fields

use crate::annotations::{CustomAttribute, TraceAnnotation};
use crate::instr::Opcode;
use crate::method::{GenericParam, MethodDef};
use crate::visibility::{TypeAccess, VisibilityLevel};

/// A CIL type as it appears in signatures and instruction operands.
#[derive(Debug, Clone, PartialEq)]
pub enum CilType {
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `sbyte`
    I1,
    /// `byte`
    U1,
    /// `short`
    I2,
    /// `ushort`
    U2,
    /// `int`
    I4,
    /// `uint`
    U4,
    /// `long`
    I8,
    /// `ulong`
    U8,
    /// `float`
    R4,
    /// `double`
    R8,
    /// `string`
    String,
    /// `object`
    Object,
    /// Reference type by reference
    Class(TypeRef),
    /// Value type by reference
    ValueType(TypeRef),
    /// Generic parameter by name (`T`)
    GenericParam(String),
    /// Managed pointer (`ref`/`out` parameter)
    ByRef(Box<CilType>),
    /// Single-dimensional array
    Array(Box<CilType>),
}

impl CilType {
    /// Whether values of this type live on the stack as value types and
    /// need boxing before being stored into an `object[]`.
    ///
    /// Generic parameters are conservatively boxed; `box !T` on a reference
    /// type instantiation is a no-op at runtime.
    pub fn needs_box(&self) -> bool {
        matches!(
            self,
            CilType::Bool
                | CilType::Char
                | CilType::I1
                | CilType::U1
                | CilType::I2
                | CilType::U2
                | CilType::I4
                | CilType::U4
                | CilType::I8
                | CilType::U8
                | CilType::R4
                | CilType::R8
                | CilType::ValueType(_)
                | CilType::GenericParam(_)
        )
    }

    /// Whether this is a managed pointer type.
    pub fn is_byref(&self) -> bool {
        matches!(self, CilType::ByRef(_))
    }

    /// The pointee of a managed pointer, or the type itself.
    pub fn strip_byref(&self) -> &CilType {
        match self {
            CilType::ByRef(inner) => inner,
            other => other,
        }
    }

    /// The indirect-load opcode that reads a value of this type through a
    /// managed pointer. `Ldobj` (with this type as operand) is returned for
    /// value types and generic parameters.
    pub fn ldind_opcode(&self) -> Opcode {
        match self {
            CilType::Bool | CilType::I1 => Opcode::LdindI1,
            CilType::U1 => Opcode::LdindU1,
            CilType::I2 => Opcode::LdindI2,
            CilType::Char | CilType::U2 => Opcode::LdindU2,
            CilType::I4 => Opcode::LdindI4,
            CilType::U4 => Opcode::LdindU4,
            CilType::I8 | CilType::U8 => Opcode::LdindI8,
            CilType::R4 => Opcode::LdindR4,
            CilType::R8 => Opcode::LdindR8,
            CilType::ValueType(_) | CilType::GenericParam(_) => Opcode::Ldobj,
            _ => Opcode::LdindRef,
        }
    }

    /// Display form used in signature strings and dumps.
    pub fn display_name(&self) -> String {
        match self {
            CilType::Void => "void".into(),
            CilType::Bool => "bool".into(),
            CilType::Char => "char".into(),
            CilType::I1 => "sbyte".into(),
            CilType::U1 => "byte".into(),
            CilType::I2 => "short".into(),
            CilType::U2 => "ushort".into(),
            CilType::I4 => "int".into(),
            CilType::U4 => "uint".into(),
            CilType::I8 => "long".into(),
            CilType::U8 => "ulong".into(),
            CilType::R4 => "float".into(),
            CilType::R8 => "double".into(),
            CilType::String => "string".into(),
            CilType::Object => "object".into(),
            CilType::Class(r) | CilType::ValueType(r) => r.display_name(),
            CilType::GenericParam(name) => name.clone(),
            CilType::ByRef(inner) => format!("{}&", inner.display_name()),
            CilType::Array(inner) => format!("{}[]", inner.display_name()),
        }
    }
}

/// Reference to a type, possibly in another assembly, possibly a generic
/// instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// Assembly the type lives in; `None` means the module being woven.
    pub assembly: Option<String>,
    /// Namespace ("" for nested or global types).
    pub namespace: String,
    /// Simple name; nested names use the `Outer/Inner` convention.
    pub name: String,
    /// Generic arguments when this reference is a generic instantiation.
    pub generic_args: Vec<CilType>,
}

impl TypeRef {
    /// Reference to a type in the current module.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            assembly: None,
            namespace: namespace.into(),
            name: name.into(),
            generic_args: Vec::new(),
        }
    }

    /// Attach the owning assembly name.
    pub fn with_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = Some(assembly.into());
        self
    }

    /// Attach generic arguments, turning this into a generic instance.
    pub fn with_generic_args(mut self, args: Vec<CilType>) -> Self {
        self.generic_args = args;
        self
    }

    /// `Namespace.Name`, ignoring generic arguments.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Full name including generic arguments.
    pub fn display_name(&self) -> String {
        let base = self.full_name();
        if self.generic_args.is_empty() {
            base
        } else {
            let args: Vec<String> = self.generic_args.iter().map(|a| a.display_name()).collect();
            format!("{}<{}>", base, args.join(", "))
        }
    }
}

/// Reference to a field, for `ldsfld`/`stsfld`/`ldfld`/`stfld` operands.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    /// Type declaring the field.
    pub declaring_type: TypeRef,
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: CilType,
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: CilType,
    /// Whether the field is static.
    pub is_static: bool,
}

/// A type definition in the module being woven.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Namespace; empty for nested types (CIL stores the namespace on the
    /// outermost type only).
    pub namespace: String,
    /// Simple name.
    pub name: String,
    /// Accessibility flags.
    pub access: TypeAccess,
    /// Whether this is an interface.
    pub is_interface: bool,
    /// Whether this is an abstract type.
    pub is_abstract: bool,
    /// Generic parameters of the type.
    pub generic_params: Vec<GenericParam>,
    /// Fields.
    pub fields: Vec<FieldDef>,
    /// Methods.
    pub methods: Vec<MethodDef>,
    /// Nested types.
    pub nested: Vec<TypeDef>,
    /// Raw custom attributes as read from metadata.
    pub attributes: Vec<CustomAttribute>,
}

impl TypeDef {
    /// Create a type with the given namespace, name and accessibility.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        access: TypeAccess,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            access,
            is_interface: false,
            is_abstract: false,
            generic_params: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// `Namespace.Name` of this type, as declared.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Declared visibility of this type.
    pub fn visibility_level(&self) -> VisibilityLevel {
        self.access.visibility_level()
    }

    /// Whether this type declares generic parameters.
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Trace annotations decoded from this type's attributes.
    pub fn trace_annotations(&self) -> Vec<TraceAnnotation> {
        TraceAnnotation::decode_all(&self.attributes)
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a method by name (first overload).
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Mutable lookup of a method by name (first overload).
    pub fn method_mut(&mut self, name: &str) -> Option<&mut MethodDef> {
        self.methods.iter_mut().find(|m| m.name == name)
    }

    /// A [`TypeRef`] pointing at this definition. For a generic type the
    /// reference is the open definition; callers instantiate as needed.
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.namespace.clone(), self.name.clone())
    }

    /// A [`TypeRef`] instantiated with this type's own generic parameters.
    ///
    /// Field references on an open generic type must go through this form
    /// so they bind correctly for every instantiation.
    pub fn self_instantiated_ref(&self) -> TypeRef {
        if self.generic_params.is_empty() {
            self.type_ref()
        } else {
            let args = self
                .generic_params
                .iter()
                .map(|p| CilType::GenericParam(p.name.clone()))
                .collect();
            self.type_ref().with_generic_args(args)
        }
    }
}
