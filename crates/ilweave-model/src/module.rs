//! Compiled module model

use crate::method::{MethodDef, MethodRef};
use crate::types::TypeDef;

/// Reference to an external assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRef {
    /// Simple assembly name.
    pub name: String,
}

/// The in-memory representation of one compiled module.
///
/// One weave invocation mutates exactly one module; a partially-woven module
/// is never a valid output, so callers discard the module on error.
#[derive(Debug, Clone)]
pub struct ModuleDef {
    /// Module (assembly) name.
    pub name: String,
    /// Referenced assemblies.
    pub assembly_refs: Vec<AssemblyRef>,
    /// Top-level types. Nested types hang off their declaring type.
    pub types: Vec<TypeDef>,
}

impl ModuleDef {
    /// Create an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assembly_refs: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Get or create a reference to the named assembly.
    ///
    /// Lookup is by identity on the simple name; the reference is added at
    /// most once per module.
    pub fn ensure_assembly_ref(&mut self, name: &str) -> &AssemblyRef {
        let pos = match self.assembly_refs.iter().position(|r| r.name == name) {
            Some(pos) => pos,
            None => {
                self.assembly_refs.push(AssemblyRef {
                    name: name.to_string(),
                });
                self.assembly_refs.len() - 1
            }
        };
        &self.assembly_refs[pos]
    }

    /// Find a type by full name. Nested types use the `Ns.Outer/Inner`
    /// convention.
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        let mut segments = full_name.split('/');
        let top = segments.next()?;
        let mut current = self.types.iter().find(|t| t.full_name() == top)?;
        for seg in segments {
            current = current.nested.iter().find(|t| t.name == seg)?;
        }
        Some(current)
    }

    /// Mutable variant of [`ModuleDef::find_type`].
    pub fn find_type_mut(&mut self, full_name: &str) -> Option<&mut TypeDef> {
        let mut segments = full_name.split('/');
        let top = segments.next()?;
        let mut current = self.types.iter_mut().find(|t| t.full_name() == top)?;
        for seg in segments {
            current = current.nested.iter_mut().find(|t| t.name == seg)?;
        }
        Some(current)
    }

    /// Resolve a method reference to its definition in this module.
    ///
    /// Returns `None` for references into other assemblies or when no
    /// definition matches by name and parameter count.
    pub fn resolve_method(&self, reference: &MethodRef) -> Option<&MethodDef> {
        if let Some(assembly) = &reference.declaring_type.assembly {
            if assembly != &self.name {
                return None;
            }
        }
        let ty = self.find_type(&reference.declaring_type.full_name())?;
        ty.methods
            .iter()
            .find(|m| m.name == reference.name && m.parameters.len() == reference.param_types.len())
    }
}
