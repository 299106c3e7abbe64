//! Declared visibility of types and methods
//!
//! CIL metadata encodes accessibility in type/method attribute flags; this
//! module decodes those into a small ordered model the filter subsystem can
//! compare against configured thresholds. The decoders are total: ambiguous
//! or unknown flag combinations fall back to the most restrictive level
//! rather than erroring.

use serde::{Deserialize, Serialize};

/// Declared visibility, ordered from most to least visible.
///
/// The order is load-bearing: filters compare a method's visibility against
/// a threshold with `<=`, so `Public < Internal < Protected < Private`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum VisibilityLevel {
    /// `public`
    Public,
    /// `internal` (assembly). "Protected internal" collapses here.
    Internal,
    /// `protected` (family)
    Protected,
    /// `private`
    Private,
}

/// Type accessibility flags as declared in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeAccess {
    /// Non-nested, visible outside the assembly
    Public,
    /// Non-nested, assembly-only
    NotPublic,
    /// Nested, public
    NestedPublic,
    /// Nested, assembly-only
    NestedAssembly,
    /// Nested, family (protected)
    NestedFamily,
    /// Nested, family-or-assembly (protected internal)
    NestedFamilyOrAssembly,
    /// Nested, family-and-assembly (private protected)
    NestedFamilyAndAssembly,
    /// Nested, private
    NestedPrivate,
}

impl TypeAccess {
    /// Resolve the accessibility flags to a visibility level.
    ///
    /// Nested visibility is derived from the nested-accessibility flags;
    /// family-or-assembly collapses to [`VisibilityLevel::Internal`].
    pub fn visibility_level(&self) -> VisibilityLevel {
        match self {
            TypeAccess::Public | TypeAccess::NestedPublic => VisibilityLevel::Public,
            TypeAccess::NotPublic
            | TypeAccess::NestedAssembly
            | TypeAccess::NestedFamilyOrAssembly => VisibilityLevel::Internal,
            TypeAccess::NestedFamily => VisibilityLevel::Protected,
            TypeAccess::NestedFamilyAndAssembly | TypeAccess::NestedPrivate => {
                VisibilityLevel::Private
            }
        }
    }
}

/// Method accessibility flags as declared in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodAccess {
    /// `public`
    Public,
    /// `internal` (assembly)
    Assembly,
    /// `protected` (family)
    Family,
    /// `protected internal` (family-or-assembly)
    FamilyOrAssembly,
    /// `private protected` (family-and-assembly)
    FamilyAndAssembly,
    /// `private`
    Private,
}

impl MethodAccess {
    /// Resolve the accessibility flags to a visibility level.
    pub fn visibility_level(&self) -> VisibilityLevel {
        match self {
            MethodAccess::Public => VisibilityLevel::Public,
            MethodAccess::Assembly | MethodAccess::FamilyOrAssembly => VisibilityLevel::Internal,
            MethodAccess::Family => VisibilityLevel::Protected,
            MethodAccess::FamilyAndAssembly | MethodAccess::Private => VisibilityLevel::Private,
        }
    }
}

/// A visibility threshold: how far down the visibility order tracing
/// reaches. Higher variants include everything the lower ones do.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TraceTargetVisibility {
    /// Nothing is included.
    None,
    /// Only public members.
    Public,
    /// Internal or more visible.
    InternalOrMoreVisible,
    /// Protected or more visible.
    ProtectedOrMoreVisible,
    /// Everything, including private members.
    All,
}

impl TraceTargetVisibility {
    /// Whether a member with the given visibility falls under this
    /// threshold.
    pub fn admits(&self, level: VisibilityLevel) -> bool {
        match self {
            TraceTargetVisibility::None => false,
            TraceTargetVisibility::Public => level == VisibilityLevel::Public,
            TraceTargetVisibility::InternalOrMoreVisible => level <= VisibilityLevel::Internal,
            TraceTargetVisibility::ProtectedOrMoreVisible => level <= VisibilityLevel::Protected,
            TraceTargetVisibility::All => true,
        }
    }

    /// Parse a configuration keyword into a threshold.
    pub fn parse_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "none" => Some(TraceTargetVisibility::None),
            "public" => Some(TraceTargetVisibility::Public),
            "internal" | "internalormorevisible" => {
                Some(TraceTargetVisibility::InternalOrMoreVisible)
            }
            "protected" | "protectedormorevisible" => {
                Some(TraceTargetVisibility::ProtectedOrMoreVisible)
            }
            "all" | "private" => Some(TraceTargetVisibility::All),
            _ => None,
        }
    }
}
