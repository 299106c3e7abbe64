//! ilweave object model
//!
//! This crate provides the in-memory representation of a compiled CIL module
//! that the weaver mutates in place: types, methods, instruction streams,
//! exception-handler regions, and the decoded trace annotations the filter
//! subsystem consumes.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod annotations;
pub mod instr;
pub mod method;
pub mod module;
pub mod pretty;
pub mod types;
pub mod validate;
pub mod visibility;

pub use annotations::{AttrValue, CustomAttribute, TraceAnnotation};
pub use instr::{
    BodyError, ExceptionHandler, HandlerKind, InstrId, Instruction, LocalId, LocalSlot, MethodBody,
    Opcode, Operand,
};
pub use method::{
    GenericParam, MethodDef, MethodRef, MethodReferenceInfo, MethodSemantics, Parameter,
    PropertyRef,
};
pub use module::{AssemblyRef, ModuleDef};
pub use types::{CilType, FieldDef, FieldRef, TypeDef, TypeRef};
pub use validate::{validate_body, ValidateError};
pub use visibility::{MethodAccess, TraceTargetVisibility, TypeAccess, VisibilityLevel};
