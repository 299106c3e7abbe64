//! CIL instruction stream model
//!
//! Method bodies are modeled as an arena of instructions plus an ordered
//! execution sequence. Instructions are addressed by stable [`InstrId`]
//! handles rather than by position: the weaving passes key their edits on
//! instruction identity ("insert before this specific `ret`"), and splicing
//! new instructions must never invalidate branch targets or
//! exception-handler boundaries that reference existing instructions.

use crate::method::MethodRef;
use crate::types::{CilType, FieldRef, TypeRef};
use thiserror::Error;

/// Stable handle to an instruction within one method body.
///
/// Identity is preserved across splices: inserting or removing other
/// instructions never changes what an existing id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrId(pub(crate) u32);

impl InstrId {
    /// Raw arena index.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for InstrId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "il{}", self.0)
    }
}

/// Handle to a local variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub(crate) u16);

impl LocalId {
    /// Slot index within the method's local signature.
    pub fn index(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "loc{}", self.0)
    }
}

/// A local variable slot.
#[derive(Debug, Clone)]
pub struct LocalSlot {
    /// Declared type of the slot.
    pub ty: CilType,
}

/// CIL opcodes understood by the weaver.
///
/// This is the subset the rewriting engine reads and synthesizes; it is not
/// the full ECMA-335 instruction set. Operands are carried on
/// [`Instruction`], not encoded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation
    Nop,
    /// Duplicate top of stack
    Dup,
    /// Discard top of stack
    Pop,

    /// Push null reference
    Ldnull,
    /// Push 32-bit integer constant
    LdcI4,
    /// Push 64-bit integer constant
    LdcI8,
    /// Push 32-bit float constant
    LdcR4,
    /// Push 64-bit float constant
    LdcR8,
    /// Push string literal
    Ldstr,

    /// Load argument
    Ldarg,
    /// Load argument address
    Ldarga,
    /// Store to argument
    Starg,
    /// Load local variable
    Ldloc,
    /// Load local variable address
    Ldloca,
    /// Store to local variable
    Stloc,

    /// Load static field
    Ldsfld,
    /// Store static field
    Stsfld,
    /// Load instance field
    Ldfld,
    /// Store instance field
    Stfld,
    /// Push runtime type handle
    Ldtoken,

    /// Allocate one-dimensional array
    Newarr,
    /// Store reference element into array
    StelemRef,
    /// Box a value type
    Box,

    /// Call a method
    Call,
    /// Call a virtual/interface method
    Callvirt,
    /// Allocate and construct an object
    Newobj,

    /// Return from method
    Ret,
    /// Unconditional branch
    Br,
    /// Branch if true/non-zero
    Brtrue,
    /// Branch if false/zero
    Brfalse,
    /// Exit a protected region toward a target
    Leave,
    /// Throw the exception on the stack
    Throw,
    /// Rethrow the in-flight exception (handler only, preserves stack trace)
    Rethrow,

    /// Indirect load, signed 8-bit
    LdindI1,
    /// Indirect load, unsigned 8-bit
    LdindU1,
    /// Indirect load, signed 16-bit
    LdindI2,
    /// Indirect load, unsigned 16-bit
    LdindU2,
    /// Indirect load, signed 32-bit
    LdindI4,
    /// Indirect load, unsigned 32-bit
    LdindU4,
    /// Indirect load, 64-bit integer
    LdindI8,
    /// Indirect load, 32-bit float
    LdindR4,
    /// Indirect load, 64-bit float
    LdindR8,
    /// Indirect load, object reference
    LdindRef,
    /// Indirect load of a value type (operand: the type)
    Ldobj,

    /// Indirect store, 32-bit integer
    StindI4,
    /// Indirect store, 64-bit integer
    StindI8,
    /// Indirect store, 64-bit float
    StindR8,
    /// Indirect store, object reference
    StindRef,
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// 32-bit integer immediate
    Int32(i32),
    /// 64-bit integer immediate
    Int64(i64),
    /// 32-bit float immediate
    Float32(f32),
    /// 64-bit float immediate
    Float64(f64),
    /// String literal
    Str(String),
    /// Argument index (0 = `this` for instance methods)
    Arg(u16),
    /// Local variable slot
    Local(LocalId),
    /// Branch / leave target
    Target(InstrId),
    /// Method reference
    Method(MethodRef),
    /// Field reference
    Field(FieldRef),
    /// Type operand (newarr, box, ldtoken, ldobj)
    Type(CilType),
}

/// One CIL instruction: opcode plus operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode.
    pub opcode: Opcode,
    /// The operand, `Operand::None` for operand-less opcodes.
    pub operand: Operand,
}

impl Instruction {
    /// Build an operand-less instruction.
    pub fn simple(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    /// Build an instruction with an operand.
    pub fn with(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }
}

/// Kind of an exception-handler region.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerKind {
    /// Catch handler for the given exception type.
    Catch {
        /// Exception type the handler catches.
        catch_type: TypeRef,
    },
    /// Finally handler.
    Finally,
}

/// An exception-handler region.
///
/// All boundaries are inclusive instruction handles: the protected range
/// covers `try_start..=try_end` in execution order, the handler covers
/// `handler_start..=handler_end`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Handler kind.
    pub kind: HandlerKind,
    /// First protected instruction.
    pub try_start: InstrId,
    /// Last protected instruction.
    pub try_end: InstrId,
    /// First handler instruction.
    pub handler_start: InstrId,
    /// Last handler instruction.
    pub handler_end: InstrId,
}

/// Errors raised by body editing operations.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The anchor instruction is not part of this body's ordered stream.
    #[error("instruction {0} is not in the body's instruction stream")]
    NotInStream(InstrId),

    /// The handle does not name an allocated instruction.
    #[error("instruction {0} is out of bounds for this body")]
    OutOfBounds(InstrId),

    /// More locals than the CIL local signature can hold.
    #[error("too many local variables (max 65535)")]
    TooManyLocals,
}

/// A method body: instruction arena, execution order, locals and
/// exception-handler regions.
#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    arena: Vec<Instruction>,
    order: Vec<InstrId>,
    /// Local variable slots.
    pub locals: Vec<LocalSlot>,
    /// Exception-handler regions, innermost first.
    pub handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Create an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, instr: Instruction) -> InstrId {
        let id = InstrId(self.arena.len() as u32);
        self.arena.push(instr);
        id
    }

    /// Append an instruction at the end of the stream.
    pub fn push(&mut self, instr: Instruction) -> InstrId {
        let id = self.alloc(instr);
        self.order.push(id);
        id
    }

    /// Insert an instruction immediately before `anchor`.
    pub fn insert_before(
        &mut self,
        anchor: InstrId,
        instr: Instruction,
    ) -> Result<InstrId, BodyError> {
        let pos = self.position(anchor).ok_or(BodyError::NotInStream(anchor))?;
        let id = self.alloc(instr);
        self.order.insert(pos, id);
        Ok(id)
    }

    /// Insert an instruction immediately after `anchor`.
    pub fn insert_after(
        &mut self,
        anchor: InstrId,
        instr: Instruction,
    ) -> Result<InstrId, BodyError> {
        let pos = self.position(anchor).ok_or(BodyError::NotInStream(anchor))?;
        let id = self.alloc(instr);
        self.order.insert(pos + 1, id);
        Ok(id)
    }

    /// Overwrite the instruction named by `id`, keeping the handle valid.
    ///
    /// Branch targets and handler boundaries referring to `id` keep
    /// referring to the replacement.
    pub fn replace(&mut self, id: InstrId, instr: Instruction) -> Result<(), BodyError> {
        let slot = self
            .arena
            .get_mut(id.0 as usize)
            .ok_or(BodyError::OutOfBounds(id))?;
        *slot = instr;
        Ok(())
    }

    /// Look up an instruction by handle.
    pub fn instr(&self, id: InstrId) -> Option<&Instruction> {
        self.arena.get(id.0 as usize)
    }

    /// Mutable lookup by handle.
    pub fn instr_mut(&mut self, id: InstrId) -> Option<&mut Instruction> {
        self.arena.get_mut(id.0 as usize)
    }

    /// Position of `id` in execution order, if it is in the stream.
    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.order.iter().position(|&x| x == id)
    }

    /// First instruction in execution order.
    pub fn first_instr(&self) -> Option<InstrId> {
        self.order.first().copied()
    }

    /// Last instruction in execution order.
    pub fn last_instr(&self) -> Option<InstrId> {
        self.order.last().copied()
    }

    /// Instruction handles in execution order.
    pub fn iter(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.order.iter().copied()
    }

    /// `(handle, instruction)` pairs in execution order.
    pub fn instructions(&self) -> impl Iterator<Item = (InstrId, &Instruction)> + '_ {
        self.order.iter().map(move |&id| (id, &self.arena[id.0 as usize]))
    }

    /// Number of instructions in the stream.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the stream is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(handle, slot)` pairs for the declared locals.
    pub fn local_slots(&self) -> impl Iterator<Item = (LocalId, &LocalSlot)> + '_ {
        self.locals
            .iter()
            .enumerate()
            .map(|(i, slot)| (LocalId(i as u16), slot))
    }

    /// Allocate a new local variable slot.
    pub fn new_local(&mut self, ty: CilType) -> Result<LocalId, BodyError> {
        if self.locals.len() >= u16::MAX as usize {
            return Err(BodyError::TooManyLocals);
        }
        let id = LocalId(self.locals.len() as u16);
        self.locals.push(LocalSlot { ty });
        Ok(id)
    }
}
