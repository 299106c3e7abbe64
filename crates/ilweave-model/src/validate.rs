//! Structural validation of method bodies
//!
//! Run after weaving to catch malformed output before it would be
//! persisted: dangling branch targets, inverted handler ranges, local
//! references past the signature.

use crate::instr::{InstrId, Opcode, Operand};
use crate::method::MethodDef;
use thiserror::Error;

/// Structural validation errors.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// A branch or leave targets an instruction that is not in the stream.
    #[error("branch at {source_instr} targets {target}, which is not in the instruction stream")]
    DanglingBranch {
        /// The branching instruction.
        source_instr: InstrId,
        /// The missing target.
        target: InstrId,
    },

    /// A local operand exceeds the local signature.
    #[error("instruction {0} references local slot {1}, but the body declares {2} locals")]
    LocalOutOfRange(InstrId, u16, usize),

    /// An exception-handler boundary is not in the stream.
    #[error("exception handler boundary {0} is not in the instruction stream")]
    DanglingHandlerBoundary(InstrId),

    /// Handler or try range is inverted or overlapping wrongly.
    #[error("exception handler ranges are out of order (try {try_start}..{try_end}, handler {handler_start}..{handler_end})")]
    HandlerRangeOrder {
        /// First protected instruction.
        try_start: InstrId,
        /// Last protected instruction.
        try_end: InstrId,
        /// First handler instruction.
        handler_start: InstrId,
        /// Last handler instruction.
        handler_end: InstrId,
    },

    /// The method has a body flag mismatch (abstract with instructions).
    #[error("abstract method {0} has a non-empty body")]
    AbstractWithBody(String),
}

/// Validate the structural invariants of a method's body.
pub fn validate_body(method: &MethodDef) -> Result<(), ValidateError> {
    let body = match &method.body {
        Some(body) => body,
        None => return Ok(()),
    };
    if method.is_abstract && !body.is_empty() {
        return Err(ValidateError::AbstractWithBody(method.name.clone()));
    }

    for (id, instr) in body.instructions() {
        match (&instr.opcode, &instr.operand) {
            (
                Opcode::Br | Opcode::Brtrue | Opcode::Brfalse | Opcode::Leave,
                Operand::Target(target),
            ) => {
                if body.position(*target).is_none() {
                    return Err(ValidateError::DanglingBranch {
                        source_instr: id,
                        target: *target,
                    });
                }
            }
            (_, Operand::Local(local)) => {
                if (local.index() as usize) >= body.locals.len() {
                    return Err(ValidateError::LocalOutOfRange(
                        id,
                        local.index(),
                        body.locals.len(),
                    ));
                }
            }
            _ => {}
        }
    }

    for handler in &body.handlers {
        let try_start = body
            .position(handler.try_start)
            .ok_or(ValidateError::DanglingHandlerBoundary(handler.try_start))?;
        let try_end = body
            .position(handler.try_end)
            .ok_or(ValidateError::DanglingHandlerBoundary(handler.try_end))?;
        let handler_start = body
            .position(handler.handler_start)
            .ok_or(ValidateError::DanglingHandlerBoundary(handler.handler_start))?;
        let handler_end = body
            .position(handler.handler_end)
            .ok_or(ValidateError::DanglingHandlerBoundary(handler.handler_end))?;

        if try_start > try_end || handler_start > handler_end || try_end >= handler_start {
            return Err(ValidateError::HandlerRangeOrder {
                try_start: handler.try_start,
                try_end: handler.try_end,
                handler_start: handler.handler_start,
                handler_end: handler.handler_end,
            });
        }
    }

    Ok(())
}
