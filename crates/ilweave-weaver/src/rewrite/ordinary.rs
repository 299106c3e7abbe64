//! Ordinary body rewriting
//!
//! Two phases over one method body. The enter phase splices payload
//! building, the trace-enter call and a start-tick capture before the first
//! original instruction. The leave phase funnels every original `ret`
//! through a single synthesized exit block via `leave` (a raw branch out of
//! a protected region is not verifiable CIL), then wraps the original body
//! in a catch-all handler that reports the exception payload and rethrows,
//! so exit tracing fires exactly once on every path.

use crate::emit::{
    self, Emitter, EXCEPTION_SLOT,
};
use crate::error::WeaveResult;
use crate::rewrite::TraceCallContext;
use ilweave_model::{
    CilType, ExceptionHandler, HandlerKind, InstrId, Instruction, LocalId, MethodDef, Opcode,
    Operand, Parameter,
};

/// One slot of the leave payload's value array.
enum SlotLoad {
    /// The stored return value.
    ReturnValue(LocalId),
    /// An `out`/`ref` parameter read through its pointer at exit.
    OutParam(u16, CilType),
}

/// Weave enter/leave tracing into a method body.
///
/// Methods without a body or with an empty instruction stream are left
/// untouched.
pub fn weave_trace(method: &mut MethodDef, ctx: &TraceCallContext<'_>) -> WeaveResult<()> {
    let is_static = method.is_static;
    let return_type = method.return_type.clone();
    let has_ret_value = method.has_return_value();
    let parameters = method.parameters.clone();
    let arg_base: u16 = if is_static { 0 } else { 1 };

    let Some(body) = method.body.as_mut() else {
        return Ok(());
    };
    let Some(first) = body.first_instr() else {
        return Ok(());
    };

    let ret_sites: Vec<InstrId> = body
        .instructions()
        .filter(|(_, i)| i.opcode == Opcode::Ret)
        .map(|(id, _)| id)
        .collect();

    let start_local = body.new_local(CilType::I8)?;
    let ret_local = if has_ret_value {
        Some(body.new_local(return_type.clone())?)
    } else {
        None
    };
    let exc_local = body.new_local(CilType::Class(emit::system_exception()))?;

    // Enter phase, spliced ahead of the original first instruction.
    {
        let mut em = Emitter::before(body, first);
        em.load_logger(&ctx.logger_field)?;
        em.ldstr(ctx.signature.as_str())?;
        em.enter_payload(&parameters, arg_base)?;
        if let Some(extras) = &ctx.extras {
            em.extras_array(extras)?;
        }
        em.callvirt(ctx.adapter.trace_enter(ctx.has_extras()))?;
        em.call(emit::stopwatch_get_timestamp())?;
        em.stloc(start_local)?;
    }

    let out_params: Vec<(u16, Parameter)> = parameters
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_out && !p.is_no_trace())
        .map(|(i, p)| (arg_base + i as u16, p.clone()))
        .collect();

    // Synthesized exit block: report, reload the return value, return.
    let exit_first;
    {
        let mut em = Emitter::at_end(body);
        exit_first = em.load_logger(&ctx.logger_field)?;
        em.ldstr(ctx.signature.as_str())?;
        em.ldloc(start_local)?;
        em.call(emit::stopwatch_get_timestamp())?;

        let mut slot_names: Vec<Option<&str>> = Vec::new();
        let mut slot_loads: Vec<SlotLoad> = Vec::new();
        if let Some(ret) = ret_local {
            // The synthetic return-value slot carries a null name.
            slot_names.push(None);
            slot_loads.push(SlotLoad::ReturnValue(ret));
        }
        for (arg, param) in &out_params {
            slot_names.push(Some(param.name.as_str()));
            slot_loads.push(SlotLoad::OutParam(*arg, param.ty.strip_byref().clone()));
        }
        if slot_loads.is_empty() {
            em.simple(Opcode::Ldnull)?;
            em.simple(Opcode::Ldnull)?;
        } else {
            em.string_array(&slot_names)?;
            em.object_array(slot_loads.len(), |em, index| match &slot_loads[index] {
                SlotLoad::ReturnValue(local) => {
                    em.ldloc(*local)?;
                    em.box_if_needed(&return_type)
                }
                SlotLoad::OutParam(arg, pointee) => {
                    em.with(Opcode::Ldarg, Operand::Arg(*arg))?;
                    em.read_through_pointer(pointee)
                }
            })?;
        }
        if let Some(extras) = &ctx.extras {
            em.extras_array(extras)?;
        }
        em.callvirt(ctx.adapter.trace_leave(ctx.has_extras()))?;
        if let Some(ret) = ret_local {
            em.ldloc(ret)?;
        }
        em.simple(Opcode::Ret)?;
    }

    // Every original `ret` becomes a store (when a value is on the stack)
    // followed by a `leave` into the exit block. Replacing in place keeps
    // branches that targeted the `ret` valid.
    for site in ret_sites {
        match ret_local {
            Some(local) => {
                body.replace(site, Instruction::with(Opcode::Stloc, Operand::Local(local)))?;
                body.insert_after(
                    site,
                    Instruction::with(Opcode::Leave, Operand::Target(exit_first)),
                )?;
            }
            None => {
                body.replace(
                    site,
                    Instruction::with(Opcode::Leave, Operand::Target(exit_first)),
                )?;
            }
        }
    }

    // The protected range ends just before the exit block.
    let order: Vec<InstrId> = body.iter().collect();
    let exit_pos = body
        .position(exit_first)
        .ok_or(ilweave_model::BodyError::NotInStream(exit_first))?;
    let try_end = order[exit_pos - 1];

    // Catch-all handler: report the exception payload, rethrow to keep the
    // original stack trace.
    let handler_start;
    let handler_end;
    {
        let mut em = Emitter::at_end(body);
        handler_start = em.stloc(exc_local)?;
        em.load_logger(&ctx.logger_field)?;
        em.ldstr(ctx.signature.as_str())?;
        em.ldloc(start_local)?;
        em.call(emit::stopwatch_get_timestamp())?;
        em.string_array(&[Some(EXCEPTION_SLOT)])?;
        em.object_array(1, |em, _| {
            em.ldloc(exc_local)?;
            Ok(())
        })?;
        if let Some(extras) = &ctx.extras {
            em.extras_array(extras)?;
        }
        em.callvirt(ctx.adapter.trace_leave(ctx.has_extras()))?;
        handler_end = em.simple(Opcode::Rethrow)?;
    }

    body.handlers.push(ExceptionHandler {
        kind: HandlerKind::Catch {
            catch_type: emit::system_exception(),
        },
        try_start: first,
        try_end,
        handler_start,
        handler_end,
    });

    Ok(())
}
