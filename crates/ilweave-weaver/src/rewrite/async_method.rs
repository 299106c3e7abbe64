//! Async body rewriting
//!
//! The compiler moves an async method's code into a generated state-machine
//! type; the kickoff body only constructs and starts it. Enter tracing
//! therefore goes into the kickoff, but the start tick must outlive the
//! kickoff frame, so it is stored into a new instance field on the state
//! machine right after the state-machine local's first use. Leave tracing
//! goes into the driver method (`MoveNext`) at the completion sites: the
//! builder's `SetResult`/`SetException` calls are the only code paths that
//! know the final result or fault.

use crate::emit::{self, Emitter, EXCEPTION_SLOT};
use crate::error::{WeaveError, WeaveResult};
use ilweave_model::{
    CilType, FieldRef, InstrId, Instruction, MethodDef, MethodRef, Opcode, Operand, TypeRef,
};

/// Weave enter tracing into an async method's kickoff body and thread the
/// start tick into the state machine's tick field.
pub fn weave_kickoff(
    method: &mut MethodDef,
    state_machine_type: &str,
    tick_field: &FieldRef,
    ctx: &super::TraceCallContext<'_>,
) -> WeaveResult<()> {
    let method_name = method.name.clone();
    let is_static = method.is_static;
    let parameters = method.parameters.clone();
    let arg_base: u16 = if is_static { 0 } else { 1 };

    let Some(body) = method.body.as_mut() else {
        return Ok(());
    };
    let Some(first) = body.first_instr() else {
        return Ok(());
    };

    // The local holding the state-machine instance. Debug builds generate a
    // class, release builds a struct; the local's type tells which.
    let state_machine_local = body
        .local_slots()
        .find_map(|(id, slot)| match &slot.ty {
            CilType::Class(r) if r.full_name() == state_machine_type => Some((id, false)),
            CilType::ValueType(r) if r.full_name() == state_machine_type => Some((id, true)),
            _ => None,
        });
    let Some((sm_local, sm_is_value)) = state_machine_local else {
        return Err(WeaveError::StateMachineLocalNotFound {
            type_name: state_machine_type.to_string(),
            method: method_name,
        });
    };

    // Enter splice, as in the ordinary strategy but with the tick captured
    // into the state machine instead of a local.
    {
        let mut em = Emitter::before(body, first);
        em.load_logger(&ctx.logger_field)?;
        em.ldstr(ctx.signature.as_str())?;
        em.enter_payload(&parameters, arg_base)?;
        if let Some(extras) = &ctx.extras {
            em.extras_array(extras)?;
        }
        em.callvirt(ctx.adapter.trace_enter(ctx.has_extras()))?;
    }

    // Store the tick right after the state-machine local's first use, once
    // the instance exists.
    let first_use = body.iter().find(|id| {
        matches!(
            body.instr(*id).map(|i| &i.operand),
            Some(Operand::Local(l)) if *l == sm_local
        )
    });
    let Some(anchor) = first_use else {
        return Err(WeaveError::StateMachineLocalNotFound {
            type_name: state_machine_type.to_string(),
            method: method_name,
        });
    };

    let load_op = if sm_is_value {
        Opcode::Ldloca
    } else {
        Opcode::Ldloc
    };
    let a = body.insert_after(anchor, Instruction::with(load_op, Operand::Local(sm_local)))?;
    let b = body.insert_after(
        a,
        Instruction::with(
            Opcode::Call,
            Operand::Method(emit::stopwatch_get_timestamp()),
        ),
    )?;
    body.insert_after(
        b,
        Instruction::with(Opcode::Stfld, Operand::Field(tick_field.clone())),
    )?;

    Ok(())
}

/// Whether a method reference points at an async method-builder type.
fn is_builder_type(ty: &TypeRef) -> bool {
    ty.namespace == "System.Runtime.CompilerServices"
        && ty.name.starts_with("Async")
        && ty.name.contains("MethodBuilder")
}

enum Completion {
    Result,
    Fault,
}

/// Weave leave tracing into a state machine's driver method.
///
/// Before each `SetResult` the result value (if any) is spilled, reported
/// as the null-named return slot and reloaded; before each `SetException`
/// the fault is reported under the `$exception` slot. The builder call
/// itself proceeds untouched, so completion semantics are preserved. An
/// async method whose builder completes without a value traces a void
/// leave.
pub fn weave_move_next(
    move_next: &mut MethodDef,
    tick_field: &FieldRef,
    ctx: &super::TraceCallContext<'_>,
) -> WeaveResult<()> {
    let Some(body) = move_next.body.as_mut() else {
        return Ok(());
    };

    let sites: Vec<(InstrId, MethodRef, Completion)> = body
        .instructions()
        .filter_map(|(id, instr)| {
            if !matches!(instr.opcode, Opcode::Call | Opcode::Callvirt) {
                return None;
            }
            let Operand::Method(target) = &instr.operand else {
                return None;
            };
            if !is_builder_type(&target.declaring_type) {
                return None;
            }
            match target.name.as_str() {
                "SetResult" => Some((id, target.clone(), Completion::Result)),
                "SetException" => Some((id, target.clone(), Completion::Fault)),
                _ => None,
            }
        })
        .collect();

    for (site, target, completion) in sites {
        match completion {
            Completion::Result if target.param_types.is_empty() => {
                let mut em = Emitter::before(body, site);
                em.load_logger(&ctx.logger_field)?;
                em.ldstr(ctx.signature.as_str())?;
                em.with(Opcode::Ldarg, Operand::Arg(0))?;
                em.with(Opcode::Ldfld, Operand::Field(tick_field.clone()))?;
                em.call(emit::stopwatch_get_timestamp())?;
                em.simple(Opcode::Ldnull)?;
                em.simple(Opcode::Ldnull)?;
                if let Some(extras) = &ctx.extras {
                    em.extras_array(extras)?;
                }
                em.callvirt(ctx.adapter.trace_leave(ctx.has_extras()))?;
            }
            Completion::Result => {
                let value_ty = target.param_types[0].clone();
                let tmp = body.new_local(value_ty.clone())?;
                let mut em = Emitter::before(body, site);
                em.stloc(tmp)?;
                em.load_logger(&ctx.logger_field)?;
                em.ldstr(ctx.signature.as_str())?;
                em.with(Opcode::Ldarg, Operand::Arg(0))?;
                em.with(Opcode::Ldfld, Operand::Field(tick_field.clone()))?;
                em.call(emit::stopwatch_get_timestamp())?;
                em.string_array(&[None])?;
                em.object_array(1, |em, _| {
                    em.ldloc(tmp)?;
                    em.box_if_needed(&value_ty)
                })?;
                if let Some(extras) = &ctx.extras {
                    em.extras_array(extras)?;
                }
                em.callvirt(ctx.adapter.trace_leave(ctx.has_extras()))?;
                em.ldloc(tmp)?;
            }
            Completion::Fault => {
                let exc_ty = target
                    .param_types
                    .first()
                    .cloned()
                    .unwrap_or(CilType::Class(emit::system_exception()));
                let tmp = body.new_local(exc_ty)?;
                let mut em = Emitter::before(body, site);
                em.stloc(tmp)?;
                em.load_logger(&ctx.logger_field)?;
                em.ldstr(ctx.signature.as_str())?;
                em.with(Opcode::Ldarg, Operand::Arg(0))?;
                em.with(Opcode::Ldfld, Operand::Field(tick_field.clone()))?;
                em.call(emit::stopwatch_get_timestamp())?;
                em.string_array(&[Some(EXCEPTION_SLOT)])?;
                em.object_array(1, |em, _| {
                    em.ldloc(tmp)?;
                    Ok(())
                })?;
                if let Some(extras) = &ctx.extras {
                    em.extras_array(extras)?;
                }
                em.callvirt(ctx.adapter.trace_leave(ctx.has_extras()))?;
                em.ldloc(tmp)?;
            }
        }
    }

    Ok(())
}
