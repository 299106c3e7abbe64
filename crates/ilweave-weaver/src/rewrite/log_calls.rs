//! Static façade-call redirection
//!
//! Calls to the configured static logging façade are rewritten into
//! instance calls on the per-type logger, prefixed with the enclosing
//! method's signature so fire-and-forget log statements become
//! contextualized. Redirection is independent of the trace decision and
//! runs even for methods the filter excluded.

use crate::emit::{AdapterRefs, Emitter};
use crate::error::{WeaveError, WeaveResult};
use ilweave_model::{
    FieldRef, InstrId, Instruction, MethodBody, MethodRef, MethodReferenceInfo, MethodSemantics,
    Opcode, Operand,
};

/// Redirect every call to `facade` in `body`. Returns the number of calls
/// rewritten.
///
/// The redirected instance method is named `<FaçadeTypeName><CallName>`;
/// getters keep their accessor prefix (`get_IsDebugEnabled` on façade `Log`
/// becomes `get_LogIsDebugEnabled`). Arguments are spilled to fresh locals
/// so the logger reference and signature string can be pushed underneath
/// them. Façade property setters fail fast: there is no instance-call shape
/// that preserves their semantics.
pub fn redirect_facade_calls(
    body: &mut MethodBody,
    signature: &str,
    facade_full_name: &str,
    adapter: &AdapterRefs,
    logger_field: &FieldRef,
) -> WeaveResult<usize> {
    let facade_simple_name = facade_full_name
        .rsplit(['.', '/'])
        .next()
        .unwrap_or(facade_full_name);

    let call_sites: Vec<(InstrId, MethodRef)> = body
        .instructions()
        .filter_map(|(id, instr)| match (&instr.opcode, &instr.operand) {
            (Opcode::Call, Operand::Method(target))
                if target.declaring_type.full_name() == facade_full_name =>
            {
                Some((id, target.clone()))
            }
            _ => None,
        })
        .collect();

    for (site, target) in &call_sites {
        let info = MethodReferenceInfo::unresolved(target);
        let instance_name = match info.semantics() {
            MethodSemantics::Setter => {
                return Err(WeaveError::StaticSetterNotSupported {
                    facade_type: facade_full_name.to_string(),
                    method_name: target.name.clone(),
                });
            }
            MethodSemantics::Getter => {
                let property = target.name.trim_start_matches("get_");
                format!("get_{}{}", facade_simple_name, property)
            }
            _ => format!("{}{}", facade_simple_name, target.name),
        };

        // Spill the arguments so the receiver and signature go underneath.
        let mut arg_locals = Vec::with_capacity(target.param_types.len());
        for ty in &target.param_types {
            arg_locals.push(body.new_local(ty.clone())?);
        }
        {
            let mut em = Emitter::before(body, *site);
            for local in arg_locals.iter().rev() {
                em.stloc(*local)?;
            }
            em.load_logger(logger_field)?;
            em.ldstr(signature)?;
            for local in &arg_locals {
                em.ldloc(*local)?;
            }
        }

        let replacement = adapter.redirected_call(
            instance_name,
            target.param_types.clone(),
            target.return_type.clone(),
        );
        body.replace(
            *site,
            Instruction::with(Opcode::Callvirt, Operand::Method(replacement)),
        )?;
    }

    Ok(call_sites.len())
}
