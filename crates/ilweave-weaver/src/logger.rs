//! Per-type logger field and static-initializer synthesis
//!
//! Each woven type carries one cached static logger field, initialized in
//! the type's static constructor by resolving the runtime type token and
//! calling the configured log-manager factory. Creation is lazy (first
//! method of the type that needs it) and get-or-create: a second request
//! returns the existing field.

use crate::emit::{self, AdapterRefs, Emitter, LOGGER_FIELD_NAME};
use crate::error::WeaveResult;
use ilweave_model::{
    CilType, FieldDef, FieldRef, Instruction, MethodAccess, MethodBody, MethodDef,
    MethodSemantics, Opcode, Operand, TypeDef,
};

/// Get or create the cached logger field on `ty` (declared at `path`),
/// synthesizing the static-constructor initialization when the field is
/// first added.
///
/// Generic declaring types bind the field through a self-instantiated type
/// reference so `ldsfld` resolves for every instantiation.
pub fn ensure_logger_field(
    ty: &mut TypeDef,
    path: &str,
    adapter: &AdapterRefs,
) -> WeaveResult<FieldRef> {
    let field = adapter.logger_field(emit::declared_ref(ty, path));
    if ty.field(LOGGER_FIELD_NAME).is_some() {
        return Ok(field);
    }

    ty.fields.push(FieldDef {
        name: LOGGER_FIELD_NAME.to_string(),
        ty: adapter.logger_cil_type(),
        is_static: true,
    });

    let token_type = CilType::Class(emit::declared_ref(ty, path));
    match ty.method_mut(".cctor") {
        Some(cctor) => {
            // Initialization goes ahead of any existing code.
            let body = cctor.body.get_or_insert_with(MethodBody::new);
            match body.first_instr() {
                Some(first) => {
                    let mut em = Emitter::before(body, first);
                    emit_init(&mut em, &token_type, adapter, &field)?;
                }
                None => {
                    let mut em = Emitter::at_end(body);
                    emit_init(&mut em, &token_type, adapter, &field)?;
                    em.simple(Opcode::Ret)?;
                }
            }
        }
        None => {
            let mut cctor = MethodDef::new(".cctor", MethodAccess::Private, CilType::Void);
            cctor.is_static = true;
            cctor.semantics = MethodSemantics::StaticConstructor;
            let body = cctor.body.get_or_insert_with(MethodBody::new);
            let mut em = Emitter::at_end(body);
            emit_init(&mut em, &token_type, adapter, &field)?;
            em.simple(Opcode::Ret)?;
            ty.methods.push(cctor);
        }
    }

    Ok(field)
}

fn emit_init(
    em: &mut Emitter<'_>,
    token_type: &CilType,
    adapter: &AdapterRefs,
    field: &FieldRef,
) -> WeaveResult<()> {
    em.with(Opcode::Ldtoken, Operand::Type(token_type.clone()))?;
    em.call(emit::get_type_from_handle())?;
    em.call(adapter.get_logger())?;
    em.with(Opcode::Stsfld, Operand::Field(field.clone()))?;
    Ok(())
}

/// Whether a body already loads the cached logger field of `field`'s
/// declaring type. This is the idempotence marker: a woven method always
/// contains such a load, so its presence makes a second pass skip the
/// method entirely.
pub fn already_woven(method: &MethodDef, field: &FieldRef) -> bool {
    let Some(body) = method.body.as_ref() else {
        return false;
    };
    body.instructions().any(|(_, instr)| {
        instr.opcode == Opcode::Ldsfld
            && matches!(
                &instr.operand,
                Operand::Field(f)
                    if f.name == field.name
                        && f.declaring_type.full_name() == field.declaring_type.full_name()
            )
    })
}
