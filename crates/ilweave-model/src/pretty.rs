//! Instruction-stream dumps for diagnostics and tests

use crate::instr::{MethodBody, Opcode, Operand};

/// CIL mnemonic for an opcode.
pub fn mnemonic(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::Nop => "nop",
        Opcode::Dup => "dup",
        Opcode::Pop => "pop",
        Opcode::Ldnull => "ldnull",
        Opcode::LdcI4 => "ldc.i4",
        Opcode::LdcI8 => "ldc.i8",
        Opcode::LdcR4 => "ldc.r4",
        Opcode::LdcR8 => "ldc.r8",
        Opcode::Ldstr => "ldstr",
        Opcode::Ldarg => "ldarg",
        Opcode::Ldarga => "ldarga",
        Opcode::Starg => "starg",
        Opcode::Ldloc => "ldloc",
        Opcode::Ldloca => "ldloca",
        Opcode::Stloc => "stloc",
        Opcode::Ldsfld => "ldsfld",
        Opcode::Stsfld => "stsfld",
        Opcode::Ldfld => "ldfld",
        Opcode::Stfld => "stfld",
        Opcode::Ldtoken => "ldtoken",
        Opcode::Newarr => "newarr",
        Opcode::StelemRef => "stelem.ref",
        Opcode::Box => "box",
        Opcode::Call => "call",
        Opcode::Callvirt => "callvirt",
        Opcode::Newobj => "newobj",
        Opcode::Ret => "ret",
        Opcode::Br => "br",
        Opcode::Brtrue => "brtrue",
        Opcode::Brfalse => "brfalse",
        Opcode::Leave => "leave",
        Opcode::Throw => "throw",
        Opcode::Rethrow => "rethrow",
        Opcode::LdindI1 => "ldind.i1",
        Opcode::LdindU1 => "ldind.u1",
        Opcode::LdindI2 => "ldind.i2",
        Opcode::LdindU2 => "ldind.u2",
        Opcode::LdindI4 => "ldind.i4",
        Opcode::LdindU4 => "ldind.u4",
        Opcode::LdindI8 => "ldind.i8",
        Opcode::LdindR4 => "ldind.r4",
        Opcode::LdindR8 => "ldind.r8",
        Opcode::LdindRef => "ldind.ref",
        Opcode::Ldobj => "ldobj",
        Opcode::StindI4 => "stind.i4",
        Opcode::StindI8 => "stind.i8",
        Opcode::StindR8 => "stind.r8",
        Opcode::StindRef => "stind.ref",
    }
}

fn operand_text(operand: &Operand) -> String {
    match operand {
        Operand::None => String::new(),
        Operand::Int32(v) => format!(" {}", v),
        Operand::Int64(v) => format!(" {}", v),
        Operand::Float32(v) => format!(" {}", v),
        Operand::Float64(v) => format!(" {}", v),
        Operand::Str(s) => format!(" \"{}\"", s),
        Operand::Arg(i) => format!(" arg{}", i),
        Operand::Local(l) => format!(" {}", l),
        Operand::Target(t) => format!(" -> {}", t),
        Operand::Method(m) => format!(" {}", m.full_name()),
        Operand::Field(f) => format!(" {}::{}", f.declaring_type.full_name(), f.name),
        Operand::Type(t) => format!(" {}", t.display_name()),
    }
}

/// Render a body as one line per instruction, stable across identical
/// streams. Tests use this to compare woven output (e.g. the idempotence
/// property: weave twice, dumps must be identical).
pub fn dump_body(body: &MethodBody) -> String {
    let mut out = String::new();
    for (id, instr) in body.instructions() {
        out.push_str(&format!(
            "{:>6}: {}{}\n",
            id.to_string(),
            mnemonic(instr.opcode),
            operand_text(&instr.operand)
        ));
    }
    for handler in &body.handlers {
        let kind = match &handler.kind {
            crate::instr::HandlerKind::Catch { catch_type } => {
                format!("catch {}", catch_type.full_name())
            }
            crate::instr::HandlerKind::Finally => "finally".to_string(),
        };
        out.push_str(&format!(
            ".try {}..{} {} {}..{}\n",
            handler.try_start, handler.try_end, kind, handler.handler_start, handler.handler_end
        ));
    }
    out
}
