//! Instruction synthesis helpers
//!
//! Everything the rewriters splice into method bodies is built here: adapter
//! method/field references derived from the weave configuration, well-known
//! runtime references (timestamp source, type-token resolution), and an
//! [`Emitter`] that appends or inserts instruction sequences at a fixed
//! point of a body. Array-building sequences leave exactly one value on the
//! stack, so they compose inside argument lists of the synthesized calls.

use crate::error::WeaveResult;
use ilweave_filter::TraceLoggingConfiguration;
use ilweave_model::{
    CilType, FieldRef, InstrId, Instruction, LocalId, MethodBody, MethodRef, Opcode, Operand,
    Parameter, TypeDef, TypeRef,
};

/// Name of the per-type cached static logger field. Its presence in a body
/// (as a `ldsfld` operand) is the idempotence marker.
pub const LOGGER_FIELD_NAME: &str = "__traceLogger";

/// Name of the start-tick instance field added to async state machines.
pub const START_TICK_FIELD_NAME: &str = "__traceStartTick";

/// Name slot paired with a caught exception in the leave payload.
pub const EXCEPTION_SLOT: &str = "$exception";

/// Assembly carrying the well-known runtime types referenced below.
const RUNTIME_ASSEMBLY: &str = "System.Runtime";

fn runtime_type(namespace: &str, name: &str) -> TypeRef {
    TypeRef::new(namespace, name).with_assembly(RUNTIME_ASSEMBLY)
}

/// `System.Diagnostics.Stopwatch::GetTimestamp() -> long`, the monotonic
/// high-resolution tick source.
pub fn stopwatch_get_timestamp() -> MethodRef {
    MethodRef::new(runtime_type("System.Diagnostics", "Stopwatch"), "GetTimestamp")
        .returning(CilType::I8)
}

/// `System.Type::GetTypeFromHandle(RuntimeTypeHandle) -> Type`, paired with
/// `ldtoken` in synthesized static initializers.
pub fn get_type_from_handle() -> MethodRef {
    MethodRef::new(runtime_type("System", "Type"), "GetTypeFromHandle")
        .with_params(vec![CilType::ValueType(runtime_type(
            "System",
            "RuntimeTypeHandle",
        ))])
        .returning(CilType::Class(runtime_type("System", "Type")))
}

/// `System.Exception`, the catch type of synthesized handler regions.
pub fn system_exception() -> TypeRef {
    runtime_type("System", "Exception")
}

/// Turn a slash-qualified type path (`Ns.Outer/Inner`) into a reference.
///
/// The namespace is taken from the outermost segment only, matching how
/// metadata stores it.
pub fn type_ref_from_path(path: &str) -> TypeRef {
    let (outer, nested) = match path.split_once('/') {
        Some((outer, rest)) => (outer, Some(rest)),
        None => (path, None),
    };
    let (namespace, outer_name) = match outer.rsplit_once('.') {
        Some((ns, n)) => (ns, n),
        None => ("", outer),
    };
    let name = match nested {
        Some(rest) => format!("{}/{}", outer_name, rest),
        None => outer_name.to_string(),
    };
    TypeRef::new(namespace, name)
}

/// Reference to `ty` as declared at `path`, instantiated with its own
/// generic parameters so member references bind for every instantiation.
pub fn declared_ref(ty: &TypeDef, path: &str) -> TypeRef {
    let base = type_ref_from_path(path);
    if ty.generic_params.is_empty() {
        base
    } else {
        let args = ty
            .generic_params
            .iter()
            .map(|p| CilType::GenericParam(p.name.clone()))
            .collect();
        base.with_generic_args(args)
    }
}

/// References into the logging-adapter assembly, derived once per weave
/// from the configuration's type names.
#[derive(Debug, Clone)]
pub struct AdapterRefs {
    logger_type: TypeRef,
    log_manager_type: TypeRef,
}

impl AdapterRefs {
    /// Build the adapter references from a weave configuration.
    pub fn from_config(config: &TraceLoggingConfiguration) -> Self {
        let assembly = config.adapter_assembly_name();
        Self {
            logger_type: type_ref_from_path(config.logger_type()).with_assembly(assembly),
            log_manager_type: type_ref_from_path(config.log_manager_type())
                .with_assembly(assembly),
        }
    }

    /// The instance-logger type as a field/local type.
    pub fn logger_cil_type(&self) -> CilType {
        CilType::Class(self.logger_type.clone())
    }

    /// The cached static logger field on `declaring`.
    pub fn logger_field(&self, declaring: TypeRef) -> FieldRef {
        FieldRef {
            declaring_type: declaring,
            name: LOGGER_FIELD_NAME.to_string(),
            ty: self.logger_cil_type(),
        }
    }

    /// `LogManager::GetLogger(Type) -> ILogger`, called from synthesized
    /// static initializers.
    pub fn get_logger(&self) -> MethodRef {
        MethodRef::new(self.log_manager_type.clone(), "GetLogger")
            .with_params(vec![CilType::Class(runtime_type("System", "Type"))])
            .returning(self.logger_cil_type())
    }

    /// `TraceEnter(signature, names, values)` on the instance logger, with
    /// an appended string-pair array when configuration extras are present.
    pub fn trace_enter(&self, with_extras: bool) -> MethodRef {
        let mut params = vec![
            CilType::String,
            CilType::Array(Box::new(CilType::String)),
            CilType::Array(Box::new(CilType::Object)),
        ];
        if with_extras {
            params.push(CilType::Array(Box::new(CilType::String)));
        }
        MethodRef::new(self.logger_type.clone(), "TraceEnter")
            .with_params(params)
            .instance()
    }

    /// `TraceLeave(signature, startTicks, endTicks, names, values)` on the
    /// instance logger, extras appended as for [`AdapterRefs::trace_enter`].
    pub fn trace_leave(&self, with_extras: bool) -> MethodRef {
        let mut params = vec![
            CilType::String,
            CilType::I8,
            CilType::I8,
            CilType::Array(Box::new(CilType::String)),
            CilType::Array(Box::new(CilType::Object)),
        ];
        if with_extras {
            params.push(CilType::Array(Box::new(CilType::String)));
        }
        MethodRef::new(self.logger_type.clone(), "TraceLeave")
            .with_params(params)
            .instance()
    }

    /// The convention-named instance method a redirected static façade call
    /// lands on. The original argument list is prefixed with the enclosing
    /// method's signature string.
    pub fn redirected_call(
        &self,
        name: impl Into<String>,
        original_params: Vec<CilType>,
        return_type: CilType,
    ) -> MethodRef {
        let mut params = Vec::with_capacity(original_params.len() + 1);
        params.push(CilType::String);
        params.extend(original_params);
        MethodRef::new(self.logger_type.clone(), name)
            .with_params(params)
            .returning(return_type)
            .instance()
    }
}

/// Emits instruction sequences at a fixed point of a body: either before an
/// anchor instruction (splicing) or at the end (appending). Successive
/// emissions keep their own order.
pub struct Emitter<'a> {
    body: &'a mut MethodBody,
    anchor: Option<InstrId>,
}

impl<'a> Emitter<'a> {
    /// Emit before `anchor`.
    pub fn before(body: &'a mut MethodBody, anchor: InstrId) -> Self {
        Self {
            body,
            anchor: Some(anchor),
        }
    }

    /// Emit at the end of the stream.
    pub fn at_end(body: &'a mut MethodBody) -> Self {
        Self { body, anchor: None }
    }

    /// Emit one instruction, returning its handle.
    pub fn emit(&mut self, instr: Instruction) -> WeaveResult<InstrId> {
        let id = match self.anchor {
            Some(anchor) => self.body.insert_before(anchor, instr)?,
            None => self.body.push(instr),
        };
        Ok(id)
    }

    /// Emit an operand-less instruction.
    pub fn simple(&mut self, opcode: Opcode) -> WeaveResult<InstrId> {
        self.emit(Instruction::simple(opcode))
    }

    /// Emit an instruction with an operand.
    pub fn with(&mut self, opcode: Opcode, operand: Operand) -> WeaveResult<InstrId> {
        self.emit(Instruction::with(opcode, operand))
    }

    /// Push a 32-bit constant.
    pub fn ldc_i4(&mut self, value: i32) -> WeaveResult<InstrId> {
        self.with(Opcode::LdcI4, Operand::Int32(value))
    }

    /// Push a string literal.
    pub fn ldstr(&mut self, value: impl Into<String>) -> WeaveResult<InstrId> {
        self.with(Opcode::Ldstr, Operand::Str(value.into()))
    }

    /// Load a local.
    pub fn ldloc(&mut self, local: LocalId) -> WeaveResult<InstrId> {
        self.with(Opcode::Ldloc, Operand::Local(local))
    }

    /// Store to a local.
    pub fn stloc(&mut self, local: LocalId) -> WeaveResult<InstrId> {
        self.with(Opcode::Stloc, Operand::Local(local))
    }

    /// Static call.
    pub fn call(&mut self, method: MethodRef) -> WeaveResult<InstrId> {
        self.with(Opcode::Call, Operand::Method(method))
    }

    /// Virtual call.
    pub fn callvirt(&mut self, method: MethodRef) -> WeaveResult<InstrId> {
        self.with(Opcode::Callvirt, Operand::Method(method))
    }

    /// Load the cached logger field.
    pub fn load_logger(&mut self, field: &FieldRef) -> WeaveResult<InstrId> {
        self.with(Opcode::Ldsfld, Operand::Field(field.clone()))
    }

    /// Box the value on the stack if its type requires it.
    pub fn box_if_needed(&mut self, ty: &CilType) -> WeaveResult<()> {
        if ty.needs_box() {
            self.with(Opcode::Box, Operand::Type(ty.clone()))?;
        }
        Ok(())
    }

    /// Read the value a managed pointer on the stack points at, then box it
    /// for the payload if needed.
    pub fn read_through_pointer(&mut self, pointee: &CilType) -> WeaveResult<()> {
        let opcode = pointee.ldind_opcode();
        if opcode == Opcode::Ldobj {
            self.with(opcode, Operand::Type(pointee.clone()))?;
        } else {
            self.simple(opcode)?;
        }
        self.box_if_needed(pointee)
    }

    /// Allocate a `string[]` and fill the named slots; `None` entries stay
    /// at the array's default `null`. Leaves the array on the stack.
    pub fn string_array(&mut self, names: &[Option<&str>]) -> WeaveResult<()> {
        self.ldc_i4(names.len() as i32)?;
        self.with(Opcode::Newarr, Operand::Type(CilType::String))?;
        for (index, name) in names.iter().enumerate() {
            if let Some(name) = name {
                self.simple(Opcode::Dup)?;
                self.ldc_i4(index as i32)?;
                self.ldstr(*name)?;
                self.simple(Opcode::StelemRef)?;
            }
        }
        Ok(())
    }

    /// Allocate an `object[]` of `len` and fill each slot through `fill`,
    /// which must leave exactly one object reference on the stack. Leaves
    /// the array on the stack.
    pub fn object_array<F>(&mut self, len: usize, mut fill: F) -> WeaveResult<()>
    where
        F: FnMut(&mut Emitter<'_>, usize) -> WeaveResult<()>,
    {
        self.ldc_i4(len as i32)?;
        self.with(Opcode::Newarr, Operand::Type(CilType::Object))?;
        for index in 0..len {
            self.simple(Opcode::Dup)?;
            self.ldc_i4(index as i32)?;
            fill(self, index)?;
            self.simple(Opcode::StelemRef)?;
        }
        Ok(())
    }

    /// Push the flattened `string[]` of configuration key/value extras.
    pub fn extras_array(&mut self, pairs: &[(String, String)]) -> WeaveResult<()> {
        self.ldc_i4((pairs.len() * 2) as i32)?;
        self.with(Opcode::Newarr, Operand::Type(CilType::String))?;
        for (index, (key, value)) in pairs.iter().enumerate() {
            self.simple(Opcode::Dup)?;
            self.ldc_i4((index * 2) as i32)?;
            self.ldstr(key.as_str())?;
            self.simple(Opcode::StelemRef)?;
            self.simple(Opcode::Dup)?;
            self.ldc_i4((index * 2 + 1) as i32)?;
            self.ldstr(value.as_str())?;
            self.simple(Opcode::StelemRef)?;
        }
        Ok(())
    }

    /// Push the enter-payload name and value arrays for `parameters`.
    ///
    /// Output-only parameters are excluded (their values are undefined at
    /// entry), and so are parameters carrying the no-trace marker: neither
    /// their name nor a value slot appears in the payload. A method with no
    /// eligible parameters pushes two nulls instead of empty arrays.
    pub fn enter_payload(&mut self, parameters: &[Parameter], arg_base: u16) -> WeaveResult<()> {
        let included: Vec<(u16, &Parameter)> = parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_out && !p.is_no_trace())
            .map(|(i, p)| (arg_base + i as u16, p))
            .collect();
        if included.is_empty() {
            self.simple(Opcode::Ldnull)?;
            self.simple(Opcode::Ldnull)?;
            return Ok(());
        }

        let names: Vec<Option<&str>> = included
            .iter()
            .map(|(_, p)| Some(p.name.as_str()))
            .collect();
        self.string_array(&names)?;

        self.object_array(included.len(), |em, index| {
            let (slot, param) = included[index];
            em.with(Opcode::Ldarg, Operand::Arg(slot))?;
            if param.ty.is_byref() {
                em.read_through_pointer(param.ty.strip_byref())?;
            } else {
                em.box_if_needed(&param.ty)?;
            }
            Ok(())
        })
    }

    /// Access to the underlying body, for local allocation mid-sequence.
    pub fn body(&mut self) -> &mut MethodBody {
        self.body
    }
}
