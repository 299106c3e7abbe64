//! Execution harness for the weaving tests
//!
//! Woven bodies are only meaningful at runtime, so the harness interprets
//! instruction streams on a small stack machine. Calls into the adapter
//! references the weaver synthesizes (TraceEnter, TraceLeave, GetLogger,
//! the redirected façade methods) are intercepted and recorded as
//! [`TraceEvent`]s; everything else (branches, locals, arrays, boxing,
//! pointer reads and writes, exception handlers) runs with ordinary CIL
//! semantics, close enough to observe the woven behavior end to end.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Once;

use ilweave_filter::{
    FilterResult, MethodTarget, TraceFilter, TraceLoggingConfiguration,
    TraceLoggingConfigurationBuilder,
};
use ilweave_model::{
    CilType, InstrId, Instruction, MethodBody, MethodDef, MethodRef, ModuleDef, Opcode, Operand,
};
use ilweave_weaver::{ModuleWeaver, WeaveStats};
use rustc_hash::FxHashMap;
use thiserror::Error;

static INIT: Once = Once::new();

/// Route `tracing` diagnostics from the weaver into the test output.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Filter that traces every candidate method.
#[derive(Debug)]
pub struct TraceAll;

impl TraceFilter for TraceAll {
    fn should_trace(&self, _target: &MethodTarget) -> FilterResult {
        FilterResult::trace()
    }
}

/// A configuration that traces everything, with the default adapter names.
pub fn trace_all_config() -> TraceLoggingConfiguration {
    TraceLoggingConfigurationBuilder::default()
        .with_filter(Box::new(TraceAll))
        .build()
}

/// Weave `module` under `config`, panicking on weave errors.
pub fn weave(config: &TraceLoggingConfiguration, module: &mut ModuleDef) -> WeaveStats {
    init_logging();
    ModuleWeaver::new(config).weave(module).expect("weave failed")
}

/// A simulated exception object.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionObj {
    pub type_name: String,
    pub message: String,
}

impl fmt::Display for ExceptionObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// A runtime value on the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<FxHashMap<String, Value>>>),
    Exception(Rc<ExceptionObj>),
    Logger,
    TypeToken(String),
    Ref(Rc<RefCell<Value>>),
}

impl Value {
    /// A fresh managed pointer, for `out`/`ref` arguments.
    pub fn out_slot() -> Value {
        Value::Ref(Rc::new(RefCell::new(Value::Null)))
    }

    /// A fresh empty object, for state-machine receivers.
    pub fn object() -> Value {
        Value::Object(Rc::new(RefCell::new(FxHashMap::default())))
    }

    /// Render the value the way a logger backend would stringify it.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Str(s) => s.clone(),
            Value::Array(items) => {
                let rendered: Vec<String> =
                    items.borrow().iter().map(|v| v.render()).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Object(_) => "<object>".to_string(),
            Value::Exception(e) => e.to_string(),
            Value::Logger => "<logger>".to_string(),
            Value::TypeToken(t) => t.clone(),
            Value::Ref(cell) => cell.borrow().render(),
        }
    }
}

/// One recorded adapter interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Enter {
        signature: String,
        names: Option<Vec<Option<String>>>,
        values: Option<Vec<String>>,
        extras: Vec<String>,
    },
    Leave {
        signature: String,
        start: i64,
        end: i64,
        names: Option<Vec<Option<String>>>,
        values: Option<Vec<String>>,
        extras: Vec<String>,
    },
    Redirected {
        method: String,
        signature: String,
        args: Vec<String>,
    },
}

/// Harness-side failures.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unhandled exception {0}")]
    Thrown(Rc<ExceptionObj>),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("evaluator does not model: {0}")]
    Unsupported(String),
    #[error("stack underflow at {0}")]
    StackUnderflow(&'static str),
}

enum Flow {
    Next,
    Jump(usize),
    Return(Value),
}

/// Interprets method bodies of one module, recording adapter calls.
///
/// Static constructors run once per type, the first time a method of the
/// type is invoked through [`Evaluator::call`], matching runtime semantics
/// closely enough for the logger-field initialization to be observable.
pub struct Evaluator<'m> {
    module: &'m ModuleDef,
    pub events: Vec<TraceEvent>,
    statics: FxHashMap<String, Value>,
    initialized: Vec<String>,
    ticks: i64,
}

impl<'m> Evaluator<'m> {
    pub fn new(module: &'m ModuleDef) -> Self {
        Self {
            module,
            events: Vec::new(),
            statics: FxHashMap::default(),
            initialized: Vec::new(),
            ticks: 0,
        }
    }

    /// Compact event view for order assertions.
    pub fn labels(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| match e {
                TraceEvent::Enter { signature, .. } => format!("enter {}", signature),
                TraceEvent::Leave { signature, .. } => format!("leave {}", signature),
                TraceEvent::Redirected { method, .. } => format!("call {}", method),
            })
            .collect()
    }

    /// Invoke a method by declaring-type path and name.
    pub fn call(
        &mut self,
        type_path: &str,
        method_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        self.run_cctor(type_path)?;
        let module = self.module;
        let method = module
            .find_type(type_path)
            .and_then(|t| t.method(method_name))
            .ok_or_else(|| {
                EvalError::MethodNotFound(format!("{}::{}", type_path, method_name))
            })?;
        self.exec(method, args)
    }

    fn run_cctor(&mut self, type_path: &str) -> Result<(), EvalError> {
        if self.initialized.iter().any(|t| t == type_path) {
            return Ok(());
        }
        self.initialized.push(type_path.to_string());
        let module = self.module;
        if let Some(cctor) = module.find_type(type_path).and_then(|t| t.method(".cctor")) {
            self.exec(cctor, Vec::new())?;
        }
        Ok(())
    }

    fn exec(&mut self, method: &MethodDef, arg_values: Vec<Value>) -> Result<Value, EvalError> {
        let body = method.body.as_ref().ok_or_else(|| {
            EvalError::Unsupported(format!("{} has no body", method.name))
        })?;
        let order: Vec<InstrId> = body.iter().collect();
        let args: Vec<Rc<RefCell<Value>>> = arg_values
            .into_iter()
            .map(|v| Rc::new(RefCell::new(v)))
            .collect();
        let locals: Vec<Rc<RefCell<Value>>> = body
            .locals
            .iter()
            .map(|_| Rc::new(RefCell::new(Value::Null)))
            .collect();
        let mut stack: Vec<Value> = Vec::new();
        let mut in_flight: Option<Rc<ExceptionObj>> = None;
        let mut pos = 0usize;

        loop {
            if pos >= order.len() {
                return Ok(Value::Null);
            }
            let instr = body
                .instr(order[pos])
                .expect("ordered instruction resolves");
            match self.step(method, body, instr, &mut stack, &locals, &args, &in_flight) {
                Ok(Flow::Next) => pos += 1,
                Ok(Flow::Jump(target)) => pos = target,
                Ok(Flow::Return(value)) => return Ok(value),
                Err(EvalError::Thrown(exc)) => {
                    match handler_covering(body, &order, pos) {
                        Some(handler_pos) => {
                            stack.clear();
                            stack.push(Value::Exception(exc.clone()));
                            in_flight = Some(exc);
                            pos = handler_pos;
                        }
                        None => return Err(EvalError::Thrown(exc)),
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        method: &MethodDef,
        body: &MethodBody,
        instr: &Instruction,
        stack: &mut Vec<Value>,
        locals: &[Rc<RefCell<Value>>],
        args: &[Rc<RefCell<Value>>],
        in_flight: &Option<Rc<ExceptionObj>>,
    ) -> Result<Flow, EvalError> {
        match (instr.opcode, &instr.operand) {
            (Opcode::Nop, _) => {}
            (Opcode::Dup, _) => {
                let top = stack.last().cloned().ok_or(EvalError::StackUnderflow("dup"))?;
                stack.push(top);
            }
            (Opcode::Pop, _) => {
                stack.pop().ok_or(EvalError::StackUnderflow("pop"))?;
            }

            (Opcode::Ldnull, _) => stack.push(Value::Null),
            (Opcode::LdcI4, Operand::Int32(v)) => stack.push(Value::Int(*v)),
            (Opcode::LdcI8, Operand::Int64(v)) => stack.push(Value::Long(*v)),
            (Opcode::LdcR4, Operand::Float32(v)) => stack.push(Value::Float(*v)),
            (Opcode::LdcR8, Operand::Float64(v)) => stack.push(Value::Double(*v)),
            (Opcode::Ldstr, Operand::Str(s)) => stack.push(Value::Str(s.clone())),

            (Opcode::Ldarg, Operand::Arg(i)) => {
                let slot = args.get(*i as usize).ok_or_else(|| {
                    EvalError::Unsupported(format!("ldarg {} beyond frame", i))
                })?;
                stack.push(slot.borrow().clone());
            }
            (Opcode::Ldarga, Operand::Arg(i)) => {
                let slot = args.get(*i as usize).ok_or_else(|| {
                    EvalError::Unsupported(format!("ldarga {} beyond frame", i))
                })?;
                stack.push(Value::Ref(slot.clone()));
            }
            (Opcode::Starg, Operand::Arg(i)) => {
                let value = stack.pop().ok_or(EvalError::StackUnderflow("starg"))?;
                let slot = args.get(*i as usize).ok_or_else(|| {
                    EvalError::Unsupported(format!("starg {} beyond frame", i))
                })?;
                *slot.borrow_mut() = value;
            }
            (Opcode::Ldloc, Operand::Local(l)) => {
                stack.push(locals[l.index() as usize].borrow().clone());
            }
            (Opcode::Ldloca, Operand::Local(l)) => {
                stack.push(Value::Ref(locals[l.index() as usize].clone()));
            }
            (Opcode::Stloc, Operand::Local(l)) => {
                let value = stack.pop().ok_or(EvalError::StackUnderflow("stloc"))?;
                *locals[l.index() as usize].borrow_mut() = value;
            }

            (Opcode::Ldsfld, Operand::Field(f)) => {
                let key = format!("{}::{}", f.declaring_type.full_name(), f.name);
                stack.push(self.statics.get(&key).cloned().unwrap_or(Value::Null));
            }
            (Opcode::Stsfld, Operand::Field(f)) => {
                let value = stack.pop().ok_or(EvalError::StackUnderflow("stsfld"))?;
                let key = format!("{}::{}", f.declaring_type.full_name(), f.name);
                self.statics.insert(key, value);
            }
            (Opcode::Ldfld, Operand::Field(f)) => {
                let target = stack.pop().ok_or(EvalError::StackUnderflow("ldfld"))?;
                let value = match field_map(&target, false)? {
                    Some(map) => map.borrow().get(&f.name).cloned().unwrap_or(Value::Null),
                    None => Value::Null,
                };
                stack.push(value);
            }
            (Opcode::Stfld, Operand::Field(f)) => {
                let value = stack.pop().ok_or(EvalError::StackUnderflow("stfld"))?;
                let target = stack.pop().ok_or(EvalError::StackUnderflow("stfld"))?;
                let map = field_map(&target, true)?.ok_or_else(|| {
                    EvalError::Unsupported("stfld on null reference".to_string())
                })?;
                map.borrow_mut().insert(f.name.clone(), value);
            }
            (Opcode::Ldtoken, Operand::Type(t)) => {
                stack.push(Value::TypeToken(t.display_name()));
            }

            (Opcode::Newarr, _) => {
                let len = match stack.pop() {
                    Some(Value::Int(n)) if n >= 0 => n as usize,
                    other => {
                        return Err(EvalError::Unsupported(format!(
                            "newarr length {:?}",
                            other
                        )))
                    }
                };
                stack.push(Value::Array(Rc::new(RefCell::new(vec![Value::Null; len]))));
            }
            (Opcode::StelemRef, _) => {
                let value = stack.pop().ok_or(EvalError::StackUnderflow("stelem"))?;
                let index = match stack.pop() {
                    Some(Value::Int(i)) if i >= 0 => i as usize,
                    other => {
                        return Err(EvalError::Unsupported(format!(
                            "stelem index {:?}",
                            other
                        )))
                    }
                };
                match stack.pop() {
                    Some(Value::Array(items)) => items.borrow_mut()[index] = value,
                    other => {
                        return Err(EvalError::Unsupported(format!(
                            "stelem target {:?}",
                            other
                        )))
                    }
                }
            }
            // Boxing does not change the simulated representation.
            (Opcode::Box, _) => {}

            (Opcode::Call | Opcode::Callvirt, Operand::Method(target)) => {
                self.dispatch_call(target, stack)?;
            }
            (Opcode::Newobj, Operand::Method(ctor)) => {
                let mut ctor_args = Vec::with_capacity(ctor.param_types.len());
                for _ in 0..ctor.param_types.len() {
                    ctor_args.push(stack.pop().ok_or(EvalError::StackUnderflow("newobj"))?);
                }
                ctor_args.reverse();
                let type_name = ctor.declaring_type.full_name();
                if type_name.contains("Exception") {
                    let message = ctor_args.first().map(|v| v.render()).unwrap_or_default();
                    stack.push(Value::Exception(Rc::new(ExceptionObj {
                        type_name,
                        message,
                    })));
                } else {
                    stack.push(Value::object());
                }
            }

            (Opcode::Ret, _) => {
                let value = if method.has_return_value() {
                    stack.pop().ok_or(EvalError::StackUnderflow("ret"))?
                } else {
                    Value::Null
                };
                return Ok(Flow::Return(value));
            }
            (Opcode::Br, Operand::Target(t)) => {
                return Ok(Flow::Jump(target_pos(body, *t)?));
            }
            (Opcode::Brtrue, Operand::Target(t)) => {
                let value = stack.pop().ok_or(EvalError::StackUnderflow("brtrue"))?;
                if truthy(&value) {
                    return Ok(Flow::Jump(target_pos(body, *t)?));
                }
            }
            (Opcode::Brfalse, Operand::Target(t)) => {
                let value = stack.pop().ok_or(EvalError::StackUnderflow("brfalse"))?;
                if !truthy(&value) {
                    return Ok(Flow::Jump(target_pos(body, *t)?));
                }
            }
            (Opcode::Leave, Operand::Target(t)) => {
                stack.clear();
                return Ok(Flow::Jump(target_pos(body, *t)?));
            }
            (Opcode::Throw, _) => match stack.pop() {
                Some(Value::Exception(exc)) => return Err(EvalError::Thrown(exc)),
                other => {
                    return Err(EvalError::Unsupported(format!("throw of {:?}", other)))
                }
            },
            (Opcode::Rethrow, _) => {
                let exc = in_flight.clone().ok_or_else(|| {
                    EvalError::Unsupported("rethrow outside a handler".to_string())
                })?;
                return Err(EvalError::Thrown(exc));
            }

            (
                Opcode::LdindI1
                | Opcode::LdindU1
                | Opcode::LdindI2
                | Opcode::LdindU2
                | Opcode::LdindI4
                | Opcode::LdindU4
                | Opcode::LdindI8
                | Opcode::LdindR4
                | Opcode::LdindR8
                | Opcode::LdindRef
                | Opcode::Ldobj,
                _,
            ) => match stack.pop() {
                Some(Value::Ref(cell)) => stack.push(cell.borrow().clone()),
                other => {
                    return Err(EvalError::Unsupported(format!(
                        "indirect load of {:?}",
                        other
                    )))
                }
            },
            (
                Opcode::StindI4 | Opcode::StindI8 | Opcode::StindR8 | Opcode::StindRef,
                _,
            ) => {
                let value = stack.pop().ok_or(EvalError::StackUnderflow("stind"))?;
                match stack.pop() {
                    Some(Value::Ref(cell)) => *cell.borrow_mut() = value,
                    other => {
                        return Err(EvalError::Unsupported(format!(
                            "indirect store to {:?}",
                            other
                        )))
                    }
                }
            }

            (opcode, operand) => {
                return Err(EvalError::Unsupported(format!(
                    "{:?} with {:?}",
                    opcode, operand
                )))
            }
        }
        Ok(Flow::Next)
    }

    fn dispatch_call(
        &mut self,
        target: &MethodRef,
        stack: &mut Vec<Value>,
    ) -> Result<(), EvalError> {
        let mut call_args = Vec::with_capacity(target.param_types.len());
        for _ in 0..target.param_types.len() {
            call_args.push(stack.pop().ok_or(EvalError::StackUnderflow("call"))?);
        }
        call_args.reverse();
        let receiver = if target.is_static {
            None
        } else {
            Some(stack.pop().ok_or(EvalError::StackUnderflow("call receiver"))?)
        };

        let declaring = target.declaring_type.full_name();
        match target.name.as_str() {
            "GetTimestamp" if declaring == "System.Diagnostics.Stopwatch" => {
                self.ticks += 1;
                stack.push(Value::Long(self.ticks));
                return Ok(());
            }
            "GetTypeFromHandle" if declaring == "System.Type" => {
                stack.push(call_args.pop().unwrap_or(Value::Null));
                return Ok(());
            }
            "GetLogger" => {
                stack.push(Value::Logger);
                return Ok(());
            }
            "TraceEnter" => {
                self.events.push(TraceEvent::Enter {
                    signature: call_args[0].render(),
                    names: names_of(&call_args[1]),
                    values: values_of(&call_args[2]),
                    extras: extras_of(call_args.get(3)),
                });
                return Ok(());
            }
            "TraceLeave" => {
                self.events.push(TraceEvent::Leave {
                    signature: call_args[0].render(),
                    start: long_of(&call_args[1]),
                    end: long_of(&call_args[2]),
                    names: names_of(&call_args[3]),
                    values: values_of(&call_args[4]),
                    extras: extras_of(call_args.get(5)),
                });
                return Ok(());
            }
            _ => {}
        }

        // Async method builders complete silently.
        if target.declaring_type.namespace == "System.Runtime.CompilerServices" {
            return Ok(());
        }

        // Remaining instance calls into a referenced assembly are the
        // redirected façade methods on the logger.
        if target.declaring_type.assembly.is_some() && receiver.is_some() {
            self.events.push(TraceEvent::Redirected {
                method: target.name.clone(),
                signature: call_args
                    .first()
                    .map(|v| v.render())
                    .unwrap_or_default(),
                args: call_args.iter().skip(1).map(|v| v.render()).collect(),
            });
            match target.return_type {
                CilType::Void => {}
                CilType::Bool => stack.push(Value::Int(1)),
                _ => stack.push(Value::Null),
            }
            return Ok(());
        }

        // Module-local call: run the callee under this evaluator.
        self.run_cctor(&declaring)?;
        let module = self.module;
        let callee = module
            .find_type(&declaring)
            .and_then(|t| t.method(&target.name))
            .ok_or_else(|| EvalError::MethodNotFound(target.full_name()))?;
        let mut frame_args = Vec::with_capacity(call_args.len() + 1);
        if let Some(receiver) = receiver {
            frame_args.push(receiver);
        }
        frame_args.extend(call_args);
        let result = self.exec(callee, frame_args)?;
        if callee.has_return_value() {
            stack.push(result);
        }
        Ok(())
    }
}

fn field_map(
    target: &Value,
    create: bool,
) -> Result<Option<Rc<RefCell<FxHashMap<String, Value>>>>, EvalError> {
    match target {
        Value::Object(map) => Ok(Some(map.clone())),
        Value::Ref(cell) => {
            let existing = match &*cell.borrow() {
                Value::Object(map) => Some(map.clone()),
                Value::Null => None,
                other => {
                    return Err(EvalError::Unsupported(format!(
                        "field access through {:?}",
                        other
                    )))
                }
            };
            match existing {
                Some(map) => Ok(Some(map)),
                // A pointer to a zero-initialized struct materializes its
                // field storage on first store.
                None if create => {
                    let map = Rc::new(RefCell::new(FxHashMap::default()));
                    *cell.borrow_mut() = Value::Object(map.clone());
                    Ok(Some(map))
                }
                None => Ok(None),
            }
        }
        Value::Null => Ok(None),
        other => Err(EvalError::Unsupported(format!(
            "field access on {:?}",
            other
        ))),
    }
}

fn handler_covering(body: &MethodBody, order: &[InstrId], pos: usize) -> Option<usize> {
    for handler in &body.handlers {
        let try_start = order.iter().position(|&id| id == handler.try_start)?;
        let try_end = order.iter().position(|&id| id == handler.try_end)?;
        if pos >= try_start && pos <= try_end {
            return order.iter().position(|&id| id == handler.handler_start);
        }
    }
    None
}

fn target_pos(body: &MethodBody, target: InstrId) -> Result<usize, EvalError> {
    body.position(target)
        .ok_or_else(|| EvalError::Unsupported(format!("dangling branch target {}", target)))
}

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Int(0) | Value::Long(0))
}

fn long_of(value: &Value) -> i64 {
    match value {
        Value::Long(v) => *v,
        Value::Int(v) => *v as i64,
        _ => 0,
    }
}

fn names_of(value: &Value) -> Option<Vec<Option<String>>> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .borrow()
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    other => Some(other.render()),
                })
                .collect(),
        ),
        _ => None,
    }
}

fn values_of(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(items.borrow().iter().map(|v| v.render()).collect()),
        _ => None,
    }
}

fn extras_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.borrow().iter().map(|v| v.render()).collect(),
        _ => Vec::new(),
    }
}
