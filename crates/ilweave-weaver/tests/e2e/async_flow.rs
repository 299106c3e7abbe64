//! Async methods: enter in the kickoff, leave at the state machine's
//! completion sites, start tick threaded through the machine.

use crate::harness::{trace_all_config, weave, Evaluator, TraceEvent, Value};
use ilweave_model::annotations::{ASYNC_STATE_MACHINE_ATTRIBUTE, COMPILER_GENERATED_ATTRIBUTE};
use ilweave_model::{
    AttrValue, CilType, CustomAttribute, Instruction, MethodAccess, MethodDef, MethodRef,
    ModuleDef, Opcode, Operand, TypeAccess, TypeDef, TypeRef,
};
use ilweave_weaver::{EXCEPTION_SLOT, START_TICK_FIELD_NAME};

const SM_NAME: &str = "<RunAsync>d__0";

fn builder_call(name: &str, params: Vec<CilType>) -> Instruction {
    Instruction::with(
        Opcode::Call,
        Operand::Method(
            MethodRef::new(
                TypeRef::new(
                    "System.Runtime.CompilerServices",
                    "AsyncTaskMethodBuilder`1",
                )
                .with_assembly("System.Runtime"),
                name,
            )
            .with_params(params)
            .instance(),
        ),
    )
}

/// A worker type in the shape the compiler leaves behind: a kickoff that
/// constructs and starts the machine, and a nested generated state-machine
/// type whose driver completes through the builder.
fn async_worker(name: &str, move_next_tail: Vec<Instruction>) -> TypeDef {
    let sm_path = format!("My.App.{}/{}", name, SM_NAME);
    let mut worker = TypeDef::new("My.App", name, TypeAccess::Public);

    let task = CilType::Class(
        TypeRef::new("System.Threading.Tasks", "Task`1").with_assembly("System.Runtime"),
    );
    let mut kickoff = MethodDef::new("RunAsync", MethodAccess::Public, task);
    kickoff.is_static = true;
    kickoff.attributes.push(CustomAttribute {
        type_full_name: ASYNC_STATE_MACHINE_ATTRIBUTE.into(),
        ctor_args: vec![AttrValue::TypeName(sm_path)],
        named_args: Vec::new(),
    });
    let body = kickoff.body.as_mut().unwrap();
    let sm_local = body
        .new_local(CilType::ValueType(TypeRef::new(
            "My.App",
            format!("{}/{}", name, SM_NAME),
        )))
        .unwrap();
    body.push(Instruction::with(Opcode::Ldloca, Operand::Local(sm_local)));
    body.push(Instruction::simple(Opcode::Pop));
    body.push(Instruction::simple(Opcode::Ldnull));
    body.push(Instruction::simple(Opcode::Ret));
    worker.methods.push(kickoff);

    let mut sm = TypeDef::new("", SM_NAME, TypeAccess::NestedPrivate);
    sm.attributes
        .push(CustomAttribute::marker(COMPILER_GENERATED_ATTRIBUTE));
    let mut move_next = MethodDef::new("MoveNext", MethodAccess::Public, CilType::Void);
    let body = move_next.body.as_mut().unwrap();
    body.push(Instruction::simple(Opcode::Ldnull));
    for instr in move_next_tail {
        body.push(instr);
    }
    body.push(Instruction::simple(Opcode::Ret));
    sm.methods.push(move_next);
    worker.nested.push(sm);

    worker
}

fn completing_worker(name: &str, result: i32) -> TypeDef {
    async_worker(
        name,
        vec![
            Instruction::with(Opcode::LdcI4, Operand::Int32(result)),
            builder_call("SetResult", vec![CilType::I4]),
        ],
    )
}

#[test]
fn test_tick_field_threaded_and_completion_sites_spliced() {
    let mut module = ModuleDef::new("My.App");
    module.types.push(completing_worker("Worker", 5));
    let stats = weave(&trace_all_config(), &mut module);
    assert_eq!(stats.methods_traced, 1);

    let sm = module
        .find_type(&format!("My.App.Worker/{}", SM_NAME))
        .unwrap();
    assert!(sm.field(START_TICK_FIELD_NAME).is_some());

    let kickoff = module.find_type("My.App.Worker").unwrap().method("RunAsync").unwrap();
    let kickoff_body = kickoff.body.as_ref().unwrap();
    assert!(kickoff_body.instructions().any(|(_, i)| matches!(
        (&i.opcode, &i.operand),
        (Opcode::Stfld, Operand::Field(f)) if f.name == START_TICK_FIELD_NAME
    )));
    assert!(kickoff_body.instructions().any(|(_, i)| matches!(
        &i.operand,
        Operand::Method(m) if m.name == "TraceEnter"
    )));
    // No leave in the kickoff; the machine outlives it.
    assert!(!kickoff_body.instructions().any(|(_, i)| matches!(
        &i.operand,
        Operand::Method(m) if m.name == "TraceLeave"
    )));

    let move_next = sm.method("MoveNext").unwrap();
    let body = move_next.body.as_ref().unwrap();
    let leave_pos = body
        .instructions()
        .position(|(_, i)| matches!(&i.operand, Operand::Method(m) if m.name == "TraceLeave"))
        .unwrap();
    let complete_pos = body
        .instructions()
        .position(|(_, i)| matches!(&i.operand, Operand::Method(m) if m.name == "SetResult"))
        .unwrap();
    assert!(leave_pos < complete_pos);
}

#[test]
fn test_nested_async_calls_report_in_logical_order() {
    let mut module = ModuleDef::new("My.App");
    module.types.push(completing_worker("CallMe", 44));
    module.types.push(completing_worker("Double", 22));
    weave(&trace_all_config(), &mut module);

    // Simulate the scheduler for CallMe awaiting Double: both kickoffs run
    // first, the awaited machine completes before the awaiting one.
    let mut eval = Evaluator::new(&module);
    eval.call("My.App.CallMe", "RunAsync", Vec::new()).unwrap();
    eval.call("My.App.Double", "RunAsync", Vec::new()).unwrap();
    eval.call(
        &format!("My.App.Double/{}", SM_NAME),
        "MoveNext",
        vec![Value::object()],
    )
    .unwrap();
    eval.call(
        &format!("My.App.CallMe/{}", SM_NAME),
        "MoveNext",
        vec![Value::object()],
    )
    .unwrap();

    assert_eq!(
        eval.labels(),
        vec![
            "enter My.App.CallMe::RunAsync",
            "enter My.App.Double::RunAsync",
            "leave My.App.Double::RunAsync",
            "leave My.App.CallMe::RunAsync",
        ]
    );

    // The awaited machine's completion value is the unwrapped task result.
    match &eval.events[2] {
        TraceEvent::Leave { names, values, .. } => {
            assert_eq!(names.as_deref(), Some(&[None][..]));
            assert_eq!(values.as_deref(), Some(&["22".to_string()][..]));
        }
        other => panic!("expected leave, got {:?}", other),
    }
}

#[test]
fn test_faulting_machine_reports_exception_slot() {
    let mut module = ModuleDef::new("My.App");
    module.types.push(async_worker(
        "Worker",
        vec![
            Instruction::with(Opcode::Ldstr, Operand::Str("bang".into())),
            Instruction::with(
                Opcode::Newobj,
                Operand::Method(
                    MethodRef::new(
                        TypeRef::new("System", "InvalidOperationException")
                            .with_assembly("System.Runtime"),
                        ".ctor",
                    )
                    .with_params(vec![CilType::String])
                    .instance(),
                ),
            ),
            builder_call(
                "SetException",
                vec![CilType::Class(
                    TypeRef::new("System", "Exception").with_assembly("System.Runtime"),
                )],
            ),
        ],
    ));
    weave(&trace_all_config(), &mut module);

    let mut eval = Evaluator::new(&module);
    eval.call("My.App.Worker", "RunAsync", Vec::new()).unwrap();
    eval.call(
        &format!("My.App.Worker/{}", SM_NAME),
        "MoveNext",
        vec![Value::object()],
    )
    .unwrap();

    match eval.events.last().unwrap() {
        TraceEvent::Leave { names, values, .. } => {
            assert_eq!(
                names.as_deref(),
                Some(&[Some(EXCEPTION_SLOT.to_string())][..])
            );
            assert_eq!(
                values.as_deref(),
                Some(&["System.InvalidOperationException: bang".to_string()][..])
            );
        }
        other => panic!("expected leave, got {:?}", other),
    }
}
