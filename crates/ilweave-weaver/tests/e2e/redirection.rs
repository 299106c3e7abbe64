//! Static façade calls land on the instance logger after weaving.

use crate::harness::{weave, Evaluator, TraceAll, TraceEvent};
use ilweave_filter::TraceLoggingConfigurationBuilder;
use ilweave_model::{
    CilType, Instruction, MethodAccess, MethodDef, MethodRef, ModuleDef, Opcode, Operand,
    TypeAccess, TypeDef, TypeRef,
};

const FACADE: &str = "My.App.Log";

fn facade_call(name: &str, params: Vec<CilType>, ret: CilType) -> Instruction {
    Instruction::with(
        Opcode::Call,
        Operand::Method(
            MethodRef::new(TypeRef::new("My.App", "Log"), name)
                .with_params(params)
                .returning(ret),
        ),
    )
}

fn widget_module(work: MethodDef) -> ModuleDef {
    let mut module = ModuleDef::new("My.App");
    let mut widget = TypeDef::new("My.App", "Widget", TypeAccess::Public);
    widget.methods.push(work);
    module.types.push(widget);
    module
}

#[test]
fn test_facade_call_redirects_with_signature_prefix() {
    let mut work = MethodDef::new("Work", MethodAccess::Public, CilType::Void);
    work.is_static = true;
    let body = work.body.as_mut().unwrap();
    body.push(Instruction::with(
        Opcode::Ldstr,
        Operand::Str("processing".into()),
    ));
    body.push(facade_call("Debug", vec![CilType::String], CilType::Void));
    body.push(Instruction::simple(Opcode::Ret));
    let mut module = widget_module(work);

    // No filter: the method is not traced, yet its log call still moves.
    let config = TraceLoggingConfigurationBuilder::default()
        .with_static_logger(FACADE)
        .build();
    let stats = weave(&config, &mut module);
    assert_eq!(stats.methods_traced, 0);
    assert_eq!(stats.log_calls_redirected, 1);

    let mut eval = Evaluator::new(&module);
    eval.call("My.App.Widget", "Work", Vec::new()).unwrap();
    assert_eq!(
        eval.events,
        vec![TraceEvent::Redirected {
            method: "LogDebug".into(),
            signature: "My.App.Widget::Work".into(),
            args: vec!["processing".into()],
        }]
    );
}

#[test]
fn test_facade_getter_redirects_to_prefixed_getter() {
    let mut work = MethodDef::new("Work", MethodAccess::Public, CilType::Void);
    work.is_static = true;
    let body = work.body.as_mut().unwrap();
    body.push(facade_call("get_IsDebugEnabled", Vec::new(), CilType::Bool));
    body.push(Instruction::simple(Opcode::Pop));
    body.push(Instruction::simple(Opcode::Ret));
    let mut module = widget_module(work);

    let config = TraceLoggingConfigurationBuilder::default()
        .with_static_logger(FACADE)
        .build();
    weave(&config, &mut module);

    let mut eval = Evaluator::new(&module);
    eval.call("My.App.Widget", "Work", Vec::new()).unwrap();
    assert_eq!(
        eval.events,
        vec![TraceEvent::Redirected {
            method: "get_LogIsDebugEnabled".into(),
            signature: "My.App.Widget::Work".into(),
            args: Vec::new(),
        }]
    );
}

#[test]
fn test_redirection_and_tracing_interleave_in_call_order() {
    let mut work = MethodDef::new("Work", MethodAccess::Public, CilType::Void);
    work.is_static = true;
    let body = work.body.as_mut().unwrap();
    body.push(Instruction::with(
        Opcode::Ldstr,
        Operand::Str("starting".into()),
    ));
    body.push(facade_call("Info", vec![CilType::String], CilType::Void));
    body.push(Instruction::simple(Opcode::Ret));
    let mut module = widget_module(work);

    let config = TraceLoggingConfigurationBuilder::default()
        .with_filter(Box::new(TraceAll))
        .with_static_logger(FACADE)
        .build();
    let stats = weave(&config, &mut module);
    assert_eq!(stats.methods_traced, 1);
    assert_eq!(stats.log_calls_redirected, 1);

    let mut eval = Evaluator::new(&module);
    eval.call("My.App.Widget", "Work", Vec::new()).unwrap();
    assert_eq!(
        eval.labels(),
        vec![
            "enter My.App.Widget::Work",
            "call LogInfo",
            "leave My.App.Widget::Work",
        ]
    );
}

#[test]
fn test_multiple_facade_levels_keep_their_arguments() {
    let mut work = MethodDef::new("Work", MethodAccess::Public, CilType::Void);
    work.is_static = true;
    let body = work.body.as_mut().unwrap();
    body.push(Instruction::with(Opcode::Ldstr, Operand::Str("a".into())));
    body.push(facade_call("Warn", vec![CilType::String], CilType::Void));
    body.push(Instruction::with(Opcode::Ldstr, Operand::Str("b".into())));
    body.push(Instruction::with(Opcode::LdcI4, Operand::Int32(3)));
    body.push(facade_call(
        "Error",
        vec![CilType::String, CilType::I4],
        CilType::Void,
    ));
    body.push(Instruction::simple(Opcode::Ret));
    let mut module = widget_module(work);

    let config = TraceLoggingConfigurationBuilder::default()
        .with_static_logger(FACADE)
        .build();
    let stats = weave(&config, &mut module);
    assert_eq!(stats.log_calls_redirected, 2);

    let mut eval = Evaluator::new(&module);
    eval.call("My.App.Widget", "Work", Vec::new()).unwrap();
    assert_eq!(
        eval.events,
        vec![
            TraceEvent::Redirected {
                method: "LogWarn".into(),
                signature: "My.App.Widget::Work".into(),
                args: vec!["a".into()],
            },
            TraceEvent::Redirected {
                method: "LogError".into(),
                signature: "My.App.Widget::Work".into(),
                args: vec!["b".into(), "3".into()],
            },
        ]
    );
}
