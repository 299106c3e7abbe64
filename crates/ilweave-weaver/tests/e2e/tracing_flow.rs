//! Enter/leave tracing over ordinary methods.

use std::cell::RefCell;
use std::rc::Rc;

use crate::harness::{trace_all_config, weave, Evaluator, TraceEvent, Value};
use ilweave_model::annotations::NO_TRACE_PARAMETER_ATTRIBUTE;
use ilweave_model::{
    CilType, CustomAttribute, GenericParam, Instruction, MethodAccess, MethodDef, ModuleDef,
    Opcode, Operand, Parameter, TypeAccess, TypeDef,
};

fn static_method(name: &str, ret: CilType, params: Vec<Parameter>) -> MethodDef {
    let mut method = MethodDef::new(name, MethodAccess::Public, ret);
    method.is_static = true;
    method.parameters = params;
    method
}

fn calc_module(methods: Vec<MethodDef>) -> ModuleDef {
    let mut module = ModuleDef::new("My.App");
    let mut calc = TypeDef::new("My.App", "Calc", TypeAccess::Public);
    calc.methods = methods;
    module.types.push(calc);
    module
}

#[test]
fn test_enter_and_leave_pair_with_rendered_argument_and_return() {
    let mut echo = static_method("Echo", CilType::I4, vec![Parameter::new("value", CilType::I4)]);
    let body = echo.body.as_mut().unwrap();
    body.push(Instruction::with(Opcode::Ldarg, Operand::Arg(0)));
    body.push(Instruction::simple(Opcode::Ret));
    let mut module = calc_module(vec![echo]);
    weave(&trace_all_config(), &mut module);

    let mut eval = Evaluator::new(&module);
    let result = eval
        .call("My.App.Calc", "Echo", vec![Value::Int(42)])
        .unwrap();
    assert_eq!(result, Value::Int(42));
    assert_eq!(
        eval.labels(),
        vec!["enter My.App.Calc::Echo", "leave My.App.Calc::Echo"]
    );

    match &eval.events[0] {
        TraceEvent::Enter { names, values, .. } => {
            assert_eq!(names.as_deref(), Some(&[Some("value".to_string())][..]));
            assert_eq!(values.as_deref(), Some(&["42".to_string()][..]));
        }
        other => panic!("expected enter, got {:?}", other),
    }
    match &eval.events[1] {
        TraceEvent::Leave {
            names,
            values,
            start,
            end,
            ..
        } => {
            // The return slot is unnamed; its value renders like the
            // argument did.
            assert_eq!(names.as_deref(), Some(&[None][..]));
            assert_eq!(values.as_deref(), Some(&["42".to_string()][..]));
            assert!(end > start);
        }
        other => panic!("expected leave, got {:?}", other),
    }
}

#[test]
fn test_every_return_path_reports_exactly_one_leave() {
    let mut pick = static_method("Pick", CilType::I4, vec![Parameter::new("flag", CilType::Bool)]);
    let body = pick.body.as_mut().unwrap();
    let one = body.push(Instruction::with(Opcode::LdcI4, Operand::Int32(1)));
    body.push(Instruction::simple(Opcode::Ret));
    let two = body.push(Instruction::with(Opcode::LdcI4, Operand::Int32(2)));
    body.push(Instruction::simple(Opcode::Ret));
    body.insert_before(one, Instruction::with(Opcode::Ldarg, Operand::Arg(0)))
        .unwrap();
    body.insert_before(one, Instruction::with(Opcode::Brtrue, Operand::Target(two)))
        .unwrap();
    let mut module = calc_module(vec![pick]);
    weave(&trace_all_config(), &mut module);

    let mut eval = Evaluator::new(&module);
    let early = eval
        .call("My.App.Calc", "Pick", vec![Value::Int(0)])
        .unwrap();
    assert_eq!(early, Value::Int(1));
    assert_eq!(eval.events.len(), 2);

    let late = eval
        .call("My.App.Calc", "Pick", vec![Value::Int(1)])
        .unwrap();
    assert_eq!(late, Value::Int(2));
    assert_eq!(eval.events.len(), 4);
    match &eval.events[3] {
        TraceEvent::Leave { values, .. } => {
            assert_eq!(values.as_deref(), Some(&["2".to_string()][..]));
        }
        other => panic!("expected leave, got {:?}", other),
    }
}

#[test]
fn test_double_return_renders_fractional_value() {
    let mut half = static_method("Half", CilType::R8, Vec::new());
    let body = half.body.as_mut().unwrap();
    body.push(Instruction::with(Opcode::LdcR8, Operand::Float64(42.5)));
    body.push(Instruction::simple(Opcode::Ret));
    let mut module = calc_module(vec![half]);
    weave(&trace_all_config(), &mut module);

    let mut eval = Evaluator::new(&module);
    eval.call("My.App.Calc", "Half", Vec::new()).unwrap();
    match &eval.events[1] {
        TraceEvent::Leave { values, .. } => {
            assert_eq!(values.as_deref(), Some(&["42.5".to_string()][..]));
        }
        other => panic!("expected leave, got {:?}", other),
    }
}

#[test]
fn test_marked_parameter_absent_from_enter_payload() {
    let mut secret = Parameter::new("secret", CilType::String);
    secret
        .attributes
        .push(CustomAttribute::marker(NO_TRACE_PARAMETER_ATTRIBUTE));
    let mut login = static_method(
        "Login",
        CilType::Void,
        vec![Parameter::new("user", CilType::String), secret],
    );
    login
        .body
        .as_mut()
        .unwrap()
        .push(Instruction::simple(Opcode::Ret));
    let mut module = calc_module(vec![login]);
    weave(&trace_all_config(), &mut module);

    let mut eval = Evaluator::new(&module);
    eval.call(
        "My.App.Calc",
        "Login",
        vec![Value::Str("ada".into()), Value::Str("hunter2".into())],
    )
    .unwrap();

    // The marked parameter leaves no trace in either array: not even a
    // null-valued slot under its name.
    match &eval.events[0] {
        TraceEvent::Enter { names, values, .. } => {
            assert_eq!(names.as_deref(), Some(&[Some("user".to_string())][..]));
            assert_eq!(values.as_deref(), Some(&["ada".to_string()][..]));
        }
        other => panic!("expected enter, got {:?}", other),
    }
}

#[test]
fn test_out_parameters_reported_after_the_return_slot() {
    let mut produce = static_method(
        "Produce",
        CilType::String,
        vec![
            Parameter::out("param", CilType::String),
            Parameter::out("para2", CilType::I4),
        ],
    );
    let body = produce.body.as_mut().unwrap();
    body.push(Instruction::with(Opcode::Ldarg, Operand::Arg(0)));
    body.push(Instruction::with(Opcode::Ldstr, Operand::Str("side".into())));
    body.push(Instruction::simple(Opcode::StindRef));
    body.push(Instruction::with(Opcode::Ldarg, Operand::Arg(1)));
    body.push(Instruction::with(Opcode::LdcI4, Operand::Int32(7)));
    body.push(Instruction::simple(Opcode::StindI4));
    body.push(Instruction::with(Opcode::Ldstr, Operand::Str("main".into())));
    body.push(Instruction::simple(Opcode::Ret));
    let mut module = calc_module(vec![produce]);
    weave(&trace_all_config(), &mut module);

    let first = Rc::new(RefCell::new(Value::Null));
    let second = Rc::new(RefCell::new(Value::Null));
    let mut eval = Evaluator::new(&module);
    let result = eval
        .call(
            "My.App.Calc",
            "Produce",
            vec![Value::Ref(first.clone()), Value::Ref(second.clone())],
        )
        .unwrap();

    assert_eq!(result, Value::Str("main".into()));
    assert_eq!(*first.borrow(), Value::Str("side".into()));
    assert_eq!(*second.borrow(), Value::Int(7));

    match &eval.events[0] {
        TraceEvent::Enter { names, values, .. } => {
            // Out parameters carry no defined value at entry.
            assert_eq!(names, &None);
            assert_eq!(values, &None);
        }
        other => panic!("expected enter, got {:?}", other),
    }
    match &eval.events[1] {
        TraceEvent::Leave { names, values, .. } => {
            assert_eq!(
                names.as_deref(),
                Some(
                    &[
                        None,
                        Some("param".to_string()),
                        Some("para2".to_string())
                    ][..]
                )
            );
            assert_eq!(
                values.as_deref(),
                Some(&["main".to_string(), "side".to_string(), "7".to_string()][..])
            );
        }
        other => panic!("expected leave, got {:?}", other),
    }
}

#[test]
fn test_generic_type_reports_concrete_values_per_instantiation() {
    let mut module = ModuleDef::new("My.App");
    let mut cache = TypeDef::new("My.App", "Cache`1", TypeAccess::Public);
    cache.generic_params.push(GenericParam {
        name: "T".into(),
        position: 0,
    });
    let mut put = static_method(
        "Put",
        CilType::Void,
        vec![Parameter::new("item", CilType::GenericParam("T".into()))],
    );
    put.body
        .as_mut()
        .unwrap()
        .push(Instruction::simple(Opcode::Ret));
    cache.methods.push(put);
    module.types.push(cache);
    weave(&trace_all_config(), &mut module);

    let mut eval = Evaluator::new(&module);
    eval.call("My.App.Cache`1", "Put", vec![Value::Int(1)]).unwrap();
    eval.call("My.App.Cache`1", "Put", vec![Value::Str("two".into())])
        .unwrap();

    let entered: Vec<Vec<String>> = eval
        .events
        .iter()
        .filter_map(|e| match e {
            TraceEvent::Enter { values, .. } => values.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(entered, vec![vec!["1".to_string()], vec!["two".to_string()]]);
}
