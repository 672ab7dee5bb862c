//! Parser tests

use crate::engine::module::ExternalKind;
use crate::engine::value::{Value, ValueType};
use crate::text::ast::{CommandKind, TextInstrKind, Var};
use crate::text::parser::{parse_module, parse_script, ParseError};

#[test]
fn empty_module() {
    let module = parse_module("(module)").expect("parse");
    assert_eq!(module.name, None);
    assert!(module.funcs.is_empty());
}

#[test]
fn named_module_with_func() {
    let module = parse_module(
        r#"
        (module $math
          (func $add (export "add") (param $x i32) (param $y i32) (result i32)
            local.get $x
            local.get $y
            i32.add))
        "#,
    )
    .expect("parse");

    assert_eq!(module.name.as_deref(), Some("math"));
    assert_eq!(module.funcs.len(), 1);
    let func = &module.funcs[0];
    assert_eq!(func.name.as_deref(), Some("add"));
    assert_eq!(func.inline_exports, vec!["add".to_string()]);
    assert_eq!(
        func.params,
        vec![
            (Some("x".to_string()), ValueType::I32),
            (Some("y".to_string()), ValueType::I32),
        ]
    );
    assert_eq!(func.results, vec![ValueType::I32]);
    assert_eq!(func.body.len(), 3);
    assert!(matches!(
        &func.body[0].kind,
        TextInstrKind::VarOp { op, var: Var::Name(name) }
            if op == "local.get" && name == "x"
    ));
}

#[test]
fn folded_instructions_emit_operands_first() {
    let module = parse_module(
        r#"
        (module
          (func (result i32)
            (i32.add (i32.const 1) (i32.const 2))))
        "#,
    )
    .expect("parse");

    let body = &module.funcs[0].body;
    assert_eq!(body.len(), 3);
    assert!(matches!(
        body[0].kind,
        TextInstrKind::Const { value: Value::I32(1) }
    ));
    assert!(matches!(
        body[1].kind,
        TextInstrKind::Const { value: Value::I32(2) }
    ));
    assert!(matches!(&body[2].kind, TextInstrKind::Plain { op } if op == "i32.add"));
}

#[test]
fn module_fields_parse() {
    let module = parse_module(
        r#"
        (module
          (type $binop (func (param i32 i32) (result i32)))
          (import "math" "add" (func $add (type $binop)))
          (global $g (mut i32) (i32.const 7))
          (table $t 1 10 funcref)
          (memory $m 1)
          (export "the-add" (func $add)))
        "#,
    )
    .expect("parse");

    assert_eq!(module.types.len(), 1);
    assert_eq!(module.imports.len(), 1);
    assert_eq!(module.globals.len(), 1);
    assert!(module.globals[0].mutable);
    assert_eq!(module.globals[0].init, Some(Value::I32(7)));
    assert_eq!(module.tables.len(), 1);
    assert_eq!(module.tables[0].max, Some(10));
    assert_eq!(module.memories.len(), 1);
    assert_eq!(module.exports.len(), 1);
    assert_eq!(module.exports[0].kind, ExternalKind::Func);
    assert_eq!(module.exports[0].target, Var::Name("add".to_string()));
}

#[test]
fn script_commands_parse() {
    let script = parse_script(
        r#"
        (module $a
          (func (export "id") (param i32) (result i32) local.get 0))
        (register "a" $a)
        (invoke $a "id" (i32.const 1))
        (assert_return (invoke "id" (i32.const 2)) (i32.const 2))
        (assert_trap (invoke "crash") "unreachable")
        "#,
    )
    .expect("parse");

    assert_eq!(script.commands.len(), 5);
    assert!(matches!(&script.commands[0].kind, CommandKind::Module(_)));
    assert!(matches!(
        &script.commands[1].kind,
        CommandKind::Register { name, module: Some(Var::Name(m)) }
            if name == "a" && m == "a"
    ));
    match &script.commands[3].kind {
        CommandKind::AssertReturn { action, expected } => {
            assert_eq!(action.field, "id");
            assert_eq!(action.args, vec![Value::I32(2)]);
            assert_eq!(expected, &vec![Value::I32(2)]);
        }
        other => panic!("expected assert_return, got {:?}", other),
    }
}

#[test]
fn float_literals_keep_bit_patterns() {
    let script = parse_script(
        r#"(invoke "f" (f32.const -0) (f64.const nan) (f32.const nan:0x200000))"#,
    )
    .expect("parse");
    let CommandKind::Invoke(action) = &script.commands[0].kind else {
        panic!("expected invoke");
    };
    assert_eq!(action.args[0], Value::F32(0x8000_0000));
    assert_eq!(action.args[1], Value::F64(f64::NAN.to_bits()));
    assert_eq!(action.args[2], Value::F32(0x7FA0_0000));
}

#[test]
fn integer_range_is_checked() {
    assert!(matches!(
        parse_script(r#"(invoke "f" (i32.const 4294967296))"#),
        Err(ParseError::InvalidLiteral { what: "i32", .. })
    ));
    // u32::MAX is in range for the unsigned interpretation
    let script =
        parse_script(r#"(invoke "f" (i32.const 4294967295))"#).expect("parse");
    let CommandKind::Invoke(action) = &script.commands[0].kind else {
        panic!("expected invoke");
    };
    assert_eq!(action.args[0], Value::I32(u32::MAX));
}

#[test]
fn folded_control_flow_is_unsupported() {
    assert!(matches!(
        parse_module("(module (func (block (nop))))"),
        Err(ParseError::Unsupported { .. })
    ));
}

#[test]
fn unknown_command_is_unsupported() {
    assert!(matches!(
        parse_script(r#"(assert_exhaustion (invoke "f") "stack")"#),
        Err(ParseError::Unsupported { .. })
    ));
}
