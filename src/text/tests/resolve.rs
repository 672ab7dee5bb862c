//! Name resolution tests

use crate::text::ast::{CommandKind, TextInstrKind, Var};
use crate::text::parser::{parse_module, parse_script};
use crate::text::resolve::{resolve_module, resolve_script, ResolveFailed};
use crate::util::Errors;

#[test]
fn backward_module_reference_resolves() {
    let mut script = parse_script(
        r#"
        (module $a (func (export "f")))
        (invoke $a "f")
        "#,
    )
    .expect("parse");
    let mut errors = Errors::new();
    assert_eq!(resolve_script(&mut script, &mut errors), Ok(()));
    assert!(errors.is_empty());

    let CommandKind::Invoke(action) = &script.commands[1].kind else {
        panic!("expected invoke");
    };
    assert_eq!(action.module, Some(Var::Index(0)));
}

#[test]
fn forward_module_reference_fails() {
    let mut script = parse_script(
        r#"
        (invoke $b "f")
        (module $b (func (export "f")))
        "#,
    )
    .expect("parse");
    let mut errors = Errors::new();
    assert_eq!(resolve_script(&mut script, &mut errors), Err(ResolveFailed));
    assert!(errors.len() >= 1);
    let first = errors.get(0).expect("diagnostic");
    assert!(first.message.contains("$b"), "got: {}", first.message);
}

#[test]
fn duplicate_module_names_fail() {
    let mut script = parse_script(
        r#"
        (module $m)
        (module $m)
        "#,
    )
    .expect("parse");
    let mut errors = Errors::new();
    assert_eq!(resolve_script(&mut script, &mut errors), Err(ResolveFailed));
    assert_eq!(errors.len(), 1);
}

#[test]
fn action_without_any_module_fails() {
    let mut script = parse_script(r#"(invoke "f")"#).expect("parse");
    let mut errors = Errors::new();
    assert_eq!(resolve_script(&mut script, &mut errors), Err(ResolveFailed));
}

#[test]
fn module_internal_names_rewrite_to_indices() {
    let mut module = parse_module(
        r#"
        (module
          (type $binop (func (param i32 i32) (result i32)))
          (import "math" "add" (func $add (type $binop)))
          (global $count i32)
          (func $double (export "double") (param $x i32) (result i32)
            local.get $x
            local.get $x
            call $add)
          (func $noop (type $binop))
          (export "d2" (func $double)))
        "#,
    )
    .expect("parse");
    let mut errors = Errors::new();
    assert_eq!(resolve_module(&mut module, &mut errors), Ok(()));
    assert!(errors.is_empty(), "unexpected: {}", errors.format());

    // Imported $add is function 0, $double is 1
    let body = &module.funcs[0].body;
    assert!(matches!(
        &body[0].kind,
        TextInstrKind::VarOp { var: Var::Index(0), .. }
    ));
    assert!(matches!(
        &body[2].kind,
        TextInstrKind::VarOp { op, var: Var::Index(0) } if op == "call"
    ));
    assert_eq!(module.exports[0].target, Var::Index(1));
    assert_eq!(module.funcs[1].type_use, Some(Var::Index(0)));
}

#[test]
fn unknown_function_reference_fails() {
    let mut module = parse_module(
        r#"
        (module
          (func (export "f") call $missing))
        "#,
    )
    .expect("parse");
    let mut errors = Errors::new();
    assert_eq!(resolve_module(&mut module, &mut errors), Err(ResolveFailed));
    assert_eq!(errors.len(), 1);
    assert!(errors.get(0).expect("diagnostic").message.contains("$missing"));
}

#[test]
fn duplicate_local_names_fail() {
    let mut module = parse_module(
        r#"
        (module
          (func (param $x i32) (local $x i32)))
        "#,
    )
    .expect("parse");
    let mut errors = Errors::new();
    assert_eq!(resolve_module(&mut module, &mut errors), Err(ResolveFailed));
}

#[test]
fn out_of_range_index_fails() {
    let mut module = parse_module(
        r#"
        (module
          (func (export "f") call 3))
        "#,
    )
    .expect("parse");
    let mut errors = Errors::new();
    assert_eq!(resolve_module(&mut module, &mut errors), Err(ResolveFailed));
}

#[test]
fn diagnostics_carry_locations() {
    let mut module = parse_module("(module (func call $nope))").expect("parse");
    let mut errors = Errors::new();
    let _ = resolve_module(&mut module, &mut errors);
    let diagnostic = errors.get(0).expect("diagnostic");
    assert!(diagnostic.location.is_some());
}

#[test]
fn sink_only_accumulates() {
    let mut errors = Errors::new();
    errors.error("pre-existing entry");

    let mut script = parse_script(r#"(invoke $nope "f")"#).expect("parse");
    let _ = resolve_script(&mut script, &mut errors);

    assert!(errors.len() >= 2);
    assert_eq!(
        errors.get(0).expect("first").message,
        "pre-existing entry"
    );
}
