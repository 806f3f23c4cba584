//! End-to-end closure lowering: fields, constructors and sites.

use janus_ast::{ConstValue, Expr, NameRegistry, Stmt, TypeKind, Unit};
use janus_lower::{lower_unit, LowerError};
use janus_test_utils::UnitBuilder;
use pretty_assertions::assert_eq;

fn lower(unit: &mut Unit) -> janus_lower::LowerOutcome {
    let mut names = NameRegistry::new();
    lower_unit(unit, &mut names).expect("lowering failed")
}

#[test]
fn compile_time_constant_capture_is_inlined() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let m = b.method(a, "m", &[], None);

    let x = b.const_local("x", b.int_ty(), ConstValue::Int(5));
    let init = b.lit_int(5);
    b.declare_local(m, x, Some(init));

    let runnable = b.interface_desc("Runnable");
    let anon_desc = b.anon_class_desc(a_desc, runnable);
    let anon = b.body_class(anon_desc, a, Some(m));
    let run = b.method(anon, "run", &[], None);
    let x_ref = b.name(x);
    b.push_stmt(run, Stmt::Expr { expr: x_ref });

    let site = b.new_expr(runnable, None, Vec::new(), Some(anon));
    b.push_stmt(m, Stmt::Expr { expr: site });
    let int_ty = b.int_ty();
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    // No field, no site argument; the reference became the literal.
    assert!(outcome.capture_fields.is_empty());
    assert_eq!(
        unit.exprs[x_ref],
        Expr::Literal {
            value: ConstValue::Int(5),
            ty: int_ty,
        }
    );
    if let Expr::New { args, .. } = &unit.exprs[site] {
        assert!(args.is_empty());
    } else {
        panic!("site is no longer a new expression");
    }
    // The synthesized constructor forwards nothing and only calls super().
    assert_eq!(outcome.synthesized_constructors.len(), 1);
    let ctor = outcome.synthesized_constructors[0];
    assert!(unit.methods[ctor].params.is_empty());
    let body = unit.body_statements(ctor).to_vec();
    assert_eq!(body.len(), 1);
    assert!(matches!(
        unit.stmts[body[0]],
        Stmt::SuperConstructorCall { .. }
    ));
}

#[test]
fn captured_local_becomes_field_constructor_param_and_site_argument() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let m = b.method(a, "m", &[], None);

    let log = b.local("log", b.string_ty());
    b.declare_local(m, log, None);

    let runnable = b.interface_desc("Runnable");
    let anon_desc = b.anon_class_desc(a_desc, runnable);
    let anon = b.body_class(anon_desc, a, Some(m));
    let run = b.method(anon, "run", &[], None);
    let log_ref = b.name(log);
    b.push_stmt(run, Stmt::Expr { expr: log_ref });

    let site = b.new_expr(runnable, None, Vec::new(), Some(anon));
    b.push_stmt(m, Stmt::Expr { expr: site });
    let string_ty = b.string_ty();
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    assert_eq!(outcome.capture_fields.len(), 1);
    let fvar = unit.fields[outcome.capture_fields[0]].var;
    assert_eq!(unit.var_descs[fvar].name, "captured$log");
    assert_eq!(unit.var_descs[fvar].ty, string_ty);

    // The body reference now reads the field.
    assert_eq!(unit.exprs[log_ref], Expr::Name { var: fvar });

    // One synthesized constructor: super(), then the field assignment.
    assert_eq!(outcome.synthesized_constructors.len(), 1);
    let ctor = outcome.synthesized_constructors[0];
    assert_eq!(unit.methods[ctor].params.len(), 1);
    let pvar = unit.methods[ctor].params[0].var;
    assert_eq!(unit.var_descs[pvar].name, "captured$log");
    let body = unit.body_statements(ctor).to_vec();
    assert_eq!(body.len(), 2);
    assert!(matches!(
        unit.stmts[body[0]],
        Stmt::SuperConstructorCall { .. }
    ));

    // The site passes the outer variable by value.
    match &unit.exprs[site] {
        Expr::New { args, ctor, .. } => {
            assert_eq!(args.len(), 1);
            assert_eq!(unit.exprs[args[0]], Expr::Name { var: log });
            assert!(ctor.is_some());
        }
        other => panic!("unexpected site shape: {other:?}"),
    }
}

#[test]
fn repeated_references_share_one_capture_field() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let x = b.param("x", b.int_ty());
    let m = b.method(a, "m", &[x], None);

    let runnable = b.interface_desc("Runnable");
    let anon_desc = b.anon_class_desc(a_desc, runnable);
    let anon = b.body_class(anon_desc, a, Some(m));
    let run = b.method(anon, "run", &[], None);
    let first = b.name(x);
    let second = b.name(x);
    b.push_stmt(run, Stmt::Expr { expr: first });
    b.push_stmt(run, Stmt::Expr { expr: second });

    let site = b.new_expr(runnable, None, Vec::new(), Some(anon));
    b.push_stmt(m, Stmt::Expr { expr: site });
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    assert_eq!(outcome.capture_fields.len(), 1);
    let fvar = unit.fields[outcome.capture_fields[0]].var;
    assert_eq!(unit.exprs[first], Expr::Name { var: fvar });
    assert_eq!(unit.exprs[second], Expr::Name { var: fvar });
    if let Expr::New { args, .. } = &unit.exprs[site] {
        assert_eq!(args.len(), 1);
    }
}

#[test]
fn synthesized_constructors_keep_params_and_binding_in_step() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let x = b.param("x", b.int_ty());
    let y = b.param("y", b.string_ty());
    let m = b.method(a, "m", &[x, y], None);

    let runnable = b.interface_desc("Runnable");
    let anon_desc = b.anon_class_desc(a_desc, runnable);
    let anon = b.body_class(anon_desc, a, Some(m));
    let run = b.method(anon, "run", &[], None);
    let x_ref = b.name(x);
    let y_ref = b.name(y);
    b.push_stmt(run, Stmt::Expr { expr: x_ref });
    b.push_stmt(run, Stmt::Expr { expr: y_ref });

    let site = b.new_expr(runnable, None, Vec::new(), Some(anon));
    b.push_stmt(m, Stmt::Expr { expr: site });
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    for ctor in outcome.synthesized_constructors {
        let desc = unit.methods[ctor].desc;
        assert_eq!(
            unit.methods[ctor].params.len(),
            unit.method_descs[desc].param_types.len()
        );
    }
}

#[test]
fn enum_constant_body_forwards_arguments_to_the_enum_constructor() {
    let mut b = UnitBuilder::new();
    let e_desc = b.class_desc("E");
    let e = b.top_class(e_desc);
    b.unit.type_descs[e_desc].kind = TypeKind::Enum;
    let p = b.param("code", b.int_ty());
    let e_ctor = b.ctor(e, &[p]);
    let e_ctor_desc = b.unit.methods[e_ctor].desc;

    let anon_desc = b.anon_class_desc(e_desc, e_desc);
    let anon = b.body_class(anon_desc, e, None);
    b.method(anon, "describe", &[], None);
    let arg = b.lit_int(5);
    let ec = b.enum_constant(e, "FIRST", vec![arg], Some(anon));
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    // The body's synthesized constructor forwards the constant's argument to
    // the enum constructor up the superclass chain.
    assert_eq!(outcome.synthesized_constructors.len(), 1);
    let ctor = outcome.synthesized_constructors[0];
    assert_eq!(unit.methods[ctor].params.len(), 1);
    let body = unit.body_statements(ctor).to_vec();
    match &unit.stmts[body[0]] {
        Stmt::SuperConstructorCall { method, args, .. } => {
            assert_eq!(*method, Some(e_ctor_desc));
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected super call, got {other:?}"),
    }

    // The constant detached from its body and kept its argument list.
    assert_eq!(unit.enum_consts[ec].body, None);
    assert_eq!(unit.enum_consts[ec].args, vec![arg]);
}

#[test]
fn redundant_implicit_enum_super_call_is_replaced_with_a_forwarding_call() {
    let mut b = UnitBuilder::new();
    let e_desc = b.class_desc("E");
    let e = b.top_class(e_desc);
    b.unit.type_descs[e_desc].kind = TypeKind::Enum;
    let code = b.param("code", b.int_ty());
    let e_ctor = b.ctor(e, &[code]);
    let e_ctor_desc = b.unit.methods[e_ctor].desc;

    // The body declares its own constructor, opened by an implicit `super()`.
    let anon_desc = b.anon_class_desc(e_desc, e_desc);
    let anon = b.body_class(anon_desc, e, None);
    let p = b.param("p", b.int_ty());
    let body_ctor = b.ctor(anon, &[p]);
    b.push_stmt(
        body_ctor,
        Stmt::SuperConstructorCall {
            method: None,
            args: Vec::new(),
            implicit: true,
        },
    );

    let arg = b.lit_int(5);
    b.enum_constant(e, "FIRST", vec![arg], Some(anon));
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    // The matching constructor was threaded in place, none synthesized, and
    // the implicit call became the real forwarding call.
    assert!(outcome.synthesized_constructors.is_empty());
    let body = unit.body_statements(body_ctor).to_vec();
    match &unit.stmts[body[0]] {
        Stmt::SuperConstructorCall {
            method,
            args,
            implicit,
        } => {
            assert!(!*implicit);
            assert_eq!(*method, Some(e_ctor_desc));
            assert_eq!(args.len(), 1);
            assert_eq!(unit.exprs[args[0]], Expr::Name { var: p });
        }
        other => panic!("expected super call, got {other:?}"),
    }
}

#[test]
fn local_class_threads_every_instantiation_site() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let x = b.param("x", b.int_ty());
    let m = b.method(a, "m", &[x], None);

    let l_desc = b.local_class_desc("L", a_desc);
    let l = b.body_class(l_desc, a, Some(m));
    let f = b.method(l, "f", &[], None);
    let x_ref = b.name(x);
    b.push_stmt(f, Stmt::Expr { expr: x_ref });

    let decl_stmt = b.push_stmt(m, Stmt::LocalType { ty: l });
    let site_a = b.new_expr(l_desc, None, Vec::new(), None);
    let site_b = b.new_expr(l_desc, None, Vec::new(), None);
    b.push_stmt(m, Stmt::Expr { expr: site_a });
    b.push_stmt(m, Stmt::Expr { expr: site_b });
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    assert_eq!(outcome.capture_fields.len(), 1);
    for site in [site_a, site_b] {
        match &unit.exprs[site] {
            Expr::New { args, .. } => {
                assert_eq!(args.len(), 1);
                assert_eq!(unit.exprs[args[0]], Expr::Name { var: x });
            }
            other => panic!("unexpected site shape: {other:?}"),
        }
    }

    // The local declaration statement was blanked and the class hoisted.
    assert_eq!(unit.stmts[decl_stmt], Stmt::Empty);
    assert!(unit.top_level.contains(&l));
    assert_eq!(unit.type_descs[l_desc].name, "A$L");
}

#[test]
fn recursive_local_class_reads_its_capture_field_at_inner_sites() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let x = b.param("x", b.int_ty());
    let m = b.method(a, "m", &[x], None);

    // `f` instantiates the class it lives in.
    let l_desc = b.local_class_desc("L", a_desc);
    let l = b.body_class(l_desc, a, Some(m));
    let f = b.method(l, "f", &[], None);
    let x_ref = b.name(x);
    b.push_stmt(f, Stmt::Expr { expr: x_ref });
    let inner_site = b.new_expr(l_desc, None, Vec::new(), None);
    b.push_stmt(f, Stmt::Expr { expr: inner_site });

    b.push_stmt(m, Stmt::LocalType { ty: l });
    let outer_site = b.new_expr(l_desc, None, Vec::new(), None);
    b.push_stmt(m, Stmt::Expr { expr: outer_site });
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    assert_eq!(outcome.capture_fields.len(), 1);
    let fvar = unit.fields[outcome.capture_fields[0]].var;

    // The method-level site reads the local; the site inside `f` reads the
    // capture field, since `x` is gone once the class is hoisted.
    match &unit.exprs[outer_site] {
        Expr::New { args, .. } => {
            assert_eq!(args.len(), 1);
            assert_eq!(unit.exprs[args[0]], Expr::Name { var: x });
        }
        other => panic!("unexpected site shape: {other:?}"),
    }
    match &unit.exprs[inner_site] {
        Expr::New { args, .. } => {
            assert_eq!(args.len(), 1);
            assert_eq!(unit.exprs[args[0]], Expr::Name { var: fvar });
        }
        other => panic!("unexpected site shape: {other:?}"),
    }
}

#[test]
fn delegating_constructor_forwards_captures_to_the_delegate() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let x = b.param("x", b.int_ty());
    let m = b.method(a, "m", &[x], None);

    let l_desc = b.local_class_desc("L", a_desc);
    let l = b.body_class(l_desc, a, Some(m));
    let p = b.param("p", b.int_ty());
    let delegate = b.ctor(l, &[p]);
    let delegating = b.ctor(l, &[]);
    let one = b.lit_int(1);
    b.push_stmt(delegating, Stmt::ThisConstructorCall { args: vec![one] });
    let f = b.method(l, "f", &[], None);
    let x_ref = b.name(x);
    b.push_stmt(f, Stmt::Expr { expr: x_ref });

    b.push_stmt(m, Stmt::LocalType { ty: l });
    let site = b.new_expr(l_desc, None, Vec::new(), None);
    b.push_stmt(m, Stmt::Expr { expr: site });
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    assert_eq!(outcome.capture_fields.len(), 1);
    let fvar = unit.fields[outcome.capture_fields[0]].var;

    // The delegating constructor gains the capture parameter and forwards it
    // through this(), with no assignment of its own.
    assert_eq!(unit.methods[delegating].params.len(), 1);
    let forwarded = unit.methods[delegating].params[0].var;
    assert_eq!(unit.var_descs[forwarded].name, "captured$x");
    let body = unit.body_statements(delegating).to_vec();
    assert_eq!(body.len(), 1);
    match &unit.stmts[body[0]] {
        Stmt::ThisConstructorCall { args } => {
            assert_eq!(args.len(), 2);
            assert_eq!(args[0], one);
            assert_eq!(unit.exprs[args[1]], Expr::Name { var: forwarded });
        }
        other => panic!("expected this() call, got {other:?}"),
    }

    // The delegate declares the same trailing parameter and owns the field
    // assignment.
    assert_eq!(unit.methods[delegate].params.len(), 2);
    let delegate_body = unit.body_statements(delegate).to_vec();
    assert_eq!(delegate_body.len(), 1);
    match &unit.stmts[delegate_body[0]] {
        Stmt::Expr { expr } => match &unit.exprs[*expr] {
            Expr::Assign { target, .. } => {
                assert!(matches!(
                    &unit.exprs[*target],
                    Expr::FieldAccess { field, .. } if *field == fvar
                ));
            }
            other => panic!("expected assignment, got {other:?}"),
        },
        other => panic!("expected expression statement, got {other:?}"),
    }
}

#[test]
fn nested_closure_reaching_past_its_enclosing_closure_chains_capture_fields() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let (_, f) = b.field(a, "f", b.int_ty());
    let m = b.method(a, "m", &[], None);

    let runnable = b.interface_desc("Runnable");
    let outer_desc = b.anon_class_desc(a_desc, runnable);
    let outer = b.body_class(outer_desc, a, Some(m));
    let outer_run = b.method(outer, "run", &[], None);

    let inner_desc = b.anon_class_desc(outer_desc, runnable);
    let inner = b.body_class(inner_desc, outer, Some(outer_run));
    let inner_run = b.method(inner, "run", &[], None);
    let f_ref = b.name(f);
    b.push_stmt(inner_run, Stmt::Expr { expr: f_ref });

    let inner_site = b.new_expr(runnable, None, Vec::new(), Some(inner));
    b.push_stmt(outer_run, Stmt::Expr { expr: inner_site });
    let outer_site = b.new_expr(runnable, None, Vec::new(), Some(outer));
    b.push_stmt(m, Stmt::Expr { expr: outer_site });
    let mut unit = b.finish();

    let outcome = lower(&mut unit);

    // The inner closure captures the outer closure's instance; the outer
    // closure is forced to capture the enclosing class even though its own
    // body never mentions it.
    assert_eq!(outcome.capture_fields.len(), 2);
    let inner_cap = unit.fields[outcome.capture_fields[0]].var;
    let outer_cap = unit.fields[outcome.capture_fields[1]].var;
    assert_eq!(unit.var_descs[inner_cap].name, "captured$this");
    assert_eq!(unit.var_descs[inner_cap].ty, outer_desc);
    assert_eq!(unit.var_descs[outer_cap].name, "captured$this");
    assert_eq!(unit.var_descs[outer_cap].ty, a_desc);

    // f  ->  this.captured$this.captured$this.f, one link per level.
    match &unit.exprs[f_ref] {
        Expr::FieldAccess { receiver, field } => {
            assert_eq!(*field, f);
            match &unit.exprs[*receiver] {
                Expr::FieldAccess {
                    receiver: link,
                    field,
                } => {
                    assert_eq!(*field, outer_cap);
                    match &unit.exprs[*link] {
                        Expr::FieldAccess {
                            receiver: base,
                            field,
                        } => {
                            assert_eq!(*field, inner_cap);
                            assert_eq!(unit.exprs[*base], Expr::This { qualifier: None });
                        }
                        other => panic!("expected field access, got {other:?}"),
                    }
                }
                other => panic!("expected field access, got {other:?}"),
            }
        }
        other => panic!("expected field access, got {other:?}"),
    }

    // Each site passes the instance the closure actually captured.
    for site in [outer_site, inner_site] {
        match &unit.exprs[site] {
            Expr::New { args, .. } => {
                assert_eq!(args.len(), 1);
                assert_eq!(unit.exprs[args[0]], Expr::This { qualifier: None });
            }
            other => panic!("unexpected site shape: {other:?}"),
        }
    }
}

#[test]
fn instance_capture_in_static_context_is_rejected() {
    let mut b = UnitBuilder::new();
    let a_desc = b.class_desc("A");
    let a = b.top_class(a_desc);
    let (_, f) = b.field(a, "f", b.int_ty());
    let s = b.static_method(a, "s", &[], None);

    let runnable = b.interface_desc("Runnable");
    let anon_desc = b.anon_class_desc(a_desc, runnable);
    let anon = b.body_class(anon_desc, a, Some(s));
    let run = b.method(anon, "run", &[], None);
    let f_ref = b.name(f);
    b.push_stmt(run, Stmt::Expr { expr: f_ref });

    let site = b.new_expr(runnable, None, Vec::new(), Some(anon));
    b.push_stmt(s, Stmt::Expr { expr: site });
    let mut unit = b.finish();

    let mut names = NameRegistry::new();
    let err = lower_unit(&mut unit, &mut names).unwrap_err();
    assert!(matches!(err, LowerError::UnsupportedCapture { .. }));
}
