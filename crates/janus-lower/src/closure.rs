//! Capture field and constructor synthesis for closures.
//!
//! Consumes the reference-descriptions produced by [`crate::capture`] and
//! rewrites one closure declaration: captured variables become private
//! `captured$` fields (compile-time constants are inlined as literals
//! instead), every constructor is threaded to accept and assign the captured
//! values, and the instantiation site is rewritten to supply them.

use std::collections::HashSet;

use janus_ast::{
    EnumConstId, Expr, ExprId, FieldDecl, FieldId, Member, MethodDecl, MethodDesc, MethodDescId,
    MethodId, Param, Stmt, TypeDescId, TypeId, Unit, VarDesc, VarDescId, VarKind, visit,
};

use crate::capture::{CaptureRef, Captured};
use crate::error::{LowerError, Result};

/// Where a closure's captured values are supplied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// The `new` expression carrying the anonymous body.
    New(ExprId),
    /// An enum constant whose argument list plays the instantiation role.
    Enum(EnumConstId),
    /// A method-local named class; every `new` of it in the unit is a site.
    Local,
}

/// What one closure lowering synthesized, for the downstream-pass report.
#[derive(Debug, Clone, Default)]
pub struct LoweredClosure {
    pub capture_fields: Vec<FieldId>,
    /// The `captured$this` variable when the closure captures its enclosing
    /// instance; registered as the closure's outer-chain field.
    pub outer_field: Option<VarDescId>,
    pub synthesized_ctors: Vec<MethodId>,
}

/// One entry of the ordered, deduplicated capture list.
#[derive(Debug, Clone)]
struct InnerVar {
    captured: Captured,
    /// Dedup declaring class, widened to a common supertype during merge.
    declaring: Option<TypeDescId>,
    /// Backing field variable, absent for inlined constants.
    field: Option<VarDescId>,
}

pub fn lower_closure(
    unit: &mut Unit,
    closure: TypeId,
    site: Site,
    refs: Vec<CaptureRef>,
    force_outer: bool,
) -> Result<LoweredClosure> {
    let closure_desc = unit.types[closure].desc;
    let enclosing_desc = unit.types[closure]
        .enclosing_type
        .map(|t| unit.types[t].desc);

    let mut refs = refs;
    let mut inner_vars = merge_captures(unit, &refs, force_outer, enclosing_desc, closure_desc)?;
    check_outer_context(unit, closure, &inner_vars)?;

    tracing::debug!(
        ty = %unit.type_descs[closure_desc].name,
        captures = inner_vars.len(),
        refs = refs.len(),
        "lowering closure"
    );

    let mut result = LoweredClosure::default();

    // Synthesize one backing field per non-constant capture, in capture
    // order. Constants get no field; their references are inlined below.
    for i in 0..inner_vars.len() {
        let (name, ty, is_const) = match inner_vars[i].captured {
            Captured::Var(v) => {
                let vd = &unit.var_descs[v];
                (vd.name.clone(), vd.ty, vd.constant.is_some())
            }
            Captured::Outer(t) => ("this".to_string(), t, false),
        };
        if is_const {
            continue;
        }
        let fvar = unit.add_var_desc(VarDesc {
            name: format!("captured${name}"),
            ty,
            declaring: Some(closure_desc),
            kind: VarKind::Field,
            is_static: false,
            is_effectively_final: true,
            constant: None,
        });
        let field = unit.add_field(FieldDecl {
            var: fvar,
            initializer: None,
        });
        unit.types[closure].members.push(Member::Field(field));
        inner_vars[i].field = Some(fvar);
        result.capture_fields.push(field);
        if matches!(inner_vars[i].captured, Captured::Outer(_)) {
            result.outer_field = Some(fvar);
        }
    }

    // Record the assigned field on every reference-description.
    for r in &mut refs {
        r.field = inner_vars
            .iter()
            .find(|iv| same_capture(unit, &iv.captured, &r.captured))
            .and_then(|iv| iv.field);
    }

    // Rewrite variable references in place. References to the enclosing
    // instance are left alone here; the whole-unit fixup routes them through
    // the captured field once every extraction has final field placement.
    for r in &refs {
        if let Captured::Var(v) = r.captured {
            let vd = unit.var_descs[v].clone();
            match vd.constant {
                Some(value) => {
                    unit.exprs[r.expr] = Expr::Literal { value, ty: vd.ty };
                }
                None => {
                    if let Some(fvar) = r.field {
                        unit.exprs[r.expr] = Expr::Name { var: fvar };
                    }
                }
            }
        }
    }

    // Arguments already forwarded at the instantiation site, and their
    // static types for constructor matching.
    let site_args: Vec<ExprId> = match site {
        Site::New(e) => match &unit.exprs[e] {
            Expr::New { args, .. } => args.clone(),
            _ => Vec::new(),
        },
        Site::Enum(ec) => unit.enum_consts[ec].args.clone(),
        Site::Local => Vec::new(),
    };
    let arg_tys: Vec<Option<TypeDescId>> = site_args
        .iter()
        .map(|a| unit.expr_type(*a, enclosing_desc))
        .collect();

    // Thread every matching constructor; synthesize a minimal one when none
    // matches (anonymous bodies normally have none).
    let ctors = unit.constructors_of(closure);
    let mut threaded_any = false;
    for ctor in ctors {
        let matches = match site {
            Site::Local => true,
            _ => ctor_matches(unit, ctor, &arg_tys),
        };
        if matches {
            thread_constructor(unit, closure, ctor, &inner_vars, site, &arg_tys)?;
            threaded_any = true;
        }
    }
    if !threaded_any {
        let ctor = synthesize_constructor(unit, closure, &arg_tys, &inner_vars)?;
        result.synthesized_ctors.push(ctor);
    }

    // Rewrite the instantiation site(s): one appended argument per
    // non-constant capture, reading the outer variable (the capture is
    // supplied by value, never aliased to the inner field).
    match site {
        Site::New(e) => {
            let extra = site_arguments(unit, &inner_vars);
            if let Expr::New { args, ctor, .. } = &mut unit.exprs[e] {
                args.extend(extra);
                if let Some(synth) = result.synthesized_ctors.first() {
                    *ctor = Some(unit.methods[*synth].desc);
                }
            }
        }
        Site::Enum(ec) => {
            let extra = site_arguments(unit, &inner_vars);
            unit.enum_consts[ec].args.extend(extra);
        }
        Site::Local => {
            // Sites lexically inside the class body cannot read the method's
            // locals once the class is hoisted; those re-read the already
            // assigned capture fields instead.
            let mut inside = HashSet::new();
            visit::exprs_in_type(unit, closure, &mut |_| true, &mut |e| {
                inside.insert(e);
            });
            let sites: Vec<ExprId> = unit
                .exprs
                .iter()
                .filter(|(_, e)| {
                    matches!(e, Expr::New { ty, body: None, .. } if *ty == closure_desc)
                })
                .map(|(raw, _)| ExprId::from_raw(raw))
                .collect();
            for s in sites {
                let extra = if inside.contains(&s) {
                    field_site_arguments(unit, &inner_vars)
                } else {
                    site_arguments(unit, &inner_vars)
                };
                if let Expr::New { args, .. } = &mut unit.exprs[s] {
                    args.extend(extra);
                }
            }
        }
    }

    Ok(result)
}

fn same_capture(unit: &Unit, a: &Captured, b: &Captured) -> bool {
    match (a, b) {
        (Captured::Var(x), Captured::Var(y)) => x == y,
        (Captured::Outer(x), Captured::Outer(y)) => {
            x == y || unit.is_assignable(*x, *y) || unit.is_assignable(*y, *x)
        }
        _ => false,
    }
}

/// Merges reference-descriptions into the ordered capture list.
///
/// Locals and parameters dedup by descriptor identity. Enclosing-instance
/// captures merge when their types are assignment-compatible; the recorded
/// declaring class widens to the common supertype, and when a third
/// mutually-compatible class appears the first-seen (possibly widened) class
/// wins, keeping the result order-stable.
fn merge_captures(
    unit: &Unit,
    refs: &[CaptureRef],
    force_outer: bool,
    enclosing_desc: Option<TypeDescId>,
    closure_desc: TypeDescId,
) -> Result<Vec<InnerVar>> {
    let mut vars: Vec<InnerVar> = Vec::new();
    for r in refs {
        match vars
            .iter_mut()
            .find(|iv| same_capture(unit, &iv.captured, &r.captured))
        {
            Some(existing) => widen(unit, &mut existing.declaring, r.declaring),
            None => vars.push(InnerVar {
                captured: r.captured,
                declaring: r.declaring,
                field: None,
            }),
        }
    }
    if force_outer && !vars.iter().any(|iv| matches!(iv.captured, Captured::Outer(_))) {
        let outer = enclosing_desc.ok_or_else(|| LowerError::UnsupportedCapture {
            ty: unit.type_descs[closure_desc].name.clone(),
            reason: "nested closure needs an enclosing instance but none exists".to_string(),
        })?;
        vars.push(InnerVar {
            captured: Captured::Outer(outer),
            declaring: Some(outer),
            field: None,
        });
    }
    Ok(vars)
}

/// Widens the recorded declaring class to `new` only when `new` is a strict
/// supertype of it; unrelated classes keep the first-seen record.
fn widen(unit: &Unit, recorded: &mut Option<TypeDescId>, new: Option<TypeDescId>) {
    if let (Some(old), Some(new)) = (recorded.as_mut(), new) {
        if *old != new && unit.is_assignable(*old, new) {
            *old = new;
        }
    }
}

/// An enclosing-instance capture inside a static context is a capture
/// pattern the lowering rules cannot express.
fn check_outer_context(unit: &Unit, closure: TypeId, vars: &[InnerVar]) -> Result<()> {
    if !vars.iter().any(|iv| matches!(iv.captured, Captured::Outer(_))) {
        return Ok(());
    }
    if let Some(m) = unit.types[closure].enclosing_method {
        if unit.method_descs[unit.methods[m].desc].is_static {
            return Err(LowerError::UnsupportedCapture {
                ty: unit.type_descs[unit.types[closure].desc].name.clone(),
                reason: "enclosing instance captured from a static context".to_string(),
            });
        }
    }
    Ok(())
}

fn ctor_matches(unit: &Unit, ctor: MethodId, arg_tys: &[Option<TypeDescId>]) -> bool {
    let desc = &unit.method_descs[unit.methods[ctor].desc];
    desc.param_types.len() == arg_tys.len()
        && desc
            .param_types
            .iter()
            .zip(arg_tys)
            .all(|(p, a)| a.map_or(true, |a| unit.is_assignable(a, *p)))
}

/// Appends one parameter per non-constant capture to `ctor` and inserts the
/// field assignments right after any leading super call. A constructor that
/// delegates through `this(...)` forwards the appended parameters instead;
/// the delegate owns the assignments.
fn thread_constructor(
    unit: &mut Unit,
    closure: TypeId,
    ctor: MethodId,
    inner_vars: &[InnerVar],
    site: Site,
    arg_tys: &[Option<TypeDescId>],
) -> Result<()> {
    let desc = unit.methods[ctor].desc;
    let original_params: Vec<VarDescId> =
        unit.methods[ctor].params.iter().map(|p| p.var).collect();

    let mut appended: Vec<(VarDescId, VarDescId)> = Vec::new();
    for iv in inner_vars {
        let Some(fvar) = iv.field else { continue };
        let fd = unit.var_descs[fvar].clone();
        let pvar = unit.add_var_desc(VarDesc {
            name: fd.name.clone(),
            ty: fd.ty,
            declaring: None,
            kind: VarKind::Param,
            is_static: false,
            is_effectively_final: true,
            constant: None,
        });
        unit.methods[ctor].params.push(Param { var: pvar });
        unit.method_descs[desc].param_types.push(fd.ty);
        appended.push((fvar, pvar));
    }

    if let Some(body) = unit.methods[ctor].body {
        let statements = match &unit.stmts[body] {
            Stmt::Block { statements } => statements.clone(),
            _ => Vec::new(),
        };

        // An enum constant that now forwards explicit arguments makes an
        // earlier implicit `super()` redundant; replace it with the real
        // forwarding call before inserting the assignments.
        if matches!(site, Site::Enum(_)) && !arg_tys.is_empty() {
            if let Some(first) = statements.first() {
                if matches!(
                    &unit.stmts[*first],
                    Stmt::SuperConstructorCall { implicit: true, args, .. } if args.is_empty()
                ) {
                    let closure_desc = unit.types[closure].desc;
                    let matched =
                        find_super_constructor(unit, closure_desc, arg_tys).ok_or_else(|| {
                            LowerError::NoMatchingSuperConstructor {
                                ty: unit.type_descs[closure_desc].name.clone(),
                                arity: arg_tys.len(),
                            }
                        })?;
                    let args: Vec<ExprId> = original_params
                        .iter()
                        .map(|var| unit.add_expr(Expr::Name { var: *var }))
                        .collect();
                    unit.stmts[*first] = Stmt::SuperConstructorCall {
                        method: Some(matched),
                        args,
                        implicit: false,
                    };
                }
            }
        }

        match statements.first().map(|s| (*s, unit.stmts[*s].clone())) {
            Some((first, Stmt::ThisConstructorCall { .. })) => {
                let extra: Vec<ExprId> = appended
                    .iter()
                    .map(|(_, pvar)| unit.add_expr(Expr::Name { var: *pvar }))
                    .collect();
                if let Stmt::ThisConstructorCall { args } = &mut unit.stmts[first] {
                    args.extend(extra);
                }
            }
            other => {
                let insert_at = match other {
                    Some((_, Stmt::SuperConstructorCall { .. })) => 1,
                    _ => 0,
                };
                let assigns: Vec<_> = appended
                    .iter()
                    .map(|(fvar, pvar)| field_assignment(unit, *fvar, *pvar))
                    .collect();
                if let Stmt::Block { statements } = &mut unit.stmts[body] {
                    statements.splice(insert_at..insert_at, assigns);
                }
            }
        }
    }

    check_constructor_arity(unit, ctor)
}

/// Synthesizes the minimal constructor: forward the site arguments to the
/// matched superclass constructor, then assign the capture fields.
fn synthesize_constructor(
    unit: &mut Unit,
    closure: TypeId,
    arg_tys: &[Option<TypeDescId>],
    inner_vars: &[InnerVar],
) -> Result<MethodId> {
    let closure_desc = unit.types[closure].desc;
    let matched = find_super_constructor(unit, closure_desc, arg_tys).ok_or_else(|| {
        LowerError::NoMatchingSuperConstructor {
            ty: unit.type_descs[closure_desc].name.clone(),
            arity: arg_tys.len(),
        }
    })?;

    let forward_tys = unit.method_descs[matched].param_types.clone();
    let mut params = Vec::new();
    let mut param_types = Vec::new();
    let mut super_args = Vec::new();
    for (i, ty) in forward_tys.iter().enumerate() {
        let pvar = unit.add_var_desc(VarDesc {
            name: format!("arg${i}"),
            ty: *ty,
            declaring: None,
            kind: VarKind::Param,
            is_static: false,
            is_effectively_final: true,
            constant: None,
        });
        params.push(Param { var: pvar });
        param_types.push(*ty);
        super_args.push(unit.add_expr(Expr::Name { var: pvar }));
    }

    let mut statements = vec![unit.add_stmt(Stmt::SuperConstructorCall {
        method: Some(matched),
        args: super_args,
        implicit: false,
    })];
    for iv in inner_vars {
        let Some(fvar) = iv.field else { continue };
        let fd = unit.var_descs[fvar].clone();
        let pvar = unit.add_var_desc(VarDesc {
            name: fd.name.clone(),
            ty: fd.ty,
            declaring: None,
            kind: VarKind::Param,
            is_static: false,
            is_effectively_final: true,
            constant: None,
        });
        params.push(Param { var: pvar });
        param_types.push(fd.ty);
        statements.push(field_assignment(unit, fvar, pvar));
    }

    let body = unit.add_stmt(Stmt::Block { statements });
    let desc = unit.add_method_desc(MethodDesc {
        name: unit.type_descs[closure_desc].name.clone(),
        declaring: closure_desc,
        param_types,
        return_ty: None,
        is_constructor: true,
        is_static: false,
    });
    let ctor = unit.add_method(MethodDecl {
        desc,
        params,
        body: Some(body),
    });
    unit.types[closure].members.push(Member::Method(ctor));
    check_constructor_arity(unit, ctor)?;
    Ok(ctor)
}

/// `this.<field> = <param>;`
pub(crate) fn field_assignment(unit: &mut Unit, field: VarDescId, param: VarDescId) -> janus_ast::StmtId {
    let this_e = unit.add_expr(Expr::This { qualifier: None });
    let target = unit.add_expr(Expr::FieldAccess {
        receiver: this_e,
        field,
    });
    let value = unit.add_expr(Expr::Name { var: param });
    let assign = unit.add_expr(Expr::Assign { target, value });
    unit.add_stmt(Stmt::Expr { expr: assign })
}

/// One appended site argument per non-constant capture: the outer variable
/// for a local/parameter capture, `this` for the enclosing instance.
fn site_arguments(unit: &mut Unit, inner_vars: &[InnerVar]) -> Vec<ExprId> {
    let mut args = Vec::new();
    for iv in inner_vars {
        if iv.field.is_none() {
            continue; // inlined constant
        }
        let arg = match iv.captured {
            Captured::Var(v) => unit.add_expr(Expr::Name { var: v }),
            Captured::Outer(_) => unit.add_expr(Expr::This { qualifier: None }),
        };
        args.push(arg);
    }
    args
}

/// Site arguments for an instantiation inside the class's own body, where
/// the captured variables are out of scope: each capture is re-read from the
/// field the enclosing instance was constructed with.
fn field_site_arguments(unit: &mut Unit, inner_vars: &[InnerVar]) -> Vec<ExprId> {
    let mut args = Vec::new();
    for iv in inner_vars {
        let Some(fvar) = iv.field else { continue };
        args.push(unit.add_expr(Expr::Name { var: fvar }));
    }
    args
}

/// Iterative superclass-chain search for a constructor accepting the given
/// argument types. Unknown argument types match any parameter. Returns an
/// explicit not-found instead of using errors for control flow.
pub(crate) fn find_super_constructor(
    unit: &Unit,
    from: TypeDescId,
    arg_tys: &[Option<TypeDescId>],
) -> Option<MethodDescId> {
    let mut cur = unit.type_descs[from].superclass;
    while let Some(sup) = cur {
        for (raw, md) in unit.method_descs.iter() {
            if md.is_constructor
                && md.declaring == sup
                && md.param_types.len() == arg_tys.len()
                && md
                    .param_types
                    .iter()
                    .zip(arg_tys)
                    .all(|(p, a)| a.map_or(true, |a| unit.is_assignable(a, *p)))
            {
                return Some(MethodDescId::from_raw(raw));
            }
        }
        cur = unit.type_descs[sup].superclass;
    }
    None
}

/// The declared parameter count of a constructor's binding must exactly
/// equal its formal parameter nodes; checked at every synthesis site.
pub(crate) fn check_constructor_arity(unit: &Unit, ctor: MethodId) -> Result<()> {
    let desc = unit.methods[ctor].desc;
    let params = unit.methods[ctor].params.len();
    let binding = unit.method_descs[desc].param_types.len();
    if params != binding {
        return Err(LowerError::ConstructorArityMismatch {
            ty: unit.type_descs[unit.method_descs[desc].declaring].name.clone(),
            params,
            binding,
        });
    }
    Ok(())
}
