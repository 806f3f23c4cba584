//! Outer-instance fields for non-static member classes.
//!
//! A member class about to be hoisted to the top level loses its implicit
//! enclosing instance, so this pass materializes it: an `outer$<k>` field
//! (first member, `k` counting inherited outer fields so names never shadow),
//! a leading constructor parameter on every constructor, and the assignment
//! wired in after any leading super call. When the superclass is itself a
//! member class its constructor expects an outer argument too; if this
//! class's enclosing instance satisfies it, it is forwarded directly,
//! otherwise an extra unnamed parameter of the superclass's enclosing type
//! is added purely to forward.

use janus_ast::{
    Expr, ExprId, FieldDecl, FieldId, Member, MethodDecl, MethodDesc, MethodId, Param, Stmt,
    TypeDescId, TypeId, Unit, VarDesc, VarDescId, VarKind,
};

use crate::closure::{check_constructor_arity, field_assignment, find_super_constructor};
use crate::error::{LowerError, Result};

/// What one outer injection synthesized.
#[derive(Debug, Clone)]
pub struct OuterInjection {
    /// The `outer$<k>` field variable; registered for the reference fixup.
    pub outer_var: VarDescId,
    pub field: FieldId,
    pub synthesized_ctors: Vec<MethodId>,
}

pub fn inject_outer(unit: &mut Unit, inner: TypeId) -> Result<OuterInjection> {
    let inner_desc = unit.types[inner].desc;
    let outer_ty = unit.type_descs[inner_desc]
        .declaring
        .ok_or_else(|| LowerError::UnsupportedCapture {
            ty: unit.type_descs[inner_desc].name.clone(),
            reason: "member class has no declaring class".to_string(),
        })?;

    let count = inherited_outer_count(unit, inner_desc);
    tracing::debug!(
        ty = %unit.type_descs[inner_desc].name,
        outer = %unit.type_descs[outer_ty].name,
        suffix = count,
        "injecting outer field"
    );

    let outer_var = unit.add_var_desc(VarDesc {
        name: format!("outer${count}"),
        ty: outer_ty,
        declaring: Some(inner_desc),
        kind: VarKind::Field,
        is_static: false,
        is_effectively_final: true,
        constant: None,
    });
    let field = unit.add_field(FieldDecl {
        var: outer_var,
        initializer: None,
    });
    unit.types[inner].members.insert(0, Member::Field(field));

    // The superclass's own enclosing instance, when it is a member class too.
    let super_outer = unit.type_descs[inner_desc]
        .superclass
        .filter(|s| unit.is_member_inner(*s))
        .and_then(|s| unit.type_descs[s].declaring);
    let needs_forward = super_outer.is_some_and(|so| !unit.is_assignable(outer_ty, so));

    let ctors = unit.constructors_of(inner);
    let mut synthesized = Vec::new();
    if ctors.is_empty() {
        let ctor = synthesize_default(unit, inner, outer_var, super_outer, needs_forward)?;
        synthesized.push(ctor);
    } else {
        for ctor in ctors {
            thread_outer(unit, ctor, outer_var, super_outer, needs_forward)?;
        }
    }

    Ok(OuterInjection {
        outer_var,
        field,
        synthesized_ctors: synthesized,
    })
}

/// Outer fields already present up the superclass chain; shifts this class's
/// `outer$<k>` suffix past them.
fn inherited_outer_count(unit: &Unit, desc: TypeDescId) -> usize {
    let mut n = 0;
    let mut cur = unit.type_descs[desc].superclass;
    while let Some(s) = cur {
        if unit.is_member_inner(s) {
            n += 1;
        }
        cur = unit.type_descs[s].superclass;
    }
    n
}

/// Prepends the leading outer parameter(s) to one existing constructor and
/// wires the field assignment and super/this forwarding into its body.
fn thread_outer(
    unit: &mut Unit,
    ctor: MethodId,
    outer_var: VarDescId,
    super_outer: Option<TypeDescId>,
    needs_forward: bool,
) -> Result<()> {
    let desc = unit.methods[ctor].desc;
    let outer_ty = unit.var_descs[outer_var].ty;
    let inner_desc = unit.method_descs[desc].declaring;

    let pvar = unit.add_var_desc(VarDesc {
        name: "outer$".to_string(),
        ty: outer_ty,
        declaring: None,
        kind: VarKind::Param,
        is_static: false,
        is_effectively_final: true,
        constant: None,
    });
    let mut lead_params = vec![Param { var: pvar }];
    let mut lead_types = vec![outer_ty];
    let mut forward_var = None;
    if needs_forward {
        if let Some(so) = super_outer {
            // Forwarding-only parameter; deliberately unnamed, nothing in the
            // body reads it besides the super call.
            let fvar = unit.add_var_desc(VarDesc {
                name: String::new(),
                ty: so,
                declaring: None,
                kind: VarKind::Param,
                is_static: false,
                is_effectively_final: true,
                constant: None,
            });
            lead_params.push(Param { var: fvar });
            lead_types.push(so);
            forward_var = Some(fvar);
        }
    }
    unit.methods[ctor].params.splice(0..0, lead_params);
    unit.method_descs[desc].param_types.splice(0..0, lead_types);

    let Some(body) = unit.methods[ctor].body else {
        return check_constructor_arity(unit, ctor);
    };
    let statements = match &unit.stmts[body] {
        Stmt::Block { statements } => statements.clone(),
        _ => Vec::new(),
    };

    match statements.first().map(|s| (*s, unit.stmts[*s].clone())) {
        Some((first, Stmt::ThisConstructorCall { .. })) => {
            // The delegated constructor owns the field assignment; this one
            // only forwards its leading arguments.
            let mut lead_args = vec![unit.add_expr(Expr::Name { var: pvar })];
            if let Some(fv) = forward_var {
                lead_args.push(unit.add_expr(Expr::Name { var: fv }));
            }
            if let Stmt::ThisConstructorCall { args } = &mut unit.stmts[first] {
                args.splice(0..0, lead_args);
            }
        }
        Some((first, Stmt::SuperConstructorCall { .. })) => {
            if super_outer.is_some() {
                let arg = unit.add_expr(Expr::Name {
                    var: forward_var.unwrap_or(pvar),
                });
                if let Stmt::SuperConstructorCall { args, implicit, .. } = &mut unit.stmts[first] {
                    args.insert(0, arg);
                    *implicit = false;
                }
            }
            let assign = field_assignment(unit, outer_var, pvar);
            if let Stmt::Block { statements } = &mut unit.stmts[body] {
                statements.insert(1, assign);
            }
        }
        _ => {
            // No leading constructor call. Create the super call when the
            // superclass expects an outer argument, then assign the field.
            let mut prefix = Vec::new();
            if super_outer.is_some() {
                let arg_var = forward_var.unwrap_or(pvar);
                let arg_ty = unit.var_descs[arg_var].ty;
                let matched = find_super_constructor(unit, inner_desc, &[Some(arg_ty)])
                    .or_else(|| find_super_constructor(unit, inner_desc, &[]));
                let arg = unit.add_expr(Expr::Name { var: arg_var });
                prefix.push(unit.add_stmt(Stmt::SuperConstructorCall {
                    method: matched,
                    args: vec![arg],
                    implicit: false,
                }));
            }
            prefix.push(field_assignment(unit, outer_var, pvar));
            if let Stmt::Block { statements } = &mut unit.stmts[body] {
                statements.splice(0..0, prefix);
            }
        }
    }

    check_constructor_arity(unit, ctor)
}

/// A member class with no declared constructor still needs one to receive
/// its enclosing instance.
fn synthesize_default(
    unit: &mut Unit,
    inner: TypeId,
    outer_var: VarDescId,
    super_outer: Option<TypeDescId>,
    needs_forward: bool,
) -> Result<MethodId> {
    let inner_desc = unit.types[inner].desc;
    let outer_ty = unit.var_descs[outer_var].ty;

    let pvar = unit.add_var_desc(VarDesc {
        name: "outer$".to_string(),
        ty: outer_ty,
        declaring: None,
        kind: VarKind::Param,
        is_static: false,
        is_effectively_final: true,
        constant: None,
    });
    let mut params = vec![Param { var: pvar }];
    let mut param_types = vec![outer_ty];
    let mut forward_var = None;
    if needs_forward {
        if let Some(so) = super_outer {
            let fvar = unit.add_var_desc(VarDesc {
                name: String::new(),
                ty: so,
                declaring: None,
                kind: VarKind::Param,
                is_static: false,
                is_effectively_final: true,
                constant: None,
            });
            params.push(Param { var: fvar });
            param_types.push(so);
            forward_var = Some(fvar);
        }
    }

    let mut statements = Vec::new();
    if unit.type_descs[inner_desc].superclass.is_some() {
        let mut super_args: Vec<ExprId> = Vec::new();
        let mut arg_tys: Vec<Option<TypeDescId>> = Vec::new();
        if super_outer.is_some() {
            let arg_var = forward_var.unwrap_or(pvar);
            arg_tys.push(Some(unit.var_descs[arg_var].ty));
            super_args.push(unit.add_expr(Expr::Name { var: arg_var }));
        }
        let matched = find_super_constructor(unit, inner_desc, &arg_tys)
            .or_else(|| find_super_constructor(unit, inner_desc, &[]))
            .ok_or_else(|| LowerError::NoMatchingSuperConstructor {
                ty: unit.type_descs[inner_desc].name.clone(),
                arity: arg_tys.len(),
            })?;
        statements.push(unit.add_stmt(Stmt::SuperConstructorCall {
            method: Some(matched),
            args: super_args,
            implicit: false,
        }));
    }
    statements.push(field_assignment(unit, outer_var, pvar));

    let body = unit.add_stmt(Stmt::Block { statements });
    let desc = unit.add_method_desc(MethodDesc {
        name: unit.type_descs[inner_desc].name.clone(),
        declaring: inner_desc,
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
    unit.types[inner].members.push(Member::Method(ctor));
    check_constructor_arity(unit, ctor)?;
    Ok(ctor)
}
