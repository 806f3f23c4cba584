//! Whole-unit reference fixup after extraction.
//!
//! Once every closure and member class carries its synthesized outer field,
//! references written against the original nesting no longer resolve: a
//! qualified `this`, an unqualified enclosing field read or instance call,
//! and a `new` of a member class all implicitly reached through enclosing
//! instances that are now explicit fields. This pass walks every type's
//! direct member bodies once and rewrites those references onto outer-field
//! chains. Every rewrite changes the node's shape (or an arity it checks
//! first), so running the pass again is a no-op.

use std::collections::{HashMap, HashSet};

use janus_ast::{
    Expr, ExprId, Member, MethodDescId, TypeDescId, TypeId, Unit, VarDescId, VarKind, visit,
};

/// The synthesized outer-instance field of each extracted type, keyed by the
/// type's descriptor: `captured$this` for closures, `outer$<k>` for member
/// classes. Chains are built by following these fields outward.
pub type OuterFields = HashMap<TypeDescId, VarDescId>;

/// Rewrites every reference in the unit that still assumes the original
/// nesting. Runs strictly after all extractions, so chains of any length are
/// available.
pub fn fix_references(unit: &mut Unit, outer: &OuterFields) {
    for raw in 0..unit.types.len() as u32 {
        fix_type(unit, outer, TypeId::from_raw(raw));
    }
}

fn fix_type(unit: &mut Unit, outer: &OuterFields, ty: TypeId) {
    let cur = unit.types[ty].desc;

    // Direct member bodies only; nested types are separate arena entries and
    // get their own iteration with their own enclosing context.
    let mut work: Vec<(ExprId, bool)> = Vec::new();
    for member in &unit.types[ty].members {
        match member {
            Member::Field(f) => {
                let is_static = unit.var_descs[unit.fields[*f].var].is_static;
                if let Some(init) = unit.fields[*f].initializer {
                    visit::exprs_in_expr(unit, init, &mut |_| false, &mut |e| {
                        work.push((e, is_static));
                    });
                }
            }
            Member::Method(m) => {
                let is_static = unit.method_descs[unit.methods[*m].desc].is_static;
                if let Some(body) = unit.methods[*m].body {
                    visit::exprs_in_stmt(unit, body, &mut |_| false, &mut |e| {
                        work.push((e, is_static));
                    });
                }
            }
            // Enum-constant arguments evaluate in a static context.
            Member::EnumConstant(ec) => {
                for arg in &unit.enum_consts[*ec].args {
                    visit::exprs_in_expr(unit, *arg, &mut |_| false, &mut |e| {
                        work.push((e, true));
                    });
                }
            }
            Member::Type(_) => {}
        }
    }

    for (e, in_static) in work {
        fix_expr(unit, outer, cur, e, in_static);
    }
}

fn fix_expr(unit: &mut Unit, outer: &OuterFields, cur: TypeDescId, expr: ExprId, in_static: bool) {
    match unit.exprs[expr].clone() {
        // A `new` of a member class needs the enclosing instance as its
        // leading constructor argument: an explicit qualifier moves into the
        // argument list, an implicit one becomes an outer chain. The arity
        // check against the constructor binding is the idempotence guard.
        Expr::New {
            ty,
            ctor,
            outer: qualifier,
            args,
            body,
        } => {
            if body.is_some() || !unit.is_member_inner(ty) {
                return;
            }
            let Some(binding) = resolve_ctor(unit, ctor, ty) else {
                return;
            };
            let expected = unit.method_descs[binding].param_types.len();
            if args.len() + 1 != expected {
                return;
            }
            let lead = match qualifier {
                Some(q) => Some(q),
                None => {
                    if in_static {
                        return;
                    }
                    match unit.type_descs[ty].declaring {
                        Some(target) => build_outer_chain(unit, outer, cur, target),
                        None => None,
                    }
                }
            };
            let Some(lead) = lead else { return };
            if let Expr::New {
                outer: q,
                args,
                ctor,
                ..
            } = &mut unit.exprs[expr]
            {
                *q = None;
                args.insert(0, lead);
                ctor.get_or_insert(binding);
            }
        }

        // `Enclosing.this` becomes the outer chain; a qualifier naming the
        // current type itself just drops.
        Expr::This { qualifier: Some(q) } => {
            if unit.is_assignable(cur, q) {
                unit.exprs[expr] = Expr::This { qualifier: None };
            } else if !in_static && unit.is_enclosing(cur, q) {
                if let Some(chain) = build_outer_chain(unit, outer, cur, q) {
                    unit.exprs[expr] = unit.exprs[chain].clone();
                }
            }
        }

        // An unqualified read of an enclosing instance field becomes a field
        // access through the outer chain.
        Expr::Name { var } => {
            let vd = &unit.var_descs[var];
            if in_static || vd.kind != VarKind::Field || vd.is_static {
                return;
            }
            let Some(declaring) = vd.declaring else { return };
            if unit.inherits_from(cur, declaring) || !unit.is_enclosing(cur, declaring) {
                return;
            }
            if let Some(chain) = build_outer_chain(unit, outer, cur, declaring) {
                unit.exprs[expr] = Expr::FieldAccess {
                    receiver: chain,
                    field: var,
                };
            }
        }

        // An unqualified instance call on an enclosing type gets the outer
        // chain as its receiver.
        Expr::Invoke {
            receiver: None,
            method,
            ..
        } => {
            let md = &unit.method_descs[method];
            if in_static || md.is_static || md.is_constructor {
                return;
            }
            let declaring = md.declaring;
            if unit.inherits_from(cur, declaring) || !unit.is_enclosing(cur, declaring) {
                return;
            }
            if let Some(chain) = build_outer_chain(unit, outer, cur, declaring) {
                if let Expr::Invoke { receiver, .. } = &mut unit.exprs[expr] {
                    *receiver = Some(chain);
                }
            }
        }

        _ => {}
    }
}

/// The constructor binding for a `new` of `ty`: the recorded one, or the
/// unique constructor descriptor of `ty` when the site carries none.
fn resolve_ctor(unit: &Unit, binding: Option<MethodDescId>, ty: TypeDescId) -> Option<MethodDescId> {
    if binding.is_some() {
        return binding;
    }
    let mut found = None;
    for (raw, md) in unit.method_descs.iter() {
        if md.is_constructor && md.declaring == ty {
            if found.is_some() {
                // Ambiguous without a resolver binding; leave the site alone.
                return None;
            }
            found = Some(MethodDescId::from_raw(raw));
        }
    }
    found
}

/// `this.outer$a.outer$b...` from `cur` until the reached type is assignable
/// to `target`. Returns `None` when some link lacks an outer field, which
/// means `target` was never an enclosing instance of `cur`.
fn build_outer_chain(
    unit: &mut Unit,
    outer: &OuterFields,
    cur: TypeDescId,
    target: TypeDescId,
) -> Option<ExprId> {
    let mut links = Vec::new();
    let mut ty = cur;
    let mut seen = HashSet::new();
    while !unit.is_assignable(ty, target) {
        if !seen.insert(ty) {
            return None;
        }
        let field = *outer.get(&ty)?;
        links.push(field);
        ty = unit.var_descs[field].ty;
    }
    let mut expr = unit.add_expr(Expr::This { qualifier: None });
    for field in links {
        expr = unit.add_expr(Expr::FieldAccess {
            receiver: expr,
            field,
        });
    }
    Some(expr)
}
