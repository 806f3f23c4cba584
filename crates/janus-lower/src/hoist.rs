//! Hoists every nested type declaration to the top level.
//!
//! Runs last: captures, outer fields and reference fixup have already made
//! each nested declaration self-contained, so hoisting is purely structural.
//! Names are qualified through the registry (`A$B` for a member class `B` of
//! `A`, `A$1` for its first anonymous class, nesting composing left to
//! right), each declaration site is blanked, and the declarations join the
//! unit's top-level list in depth-first declaration order.

use std::collections::HashSet;

use janus_ast::{Expr, ExprId, Member, NameRegistry, Stmt, StmtId, TypeId, Unit, visit};

/// Hoists all nested declarations, returning them in hoist order (each
/// parent before its own nested declarations).
pub fn hoist_unit(unit: &mut Unit, names: &mut NameRegistry) -> Vec<TypeId> {
    let roots = unit.top_level.clone();
    let mut hoisted = Vec::new();
    for ty in roots {
        let prefix = unit.type_descs[unit.types[ty].desc].name.clone();
        qualify_nested(unit, names, ty, &prefix, &mut hoisted);
    }

    detach_all(unit, &hoisted);
    for ty in &hoisted {
        unit.types[*ty].enclosing_type = None;
        unit.types[*ty].enclosing_method = None;
        unit.top_level.push(*ty);
    }

    tracing::debug!(count = hoisted.len(), "hoisted nested declarations");
    hoisted
}

/// Depth-first: renames each directly nested declaration to its qualified
/// name, then recurses with that name as the new prefix.
fn qualify_nested(
    unit: &mut Unit,
    names: &mut NameRegistry,
    ty: TypeId,
    prefix: &str,
    out: &mut Vec<TypeId>,
) {
    let mut nested = Vec::new();
    visit::exprs_in_type(
        unit,
        ty,
        &mut |t| {
            nested.push(t);
            false
        },
        &mut |_| {},
    );

    for t in nested {
        let desc = unit.types[t].desc;
        let name = unit.type_descs[desc].name.clone();
        // Anonymous names already carry their `$`; named members get one.
        let qualified = if name.starts_with('$') {
            format!("{prefix}{name}")
        } else {
            format!("{prefix}${name}")
        };
        let reserved = names.reserve(&qualified);
        names.rename(unit, desc, reserved.clone());
        out.push(t);
        qualify_nested(unit, names, t, &reserved, out);
    }
}

/// Blanks every declaration site of the hoisted types: member entries are
/// removed, `new` expressions lose their bodies, local class statements
/// become empty statements and enum-constant bodies detach.
fn detach_all(unit: &mut Unit, hoisted: &[TypeId]) {
    let set: HashSet<TypeId> = hoisted.iter().copied().collect();

    for raw in 0..unit.types.len() as u32 {
        let ty = TypeId::from_raw(raw);
        unit.types[ty]
            .members
            .retain(|m| !matches!(m, Member::Type(t) if set.contains(t)));
    }

    for raw in 0..unit.exprs.len() as u32 {
        let id = ExprId::from_raw(raw);
        let detach = matches!(
            &unit.exprs[id],
            Expr::New { body: Some(b), .. } if set.contains(b)
        );
        if detach {
            if let Expr::New { body, .. } = &mut unit.exprs[id] {
                *body = None;
            }
        }
    }

    for raw in 0..unit.stmts.len() as u32 {
        let id = StmtId::from_raw(raw);
        if matches!(&unit.stmts[id], Stmt::LocalType { ty } if set.contains(ty)) {
            unit.stmts[id] = Stmt::Empty;
        }
    }

    for raw in 0..unit.enum_consts.len() as u32 {
        let id = janus_ast::EnumConstId::from_raw(raw);
        let detach = matches!(unit.enum_consts[id].body, Some(b) if set.contains(&b));
        if detach {
            unit.enum_consts[id].body = None;
        }
    }
}
