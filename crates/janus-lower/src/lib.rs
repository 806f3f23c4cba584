//! Lowering of closures and nested classes onto a flat object model.
//!
//! The input is a resolved [`janus_ast::Unit`] that still contains nested
//! type declarations: anonymous class bodies, method-local classes, member
//! classes and enum-constant bodies. The output is the same unit with every
//! implicit context made explicit and every declaration at the top level:
//!
//! 1. [`namer`] gives anonymous classes deterministic `$<n>` names.
//! 2. [`capture`] computes, per closure, which enclosing effectively-final
//!    variables and which enclosing instance its body reads.
//! 3. [`closure`] turns those captures into `captured$` fields, threads
//!    every constructor and rewrites the instantiation sites. Declarations
//!    are processed innermost-first, so a nested closure's demands are known
//!    before its enclosing closure is lowered.
//! 4. [`outer`] gives each non-static member class an `outer$<k>` field and
//!    a leading constructor parameter.
//! 5. [`fixup`] rewrites, in one whole-unit pass, every reference that
//!    still assumes the original nesting onto outer-field chains.
//! 6. [`hoist`] moves all nested declarations to the top level under
//!    registry-qualified names.
//!
//! All rewriting is in place; arena ids stay valid throughout.

use std::collections::{HashMap, HashSet};

use janus_ast::{
    EnumConstId, Expr, ExprId, FieldId, Member, MethodId, NameRegistry, TypeId, Unit, visit,
};

pub mod capture;
pub mod closure;
pub mod error;
pub mod fixup;
pub mod hoist;
pub mod namer;
pub mod outer;

pub use closure::Site;
pub use error::{LowerError, Result};

/// Everything one [`lower_unit`] run synthesized, for diagnostics and tests.
#[derive(Debug, Clone, Default)]
pub struct LowerOutcome {
    /// `captured$` fields added to closures.
    pub capture_fields: Vec<FieldId>,
    /// `outer$<k>` fields added to member classes.
    pub outer_fields: Vec<FieldId>,
    pub synthesized_constructors: Vec<MethodId>,
    /// Hoisted declarations, each parent before its own nested types.
    pub hoisted: Vec<TypeId>,
}

/// Lowers every nested declaration in `unit`. The registry carries name
/// reservations and renames across units of the same program.
pub fn lower_unit(unit: &mut Unit, names: &mut NameRegistry) -> Result<LowerOutcome> {
    names.seed_unit(unit);
    namer::assign_names(unit, names);

    let mut ctx = LowerCtx::default();
    let roots = unit.top_level.clone();
    for ty in roots {
        process_type(unit, &mut ctx, ty)?;
    }

    fixup::fix_references(unit, &ctx.outer_fields);
    ctx.outcome.hoisted = hoist::hoist_unit(unit, names);

    tracing::debug!(
        capture_fields = ctx.outcome.capture_fields.len(),
        outer_fields = ctx.outcome.outer_fields.len(),
        constructors = ctx.outcome.synthesized_constructors.len(),
        hoisted = ctx.outcome.hoisted.len(),
        "unit lowered"
    );
    Ok(ctx.outcome)
}

#[derive(Default)]
struct LowerCtx {
    /// Synthesized outer-instance field per extracted type, for the fixup.
    outer_fields: fixup::OuterFields,
    /// Closures that must capture their enclosing instance even without a
    /// direct reference, because a nested closure reaches through them.
    forced: HashSet<TypeId>,
    outcome: LowerOutcome,
}

/// Lowers every declaration nested in `ty`, innermost first.
fn process_type(unit: &mut Unit, ctx: &mut LowerCtx, ty: TypeId) -> Result<()> {
    for (child, site) in direct_children(unit, ty) {
        process_type(unit, ctx, child)?;

        let desc = unit.types[child].desc;
        let is_closure = {
            let d = &unit.type_descs[desc];
            d.is_anonymous || d.is_local
        };
        if is_closure {
            let Some(site) = site else { continue };
            let refs = capture::analyze(unit, child);
            mark_forced(unit, ctx, child, &refs);
            let force = ctx.forced.contains(&child);
            let lowered = closure::lower_closure(unit, child, site, refs, force)?;
            if let Some(fvar) = lowered.outer_field {
                ctx.outer_fields.insert(desc, fvar);
            }
            ctx.outcome.capture_fields.extend(lowered.capture_fields);
            ctx.outcome
                .synthesized_constructors
                .extend(lowered.synthesized_ctors);
        } else if unit.is_member_inner(desc) {
            let injected = outer::inject_outer(unit, child)?;
            ctx.outer_fields.insert(desc, injected.outer_var);
            ctx.outcome.outer_fields.push(injected.field);
            ctx.outcome
                .synthesized_constructors
                .extend(injected.synthesized_ctors);
        }
    }
    Ok(())
}

/// The type declarations directly nested in `ty`, in declaration order, each
/// with the instantiation site that will receive its captured values.
fn direct_children(unit: &Unit, ty: TypeId) -> Vec<(TypeId, Option<Site>)> {
    let mut order = Vec::new();
    let mut new_sites: HashMap<TypeId, ExprId> = HashMap::new();
    visit::exprs_in_type(
        unit,
        ty,
        &mut |t| {
            order.push(t);
            false
        },
        &mut |e| {
            if let Expr::New { body: Some(b), .. } = &unit.exprs[e] {
                new_sites.insert(*b, e);
            }
        },
    );

    let mut enum_sites: HashMap<TypeId, EnumConstId> = HashMap::new();
    for member in &unit.types[ty].members {
        if let Member::EnumConstant(ec) = member {
            if let Some(b) = unit.enum_consts[*ec].body {
                enum_sites.insert(b, *ec);
            }
        }
    }

    order
        .into_iter()
        .map(|t| {
            let d = &unit.type_descs[unit.types[t].desc];
            let site = if d.is_anonymous {
                enum_sites
                    .get(&t)
                    .map(|ec| Site::Enum(*ec))
                    .or_else(|| new_sites.get(&t).map(|e| Site::New(*e)))
            } else if d.is_local {
                Some(Site::Local)
            } else {
                None
            };
            (t, site)
        })
        .collect()
}

/// When `closure` reaches enclosing state declared beyond its innermost
/// enclosing instance, every closure on the enclosing path up to the
/// declaring class must capture its own enclosing instance, or the fixup
/// chain breaks. Marks run before those enclosing closures are lowered.
fn mark_forced(unit: &Unit, ctx: &mut LowerCtx, closure: TypeId, refs: &[capture::CaptureRef]) {
    for r in refs {
        if !matches!(r.captured, capture::Captured::Outer(_)) {
            continue;
        }
        let Some(d) = r.declaring else { continue };
        let mut cur = unit.types[closure].enclosing_type;
        while let Some(e) = cur {
            let ed = unit.types[e].desc;
            if unit.is_assignable(ed, d) {
                break;
            }
            let edesc = &unit.type_descs[ed];
            if edesc.is_anonymous || edesc.is_local {
                ctx.forced.insert(e);
            }
            cur = unit.types[e].enclosing_type;
        }
    }
}
