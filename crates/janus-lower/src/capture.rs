//! Scope and capture analysis for closure declarations.
//!
//! For a given closure (anonymous or method-local class) this pass computes
//! which enclosing effectively-final locals and parameters its body reads,
//! and which expressions inside the body refer to enclosing instance state.
//! It walks the enclosing method chain outward, so multi-level nesting
//! captures transitively, and prunes every walk at nested type boundaries:
//! nested closures have independent, already-lowered scopes.
//!
//! The pass is read-only. Its output is a list of [`CaptureRef`]
//! reference-descriptions consumed (and discarded) by field synthesis.

use std::collections::HashSet;

use janus_ast::visit;
use janus_ast::{
    Expr, ExprId, Member, MethodId, Stmt, StmtId, TypeDescId, TypeId, Unit, VarDescId, VarKind,
};

/// What a reference inside the closure body resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Captured {
    /// An enclosing effectively-final local or parameter.
    Var(VarDescId),
    /// The innermost enclosing instance; covers field reads, qualified
    /// `this` and unqualified instance calls that target enclosing types.
    Outer(TypeDescId),
}

/// One captured reference inside the closure body.
///
/// Ephemeral: created here, consumed by the field/constructor synthesizer,
/// then discarded.
#[derive(Debug, Clone)]
pub struct CaptureRef {
    /// The referencing expression node.
    pub expr: ExprId,
    pub captured: Captured,
    /// Declaring class used for dedup; may be widened to a common supertype
    /// while merging.
    pub declaring: Option<TypeDescId>,
    /// The closure method containing the reference, if any (field
    /// initializers have none).
    pub method: Option<MethodId>,
    /// Filled in once a backing field has been synthesized for this capture.
    pub field: Option<VarDescId>,
}

/// Computes the capture set of `closure`.
///
/// A closure with no enclosing method captures no variables; it may still
/// produce [`Captured::Outer`] references to enclosing instance state.
#[must_use]
pub fn analyze(unit: &Unit, closure: TypeId) -> Vec<CaptureRef> {
    let visible = visible_variables(unit, closure);
    collect_references(unit, closure, &visible)
}

/// The enclosing effectively-final locals and parameters visible at the
/// closure's declaration point, accumulated over every enclosing method.
fn visible_variables(unit: &Unit, closure: TypeId) -> HashSet<VarDescId> {
    let mut visible = HashSet::new();
    let mut target = closure;
    let mut method = unit.types[closure].enclosing_method;
    while let Some(m) = method {
        for param in &unit.methods[m].params {
            if unit.var_descs[param.var].is_effectively_final {
                visible.insert(param.var);
            }
        }
        if let Some(body) = unit.methods[m].body {
            prefix_locals(unit, body, target, &mut visible);
        }
        // Continue outward: the method's owner may itself be a local or
        // anonymous class with an enclosing method of its own.
        match unit.owner_of_method(m) {
            Some(owner) => {
                target = owner;
                method = unit.types[owner].enclosing_method;
            }
            None => break,
        }
    }
    visible
}

/// Adds every effectively-final local declared before the statement that
/// contains `target`'s declaration, descending only along the containment
/// path so sibling-scope locals are not collected. Returns `true` once the
/// containing statement has been reached.
fn prefix_locals(
    unit: &Unit,
    stmt: StmtId,
    target: TypeId,
    visible: &mut HashSet<VarDescId>,
) -> bool {
    if !visit::stmt_declares_type(unit, stmt, target) {
        if let Stmt::Local { var, .. } = &unit.stmts[stmt] {
            if unit.var_descs[*var].is_effectively_final {
                visible.insert(*var);
            }
        }
        return false;
    }
    match &unit.stmts[stmt] {
        Stmt::Block { statements } => {
            for s in statements {
                if prefix_locals(unit, *s, target, visible) {
                    break;
                }
            }
        }
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            if !prefix_locals(unit, *then_branch, target, visible) {
                if let Some(else_branch) = else_branch {
                    prefix_locals(unit, *else_branch, target, visible);
                }
            }
        }
        // The declaration sits inside this statement's own expressions
        // (e.g. a local whose initializer is the closure); its variable is
        // not in scope inside the closure, so add nothing.
        _ => {}
    }
    true
}

/// Walks the closure's own member bodies, collecting references to visible
/// enclosing variables and to enclosing instance state. Never descends into
/// nested type bodies.
fn collect_references(
    unit: &Unit,
    closure: TypeId,
    visible: &HashSet<VarDescId>,
) -> Vec<CaptureRef> {
    let closure_desc = unit.types[closure].desc;
    let enclosing_desc = unit.types[closure]
        .enclosing_type
        .map(|t| unit.types[t].desc);
    let mut refs = Vec::new();

    for member in &unit.types[closure].members {
        match member {
            Member::Field(f) => {
                if let Some(init) = unit.fields[*f].initializer {
                    visit::exprs_in_expr(unit, init, &mut |_| false, &mut |e| {
                        classify(unit, e, None, closure_desc, enclosing_desc, visible, &mut refs);
                    });
                }
            }
            Member::Method(m) => {
                if let Some(body) = unit.methods[*m].body {
                    visit::exprs_in_stmt(unit, body, &mut |_| false, &mut |e| {
                        classify(
                            unit,
                            e,
                            Some(*m),
                            closure_desc,
                            enclosing_desc,
                            visible,
                            &mut refs,
                        );
                    });
                }
            }
            Member::EnumConstant(ec) => {
                for arg in &unit.enum_consts[*ec].args {
                    visit::exprs_in_expr(unit, *arg, &mut |_| false, &mut |e| {
                        classify(unit, e, None, closure_desc, enclosing_desc, visible, &mut refs);
                    });
                }
            }
            Member::Type(_) => {}
        }
    }
    refs
}

/// Classifies one expression node, appending a reference-description when it
/// reads a visible enclosing variable or enclosing instance state.
#[allow(clippy::too_many_arguments)]
fn classify(
    unit: &Unit,
    expr: ExprId,
    method: Option<MethodId>,
    closure_desc: TypeDescId,
    enclosing_desc: Option<TypeDescId>,
    visible: &HashSet<VarDescId>,
    refs: &mut Vec<CaptureRef>,
) {
    match &unit.exprs[expr] {
        Expr::Name { var } => {
            let vd = &unit.var_descs[*var];
            if visible.contains(var) {
                refs.push(CaptureRef {
                    expr,
                    captured: Captured::Var(*var),
                    declaring: vd.declaring,
                    method,
                    field: None,
                });
            } else if vd.kind == VarKind::Field
                && !vd.is_static
                && vd.declaring.is_some_and(|d| {
                    !unit.inherits_from(closure_desc, d) && unit.is_enclosing(closure_desc, d)
                })
            {
                if let Some(outer) = enclosing_desc {
                    refs.push(CaptureRef {
                        expr,
                        captured: Captured::Outer(outer),
                        declaring: vd.declaring,
                        method,
                        field: None,
                    });
                }
            }
        }
        Expr::This { qualifier: Some(q) } => {
            if *q != closure_desc && unit.is_enclosing(closure_desc, *q) {
                if let Some(outer) = enclosing_desc {
                    refs.push(CaptureRef {
                        expr,
                        captured: Captured::Outer(outer),
                        declaring: Some(*q),
                        method,
                        field: None,
                    });
                }
            }
        }
        Expr::Invoke {
            receiver: None,
            method: target,
            ..
        } => {
            let md = &unit.method_descs[*target];
            if !md.is_static
                && !md.is_constructor
                && !unit.inherits_from(closure_desc, md.declaring)
                && unit.is_enclosing(closure_desc, md.declaring)
            {
                if let Some(outer) = enclosing_desc {
                    refs.push(CaptureRef {
                        expr,
                        captured: Captured::Outer(outer),
                        declaring: Some(md.declaring),
                        method,
                        field: None,
                    });
                }
            }
        }
        _ => {}
    }
}
