//! Pre-order traversals with explicit type-declaration boundaries.
//!
//! Every walker takes a `descend` predicate that is consulted each time a
//! nested type declaration is reached (an anonymous class body, a method-local
//! class or a member type). Returning `false` prunes the walk at that
//! boundary, which is how the lowering passes skip already-processed closure
//! bodies without relying on implicit visitor state.

use crate::ids::{ExprId, StmtId, TypeId};
use crate::tree::{Expr, Member, Stmt, Unit};

/// Visits `expr` and every sub-expression in pre-order.
pub fn exprs_in_expr(
    unit: &Unit,
    expr: ExprId,
    descend: &mut dyn FnMut(TypeId) -> bool,
    f: &mut dyn FnMut(ExprId),
) {
    f(expr);
    match &unit.exprs[expr] {
        Expr::Name { .. } | Expr::This { .. } | Expr::Literal { .. } => {}
        Expr::FieldAccess { receiver, .. } => exprs_in_expr(unit, *receiver, descend, f),
        Expr::New {
            outer, args, body, ..
        } => {
            if let Some(outer) = outer {
                exprs_in_expr(unit, *outer, descend, f);
            }
            for arg in args {
                exprs_in_expr(unit, *arg, descend, f);
            }
            if let Some(body) = body {
                if descend(*body) {
                    exprs_in_type(unit, *body, descend, f);
                }
            }
        }
        Expr::Invoke { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                exprs_in_expr(unit, *receiver, descend, f);
            }
            for arg in args {
                exprs_in_expr(unit, *arg, descend, f);
            }
        }
        Expr::Assign { target, value } => {
            exprs_in_expr(unit, *target, descend, f);
            exprs_in_expr(unit, *value, descend, f);
        }
        Expr::Binary { lhs, rhs, .. } => {
            exprs_in_expr(unit, *lhs, descend, f);
            exprs_in_expr(unit, *rhs, descend, f);
        }
    }
}

/// Visits every expression under `stmt` in pre-order.
pub fn exprs_in_stmt(
    unit: &Unit,
    stmt: StmtId,
    descend: &mut dyn FnMut(TypeId) -> bool,
    f: &mut dyn FnMut(ExprId),
) {
    match &unit.stmts[stmt] {
        Stmt::Block { statements } => {
            for s in statements {
                exprs_in_stmt(unit, *s, descend, f);
            }
        }
        Stmt::Local { initializer, .. } => {
            if let Some(init) = initializer {
                exprs_in_expr(unit, *init, descend, f);
            }
        }
        Stmt::LocalType { ty } => {
            if descend(*ty) {
                exprs_in_type(unit, *ty, descend, f);
            }
        }
        Stmt::Expr { expr } => exprs_in_expr(unit, *expr, descend, f),
        Stmt::Return { expr } => {
            if let Some(expr) = expr {
                exprs_in_expr(unit, *expr, descend, f);
            }
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            exprs_in_expr(unit, *condition, descend, f);
            exprs_in_stmt(unit, *then_branch, descend, f);
            if let Some(else_branch) = else_branch {
                exprs_in_stmt(unit, *else_branch, descend, f);
            }
        }
        Stmt::SuperConstructorCall { args, .. } | Stmt::ThisConstructorCall { args } => {
            for arg in args {
                exprs_in_expr(unit, *arg, descend, f);
            }
        }
        Stmt::Empty => {}
    }
}

/// Visits every expression in the member bodies of `ty`: field initializers,
/// method bodies and enum-constant arguments. Nested member types are subject
/// to the same `descend` predicate.
pub fn exprs_in_type(
    unit: &Unit,
    ty: TypeId,
    descend: &mut dyn FnMut(TypeId) -> bool,
    f: &mut dyn FnMut(ExprId),
) {
    for member in &unit.types[ty].members {
        match member {
            Member::Field(field) => {
                if let Some(init) = unit.fields[*field].initializer {
                    exprs_in_expr(unit, init, descend, f);
                }
            }
            Member::Method(method) => {
                if let Some(body) = unit.methods[*method].body {
                    exprs_in_stmt(unit, body, descend, f);
                }
            }
            Member::Type(nested) => {
                if descend(*nested) {
                    exprs_in_type(unit, *nested, descend, f);
                }
            }
            Member::EnumConstant(ec) => {
                let decl = &unit.enum_consts[*ec];
                for arg in &decl.args {
                    exprs_in_expr(unit, *arg, descend, f);
                }
                if let Some(body) = decl.body {
                    if descend(body) {
                        exprs_in_type(unit, body, descend, f);
                    }
                }
            }
        }
    }
}

/// Whether the declaration of `target` (a `new` body, a local class statement
/// or an enum-constant body) appears anywhere under `stmt`, including inside
/// nested type bodies.
#[must_use]
pub fn stmt_declares_type(unit: &Unit, stmt: StmtId, target: TypeId) -> bool {
    let mut found = false;
    exprs_in_stmt(
        unit,
        stmt,
        &mut |ty| {
            if ty == target {
                found = true;
            }
            // Keep descending until found; declaration sites nested inside
            // other type bodies still count as containment.
            !found
        },
        &mut |_| {},
    );
    found
}
