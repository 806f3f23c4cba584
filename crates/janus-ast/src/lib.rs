//! Resolved compilation-unit trees for the Janus lowering core.
//!
//! This crate is the data model the front-end resolver hands to the lowering
//! passes: a mutable, arena-allocated tree of declarations, statements and
//! expressions, plus the descriptor tables that carry each declaration's
//! resolved semantic identity. Nodes reference descriptors through table
//! indices, so renaming a declaration is a single table update and every
//! holder of the index observes the new name.
//!
//! The crate exposes:
//! - [`Unit`]: one compilation unit's arenas and descriptor tables.
//! - [`NameRegistry`]: the unit-scoped bind/rename store threaded explicitly
//!   through every lowering stage.
//! - [`visit`]: pre-order traversals parameterized by an explicit boundary
//!   predicate, so "do not descend into nested type bodies" is an argument
//!   rather than a visitor side effect.

mod arena;
mod desc;
mod ids;
mod registry;
mod tree;
pub mod visit;

pub use arena::Arena;
pub use desc::{ConstValue, MethodDesc, TypeDesc, TypeKind, VarDesc, VarKind};
pub use ids::{
    EnumConstId, ExprId, FieldId, MethodDescId, MethodId, StmtId, TypeDescId, TypeId, VarDescId,
};
pub use registry::NameRegistry;
pub use tree::{
    BinaryOp, EnumConstant, Expr, FieldDecl, Member, MethodDecl, Param, Stmt, TypeDecl, Unit,
};
