use std::collections::HashSet;

use crate::arena::Arena;
use crate::desc::{ConstValue, MethodDesc, TypeDesc, TypeKind, VarDesc};
use crate::ids::{
    EnumConstId, ExprId, FieldId, MethodDescId, MethodId, StmtId, TypeDescId, TypeId, VarDescId,
};
use serde::{Deserialize, Serialize};

/// One compilation unit: node arenas, descriptor tables and the top-level
/// declaration list.
///
/// Everything here is created and destroyed within the processing of a single
/// unit; nothing persists across units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub types: Arena<TypeDecl>,
    pub methods: Arena<MethodDecl>,
    pub fields: Arena<FieldDecl>,
    pub enum_consts: Arena<EnumConstant>,
    pub stmts: Arena<Stmt>,
    pub exprs: Arena<Expr>,

    pub type_descs: Arena<TypeDesc>,
    pub method_descs: Arena<MethodDesc>,
    pub var_descs: Arena<VarDesc>,

    pub top_level: Vec<TypeId>,
}

/// A class, interface, enum, anonymous or local class declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub desc: TypeDescId,
    /// Ordered member list; synthesized members are spliced in here.
    pub members: Vec<Member>,
    /// Lexically enclosing type declaration, cleared on hoisting.
    pub enclosing_type: Option<TypeId>,
    /// Lexically enclosing method, for method-local declarations.
    pub enclosing_method: Option<MethodId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Member {
    Field(FieldId),
    Method(MethodId),
    Type(TypeId),
    EnumConstant(EnumConstId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub desc: MethodDescId,
    /// Formal parameter nodes. Invariant after synthesis: `params.len()`
    /// equals the descriptor's `param_types.len()`.
    pub params: Vec<Param>,
    /// A `Stmt::Block`, absent for abstract methods.
    pub body: Option<StmtId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub var: VarDescId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub var: VarDescId,
    pub initializer: Option<ExprId>,
}

/// An enum constant. Its argument list is the instantiation site for a
/// constant with an anonymous body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumConstant {
    pub name: String,
    pub args: Vec<ExprId>,
    pub body: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Block {
        statements: Vec<StmtId>,
    },
    Local {
        var: VarDescId,
        initializer: Option<ExprId>,
    },
    /// A named class declared inside a method body.
    LocalType {
        ty: TypeId,
    },
    Expr {
        expr: ExprId,
    },
    Return {
        expr: Option<ExprId>,
    },
    If {
        condition: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    SuperConstructorCall {
        method: Option<MethodDescId>,
        args: Vec<ExprId>,
        /// Injected by an earlier initializer-normalization pass rather than
        /// written by the user; removable when a real call replaces it.
        implicit: bool,
    },
    ThisConstructorCall {
        args: Vec<ExprId>,
    },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Identifier reference resolved to a variable (local, param or field).
    Name {
        var: VarDescId,
    },
    FieldAccess {
        receiver: ExprId,
        field: VarDescId,
    },
    This {
        /// `Outer.this` carries the outer type; plain `this` carries `None`.
        qualifier: Option<TypeDescId>,
    },
    New {
        ty: TypeDescId,
        ctor: Option<MethodDescId>,
        /// Explicit outer-instance qualifier (`outer.new Inner(...)`).
        outer: Option<ExprId>,
        args: Vec<ExprId>,
        /// Anonymous class body declared at this instantiation.
        body: Option<TypeId>,
    },
    Invoke {
        receiver: Option<ExprId>,
        method: MethodDescId,
        args: Vec<ExprId>,
    },
    Literal {
        value: ConstValue,
        ty: TypeDescId,
    },
    Assign {
        target: ExprId,
        value: ExprId,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl Unit {
    pub fn add_type(&mut self, decl: TypeDecl) -> TypeId {
        TypeId::from_raw(self.types.alloc(decl))
    }

    pub fn add_method(&mut self, decl: MethodDecl) -> MethodId {
        MethodId::from_raw(self.methods.alloc(decl))
    }

    pub fn add_field(&mut self, decl: FieldDecl) -> FieldId {
        FieldId::from_raw(self.fields.alloc(decl))
    }

    pub fn add_enum_const(&mut self, decl: EnumConstant) -> EnumConstId {
        EnumConstId::from_raw(self.enum_consts.alloc(decl))
    }

    pub fn add_stmt(&mut self, stmt: Stmt) -> StmtId {
        StmtId::from_raw(self.stmts.alloc(stmt))
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        ExprId::from_raw(self.exprs.alloc(expr))
    }

    pub fn add_type_desc(&mut self, desc: TypeDesc) -> TypeDescId {
        TypeDescId::from_raw(self.type_descs.alloc(desc))
    }

    pub fn add_method_desc(&mut self, desc: MethodDesc) -> MethodDescId {
        MethodDescId::from_raw(self.method_descs.alloc(desc))
    }

    pub fn add_var_desc(&mut self, desc: VarDesc) -> VarDescId {
        VarDescId::from_raw(self.var_descs.alloc(desc))
    }

    /// Widening reference conversion: `sub` is `sup` or reaches it through
    /// superclasses or implemented interfaces.
    #[must_use]
    pub fn is_assignable(&self, sub: TypeDescId, sup: TypeDescId) -> bool {
        if sub == sup {
            return true;
        }
        let mut seen = HashSet::new();
        let mut work = vec![sub];
        while let Some(cur) = work.pop() {
            if cur == sup {
                return true;
            }
            if !seen.insert(cur) {
                continue;
            }
            let desc = &self.type_descs[cur];
            if let Some(s) = desc.superclass {
                work.push(s);
            }
            work.extend(desc.interfaces.iter().copied());
        }
        false
    }

    /// The type declaration owning a method node.
    #[must_use]
    pub fn owner_of_method(&self, method: MethodId) -> Option<TypeId> {
        self.types
            .iter()
            .find(|(_, decl)| decl.members.contains(&Member::Method(method)))
            .map(|(raw, _)| TypeId::from_raw(raw))
    }

    /// Constructor declarations of a type, in member order.
    #[must_use]
    pub fn constructors_of(&self, ty: TypeId) -> Vec<MethodId> {
        self.types[ty]
            .members
            .iter()
            .filter_map(|member| match member {
                Member::Method(m) if self.method_descs[self.methods[*m].desc].is_constructor => {
                    Some(*m)
                }
                _ => None,
            })
            .collect()
    }

    /// Walks the `declaring` chain outward, starting at (and excluding) `ty`.
    pub fn enclosing_chain(&self, ty: TypeDescId) -> impl Iterator<Item = TypeDescId> + '_ {
        std::iter::successors(self.type_descs[ty].declaring, move |cur| {
            self.type_descs[*cur].declaring
        })
    }

    /// Whether `desc` names a proper enclosing type of `ty`.
    #[must_use]
    pub fn is_enclosing(&self, ty: TypeDescId, desc: TypeDescId) -> bool {
        self.enclosing_chain(ty)
            .any(|outer| self.is_assignable(outer, desc))
    }

    /// Whether `ty` or one of its supertypes is `owner` (member access needs
    /// no receiver rewrite in that case).
    #[must_use]
    pub fn inherits_from(&self, ty: TypeDescId, owner: TypeDescId) -> bool {
        self.is_assignable(ty, owner)
    }

    /// Static type of an expression. `this_ty` supplies the meaning of an
    /// unqualified `this` at the expression's location.
    #[must_use]
    pub fn expr_type(&self, expr: ExprId, this_ty: Option<TypeDescId>) -> Option<TypeDescId> {
        match &self.exprs[expr] {
            Expr::Name { var } => Some(self.var_descs[*var].ty),
            Expr::FieldAccess { field, .. } => Some(self.var_descs[*field].ty),
            Expr::This { qualifier } => qualifier.or(this_ty),
            Expr::New { ty, .. } => Some(*ty),
            Expr::Invoke { method, .. } => self.method_descs[*method].return_ty,
            Expr::Literal { ty, .. } => Some(*ty),
            Expr::Assign { target, .. } => self.expr_type(*target, this_ty),
            Expr::Binary { lhs, .. } => self.expr_type(*lhs, this_ty),
        }
    }

    /// The block statement list of a method body.
    #[must_use]
    pub fn body_statements(&self, method: MethodId) -> &[StmtId] {
        match self.methods[method].body {
            Some(body) => match &self.stmts[body] {
                Stmt::Block { statements } => statements,
                _ => &[],
            },
            None => &[],
        }
    }

    /// Whether a type is a non-static member class (not anonymous, not
    /// local, not top-level), the shape that receives outer-instance fields.
    #[must_use]
    pub fn is_member_inner(&self, desc: TypeDescId) -> bool {
        let d = &self.type_descs[desc];
        d.kind == TypeKind::Class
            && d.declaring.is_some()
            && !d.is_static
            && !d.is_anonymous
            && !d.is_local
    }
}
