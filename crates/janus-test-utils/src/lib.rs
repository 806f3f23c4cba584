//! Fixture construction for the Janus lowering tests.
//!
//! The lowering core consumes already-resolved trees; there is no parser in
//! scope. [`UnitBuilder`] assembles resolved units programmatically: it
//! pre-registers the well-known external types (`Object`, `String`, the
//! primitives) and offers small helpers for declaring classes, members and
//! bodies with their descriptors wired up the way the front end would.

use janus_ast::{
    ConstValue, EnumConstId, EnumConstant, Expr, ExprId, FieldDecl, FieldId, Member, MethodDecl,
    MethodDesc, MethodDescId, MethodId, Param, Stmt, StmtId, TypeDecl, TypeDesc, TypeDescId,
    TypeId, TypeKind, Unit, VarDesc, VarDescId, VarKind,
};

pub struct UnitBuilder {
    pub unit: Unit,
    object: TypeDescId,
    object_ctor: MethodDescId,
    int_ty: TypeDescId,
    boolean_ty: TypeDescId,
    string_ty: TypeDescId,
}

impl UnitBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut unit = Unit::default();
        let object = unit.add_type_desc(TypeDesc {
            name: "Object".to_string(),
            declaring: None,
            superclass: None,
            interfaces: Vec::new(),
            kind: TypeKind::Class,
            is_static: false,
            is_anonymous: false,
            is_local: false,
        });
        let object_ctor = unit.add_method_desc(MethodDesc {
            name: "Object".to_string(),
            declaring: object,
            param_types: Vec::new(),
            return_ty: None,
            is_constructor: true,
            is_static: false,
        });
        let mut prim = |unit: &mut Unit, name: &str| {
            unit.add_type_desc(TypeDesc {
                name: name.to_string(),
                declaring: None,
                superclass: None,
                interfaces: Vec::new(),
                kind: TypeKind::Class,
                is_static: false,
                is_anonymous: false,
                is_local: false,
            })
        };
        let int_ty = prim(&mut unit, "int");
        let boolean_ty = prim(&mut unit, "boolean");
        let string_ty = unit.add_type_desc(TypeDesc {
            name: "String".to_string(),
            declaring: None,
            superclass: Some(object),
            interfaces: Vec::new(),
            kind: TypeKind::Class,
            is_static: false,
            is_anonymous: false,
            is_local: false,
        });
        UnitBuilder {
            unit,
            object,
            object_ctor,
            int_ty,
            boolean_ty,
            string_ty,
        }
    }

    #[must_use]
    pub fn object(&self) -> TypeDescId {
        self.object
    }

    #[must_use]
    pub fn object_ctor(&self) -> MethodDescId {
        self.object_ctor
    }

    #[must_use]
    pub fn int_ty(&self) -> TypeDescId {
        self.int_ty
    }

    #[must_use]
    pub fn boolean_ty(&self) -> TypeDescId {
        self.boolean_ty
    }

    #[must_use]
    pub fn string_ty(&self) -> TypeDescId {
        self.string_ty
    }

    fn type_desc(
        &mut self,
        name: &str,
        declaring: Option<TypeDescId>,
        superclass: Option<TypeDescId>,
        kind: TypeKind,
    ) -> TypeDescId {
        self.unit.add_type_desc(TypeDesc {
            name: name.to_string(),
            declaring,
            superclass,
            interfaces: Vec::new(),
            kind,
            is_static: false,
            is_anonymous: false,
            is_local: false,
        })
    }

    /// Descriptor for a top-level class extending `Object`.
    pub fn class_desc(&mut self, name: &str) -> TypeDescId {
        let object = self.object;
        self.type_desc(name, None, Some(object), TypeKind::Class)
    }

    pub fn class_desc_extending(&mut self, name: &str, superclass: TypeDescId) -> TypeDescId {
        self.type_desc(name, None, Some(superclass), TypeKind::Class)
    }

    /// Descriptor for a non-static member class.
    pub fn member_class_desc(&mut self, name: &str, declaring: TypeDescId) -> TypeDescId {
        let object = self.object;
        self.type_desc(name, Some(declaring), Some(object), TypeKind::Class)
    }

    pub fn member_class_desc_extending(
        &mut self,
        name: &str,
        declaring: TypeDescId,
        superclass: TypeDescId,
    ) -> TypeDescId {
        self.type_desc(name, Some(declaring), Some(superclass), TypeKind::Class)
    }

    pub fn static_member_class_desc(&mut self, name: &str, declaring: TypeDescId) -> TypeDescId {
        let desc = self.member_class_desc(name, declaring);
        self.unit.type_descs[desc].is_static = true;
        desc
    }

    /// Descriptor for an anonymous class extending (or implementing)
    /// `supertype`. Anonymous classes start out unnamed; the namer assigns
    /// `$<n>`. An interface supertype puts `Object` in the superclass slot,
    /// the way a resolver would.
    pub fn anon_class_desc(&mut self, declaring: TypeDescId, supertype: TypeDescId) -> TypeDescId {
        let object = self.object;
        let desc = if self.unit.type_descs[supertype].kind == TypeKind::Interface {
            let desc = self.type_desc("", Some(declaring), Some(object), TypeKind::Class);
            self.unit.type_descs[desc].interfaces.push(supertype);
            desc
        } else {
            self.type_desc("", Some(declaring), Some(supertype), TypeKind::Class)
        };
        self.unit.type_descs[desc].is_anonymous = true;
        desc
    }

    /// Descriptor for a named class declared inside a method body.
    pub fn local_class_desc(&mut self, name: &str, declaring: TypeDescId) -> TypeDescId {
        let object = self.object;
        let desc = self.type_desc(name, Some(declaring), Some(object), TypeKind::Class);
        self.unit.type_descs[desc].is_local = true;
        desc
    }

    pub fn interface_desc(&mut self, name: &str) -> TypeDescId {
        self.type_desc(name, None, None, TypeKind::Interface)
    }

    /// Top-level type declaration registered in the unit's top-level list.
    pub fn top_class(&mut self, desc: TypeDescId) -> TypeId {
        let ty = self.unit.add_type(TypeDecl {
            desc,
            members: Vec::new(),
            enclosing_type: None,
            enclosing_method: None,
        });
        self.unit.top_level.push(ty);
        ty
    }

    /// Member type declaration attached to `outer`.
    pub fn member_class(&mut self, outer: TypeId, desc: TypeDescId) -> TypeId {
        let ty = self.unit.add_type(TypeDecl {
            desc,
            members: Vec::new(),
            enclosing_type: Some(outer),
            enclosing_method: None,
        });
        self.unit.types[outer].members.push(Member::Type(ty));
        ty
    }

    /// Detached type declaration, used for anonymous and local class bodies
    /// that attach through a `new` expression or a `LocalType` statement.
    pub fn body_class(
        &mut self,
        desc: TypeDescId,
        enclosing_type: TypeId,
        enclosing_method: Option<MethodId>,
    ) -> TypeId {
        self.unit.add_type(TypeDecl {
            desc,
            members: Vec::new(),
            enclosing_type: Some(enclosing_type),
            enclosing_method,
        })
    }

    pub fn param(&mut self, name: &str, ty: TypeDescId) -> VarDescId {
        self.unit.add_var_desc(VarDesc {
            name: name.to_string(),
            ty,
            declaring: None,
            kind: VarKind::Param,
            is_static: false,
            is_effectively_final: true,
            constant: None,
        })
    }

    pub fn local(&mut self, name: &str, ty: TypeDescId) -> VarDescId {
        self.unit.add_var_desc(VarDesc {
            name: name.to_string(),
            ty,
            declaring: None,
            kind: VarKind::Local,
            is_static: false,
            is_effectively_final: true,
            constant: None,
        })
    }

    /// A reassigned local; not capturable.
    pub fn local_mut(&mut self, name: &str, ty: TypeDescId) -> VarDescId {
        let var = self.local(name, ty);
        self.unit.var_descs[var].is_effectively_final = false;
        var
    }

    /// An effectively-final local with a compile-time constant value.
    pub fn const_local(&mut self, name: &str, ty: TypeDescId, value: ConstValue) -> VarDescId {
        let var = self.local(name, ty);
        self.unit.var_descs[var].constant = Some(value);
        var
    }

    pub fn field(&mut self, owner: TypeId, name: &str, ty: TypeDescId) -> (FieldId, VarDescId) {
        let declaring = self.unit.types[owner].desc;
        let var = self.unit.add_var_desc(VarDesc {
            name: name.to_string(),
            ty,
            declaring: Some(declaring),
            kind: VarKind::Field,
            is_static: false,
            is_effectively_final: false,
            constant: None,
        });
        let field = self.unit.add_field(FieldDecl {
            var,
            initializer: None,
        });
        self.unit.types[owner].members.push(Member::Field(field));
        (field, var)
    }

    pub fn static_field(
        &mut self,
        owner: TypeId,
        name: &str,
        ty: TypeDescId,
    ) -> (FieldId, VarDescId) {
        let (field, var) = self.field(owner, name, ty);
        self.unit.var_descs[var].is_static = true;
        (field, var)
    }

    /// Instance method with an empty block body.
    pub fn method(
        &mut self,
        owner: TypeId,
        name: &str,
        params: &[VarDescId],
        return_ty: Option<TypeDescId>,
    ) -> MethodId {
        let declaring = self.unit.types[owner].desc;
        let param_types = params.iter().map(|p| self.unit.var_descs[*p].ty).collect();
        let desc = self.unit.add_method_desc(MethodDesc {
            name: name.to_string(),
            declaring,
            param_types,
            return_ty,
            is_constructor: false,
            is_static: false,
        });
        self.method_decl(owner, desc, params)
    }

    pub fn static_method(
        &mut self,
        owner: TypeId,
        name: &str,
        params: &[VarDescId],
        return_ty: Option<TypeDescId>,
    ) -> MethodId {
        let method = self.method(owner, name, params, return_ty);
        let desc = self.unit.methods[method].desc;
        self.unit.method_descs[desc].is_static = true;
        method
    }

    /// Constructor with an empty block body.
    pub fn ctor(&mut self, owner: TypeId, params: &[VarDescId]) -> MethodId {
        let declaring = self.unit.types[owner].desc;
        let name = self.unit.type_descs[declaring].name.clone();
        let param_types = params.iter().map(|p| self.unit.var_descs[*p].ty).collect();
        let desc = self.unit.add_method_desc(MethodDesc {
            name,
            declaring,
            param_types,
            return_ty: None,
            is_constructor: true,
            is_static: false,
        });
        self.method_decl(owner, desc, params)
    }

    fn method_decl(&mut self, owner: TypeId, desc: MethodDescId, params: &[VarDescId]) -> MethodId {
        let body = self.unit.add_stmt(Stmt::Block {
            statements: Vec::new(),
        });
        let method = self.unit.add_method(MethodDecl {
            desc,
            params: params.iter().map(|var| Param { var: *var }).collect(),
            body: Some(body),
        });
        self.unit.types[owner].members.push(Member::Method(method));
        method
    }

    /// Descriptor for a method of an external type (no declaration node).
    pub fn external_method_desc(
        &mut self,
        declaring: TypeDescId,
        name: &str,
        param_types: &[TypeDescId],
        return_ty: Option<TypeDescId>,
    ) -> MethodDescId {
        self.unit.add_method_desc(MethodDesc {
            name: name.to_string(),
            declaring,
            param_types: param_types.to_vec(),
            return_ty,
            is_constructor: false,
            is_static: false,
        })
    }

    pub fn enum_constant(
        &mut self,
        owner: TypeId,
        name: &str,
        args: Vec<ExprId>,
        body: Option<TypeId>,
    ) -> EnumConstId {
        let ec = self.unit.add_enum_const(EnumConstant {
            name: name.to_string(),
            args,
            body,
        });
        self.unit.types[owner].members.push(Member::EnumConstant(ec));
        ec
    }

    /// Appends a statement to a method's root block.
    pub fn push_stmt(&mut self, method: MethodId, stmt: Stmt) -> StmtId {
        let id = self.unit.add_stmt(stmt);
        let body = self.unit.methods[method]
            .body
            .expect("method body is missing");
        match &mut self.unit.stmts[body] {
            Stmt::Block { statements } => statements.push(id),
            other => panic!("method body is not a block: {other:?}"),
        }
        id
    }

    pub fn declare_local(
        &mut self,
        method: MethodId,
        var: VarDescId,
        initializer: Option<ExprId>,
    ) -> StmtId {
        self.push_stmt(method, Stmt::Local { var, initializer })
    }

    pub fn name(&mut self, var: VarDescId) -> ExprId {
        self.unit.add_expr(Expr::Name { var })
    }

    pub fn this(&mut self) -> ExprId {
        self.unit.add_expr(Expr::This { qualifier: None })
    }

    pub fn qualified_this(&mut self, qualifier: TypeDescId) -> ExprId {
        self.unit.add_expr(Expr::This {
            qualifier: Some(qualifier),
        })
    }

    pub fn lit_int(&mut self, value: i32) -> ExprId {
        let ty = self.int_ty;
        self.unit.add_expr(Expr::Literal {
            value: ConstValue::Int(value),
            ty,
        })
    }

    pub fn field_access(&mut self, receiver: ExprId, field: VarDescId) -> ExprId {
        self.unit.add_expr(Expr::FieldAccess { receiver, field })
    }

    pub fn invoke(
        &mut self,
        receiver: Option<ExprId>,
        method: MethodDescId,
        args: Vec<ExprId>,
    ) -> ExprId {
        self.unit.add_expr(Expr::Invoke {
            receiver,
            method,
            args,
        })
    }

    /// `new ty(args)` with an optional anonymous body.
    pub fn new_expr(
        &mut self,
        ty: TypeDescId,
        ctor: Option<MethodDescId>,
        args: Vec<ExprId>,
        body: Option<TypeId>,
    ) -> ExprId {
        self.unit.add_expr(Expr::New {
            ty,
            ctor,
            outer: None,
            args,
            body,
        })
    }

    pub fn finish(self) -> Unit {
        self.unit
    }
}

impl Default for UnitBuilder {
    fn default() -> Self {
        Self::new()
    }
}
