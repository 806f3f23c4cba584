use crate::ids::TypeDescId;
use serde::{Deserialize, Serialize};

/// Resolved identity of a type declaration, supplied by the front end.
///
/// Descriptors live in [`crate::Unit::type_descs`] and are referenced by
/// index. Renaming a declaration rewrites `name` in the table entry; nodes
/// keep their index and pick up the new name through the indirection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDesc {
    pub name: String,
    /// Enclosing type, `None` for top-level declarations.
    pub declaring: Option<TypeDescId>,
    pub superclass: Option<TypeDescId>,
    pub interfaces: Vec<TypeDescId>,
    pub kind: TypeKind,
    pub is_static: bool,
    pub is_anonymous: bool,
    /// Named class declared inside a method body.
    pub is_local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
}

/// Resolved identity of a method or constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDesc {
    pub name: String,
    pub declaring: TypeDescId,
    pub param_types: Vec<TypeDescId>,
    /// `None` means void.
    pub return_ty: Option<TypeDescId>,
    pub is_constructor: bool,
    pub is_static: bool,
}

/// Resolved identity of a local, parameter or field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDesc {
    pub name: String,
    pub ty: TypeDescId,
    /// Declaring class; `None` for locals and parameters.
    pub declaring: Option<TypeDescId>,
    pub kind: VarKind,
    pub is_static: bool,
    /// Never reassigned after initialization, so safe to capture by value.
    pub is_effectively_final: bool,
    /// Present only for compile-time constants.
    pub constant: Option<ConstValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Local,
    Param,
    Field,
}

/// A compile-time constant value carried on a variable descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Int(i32),
    Long(i64),
    Bool(bool),
    Char(char),
    Double(f64),
    Str(String),
}
