use crate::ids::{
    EnumConstId, ExprId, FieldId, MethodDescId, MethodId, StmtId, TypeDescId, TypeId, VarDescId,
};
use serde::{Deserialize, Serialize};

/// Append-only storage for one kind of node or descriptor.
///
/// Entries are addressed by `u32` newtype ids; an id stays valid for the life
/// of the unit, so relocating a declaration never invalidates references to
/// it. Mutation happens in place through `IndexMut`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Arena<T> {
    pub fn alloc(&mut self, value: T) -> u32 {
        let idx = self.data.len() as u32;
        self.data.push(value);
        idx
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.data.iter().enumerate().map(|(i, v)| (i as u32, v))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena { data: Vec::new() }
    }
}

macro_rules! arena_index {
    ($($id:ty),* $(,)?) => {
        $(
            impl<T> std::ops::Index<$id> for Arena<T> {
                type Output = T;

                fn index(&self, index: $id) -> &Self::Output {
                    &self.data[index.idx()]
                }
            }

            impl<T> std::ops::IndexMut<$id> for Arena<T> {
                fn index_mut(&mut self, index: $id) -> &mut Self::Output {
                    &mut self.data[index.idx()]
                }
            }
        )*
    };
}

arena_index!(
    TypeId,
    MethodId,
    FieldId,
    EnumConstId,
    StmtId,
    ExprId,
    TypeDescId,
    MethodDescId,
    VarDescId,
);
