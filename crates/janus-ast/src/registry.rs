use std::collections::{HashMap, HashSet};

use crate::ids::TypeDescId;
use crate::tree::Unit;

/// Unit-scoped rename and name-uniqueness store.
///
/// The registry is passed explicitly through every lowering stage; it is
/// never ambient state. Binding a node to a descriptor is structural in this
/// model (nodes hold descriptor indices), so the registry's job is the other
/// two registry operations: handing out deterministic unique names and
/// retargeting a type descriptor's name while recording the rename for later
/// passes.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    taken: HashSet<String>,
    renames: HashMap<String, String>,
}

impl NameRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every top-level declaration name of `unit` as taken, so
    /// synthesized and hoisted names cannot collide with user names.
    pub fn seed_unit(&mut self, unit: &Unit) {
        for ty in &unit.top_level {
            let name = unit.type_descs[unit.types[*ty].desc].name.clone();
            self.taken.insert(name);
        }
    }

    /// Returns `candidate` if free, otherwise the first free
    /// `candidate$<n>` counting up from 2. The returned name is marked taken.
    pub fn reserve(&mut self, candidate: &str) -> String {
        if self.taken.insert(candidate.to_string()) {
            return candidate.to_string();
        }
        let mut n = 2u32;
        loop {
            let attempt = format!("{candidate}${n}");
            if self.taken.insert(attempt.clone()) {
                return attempt;
            }
            n += 1;
        }
    }

    /// Renames a type descriptor in place and records the old name so later
    /// passes can map pre-lowering names to post-lowering ones.
    pub fn rename(&mut self, unit: &mut Unit, desc: TypeDescId, new_name: impl Into<String>) {
        let new_name = new_name.into();
        let old = std::mem::replace(&mut unit.type_descs[desc].name, new_name.clone());
        if !old.is_empty() && old != new_name {
            self.renames.insert(old, new_name.clone());
        }
        self.taken.insert(new_name);
    }

    /// The post-lowering name a pre-lowering name was renamed to, if any.
    #[must_use]
    pub fn lookup(&self, old: &str) -> Option<&str> {
        self.renames.get(old).map(String::as_str)
    }
}
