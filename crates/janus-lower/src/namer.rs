//! Deterministic `$<n>` names for anonymous classes.
//!
//! Each type declaration opens its own numbering frame: the anonymous
//! classes declared directly inside it (in its field initializers, method
//! bodies and enum-constant arguments, but not inside further nested type
//! bodies) are numbered `$1`, `$2`, ... in declaration order. Nested frames
//! restart at `$1`, so the eventual hoisted names read `A$1`, `A$1$1` and so
//! on. Numbering depends only on tree order and the anonymous flag, never on
//! capture contents, which keeps the output stable across runs.

use janus_ast::{NameRegistry, TypeId, Unit, visit};

/// Assigns `$<n>` names to every anonymous class in the unit, recording the
/// assignments in `names`. Must run before any extraction so that capture
/// and outer-field synthesis see final names.
pub fn assign_names(unit: &mut Unit, names: &mut NameRegistry) {
    let roots = unit.top_level.clone();
    for ty in roots {
        name_frame(unit, names, ty);
    }
}

fn name_frame(unit: &mut Unit, names: &mut NameRegistry, ty: TypeId) {
    // Direct children only: the descend predicate records each nested type
    // declaration and prunes the walk there, leaving deeper declarations to
    // that child's own frame.
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

    let mut counter = 1u32;
    for t in &nested {
        let desc = unit.types[*t].desc;
        if unit.type_descs[desc].is_anonymous {
            names.rename(unit, desc, format!("${counter}"));
            counter += 1;
        }
    }
    for t in nested {
        name_frame(unit, names, t);
    }
}
