//! Policy storage.
//!
//! This module provides an in-memory `PolicyAccessor` and the snapshot
//! format it is loaded from.

mod in_memory;
mod snapshot;

pub use in_memory::{InMemoryPolicy, RuleDef};
pub use snapshot::{
    level_spec, range_spec, AvRuleDecl, BoolDecl, CategoryDecl, ClassDecl, CommonDecl, NamedDecl,
    PolicySnapshot, RangeTransDecl, RoleAllowDecl, RoleDecl, RoleTransDecl, SensitivityDecl,
    TeRuleDecl, TypeDecl, UserDecl,
};
