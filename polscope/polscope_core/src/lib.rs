//! # polscope Core
//!
//! `polscope_core` provides the fundamental building blocks for polscope, a
//! toolkit for asking precise questions about a loaded type-enforcement and
//! multi-level-security policy. This includes error types, element handles,
//! the policy accessor trait, and common data structures used throughout
//! the workspace.
//!
//! ## Core Principles
//!
//! 1. **Explicit policy context**: No operation reads a policy from ambient
//!    state. Every operation that needs policy knowledge receives a
//!    `PolicyAccessor` argument.
//!
//! 2. **Opaque handles**: Elements are referred to by `ElementHandle`s that
//!    pair a kind with an accessor-specific index.
//!
//! 3. **Typed failures**: Construction, compatibility, resolution,
//!    consistency, and usage failures are distinct error classes.
//!
//! ## Crate Structure
//!
//! - **error**: Error taxonomy
//! - **handle**: Element handles
//! - **traits**: The policy accessor interface
//! - **types**: Element kinds, relations, rule flags, level/range specs
//! - **utils**: Logging and configuration helpers

pub mod error;
pub mod handle;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export key types and traits for convenience
pub use error::{Error, Result};
pub use handle::ElementHandle;
pub use traits::PolicyAccessor;
pub use types::{ElementKind, LevelSpec, RangeSpec, Relation, RuleTypes};
pub use utils::{Config, ConfigValue, LogLevel};
