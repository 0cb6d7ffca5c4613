//! Core data types for polscope.
//!
//! This module defines the vocabulary shared by every layer: element kinds
//! and relations, rule type flags, and the structural level and range
//! descriptions an accessor hands out.

pub mod element;
pub mod mls;
pub mod rule;

pub use element::{ElementKind, Relation};
pub use mls::{LevelSpec, RangeSpec};
pub use rule::RuleTypes;
