//! Structural MLS descriptions.
//!
//! An accessor describes the levels and ranges stored in a policy in terms
//! of handles. The engine turns these into full `MlsLevel`/`MlsRange`
//! values, which carry names and the dominance algebra.

use serde::{Deserialize, Serialize};

use crate::handle::ElementHandle;

/// A level as stored in a policy: one sensitivity and its categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    /// Handle of the sensitivity.
    pub sensitivity: ElementHandle,

    /// Handles of the categories, in any order.
    pub categories: Vec<ElementHandle>,
}

/// A range as stored in a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSpec {
    /// The low level.
    pub low: LevelSpec,

    /// The high level; `None` when the range is a single level.
    pub high: Option<LevelSpec>,
}
