//! Data model for policy queries.
//!
//! This module contains the value types the engine works with: sparse
//! bitmaps, MLS levels and ranges, file-context lists, and the pieces a
//! query is assembled from.

pub mod condition;
pub mod ebitmap;
pub mod fc;
pub mod level;
pub mod parameter;
pub mod query;
pub mod range;
pub mod result;
pub mod value;

pub use condition::{MatchMode, Operator, ParamType, TestCondition};
pub use ebitmap::{BitmapNode, SparseBitSet, MAPSIZE};
pub use fc::{FcContext, FcEntry, FileClass, FileContextList};
pub use level::{LevelCompare, MlsLevel};
pub use parameter::{MatchContext, Parameter, RegexParameter, StringExpression, X_IDENTIFIER};
pub use query::{Criterion, Query, Test};
pub use range::{MlsRange, RangeMatch};
pub use result::{Proof, SearchResult};
pub use value::MatchValue;
