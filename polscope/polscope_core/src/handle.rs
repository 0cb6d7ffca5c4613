//! Element handles.
//!
//! A handle is an opaque reference to one element of a loaded policy. It
//! pairs the element's kind with an index that only the issuing accessor
//! can interpret, so handles from different kinds never compare equal even
//! when their indices coincide.
//!
//! # Examples
//!
//! ```
//! use polscope_core::handle::ElementHandle;
//! use polscope_core::types::ElementKind;
//!
//! let a = ElementHandle::new(ElementKind::Type, 3);
//! let b = ElementHandle::new(ElementKind::Role, 3);
//! assert_ne!(a, b);
//! assert_eq!(a.to_string(), "type#3");
//! ```

use crate::types::ElementKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque reference to a policy element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle {
    kind: ElementKind,
    index: u32,
}

impl ElementHandle {
    /// Create a handle.
    ///
    /// # Arguments
    ///
    /// * `kind` - The kind of element referenced.
    /// * `index` - The accessor-specific index of the element.
    pub fn new(kind: ElementKind, index: u32) -> Self {
        Self { kind, index }
    }

    /// Get the kind of element this handle refers to.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Get the accessor-specific index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ElementKind::String => "string".to_string(),
            other => other.as_str().replace(' ', "_"),
        };
        write!(f, "{}#{}", kind, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_identity() {
        let a = ElementHandle::new(ElementKind::Category, 7);
        let b = ElementHandle::new(ElementKind::Category, 7);
        let c = ElementHandle::new(ElementKind::Level, 7);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.kind(), ElementKind::Category);
        assert_eq!(a.index(), 7);
    }

    #[test]
    fn test_handle_display() {
        let h = ElementHandle::new(ElementKind::AvRule, 12);
        assert_eq!(h.to_string(), "av_rule#12");
    }

    #[test]
    fn test_handle_serialization() {
        let h = ElementHandle::new(ElementKind::User, 1);
        let serialized = serde_json::to_string(&h).unwrap();
        let deserialized: ElementHandle = serde_json::from_str(&serialized).unwrap();
        assert_eq!(h, deserialized);
    }
}
