//! Query results and the proofs that support them.

use polscope_core::error::{ConsistencyError, Result};
use polscope_core::types::ElementKind;
use polscope_core::ElementHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::condition::TestCondition;

/// Evidence that a sub-element made a test pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// The condition of the test that produced this proof.
    pub condition: TestCondition,

    /// The kind of the sub-element.
    pub element_kind: ElementKind,

    /// The sub-element, when it is a policy element.
    pub element: Option<ElementHandle>,

    /// The sub-element rendered as text.
    pub text: String,
}

impl Proof {
    /// Create a proof.
    pub fn new(
        condition: TestCondition,
        element_kind: ElementKind,
        element: Option<ElementHandle>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            condition,
            element_kind,
            element,
            text: text.into(),
        }
    }
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.condition.phrase(), self.text)
    }
}

/// A matched top-level element with its proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The queried element kind.
    pub element_kind: ElementKind,

    /// The matched element.
    pub element: ElementHandle,

    /// The element's name.
    pub name: String,

    /// The evidence, in test order.
    pub proofs: Vec<Proof>,
}

impl SearchResult {
    /// Create a result with no proofs.
    pub fn new(element: ElementHandle, name: impl Into<String>) -> Self {
        Self {
            element_kind: element.kind(),
            element,
            name: name.into(),
            proofs: Vec::new(),
        }
    }

    /// Merge another result for the same element into this one.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The other result's proofs were appended.
    /// * `Err` - `ConsistencyError::ResultMismatch` if the results are for
    ///   different elements.
    pub fn merge(&mut self, other: SearchResult) -> Result<()> {
        if other.element != self.element {
            return Err(ConsistencyError::ResultMismatch(self.name.clone(), other.name).into());
        }
        self.proofs.extend(other.proofs);
        Ok(())
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for proof in &self.proofs {
            write!(f, "\n    {}", proof)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polscope_core::Error;

    fn result(index: u32, name: &str) -> SearchResult {
        SearchResult::new(ElementHandle::new(ElementKind::Type, index), name)
    }

    #[test]
    fn test_merge_concatenates_proofs() {
        let mut a = result(0, "httpd_t");
        a.proofs.push(Proof::new(TestCondition::Name, ElementKind::String, None, "httpd_t"));
        let mut b = result(0, "httpd_t");
        b.proofs.push(Proof::new(TestCondition::Alias, ElementKind::String, None, "web_t"));

        a.merge(b).unwrap();
        assert_eq!(a.proofs.len(), 2);
        assert_eq!(a.proofs[1].to_string(), "it has an alias web_t");
    }

    #[test]
    fn test_merge_rejects_other_element() {
        let mut a = result(0, "httpd_t");
        let err = a.merge(result(1, "sshd_t")).unwrap_err();
        assert!(matches!(err, Error::Consistency(ConsistencyError::ResultMismatch(..))));
    }

    #[test]
    fn test_display() {
        let mut a = result(0, "httpd_t");
        a.proofs.push(Proof::new(TestCondition::Name, ElementKind::String, None, "httpd_t"));
        assert_eq!(a.to_string(), "httpd_t\n    its name httpd_t");
    }
}
