//! Policy accessor trait.
//!
//! The analysis engine never reads a policy database directly. Everything
//! it needs (enumeration, name resolution, ordinals, relations, and a few
//! per-element attributes) is asked of a read-only `PolicyAccessor` that
//! is passed explicitly into every operation.
//!
//! # Ordinals
//!
//! Sensitivities and categories are ordered by their ordinal, which is the
//! 1-based declaration order in the policy. An alias shares the ordinal of
//! its primary. Dominance between sensitivities and the canonical ordering
//! of category sets are both defined in terms of ordinals.

use crate::error::Result;
use crate::handle::ElementHandle;
use crate::types::{ElementKind, LevelSpec, RangeSpec, Relation, RuleTypes};

/// Read-only view of a loaded policy.
///
/// # Examples
///
/// ```ignore
/// use polscope_core::traits::PolicyAccessor;
/// use polscope_core::types::{ElementKind, Relation};
///
/// fn attribute_names(policy: &dyn PolicyAccessor, type_name: &str) -> polscope_core::Result<Vec<String>> {
///     let handle = policy.resolve_by_name(ElementKind::Type, type_name)?;
///     policy
///         .related(handle, Relation::Attributes)?
///         .into_iter()
///         .map(|attr| policy.render_name(attr))
///         .collect()
/// }
/// ```
pub trait PolicyAccessor {
    /// Enumerate all elements of a kind.
    ///
    /// # Arguments
    ///
    /// * `kind` - The kind of element to list.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ElementHandle>)` - All elements in declaration order,
    ///   aliases included.
    /// * `Err` - If the kind is not stored by this accessor.
    fn enumerate(&self, kind: ElementKind) -> Result<Vec<ElementHandle>>;

    /// Resolve a name to a handle.
    ///
    /// # Arguments
    ///
    /// * `kind` - The kind of element the name refers to.
    /// * `name` - The primary or alias name.
    ///
    /// # Returns
    ///
    /// * `Ok(ElementHandle)` - The element. An alias name yields the alias
    ///   entry itself.
    /// * `Err` - `ResolutionError::NotFound` if no such element exists.
    fn resolve_by_name(&self, kind: ElementKind, name: &str) -> Result<ElementHandle>;

    /// Get the ordinal of an element.
    fn ordinal(&self, handle: ElementHandle) -> Result<u32>;

    /// Get the elements related to an element.
    ///
    /// # Arguments
    ///
    /// * `handle` - The element.
    /// * `relation` - Which relation to follow.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ElementHandle>)` - The related elements, possibly empty.
    /// * `Err` - If the handle is unknown.
    fn related(&self, handle: ElementHandle, relation: Relation) -> Result<Vec<ElementHandle>>;

    /// Get the name of an element.
    fn render_name(&self, handle: ElementHandle) -> Result<String>;

    /// Check whether an element is an alias entry.
    fn is_alias(&self, handle: ElementHandle) -> Result<bool>;

    /// Get the rule type of a rule element.
    fn rule_type(&self, handle: ElementHandle) -> Result<RuleTypes>;

    /// Get the default state of a boolean.
    fn bool_state(&self, handle: ElementHandle) -> Result<bool>;

    /// Get the default level of a user.
    fn default_level(&self, handle: ElementHandle) -> Result<Option<LevelSpec>>;

    /// Get the range of a user or range_transition rule.
    fn mls_range(&self, handle: ElementHandle) -> Result<Option<RangeSpec>>;

    /// Get the primary element behind a possible alias.
    ///
    /// # Returns
    ///
    /// The primary element, or the handle itself if it is not an alias.
    fn primary(&self, handle: ElementHandle) -> Result<ElementHandle> {
        if !self.is_alias(handle)? {
            return Ok(handle);
        }
        Ok(self
            .related(handle, Relation::Primary)?
            .into_iter()
            .next()
            .unwrap_or(handle))
    }

    /// Get every name an element is known by.
    ///
    /// # Returns
    ///
    /// The primary name first, followed by alias names for the kinds that
    /// carry aliases.
    fn all_names(&self, handle: ElementHandle) -> Result<Vec<String>> {
        let primary = self.primary(handle)?;
        let mut names = vec![self.render_name(primary)?];
        if primary.kind().has_aliases() {
            for alias in self.related(primary, Relation::Aliases)? {
                names.push(self.render_name(alias)?);
            }
        }
        Ok(names)
    }
}

impl<T: PolicyAccessor + ?Sized> PolicyAccessor for &T {
    fn enumerate(&self, kind: ElementKind) -> Result<Vec<ElementHandle>> {
        (**self).enumerate(kind)
    }

    fn resolve_by_name(&self, kind: ElementKind, name: &str) -> Result<ElementHandle> {
        (**self).resolve_by_name(kind, name)
    }

    fn ordinal(&self, handle: ElementHandle) -> Result<u32> {
        (**self).ordinal(handle)
    }

    fn related(&self, handle: ElementHandle, relation: Relation) -> Result<Vec<ElementHandle>> {
        (**self).related(handle, relation)
    }

    fn render_name(&self, handle: ElementHandle) -> Result<String> {
        (**self).render_name(handle)
    }

    fn is_alias(&self, handle: ElementHandle) -> Result<bool> {
        (**self).is_alias(handle)
    }

    fn rule_type(&self, handle: ElementHandle) -> Result<RuleTypes> {
        (**self).rule_type(handle)
    }

    fn bool_state(&self, handle: ElementHandle) -> Result<bool> {
        (**self).bool_state(handle)
    }

    fn default_level(&self, handle: ElementHandle) -> Result<Option<LevelSpec>> {
        (**self).default_level(handle)
    }

    fn mls_range(&self, handle: ElementHandle) -> Result<Option<RangeSpec>> {
        (**self).mls_range(handle)
    }
}
