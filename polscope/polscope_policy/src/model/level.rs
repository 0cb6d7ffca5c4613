//! MLS levels.
//!
//! A level is one sensitivity plus a set of categories. Levels are created
//! from literal strings such as `s0:c0,c2.c4`, from an existing level, or
//! from the handle-based description a policy accessor hands out. A level
//! parsed from a literal keeps its category expression unresolved until it
//! is bound to a policy with [`MlsLevel::bind`].
//!
//! Once bound, the category list holds primary (non-alias) names sorted by
//! ordinal, which is the canonical order for rendering and comparison.

use polscope_core::error::{ConstructionError, ResolutionError, Result};
use polscope_core::types::{ElementKind, LevelSpec, Relation};
use polscope_core::PolicyAccessor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Outcome of comparing two levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelCompare {
    /// The levels are equal.
    Eq,
    /// The first level dominates the second.
    Dom,
    /// The first level is dominated by the second.
    Domby,
    /// Neither level dominates the other.
    Incomp,
}

impl LevelCompare {
    /// Get the short name of this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Dom => "dom",
            Self::Domby => "domby",
            Self::Incomp => "incomp",
        }
    }
}

impl fmt::Display for LevelCompare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A multi-level-security level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MlsLevel {
    sensitivity: String,
    categories: Vec<String>,
    literal: Option<String>,
}

impl MlsLevel {
    /// Create a level with a sensitivity and no categories.
    pub fn new(sensitivity: impl Into<String>) -> Self {
        Self {
            sensitivity: sensitivity.into(),
            categories: Vec::new(),
            literal: None,
        }
    }

    /// Create an unbound level from a literal string.
    ///
    /// The text before the first `:` is the sensitivity; the rest is kept
    /// as an unresolved category expression.
    ///
    /// # Arguments
    ///
    /// * `literal` - A level such as `s0`, `s0:c1` or `s1:c0.c3,c7`.
    ///
    /// # Returns
    ///
    /// * `Ok(MlsLevel)` - The unbound level.
    /// * `Err` - `ConstructionError::MalformedLevel` if the literal is empty
    ///   or starts with `:`.
    pub fn from_literal(literal: &str) -> Result<Self> {
        let trimmed = literal.trim();
        if trimmed.is_empty() || trimmed.starts_with(':') {
            return Err(ConstructionError::MalformedLevel(literal.to_string()).into());
        }

        let (sensitivity, expression) = match trimmed.split_once(':') {
            Some((sens, cats)) => (sens.trim(), cats.trim()),
            None => (trimmed, ""),
        };
        if sensitivity.is_empty() {
            return Err(ConstructionError::MalformedLevel(literal.to_string()).into());
        }

        Ok(Self {
            sensitivity: sensitivity.to_string(),
            categories: Vec::new(),
            literal: (!expression.is_empty()).then(|| expression.to_string()),
        })
    }

    /// Parse a literal and bind it in one step.
    pub fn parse(accessor: &dyn PolicyAccessor, literal: &str) -> Result<Self> {
        let mut level = Self::from_literal(literal)?;
        level.bind(accessor)?;
        Ok(level)
    }

    /// Build a level from an accessor's structural description.
    ///
    /// # Arguments
    ///
    /// * `accessor` - The policy the handles belong to.
    /// * `spec` - Sensitivity and category handles.
    ///
    /// # Returns
    ///
    /// * `Ok(MlsLevel)` - A bound level using primary names.
    /// * `Err` - If a handle cannot be resolved.
    pub fn from_spec(accessor: &dyn PolicyAccessor, spec: &LevelSpec) -> Result<Self> {
        let sens = accessor.primary(spec.sensitivity)?;
        expect_kind(sens, ElementKind::Level)?;

        let mut cats = Vec::with_capacity(spec.categories.len());
        for handle in &spec.categories {
            let primary = accessor.primary(*handle)?;
            expect_kind(primary, ElementKind::Category)?;
            cats.push((accessor.ordinal(primary)?, accessor.render_name(primary)?));
        }
        cats.sort();
        cats.dedup();

        Ok(Self {
            sensitivity: accessor.render_name(sens)?,
            categories: cats.into_iter().map(|(_, name)| name).collect(),
            literal: None,
        })
    }

    /// Get the sensitivity name.
    pub fn sensitivity(&self) -> &str {
        &self.sensitivity
    }

    /// Get the category names. For a bound level these are sorted by ordinal.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Get the unresolved category expression, if any.
    pub fn literal(&self) -> Option<&str> {
        self.literal.as_deref()
    }

    /// Check whether the category expression has been resolved.
    pub fn is_bound(&self) -> bool {
        self.literal.is_none()
    }

    /// Resolve the level against a policy.
    ///
    /// The category expression is a comma-separated list of category names
    /// and dotted ranges `A.B`. A range adds `A`, every non-alias category
    /// whose ordinal lies strictly between `A` and `B`, and `B`. Alias names
    /// are replaced by their primary. The sensitivity is canonicalised the
    /// same way.
    ///
    /// On failure the level is left unchanged.
    ///
    /// # Arguments
    ///
    /// * `accessor` - The policy to resolve names against.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If every name resolved.
    /// * `Err` - `ResolutionError` for unknown names or a descending range,
    ///   `ConstructionError` for an empty token.
    pub fn bind(&mut self, accessor: &dyn PolicyAccessor) -> Result<()> {
        let sens = accessor.resolve_by_name(ElementKind::Level, &self.sensitivity)?;
        let sensitivity = accessor.render_name(accessor.primary(sens)?)?;

        let mut cats: Vec<(u32, String)> = Vec::new();
        for name in &self.categories {
            cats.push(resolve_category(accessor, name)?);
        }

        if let Some(expression) = &self.literal {
            for token in expression.split(',').map(str::trim) {
                if token.is_empty() {
                    return Err(ConstructionError::MalformedLevel(format!(
                        "{}:{}",
                        self.sensitivity, expression
                    ))
                    .into());
                }
                match token.split_once('.') {
                    Some((low, high)) => {
                        cats.extend(expand_category_range(accessor, low.trim(), high.trim())?)
                    }
                    None => cats.push(resolve_category(accessor, token)?),
                }
            }
        }

        cats.sort();
        cats.dedup();

        self.sensitivity = sensitivity;
        self.categories = cats.into_iter().map(|(_, name)| name).collect();
        self.literal = None;
        Ok(())
    }

    /// Add one category, keeping the set sorted by ordinal.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the category resolved.
    /// * `Err` - If it is unknown to the policy.
    pub fn add_category(&mut self, accessor: &dyn PolicyAccessor, name: &str) -> Result<()> {
        let (ordinal, primary) = resolve_category(accessor, name)?;
        if self.categories.contains(&primary) {
            return Ok(());
        }
        let mut pos = self.categories.len();
        for (i, existing) in self.categories.iter().enumerate() {
            if resolve_category(accessor, existing)?.0 > ordinal {
                pos = i;
                break;
            }
        }
        self.categories.insert(pos, primary);
        Ok(())
    }

    /// Render the level in canonical form.
    ///
    /// Runs of three or more consecutive categories are written `first.last`;
    /// shorter runs are listed individually.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - e.g. `s0:c0,c2.c4`.
    /// * `Err` - If a category cannot be resolved.
    pub fn render(&self, accessor: &dyn PolicyAccessor) -> Result<String> {
        let mut out = self.sensitivity.clone();
        let mut parts: Vec<String> = Vec::new();

        if !self.categories.is_empty() {
            let mut cats = Vec::with_capacity(self.categories.len());
            for name in &self.categories {
                cats.push((resolve_category(accessor, name)?.0, name.as_str()));
            }
            cats.sort();

            let mut start = 0;
            while start < cats.len() {
                let mut end = start;
                while end + 1 < cats.len() && cats[end + 1].0 == cats[end].0 + 1 {
                    end += 1;
                }
                if end - start >= 2 {
                    parts.push(format!("{}.{}", cats[start].1, cats[end].1));
                } else {
                    parts.extend(cats[start..=end].iter().map(|(_, n)| n.to_string()));
                }
                start = end + 1;
            }
        }

        if let Some(literal) = self.literal.as_deref().filter(|l| !l.is_empty()) {
            parts.push(literal.to_string());
        }
        if !parts.is_empty() {
            out.push(':');
            out.push_str(&parts.join(","));
        }
        Ok(out)
    }

    /// Check that every category is legal under the sensitivity.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The level is valid.
    /// * `Ok(false)` - Some category is not legal for the sensitivity.
    /// * `Err` - The level is unbound or the sensitivity is unknown.
    pub fn validate(&self, accessor: &dyn PolicyAccessor) -> Result<bool> {
        self.require_bound()?;
        let sens = accessor.primary(accessor.resolve_by_name(ElementKind::Level, &self.sensitivity)?)?;

        let mut legal = HashSet::new();
        for cat in accessor.related(sens, Relation::Categories)? {
            if !accessor.is_alias(cat)? {
                legal.insert(accessor.render_name(cat)?);
            }
        }
        Ok(self.categories.iter().all(|c| legal.contains(c)))
    }

    /// Compare this level against another.
    ///
    /// Comparing against `None` yields `Eq`.
    ///
    /// # Returns
    ///
    /// * `Ok(LevelCompare)` - The dominance relation between the levels.
    /// * `Err` - If a sensitivity cannot be resolved.
    pub fn compare(
        &self,
        other: Option<&MlsLevel>,
        accessor: &dyn PolicyAccessor,
    ) -> Result<LevelCompare> {
        let Some(other) = other else {
            return Ok(LevelCompare::Eq);
        };

        let sens_cmp = i64::from(self.sensitivity_ordinal(accessor)?)
            - i64::from(other.sensitivity_ordinal(accessor)?);

        let self_is_master = self.categories.len() >= other.categories.len();
        let (master, subset) = if self_is_master {
            (&self.categories, &other.categories)
        } else {
            (&other.categories, &self.categories)
        };
        let uncommon = subset.iter().any(|cat| !master.contains(cat));
        let sizes_equal = self.categories.len() == other.categories.len();

        let outcome = if sens_cmp == 0 && !uncommon && sizes_equal {
            LevelCompare::Eq
        } else if sens_cmp >= 0 && self_is_master && !uncommon {
            LevelCompare::Dom
        } else if sens_cmp <= 0 && (!self_is_master || sizes_equal) && !uncommon {
            LevelCompare::Domby
        } else {
            LevelCompare::Incomp
        };
        Ok(outcome)
    }

    /// Check whether this level dominates or equals another.
    pub fn dominates(&self, other: &MlsLevel, accessor: &dyn PolicyAccessor) -> Result<bool> {
        Ok(matches!(
            self.compare(Some(other), accessor)?,
            LevelCompare::Eq | LevelCompare::Dom
        ))
    }

    /// Get the ordinal of the sensitivity.
    pub fn sensitivity_ordinal(&self, accessor: &dyn PolicyAccessor) -> Result<u32> {
        accessor.ordinal(accessor.resolve_by_name(ElementKind::Level, &self.sensitivity)?)
    }

    /// Compute the least level dominating both operands: the higher
    /// sensitivity with the union of the categories.
    pub(crate) fn join(&self, other: &MlsLevel, accessor: &dyn PolicyAccessor) -> Result<MlsLevel> {
        let sensitivity = if self.sensitivity_ordinal(accessor)? >= other.sensitivity_ordinal(accessor)? {
            self.sensitivity.clone()
        } else {
            other.sensitivity.clone()
        };
        let mut joined = MlsLevel {
            sensitivity,
            categories: self.categories.clone(),
            literal: None,
        };
        for cat in &other.categories {
            joined.add_category(accessor, cat)?;
        }
        Ok(joined)
    }

    fn require_bound(&self) -> Result<()> {
        match &self.literal {
            Some(literal) => Err(ResolutionError::Unbound(format!("{}:{}", self.sensitivity, literal)).into()),
            None => Ok(()),
        }
    }
}

impl fmt::Display for MlsLevel {
    /// Writes the level without run compression, since ordinals need a policy.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sensitivity)?;
        let mut parts: Vec<&str> = self.categories.iter().map(String::as_str).collect();
        if let Some(literal) = self.literal.as_deref() {
            parts.push(literal);
        }
        if !parts.is_empty() {
            write!(f, ":{}", parts.join(","))?;
        }
        Ok(())
    }
}

fn expect_kind(handle: polscope_core::ElementHandle, expected: ElementKind) -> Result<()> {
    if handle.kind() != expected {
        return Err(ResolutionError::WrongKind { handle, expected }.into());
    }
    Ok(())
}

fn resolve_category(accessor: &dyn PolicyAccessor, name: &str) -> Result<(u32, String)> {
    let handle = accessor.primary(accessor.resolve_by_name(ElementKind::Category, name)?)?;
    Ok((accessor.ordinal(handle)?, accessor.render_name(handle)?))
}

fn expand_category_range(
    accessor: &dyn PolicyAccessor,
    low: &str,
    high: &str,
) -> Result<Vec<(u32, String)>> {
    let first = resolve_category(accessor, low)?;
    let last = resolve_category(accessor, high)?;
    if first.0 >= last.0 {
        return Err(ResolutionError::DescendingRange {
            low: low.to_string(),
            high: high.to_string(),
        }
        .into());
    }

    let mut cats = vec![first.clone()];
    for handle in accessor.enumerate(ElementKind::Category)? {
        if accessor.is_alias(handle)? {
            continue;
        }
        let ordinal = accessor.ordinal(handle)?;
        if ordinal > first.0 && ordinal < last.0 {
            cats.push((ordinal, accessor.render_name(handle)?));
        }
    }
    cats.push(last);
    Ok(cats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_fixtures::mls_policy;
    use polscope_core::Error;

    #[test]
    fn test_from_literal() {
        let level = MlsLevel::from_literal(" s0 : c0,c2.c4 ").unwrap();
        assert_eq!(level.sensitivity(), "s0");
        assert_eq!(level.literal(), Some("c0,c2.c4"));
        assert!(!level.is_bound());

        let bare = MlsLevel::from_literal("s1").unwrap();
        assert_eq!(bare.literal(), None);
        assert!(bare.categories().is_empty());
    }

    #[test]
    fn test_from_literal_rejects_leading_colon() {
        let err = MlsLevel::from_literal(":c0").unwrap_err();
        assert!(matches!(err, Error::Construction(ConstructionError::MalformedLevel(_))));
        assert!(MlsLevel::from_literal("   ").is_err());
    }

    #[test]
    fn test_bind_expands_ranges() {
        let policy = mls_policy();
        let level = MlsLevel::parse(&policy, "s0:c0,c2.c4").unwrap();
        assert_eq!(level.categories(), &["c0", "c2", "c3", "c4"]);
        assert!(level.is_bound());
    }

    #[test]
    fn test_bind_canonicalises_aliases() {
        let policy = mls_policy();
        let level = MlsLevel::parse(&policy, "unclassified:blue,c1").unwrap();
        assert_eq!(level.sensitivity(), "s0");
        assert_eq!(level.categories(), &["c1", "c5"]);
    }

    #[test]
    fn test_bind_errors_leave_level_unchanged() {
        let policy = mls_policy();
        let mut level = MlsLevel::from_literal("s0:c4.c2").unwrap();
        let err = level.bind(&policy).unwrap_err();
        assert!(matches!(err, Error::Resolution(ResolutionError::DescendingRange { .. })));
        assert_eq!(level.literal(), Some("c4.c2"));

        let mut level = MlsLevel::from_literal("s0:c0,nosuch").unwrap();
        assert!(matches!(level.bind(&policy), Err(Error::Resolution(_))));
        assert!(level.categories().is_empty());

        let mut level = MlsLevel::from_literal("s9:c0").unwrap();
        assert!(level.bind(&policy).is_err());

        let mut level = MlsLevel::from_literal("s0:c0,,c1").unwrap();
        assert!(matches!(level.bind(&policy), Err(Error::Construction(_))));
    }

    #[test]
    fn test_render() {
        let policy = mls_policy();
        let cases = [
            ("s0", "s0"),
            ("s0:c0", "s0:c0"),
            ("s0:c0,c1", "s0:c0,c1"),
            ("s0:c2,c0,c1", "s0:c0.c2"),
            ("s0:c0,c2.c4", "s0:c0,c2.c4"),
            ("s1:c0,c1,c3,c4,c5,c7", "s1:c0,c1,c3.c5,c7"),
        ];
        for (input, expected) in cases {
            let level = MlsLevel::parse(&policy, input).unwrap();
            assert_eq!(level.render(&policy).unwrap(), expected, "rendering {}", input);
        }
    }

    #[test]
    fn test_render_unbound() {
        let policy = mls_policy();
        let level = MlsLevel::from_literal("s0:c9.c12").unwrap();
        assert_eq!(level.render(&policy).unwrap(), "s0:c9.c12");
        assert_eq!(level.to_string(), "s0:c9.c12");
    }

    #[test]
    fn test_add_category_keeps_order() {
        let policy = mls_policy();
        let mut level = MlsLevel::new("s0");
        level.add_category(&policy, "c3").unwrap();
        level.add_category(&policy, "c0").unwrap();
        level.add_category(&policy, "c2").unwrap();
        level.add_category(&policy, "c0").unwrap();
        assert_eq!(level.categories(), &["c0", "c2", "c3"]);
        assert!(level.add_category(&policy, "c99").is_err());
    }

    #[test]
    fn test_validate() {
        let policy = mls_policy();
        assert!(MlsLevel::parse(&policy, "s0:c0.c5").unwrap().validate(&policy).unwrap());
        // c7 is only legal from s1 upwards.
        assert!(!MlsLevel::parse(&policy, "s0:c7").unwrap().validate(&policy).unwrap());
        assert!(MlsLevel::parse(&policy, "s1:c7").unwrap().validate(&policy).unwrap());

        let unbound = MlsLevel::from_literal("s0:c1").unwrap();
        assert!(unbound.validate(&policy).is_err());
    }

    #[test]
    fn test_compare_decision_table() {
        let policy = mls_policy();
        let level = |s: &str| MlsLevel::parse(&policy, s).unwrap();

        let a = level("s0:c0,c2.c4");
        assert_eq!(a.compare(Some(&level("s0:c2.c4")), &policy).unwrap(), LevelCompare::Dom);
        assert_eq!(level("s0:c2.c4").compare(Some(&a), &policy).unwrap(), LevelCompare::Domby);
        assert_eq!(a.compare(Some(&a), &policy).unwrap(), LevelCompare::Eq);
        assert_eq!(a.compare(None, &policy).unwrap(), LevelCompare::Eq);

        assert_eq!(level("s1").compare(Some(&level("s0")), &policy).unwrap(), LevelCompare::Dom);
        assert_eq!(level("s0").compare(Some(&level("s1")), &policy).unwrap(), LevelCompare::Domby);
        assert_eq!(
            level("s1:c0").compare(Some(&level("s0:c0,c1")), &policy).unwrap(),
            LevelCompare::Incomp
        );
        assert_eq!(
            level("s0:c0").compare(Some(&level("s0:c1")), &policy).unwrap(),
            LevelCompare::Incomp
        );
        assert_eq!(
            level("s0").compare(Some(&level("s0:c1")), &policy).unwrap(),
            LevelCompare::Domby
        );
    }

    #[test]
    fn test_compare_is_antisymmetric() {
        let policy = mls_policy();
        let literals = ["s0", "s0:c0", "s0:c0.c3", "s1:c1", "s1:c0.c5", "s2", "s0:c4,c5"];
        let levels: Vec<MlsLevel> = literals
            .iter()
            .map(|s| MlsLevel::parse(&policy, s).unwrap())
            .collect();
        for a in &levels {
            assert_eq!(a.compare(Some(a), &policy).unwrap(), LevelCompare::Eq);
            for b in &levels {
                if a == b {
                    continue;
                }
                let ab = a.compare(Some(b), &policy).unwrap();
                let ba = b.compare(Some(a), &policy).unwrap();
                assert_eq!(ab == LevelCompare::Dom, ba == LevelCompare::Domby, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_from_spec() {
        let policy = mls_policy();
        let sens = policy.resolve_by_name(ElementKind::Level, "s1").unwrap();
        let c3 = policy.resolve_by_name(ElementKind::Category, "c3").unwrap();
        let blue = policy.resolve_by_name(ElementKind::Category, "blue").unwrap();
        let spec = LevelSpec {
            sensitivity: sens,
            categories: vec![blue, c3],
        };
        let level = MlsLevel::from_spec(&policy, &spec).unwrap();
        assert_eq!(level.to_string(), "s1:c3,c5");

        let bad = LevelSpec {
            sensitivity: c3,
            categories: vec![],
        };
        assert!(MlsLevel::from_spec(&policy, &bad).is_err());
    }

    #[test]
    fn test_join() {
        let policy = mls_policy();
        let a = MlsLevel::parse(&policy, "s0:c3").unwrap();
        let b = MlsLevel::parse(&policy, "s1:c0").unwrap();
        assert_eq!(a.join(&b, &policy).unwrap().to_string(), "s1:c0,c3");
    }
}
