//! MLS ranges.
//!
//! A range is either a single level or a low/high pair where the high level
//! dominates the low one. Range comparisons are built on the level
//! dominance algebra in [`super::level`].

use bitflags::bitflags;
use polscope_core::error::{ConsistencyError, ConstructionError, Result, UsageError};
use polscope_core::types::{ElementKind, RangeSpec, Relation};
use polscope_core::PolicyAccessor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::level::{LevelCompare, MlsLevel};

bitflags! {
    /// How a target range is compared with a search range.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RangeMatch: u32 {
        /// The target contains the search range.
        const SUB = 0x02;
        /// The search range contains the target.
        const SUPER = 0x04;
        /// Both contain each other.
        const EXACT = Self::SUB.bits() | Self::SUPER.bits();
        /// The ranges share at least one level.
        const INTERSECT = 0x08;
    }
}

/// A multi-level-security range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MlsRange {
    /// A range covering exactly one level.
    Single(MlsLevel),

    /// A range with separate low and high levels.
    Distinct {
        /// The low level.
        low: MlsLevel,
        /// The high level.
        high: MlsLevel,
    },
}

impl MlsRange {
    /// Create a range from its bounds.
    pub fn new(low: MlsLevel, high: Option<MlsLevel>) -> Self {
        match high {
            Some(high) => Self::Distinct { low, high },
            None => Self::Single(low),
        }
    }

    /// Create an unbound range from a literal such as `s0 - s1:c0.c3`.
    ///
    /// # Arguments
    ///
    /// * `literal` - One level, or two levels separated by the first `-`.
    ///
    /// # Returns
    ///
    /// * `Ok(MlsRange)` - The unbound range.
    /// * `Err` - `ConstructionError` if either side is not a level literal.
    pub fn from_literal(literal: &str) -> Result<Self> {
        let trimmed = literal.trim();
        if trimmed.is_empty() {
            return Err(ConstructionError::MalformedRange(literal.to_string()).into());
        }
        match trimmed.split_once('-') {
            Some((low, high)) => {
                let low = MlsLevel::from_literal(low)
                    .map_err(|_| ConstructionError::MalformedRange(literal.to_string()))?;
                let high = MlsLevel::from_literal(high)
                    .map_err(|_| ConstructionError::MalformedRange(literal.to_string()))?;
                Ok(Self::Distinct { low, high })
            }
            None => Ok(Self::Single(MlsLevel::from_literal(trimmed)?)),
        }
    }

    /// Parse a literal and bind both levels.
    pub fn parse(accessor: &dyn PolicyAccessor, literal: &str) -> Result<Self> {
        let mut range = Self::from_literal(literal)?;
        range.bind(accessor)?;
        Ok(range)
    }

    /// Build a range from an accessor's structural description.
    pub fn from_spec(accessor: &dyn PolicyAccessor, spec: &RangeSpec) -> Result<Self> {
        let low = MlsLevel::from_spec(accessor, &spec.low)?;
        let high = spec
            .high
            .as_ref()
            .map(|high| MlsLevel::from_spec(accessor, high))
            .transpose()?;
        Ok(Self::new(low, high))
    }

    /// Bind both levels to a policy. On failure the range is left unchanged.
    pub fn bind(&mut self, accessor: &dyn PolicyAccessor) -> Result<()> {
        match self {
            Self::Single(level) => level.bind(accessor),
            Self::Distinct { low, high } => {
                let mut bound_low = low.clone();
                let mut bound_high = high.clone();
                bound_low.bind(accessor)?;
                bound_high.bind(accessor)?;
                *low = bound_low;
                *high = bound_high;
                Ok(())
            }
        }
    }

    /// Get the low level.
    pub fn low(&self) -> &MlsLevel {
        match self {
            Self::Single(level) => level,
            Self::Distinct { low, .. } => low,
        }
    }

    /// Get the high level, or `None` for a single-level range.
    pub fn high(&self) -> Option<&MlsLevel> {
        match self {
            Self::Single(_) => None,
            Self::Distinct { high, .. } => Some(high),
        }
    }

    /// Get the high level, falling back to the low level.
    pub fn effective_high(&self) -> &MlsLevel {
        self.high().unwrap_or_else(|| self.low())
    }

    /// Render the range.
    ///
    /// The high level is only written when it differs from the low level
    /// by dominance.
    pub fn render(&self, accessor: &dyn PolicyAccessor) -> Result<String> {
        let mut out = self.low().render(accessor)?;
        if let Some(high) = self.high() {
            if matches!(
                self.low().compare(Some(high), accessor)?,
                LevelCompare::Dom | LevelCompare::Domby
            ) {
                out.push_str(" - ");
                out.push_str(&high.render(accessor)?);
            }
        }
        Ok(out)
    }

    /// Check that both levels are valid and the high dominates the low.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The range is valid.
    /// * `Ok(false)` - A level is invalid or the levels are out of order.
    /// * `Err` - If a level cannot be resolved.
    pub fn validate(&self, accessor: &dyn PolicyAccessor) -> Result<bool> {
        if !self.low().validate(accessor)? {
            return Ok(false);
        }
        let Some(high) = self.high() else {
            return Ok(true);
        };
        if !high.validate(accessor)? {
            return Ok(false);
        }
        Ok(matches!(
            self.low().compare(Some(high), accessor)?,
            LevelCompare::Eq | LevelCompare::Domby
        ))
    }

    /// Validate the range, turning an invalid range into an error.
    pub fn ensure_valid(&self, accessor: &dyn PolicyAccessor) -> Result<()> {
        if self.validate(accessor)? {
            return Ok(());
        }
        Err(ConsistencyError::RangeOrder {
            low: self.low().to_string(),
            high: self.effective_high().to_string(),
        }
        .into())
    }

    /// Check whether a level lies within the range.
    ///
    /// The level must dominate the low level and be dominated by the high
    /// level. A single-level range `l` behaves exactly like `l - l`, so it
    /// only includes levels equal to `l`.
    pub fn includes_level(&self, level: &MlsLevel, accessor: &dyn PolicyAccessor) -> Result<bool> {
        let high_cmp = self.effective_high().compare(Some(level), accessor)?;
        if !matches!(high_cmp, LevelCompare::Eq | LevelCompare::Dom) {
            return Ok(false);
        }
        Ok(matches!(
            self.low().compare(Some(level), accessor)?,
            LevelCompare::Eq | LevelCompare::Domby
        ))
    }

    /// Check whether another range lies entirely within this one.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - Whether both ends of `sub` are included.
    /// * `Err` - `ConsistencyError::RangeOrder` if `sub` is not a valid range.
    pub fn contains_subrange(&self, sub: &MlsRange, accessor: &dyn PolicyAccessor) -> Result<bool> {
        sub.ensure_valid(accessor)?;
        if !self.includes_level(sub.low(), accessor)? {
            return Ok(false);
        }
        match sub.high() {
            Some(high) => self.includes_level(high, accessor),
            None => Ok(true),
        }
    }

    /// Check whether the two ranges share at least one level.
    ///
    /// Two ranges intersect when the least upper bound of their lows is
    /// dominated by both highs. This differs from "either range contains
    /// the other": `s0 - s1:c0.c3` and `s1 - s2:c0.c10` intersect at `s1`.
    /// Overlapping sensitivities alone are not enough either:
    /// `s0:c0 - s1:c0` and `s0:c1 - s1:c1` share no level and do not
    /// intersect.
    pub fn intersects(&self, other: &MlsRange, accessor: &dyn PolicyAccessor) -> Result<bool> {
        self.ensure_valid(accessor)?;
        other.ensure_valid(accessor)?;
        let floor = self.low().join(other.low(), accessor)?;
        Ok(self.effective_high().dominates(&floor, accessor)?
            && other.effective_high().dominates(&floor, accessor)?)
    }

    /// Compare a target range with a search range.
    ///
    /// # Arguments
    ///
    /// * `search` - The range being searched for.
    /// * `mode` - Which relation to test. `EXACT` takes precedence over its
    ///   component bits.
    /// * `accessor` - The policy.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - Whether the relation holds.
    /// * `Err` - If a range is invalid or `mode` is empty.
    pub fn compare(
        &self,
        search: &MlsRange,
        mode: RangeMatch,
        accessor: &dyn PolicyAccessor,
    ) -> Result<bool> {
        if mode.contains(RangeMatch::EXACT) {
            return Ok(self.contains_subrange(search, accessor)?
                && search.contains_subrange(self, accessor)?);
        }
        if mode.contains(RangeMatch::SUB) {
            return self.contains_subrange(search, accessor);
        }
        if mode.contains(RangeMatch::SUPER) {
            return search.contains_subrange(self, accessor);
        }
        if mode.contains(RangeMatch::INTERSECT) {
            return self.intersects(search, accessor);
        }
        Err(UsageError::Invalid(format!("invalid range comparison mode {:#x}", mode.bits())).into())
    }

    /// Enumerate one level per sensitivity covered by the range.
    ///
    /// Each level carries the high level's categories that are legal for
    /// its sensitivity.
    pub fn levels(&self, accessor: &dyn PolicyAccessor) -> Result<Vec<MlsLevel>> {
        let low_ordinal = self.low().sensitivity_ordinal(accessor)?;
        let high = self.effective_high();
        let high_ordinal = high.sensitivity_ordinal(accessor)?;

        let mut levels = Vec::new();
        for sens in accessor.enumerate(ElementKind::Level)? {
            if accessor.is_alias(sens)? {
                continue;
            }
            let ordinal = accessor.ordinal(sens)?;
            if ordinal < low_ordinal || ordinal > high_ordinal {
                continue;
            }

            let legal: HashSet<String> = accessor
                .related(sens, Relation::Categories)?
                .into_iter()
                .map(|cat| accessor.render_name(cat))
                .collect::<Result<_>>()?;

            let mut level = MlsLevel::new(accessor.render_name(sens)?);
            for cat in high.categories().iter().filter(|c| legal.contains(*c)) {
                level.add_category(accessor, cat)?;
            }
            levels.push(level);
        }
        Ok(levels)
    }
}

impl fmt::Display for MlsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(level) => write!(f, "{}", level),
            Self::Distinct { low, high } => write!(f, "{} - {}", low, high),
        }
    }
}
