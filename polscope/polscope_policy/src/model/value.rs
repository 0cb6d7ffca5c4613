//! Comparison inputs.

use polscope_core::types::RuleTypes;
use std::fmt;

use super::level::MlsLevel;
use super::range::MlsRange;

/// A value extracted from a test candidate for a criterion to compare.
///
/// The variant always agrees with the payload, so a parameter can never
/// read a value as the wrong type.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    /// A single string.
    Str(String),
    /// A boolean state.
    Bool(bool),
    /// Rule type flags.
    RuleType(RuleTypes),
    /// An MLS level.
    Level(MlsLevel),
    /// An MLS range.
    Range(MlsRange),
    /// Names, including indirect names such as an attribute's member types.
    NameList(Vec<String>),
}

impl MatchValue {
    /// Get the value's names, when it carries any.
    pub fn names(&self) -> Option<Vec<&str>> {
        match self {
            Self::Str(s) => Some(vec![s.as_str()]),
            Self::NameList(list) => Some(list.iter().map(String::as_str).collect()),
            _ => None,
        }
    }

    /// Get a short description of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::RuleType(_) => "rule type",
            Self::Level(_) => "level",
            Self::Range(_) => "range",
            Self::NameList(_) => "name list",
        }
    }
}

impl fmt::Display for MatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::RuleType(t) => write!(f, "{}", t),
            Self::Level(l) => write!(f, "{}", l),
            Self::Range(r) => write!(f, "{}", r),
            Self::NameList(list) => write!(f, "{{ {} }}", list.join(" ")),
        }
    }
}
