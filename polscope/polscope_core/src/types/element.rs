//! Element kinds and relations.
//!
//! Every element a query can enumerate, match, or cite as evidence has an
//! `ElementKind`. The first nine kinds are policy symbols that may be the
//! subject of a top-level query; the remaining kinds only appear as the
//! sub-elements a test iterates over.

use crate::error::ConstructionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of a policy element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A type.
    Type,
    /// A type attribute.
    Attribute,
    /// A role.
    Role,
    /// A user.
    User,
    /// An object class.
    Class,
    /// A common permission set.
    Common,
    /// An MLS category.
    Category,
    /// An MLS sensitivity.
    Level,
    /// A conditional boolean.
    Bool,
    /// A bare string such as a name or alias.
    String,
    /// An access vector rule (allow, auditallow, dontaudit, neverallow).
    AvRule,
    /// A type rule (type_transition, type_member, type_change).
    TeRule,
    /// A role allow rule.
    RoleAllow,
    /// A role_transition rule.
    RoleTrans,
    /// A range_transition rule.
    RangeTrans,
    /// An entry of a file_contexts list.
    FcEntry,
    /// A complete MLS level.
    MlsLevel,
    /// A complete MLS range.
    MlsRange,
    /// A permission name.
    Permission,
    /// The default state of a boolean.
    BoolState,
}

impl ElementKind {
    /// The kinds that may be the subject of a top-level query.
    pub const SYMBOLS: [ElementKind; 9] = [
        Self::Type,
        Self::Attribute,
        Self::Role,
        Self::User,
        Self::Class,
        Self::Common,
        Self::Category,
        Self::Level,
        Self::Bool,
    ];

    /// Get the display name of this kind.
    ///
    /// # Returns
    ///
    /// The name used in proofs and error messages. Bare strings have an
    /// empty name since the string itself is the element.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Attribute => "attribute",
            Self::Role => "role",
            Self::User => "user",
            Self::Class => "class",
            Self::Common => "common",
            Self::Category => "category",
            Self::Level => "level",
            Self::Bool => "bool",
            Self::String => "",
            Self::AvRule => "av rule",
            Self::TeRule => "type rule",
            Self::RoleAllow => "role allow",
            Self::RoleTrans => "role_transition",
            Self::RangeTrans => "range_transition",
            Self::FcEntry => "file_contexts entry",
            Self::MlsLevel => "level",
            Self::MlsRange => "range",
            Self::Permission => "permission",
            Self::BoolState => "state",
        }
    }

    /// Check whether this kind is a policy symbol.
    pub fn is_symbol(&self) -> bool {
        Self::SYMBOLS.contains(self)
    }

    /// Check whether this kind is a rule.
    pub fn is_rule(&self) -> bool {
        matches!(
            self,
            Self::AvRule | Self::TeRule | Self::RoleAllow | Self::RoleTrans | Self::RangeTrans
        )
    }

    /// Check whether elements of this kind may carry aliases.
    pub fn has_aliases(&self) -> bool {
        matches!(self, Self::Type | Self::Level | Self::Category)
    }
}

impl FromStr for ElementKind {
    type Err = ConstructionError;

    /// Parse a top-level symbol kind, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "type" => Ok(Self::Type),
            "attribute" | "attr" => Ok(Self::Attribute),
            "role" => Ok(Self::Role),
            "user" => Ok(Self::User),
            "class" => Ok(Self::Class),
            "common" => Ok(Self::Common),
            "category" | "cat" => Ok(Self::Category),
            "level" | "sensitivity" | "sens" => Ok(Self::Level),
            "bool" | "boolean" => Ok(Self::Bool),
            _ => Err(ConstructionError::UnknownKeyword {
                what: "element kind",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// A relation between elements, as answered by `PolicyAccessor::related`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Attributes assigned to a type.
    Attributes,
    /// Types in an attribute, or types assigned to a role.
    Types,
    /// Roles containing a type, or roles assigned to a user.
    Roles,
    /// Users assigned a role.
    Users,
    /// Aliases of a primary symbol.
    Aliases,
    /// The primary symbol of an alias.
    Primary,
    /// The common a class inherits.
    Common,
    /// Permissions of a class, common, or av rule.
    Permissions,
    /// Categories legal under a sensitivity.
    Categories,
    /// Source of a rule.
    Source,
    /// Target of a rule.
    Target,
    /// Object class of a rule.
    Class,
    /// Default of a rule.
    Default,
    /// Booleans of the conditional a rule lives in.
    CondBooleans,
}
