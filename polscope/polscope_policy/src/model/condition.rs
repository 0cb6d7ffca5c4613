//! Test conditions, operators and their compatibility tables.
//!
//! Which conditions apply to which element kinds, which operators apply to
//! which conditions, and which parameter type each operator takes are all
//! fixed tables. Queries consult them while they are being assembled, so an
//! incompatible combination never reaches evaluation.

use lazy_static::lazy_static;
use polscope_core::error::ConstructionError;
use polscope_core::types::ElementKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// How the tests of a query combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every test must pass.
    #[default]
    All,
    /// At least one test must pass.
    Any,
}

impl FromStr for MatchMode {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            _ => Err(ConstructionError::UnknownKeyword {
                what: "match mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// What a test examines about a candidate element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCondition {
    Name,
    Alias,
    Attributes,
    Roles,
    AvRule,
    TeRule,
    RoleAllow,
    RoleTrans,
    RangeTrans,
    FcEntry,
    Types,
    Users,
    DefaultLevel,
    Range,
    Common,
    Permissions,
    Categories,
    State,
}

impl TestCondition {
    /// All conditions.
    pub const ALL: [TestCondition; 18] = [
        Self::Name,
        Self::Alias,
        Self::Attributes,
        Self::Roles,
        Self::AvRule,
        Self::TeRule,
        Self::RoleAllow,
        Self::RoleTrans,
        Self::RangeTrans,
        Self::FcEntry,
        Self::Types,
        Self::Users,
        Self::DefaultLevel,
        Self::Range,
        Self::Common,
        Self::Permissions,
        Self::Categories,
        Self::State,
    ];

    /// Get the keyword used on the command line.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Alias => "alias",
            Self::Attributes => "attributes",
            Self::Roles => "roles",
            Self::AvRule => "avrule",
            Self::TeRule => "terule",
            Self::RoleAllow => "roleallow",
            Self::RoleTrans => "roletrans",
            Self::RangeTrans => "rangetrans",
            Self::FcEntry => "fcentry",
            Self::Types => "types",
            Self::Users => "users",
            Self::DefaultLevel => "default_level",
            Self::Range => "range",
            Self::Common => "common",
            Self::Permissions => "permissions",
            Self::Categories => "categories",
            Self::State => "state",
        }
    }

    /// Get the phrase used when explaining a match.
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Name => "its name",
            Self::Alias => "it has an alias",
            Self::Attributes => "its assigned attributes",
            Self::Roles => "its assigned roles",
            Self::AvRule => "there is an av rule",
            Self::TeRule => "there is a type rule",
            Self::RoleAllow => "there is a role allow rule",
            Self::RoleTrans => "there is a role_transition rule",
            Self::RangeTrans => "there is a range_transition rule",
            Self::FcEntry => "there is a file_context entry",
            Self::Types => "its assigned types",
            Self::Users => "it is assigned to users",
            Self::DefaultLevel => "its default level",
            Self::Range => "its assigned range",
            Self::Common => "its inherited common",
            Self::Permissions => "its assigned permissions",
            Self::Categories => "its assigned categories",
            Self::State => "its default state",
        }
    }

    /// Get the kind of element a test with this condition iterates over.
    pub fn candidate_kind(&self) -> ElementKind {
        match self {
            Self::Name | Self::Alias => ElementKind::String,
            Self::Attributes => ElementKind::Attribute,
            Self::Roles => ElementKind::Role,
            Self::AvRule => ElementKind::AvRule,
            Self::TeRule => ElementKind::TeRule,
            Self::RoleAllow => ElementKind::RoleAllow,
            Self::RoleTrans => ElementKind::RoleTrans,
            Self::RangeTrans => ElementKind::RangeTrans,
            Self::FcEntry => ElementKind::FcEntry,
            Self::Types => ElementKind::Type,
            Self::Users => ElementKind::User,
            Self::DefaultLevel => ElementKind::MlsLevel,
            Self::Range => ElementKind::MlsRange,
            Self::Common => ElementKind::Common,
            Self::Permissions => ElementKind::Permission,
            Self::Categories => ElementKind::Category,
            Self::State => ElementKind::BoolState,
        }
    }

    /// Check whether the condition applies to an element kind.
    pub fn is_valid_for(&self, kind: ElementKind) -> bool {
        CONDITION_KINDS
            .get(self)
            .map_or(false, |kinds| kinds.contains(&kind))
    }

    /// Get the operators valid for this condition on an element kind.
    ///
    /// # Returns
    ///
    /// The operators, or an empty slice if the condition does not apply
    /// to `kind`.
    pub fn valid_operators(&self, kind: ElementKind) -> &'static [Operator] {
        if !self.is_valid_for(kind) {
            return &[];
        }
        CONDITION_OPERATORS.get(self).map_or(&[], |ops| ops.as_slice())
    }
}

impl FromStr for TestCondition {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .find(|c| c.keyword() == wanted || c.keyword().replace('_', "") == wanted)
            .copied()
            .ok_or_else(|| ConstructionError::UnknownKeyword {
                what: "test condition",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for TestCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// How a criterion compares a candidate with its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Is,
    MatchRegex,
    RuleType,
    Include,
    AsSource,
    AsTarget,
    AsClass,
    AsPerm,
    AsDefault,
    AsSrcTgt,
    AsSrcTgtDflt,
    AsSrcDflt,
    InCond,
    AsLevelExact,
    AsLevelDom,
    AsLevelDomby,
    AsRangeExact,
    AsRangeSuper,
    AsRangeSub,
    AsRangeIntersect,
    AsUser,
    AsRole,
    AsType,
}

impl Operator {
    /// All operators.
    pub const ALL: [Operator; 23] = [
        Self::Is,
        Self::MatchRegex,
        Self::RuleType,
        Self::Include,
        Self::AsSource,
        Self::AsTarget,
        Self::AsClass,
        Self::AsPerm,
        Self::AsDefault,
        Self::AsSrcTgt,
        Self::AsSrcTgtDflt,
        Self::AsSrcDflt,
        Self::InCond,
        Self::AsLevelExact,
        Self::AsLevelDom,
        Self::AsLevelDomby,
        Self::AsRangeExact,
        Self::AsRangeSuper,
        Self::AsRangeSub,
        Self::AsRangeIntersect,
        Self::AsUser,
        Self::AsRole,
        Self::AsType,
    ];

    /// Get the keyword used on the command line.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::MatchRegex => "regex",
            Self::RuleType => "rule_type",
            Self::Include => "include",
            Self::AsSource => "source",
            Self::AsTarget => "target",
            Self::AsClass => "class",
            Self::AsPerm => "perm",
            Self::AsDefault => "default",
            Self::AsSrcTgt => "src_tgt",
            Self::AsSrcTgtDflt => "src_tgt_dflt",
            Self::AsSrcDflt => "src_dflt",
            Self::InCond => "in_cond",
            Self::AsLevelExact => "level_exact",
            Self::AsLevelDom => "level_dom",
            Self::AsLevelDomby => "level_domby",
            Self::AsRangeExact => "range_exact",
            Self::AsRangeSuper => "range_super",
            Self::AsRangeSub => "range_sub",
            Self::AsRangeIntersect => "range_intersect",
            Self::AsUser => "user",
            Self::AsRole => "role",
            Self::AsType => "type",
        }
    }

    /// Get the parameter type this operator takes under a condition.
    pub fn param_type(&self, condition: TestCondition) -> ParamType {
        match self {
            Self::Is if condition == TestCondition::State => ParamType::Bool,
            Self::MatchRegex => ParamType::Regex,
            Self::RuleType => ParamType::RuleType,
            Self::AsLevelExact | Self::AsLevelDom | Self::AsLevelDomby => ParamType::Level,
            op if op.is_range_operator() => ParamType::Range,
            _ => ParamType::StrExpr,
        }
    }

    /// Check whether this is one of the range operators.
    pub fn is_range_operator(&self) -> bool {
        matches!(
            self,
            Self::AsRangeExact | Self::AsRangeSuper | Self::AsRangeSub | Self::AsRangeIntersect
        )
    }

    /// Get the kinds of element whose names this operator compares under
    /// a condition. The identifier `X` is only meaningful when the query's
    /// element kind is one of these.
    pub fn compared_kinds(&self, condition: TestCondition) -> &'static [ElementKind] {
        const TYPES: &[ElementKind] = &[ElementKind::Type, ElementKind::Attribute];
        const ROLES: &[ElementKind] = &[ElementKind::Role];
        let role_rule = matches!(condition, TestCondition::RoleAllow | TestCondition::RoleTrans);
        match self {
            Self::Is => match condition {
                TestCondition::Name => &ElementKind::SYMBOLS,
                _ => &[],
            },
            Self::Include => match condition {
                TestCondition::Attributes => &[ElementKind::Attribute],
                TestCondition::Roles => ROLES,
                TestCondition::Types => &[ElementKind::Type],
                TestCondition::Users => &[ElementKind::User],
                TestCondition::Common => &[ElementKind::Common],
                TestCondition::Categories => &[ElementKind::Category],
                _ => &[],
            },
            Self::AsSource | Self::AsSrcDflt if role_rule => ROLES,
            Self::AsDefault if role_rule => ROLES,
            Self::AsTarget | Self::AsSrcTgt if condition == TestCondition::RoleAllow => ROLES,
            Self::AsSource
            | Self::AsTarget
            | Self::AsDefault
            | Self::AsSrcTgt
            | Self::AsSrcTgtDflt
            | Self::AsSrcDflt
            | Self::AsType => TYPES,
            Self::AsClass => &[ElementKind::Class],
            Self::InCond => &[ElementKind::Bool],
            Self::AsUser => &[ElementKind::User],
            Self::AsRole => ROLES,
            _ => &[],
        }
    }
}

impl FromStr for Operator {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase().replace('-', "_");
        let wanted = wanted.strip_prefix("as_").unwrap_or(&wanted);
        Self::ALL
            .iter()
            .find(|op| op.keyword() == wanted)
            .copied()
            .ok_or_else(|| ConstructionError::UnknownKeyword {
                what: "operator",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// The type of value a criterion's parameter holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Regex,
    StrExpr,
    RuleType,
    Bool,
    Level,
    Range,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Regex => "regex",
            Self::StrExpr => "string expression",
            Self::RuleType => "rule type",
            Self::Bool => "bool",
            Self::Level => "level",
            Self::Range => "range",
        };
        write!(f, "{}", name)
    }
}

const RANGE_OPERATORS: [Operator; 4] = [
    Operator::AsRangeExact,
    Operator::AsRangeSuper,
    Operator::AsRangeSub,
    Operator::AsRangeIntersect,
];

lazy_static! {
    static ref CONDITION_KINDS: HashMap<TestCondition, HashSet<ElementKind>> = {
        use ElementKind as K;
        use TestCondition as C;
        let mut m = HashMap::new();
        m.insert(C::Name, ElementKind::SYMBOLS.into_iter().collect());
        m.insert(C::Alias, [K::Type, K::Level, K::Category].into_iter().collect());
        m.insert(C::Attributes, [K::Type].into_iter().collect());
        m.insert(C::Roles, [K::Type, K::User].into_iter().collect());
        m.insert(C::AvRule, [K::Type, K::Attribute, K::Class].into_iter().collect());
        m.insert(C::TeRule, [K::Type, K::Attribute, K::Class].into_iter().collect());
        m.insert(C::RoleAllow, [K::Role].into_iter().collect());
        m.insert(C::Users, [K::Role].into_iter().collect());
        m.insert(C::RoleTrans, [K::Role, K::Type, K::Attribute].into_iter().collect());
        m.insert(
            C::RangeTrans,
            [K::Type, K::Attribute, K::Class, K::Level, K::Category].into_iter().collect(),
        );
        m.insert(
            C::FcEntry,
            [K::Type, K::Role, K::Class, K::Level, K::Category].into_iter().collect(),
        );
        m.insert(C::Types, [K::Role, K::Attribute].into_iter().collect());
        m.insert(C::DefaultLevel, [K::User].into_iter().collect());
        m.insert(C::Range, [K::User].into_iter().collect());
        m.insert(C::Common, [K::Class].into_iter().collect());
        m.insert(C::Permissions, [K::Class, K::Common].into_iter().collect());
        m.insert(C::Categories, [K::Level].into_iter().collect());
        m.insert(C::State, [K::Bool].into_iter().collect());
        m
    };

    static ref CONDITION_OPERATORS: HashMap<TestCondition, Vec<Operator>> = {
        use Operator as O;
        use TestCondition as C;
        let mut m = HashMap::new();
        m.insert(C::Name, vec![O::Is, O::MatchRegex]);
        m.insert(C::Alias, vec![O::MatchRegex]);
        for cond in [
            C::Attributes,
            C::Roles,
            C::Types,
            C::Users,
            C::Common,
            C::Permissions,
            C::Categories,
        ] {
            m.insert(cond, vec![O::Include]);
        }
        m.insert(
            C::AvRule,
            vec![O::RuleType, O::AsSource, O::AsTarget, O::AsClass, O::AsSrcTgt, O::InCond, O::AsPerm],
        );
        m.insert(
            C::TeRule,
            vec![
                O::RuleType,
                O::AsSource,
                O::AsTarget,
                O::AsClass,
                O::AsSrcTgt,
                O::InCond,
                O::AsDefault,
                O::AsSrcDflt,
                O::AsSrcTgtDflt,
            ],
        );
        m.insert(C::RoleAllow, vec![O::AsSource, O::AsTarget, O::AsSrcTgt]);
        m.insert(C::RoleTrans, vec![O::AsSource, O::AsTarget, O::AsDefault, O::AsSrcDflt]);

        let mut range_trans = RANGE_OPERATORS.to_vec();
        range_trans.extend([O::AsSource, O::AsTarget, O::AsClass, O::AsSrcTgt]);
        m.insert(C::RangeTrans, range_trans);

        let mut fc_entry = vec![O::AsUser, O::AsRole, O::AsType];
        fc_entry.extend(RANGE_OPERATORS);
        fc_entry.push(O::AsClass);
        m.insert(C::FcEntry, fc_entry);

        m.insert(C::DefaultLevel, vec![O::AsLevelExact, O::AsLevelDom, O::AsLevelDomby]);
        m.insert(C::Range, RANGE_OPERATORS.to_vec());
        m.insert(C::State, vec![O::Is]);
        m
    };
}
