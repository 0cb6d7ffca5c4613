//! Rule type flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConstructionError;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    /// The kind of an access vector or type rule, as a bit field so that a
    /// query parameter can name several rule types at once.
    pub struct RuleTypes: u32 {
        const ALLOW = 0x0001;
        const AUDITALLOW = 0x0002;
        const DONTAUDIT = 0x0004;
        const TYPE_TRANSITION = 0x0010;
        const TYPE_MEMBER = 0x0020;
        const TYPE_CHANGE = 0x0040;
        const NEVERALLOW = 0x0080;

        const AV_RULES = Self::ALLOW.bits()
            | Self::AUDITALLOW.bits()
            | Self::DONTAUDIT.bits()
            | Self::NEVERALLOW.bits();
        const TE_RULES = Self::TYPE_TRANSITION.bits()
            | Self::TYPE_MEMBER.bits()
            | Self::TYPE_CHANGE.bits();
    }
}

const KEYWORDS: [(RuleTypes, &str); 7] = [
    (RuleTypes::ALLOW, "allow"),
    (RuleTypes::AUDITALLOW, "auditallow"),
    (RuleTypes::DONTAUDIT, "dontaudit"),
    (RuleTypes::NEVERALLOW, "neverallow"),
    (RuleTypes::TYPE_TRANSITION, "type_transition"),
    (RuleTypes::TYPE_MEMBER, "type_member"),
    (RuleTypes::TYPE_CHANGE, "type_change"),
];

impl RuleTypes {
    /// Get the policy keyword of a single rule type.
    ///
    /// # Returns
    ///
    /// The keyword, or `None` if this value is empty or names more than one
    /// rule type.
    pub fn keyword(&self) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .find(|(flag, _)| flag == self)
            .map(|(_, kw)| *kw)
    }
}

impl FromStr for RuleTypes {
    type Err = ConstructionError;

    /// Parse a `|`- or `,`-separated list of rule keywords.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut types = RuleTypes::empty();
        for token in s.split(['|', ',']).map(str::trim).filter(|t| !t.is_empty()) {
            let flag = KEYWORDS
                .iter()
                .find(|(_, kw)| kw.eq_ignore_ascii_case(token))
                .map(|(flag, _)| *flag)
                .ok_or_else(|| ConstructionError::UnknownKeyword {
                    what: "rule type",
                    value: token.to_string(),
                })?;
            types |= flag;
        }
        if types.is_empty() {
            return Err(ConstructionError::UnknownKeyword {
                what: "rule type",
                value: s.to_string(),
            });
        }
        Ok(types)
    }
}

impl fmt::Display for RuleTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = KEYWORDS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, kw)| *kw)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_types_from_str() {
        assert_eq!("allow".parse::<RuleTypes>().unwrap(), RuleTypes::ALLOW);
        assert_eq!(
            "allow|dontaudit".parse::<RuleTypes>().unwrap(),
            RuleTypes::ALLOW | RuleTypes::DONTAUDIT
        );
        assert!("permit".parse::<RuleTypes>().is_err());
        assert!("".parse::<RuleTypes>().is_err());
    }

    #[test]
    fn test_rule_types_groups() {
        assert!(RuleTypes::AV_RULES.contains(RuleTypes::NEVERALLOW));
        assert!(!RuleTypes::AV_RULES.intersects(RuleTypes::TE_RULES));
    }

    #[test]
    fn test_rule_types_display() {
        assert_eq!(RuleTypes::TYPE_TRANSITION.keyword(), Some("type_transition"));
        assert_eq!((RuleTypes::ALLOW | RuleTypes::AUDITALLOW).keyword(), None);
        assert_eq!(
            (RuleTypes::ALLOW | RuleTypes::AUDITALLOW).to_string(),
            "allow|auditallow"
        );
    }
}
