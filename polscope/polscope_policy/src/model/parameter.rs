//! Criterion parameters.
//!
//! A parameter is the right-hand side of a criterion: a regular expression,
//! a string expression, rule type flags, a boolean, a level or a range.
//! Matching is driven by the criterion's operator and a [`MatchContext`]
//! that carries the policy and the names of the current top-level
//! candidate, which the special identifier `X` stands for.

use polscope_core::error::{ConstructionError, IncompatibleQueryError, Result};
use polscope_core::types::RuleTypes;
use polscope_core::PolicyAccessor;
use regex::{Regex, RegexBuilder};
use std::fmt;

use super::condition::{Operator, ParamType};
use super::level::{LevelCompare, MlsLevel};
use super::range::{MlsRange, RangeMatch};
use super::value::MatchValue;

/// The identifier standing for the current top-level candidate.
pub const X_IDENTIFIER: &str = "X";

/// What a parameter needs besides the value it is matched against.
pub struct MatchContext<'a> {
    /// The policy being searched.
    pub accessor: &'a dyn PolicyAccessor,

    /// Every name of the current top-level candidate.
    pub xnames: &'a [String],
}

/// A compiled regular expression.
#[derive(Debug, Clone)]
pub struct RegexParameter {
    expression: String,
    ignore_case: bool,
    compiled: Regex,
}

impl RegexParameter {
    /// Compile a regular expression.
    ///
    /// # Arguments
    ///
    /// * `expression` - The pattern.
    /// * `ignore_case` - Whether matching ignores case.
    ///
    /// # Returns
    ///
    /// * `Ok(RegexParameter)` - The compiled parameter.
    /// * `Err` - `ConstructionError::InvalidRegex` if the pattern does not compile.
    pub fn new(expression: &str, ignore_case: bool) -> Result<Self> {
        let compiled = RegexBuilder::new(expression)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| ConstructionError::InvalidRegex {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_string(),
            ignore_case,
            compiled,
        })
    }

    /// Get the pattern.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Check whether matching ignores case.
    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    /// Match one string. The string `X` matches if any candidate name does.
    pub fn is_match(&self, s: &str, xnames: &[String]) -> bool {
        if s == X_IDENTIFIER {
            xnames.iter().any(|name| self.compiled.is_match(name))
        } else {
            self.compiled.is_match(s)
        }
    }

    /// Match a list of strings; any match suffices.
    pub fn matches_any(&self, list: &[&str], xnames: &[String]) -> bool {
        list.iter().any(|s| self.is_match(s, xnames))
    }
}

impl PartialEq for RegexParameter {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression && self.ignore_case == other.ignore_case
    }
}

/// A list of identifiers to include or, with a `~` prefix, exclude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringExpression {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl StringExpression {
    /// Parse a whitespace- or comma-separated identifier list.
    ///
    /// # Returns
    ///
    /// * `Ok(StringExpression)` - The parsed expression.
    /// * `Err` - `ConstructionError::InvalidExpression` if the list is empty
    ///   or contains a bare `~`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for token in text.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
            match token.strip_prefix('~') {
                Some("") => return Err(ConstructionError::InvalidExpression(text.to_string()).into()),
                Some(id) => exclude.push(id.to_string()),
                None => include.push(token.to_string()),
            }
        }
        if include.is_empty() && exclude.is_empty() {
            return Err(ConstructionError::InvalidExpression(text.to_string()).into());
        }
        Ok(Self { include, exclude })
    }

    /// Get the included identifiers.
    pub fn include(&self) -> &[String] {
        &self.include
    }

    /// Get the excluded identifiers.
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Check whether the expression mentions `X`.
    pub fn uses_x(&self) -> bool {
        self.include.iter().chain(&self.exclude).any(|id| id == X_IDENTIFIER)
    }

    /// Match a list of names.
    ///
    /// The list matches if it is non-empty, some name is included (or the
    /// expression includes nothing), and no name is excluded.
    pub fn matches(&self, list: &[&str], xnames: &[String]) -> bool {
        if list.is_empty() {
            return false;
        }
        let listed = |ids: &[String], name: &str| {
            ids.iter().any(|id| {
                if id == X_IDENTIFIER {
                    xnames.iter().any(|x| x == name)
                } else {
                    id == name
                }
            })
        };
        let included = self.include.is_empty() || list.iter().any(|name| listed(&self.include, name));
        let excluded = list.iter().any(|name| listed(&self.exclude, name));
        included && !excluded
    }
}

impl fmt::Display for StringExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self
            .include
            .iter()
            .cloned()
            .chain(self.exclude.iter().map(|id| format!("~{}", id)))
            .collect();
        write!(f, "{}", ids.join(" "))
    }
}

/// The parameter of a criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Regex(RegexParameter),
    StrExpr(StringExpression),
    RuleType(RuleTypes),
    Bool(bool),
    Level(MlsLevel),
    Range(MlsRange),
}

impl Parameter {
    /// Get the type of this parameter.
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Regex(_) => ParamType::Regex,
            Self::StrExpr(_) => ParamType::StrExpr,
            Self::RuleType(_) => ParamType::RuleType,
            Self::Bool(_) => ParamType::Bool,
            Self::Level(_) => ParamType::Level,
            Self::Range(_) => ParamType::Range,
        }
    }

    /// Build a parameter of a given type from text.
    ///
    /// Levels and ranges are left unbound; they are resolved when the
    /// query runs.
    ///
    /// # Arguments
    ///
    /// * `param_type` - The type to build.
    /// * `text` - The parameter as written.
    /// * `ignore_case` - Case sensitivity for regular expressions.
    pub fn parse(param_type: ParamType, text: &str, ignore_case: bool) -> Result<Self> {
        Ok(match param_type {
            ParamType::Regex => Self::Regex(RegexParameter::new(text, ignore_case)?),
            ParamType::StrExpr => Self::StrExpr(StringExpression::parse(text)?),
            ParamType::RuleType => Self::RuleType(text.parse()?),
            ParamType::Bool => Self::Bool(match text.trim().to_lowercase().as_str() {
                "true" | "on" | "1" => true,
                "false" | "off" | "0" => false,
                _ => {
                    return Err(ConstructionError::UnknownKeyword {
                        what: "boolean",
                        value: text.to_string(),
                    }
                    .into())
                }
            }),
            ParamType::Level => Self::Level(MlsLevel::from_literal(text)?),
            ParamType::Range => Self::Range(MlsRange::from_literal(text)?),
        })
    }

    /// Resolve a level or range parameter against a policy.
    ///
    /// Range parameters must also be valid ranges.
    pub fn bind(&mut self, accessor: &dyn PolicyAccessor) -> Result<()> {
        match self {
            Self::Level(level) if !level.is_bound() => level.bind(accessor),
            Self::Range(range) => {
                range.bind(accessor)?;
                range.ensure_valid(accessor)
            }
            _ => Ok(()),
        }
    }

    /// Check whether the parameter mentions `X`.
    pub fn uses_x(&self) -> bool {
        matches!(self, Self::StrExpr(expr) if expr.uses_x())
    }

    /// Match a value.
    ///
    /// # Arguments
    ///
    /// * `op` - The criterion's operator, which selects level and range semantics.
    /// * `value` - The value extracted from the test candidate.
    /// * `ctx` - The policy and the current candidate's names.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - Whether the value matches.
    /// * `Err` - If the value's type does not fit the parameter or a
    ///   level cannot be resolved.
    pub fn matches(&self, op: Operator, value: &MatchValue, ctx: &MatchContext<'_>) -> Result<bool> {
        if let Some(list) = value.names() {
            match self {
                Self::Regex(re) => return Ok(re.matches_any(&list, ctx.xnames)),
                Self::StrExpr(expr) => return Ok(expr.matches(&list, ctx.xnames)),
                _ => {}
            }
        }

        match (self, value) {
            (Self::RuleType(wanted), MatchValue::RuleType(actual)) => Ok(wanted.intersects(*actual)),
            (Self::Bool(wanted), MatchValue::Bool(actual)) => Ok(wanted == actual),
            (Self::Level(wanted), MatchValue::Level(actual)) => {
                let cmp = actual.compare(Some(wanted), ctx.accessor)?;
                Ok(match op {
                    Operator::AsLevelDom => matches!(cmp, LevelCompare::Eq | LevelCompare::Dom),
                    Operator::AsLevelDomby => matches!(cmp, LevelCompare::Eq | LevelCompare::Domby),
                    _ => cmp == LevelCompare::Eq,
                })
            }
            (Self::Range(wanted), MatchValue::Range(actual)) => {
                let mode = match op {
                    Operator::AsRangeSuper => RangeMatch::SUPER,
                    Operator::AsRangeSub => RangeMatch::SUB,
                    Operator::AsRangeIntersect => RangeMatch::INTERSECT,
                    _ => RangeMatch::EXACT,
                };
                actual.compare(wanted, mode, ctx.accessor)
            }
            (param, value) => Err(IncompatibleQueryError::ParameterType {
                operator: op.to_string(),
                parameter: value.type_name().to_string(),
                expected: param.param_type().to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(re) => write!(f, "/{}/{}", re.expression(), if re.ignore_case() { "i" } else { "" }),
            Self::StrExpr(expr) => write!(f, "{}", expr),
            Self::RuleType(t) => write!(f, "{}", t),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Level(l) => write!(f, "{}", l),
            Self::Range(r) => write!(f, "{}", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_fixtures::mls_policy;
    use polscope_core::Error;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_regex_parameter() {
        let re = RegexParameter::new("^httpd_", false).unwrap();
        assert!(re.is_match("httpd_t", &[]));
        assert!(!re.is_match("HTTPD_t", &[]));
        assert!(RegexParameter::new("^httpd_", true).unwrap().is_match("HTTPD_t", &[]));
        assert!(re.matches_any(&["sshd_t", "httpd_log_t"], &[]));
        assert!(!re.matches_any(&[], &[]));
    }

    #[test]
    fn test_regex_x_uses_candidate_names() {
        let re = RegexParameter::new("_log_", false).unwrap();
        assert!(re.is_match("X", &names(&["httpd_log_t"])));
        assert!(!re.is_match("X", &names(&["httpd_t"])));
    }

    #[test]
    fn test_invalid_regex() {
        let err = RegexParameter::new("(unclosed", false).unwrap_err();
        assert!(matches!(err, Error::Construction(ConstructionError::InvalidRegex { .. })));
    }

    #[test]
    fn test_string_expression() {
        let expr = StringExpression::parse("httpd_t, sshd_t ~etc_t").unwrap();
        assert_eq!(expr.include(), &["httpd_t", "sshd_t"]);
        assert_eq!(expr.exclude(), &["etc_t"]);
        assert!(expr.matches(&["httpd_t"], &[]));
        assert!(expr.matches(&["httpd_t", "other_t"], &[]));
        assert!(!expr.matches(&["httpd_t", "etc_t"], &[]));
        assert!(!expr.matches(&["other_t"], &[]));
        assert!(!expr.matches(&[], &[]));
    }

    #[test]
    fn test_string_expression_exclusions_only() {
        let expr = StringExpression::parse("~etc_t").unwrap();
        assert!(expr.matches(&["httpd_t"], &[]));
        assert!(!expr.matches(&["etc_t"], &[]));
    }

    #[test]
    fn test_string_expression_x() {
        let expr = StringExpression::parse("X").unwrap();
        assert!(expr.uses_x());
        let xnames = names(&["httpd_t", "web_t"]);
        assert!(expr.matches(&["web_t"], &xnames));
        assert!(!expr.matches(&["sshd_t"], &xnames));

        let not_x = StringExpression::parse("~X").unwrap();
        assert!(not_x.matches(&["sshd_t"], &xnames));
        assert!(!not_x.matches(&["httpd_t"], &xnames));
    }

    #[test]
    fn test_string_expression_rejects_empty() {
        assert!(StringExpression::parse("  , ").is_err());
        assert!(StringExpression::parse("a ~").is_err());
    }

    #[test]
    fn test_parse_parameters() {
        assert_eq!(
            Parameter::parse(ParamType::RuleType, "allow|dontaudit", false).unwrap(),
            Parameter::RuleType(RuleTypes::ALLOW | RuleTypes::DONTAUDIT)
        );
        assert_eq!(Parameter::parse(ParamType::Bool, "on", false).unwrap(), Parameter::Bool(true));
        assert!(Parameter::parse(ParamType::Bool, "maybe", false).is_err());
        assert_eq!(
            Parameter::parse(ParamType::Regex, "x", true).unwrap().param_type(),
            ParamType::Regex
        );
    }

    #[test]
    fn test_level_operators() {
        let policy = mls_policy();
        let ctx = MatchContext {
            accessor: &policy,
            xnames: &[],
        };
        let mut param = Parameter::parse(ParamType::Level, "s0:c1", false).unwrap();
        param.bind(&policy).unwrap();

        let value = MatchValue::Level(MlsLevel::parse(&policy, "s1:c1,c2").unwrap());
        assert!(param.matches(Operator::AsLevelDom, &value, &ctx).unwrap());
        assert!(!param.matches(Operator::AsLevelDomby, &value, &ctx).unwrap());
        assert!(!param.matches(Operator::AsLevelExact, &value, &ctx).unwrap());

        let same = MatchValue::Level(MlsLevel::parse(&policy, "s0:c1").unwrap());
        assert!(param.matches(Operator::AsLevelExact, &same, &ctx).unwrap());
        assert!(param.matches(Operator::AsLevelDomby, &same, &ctx).unwrap());
    }

    #[test]
    fn test_range_operators() {
        let policy = mls_policy();
        let ctx = MatchContext {
            accessor: &policy,
            xnames: &[],
        };
        let mut param = Parameter::parse(ParamType::Range, "s0 - s1:c0.c3", false).unwrap();
        param.bind(&policy).unwrap();

        let wide = MatchValue::Range(MlsRange::parse(&policy, "s0 - s2:c0.c10").unwrap());
        assert!(param.matches(Operator::AsRangeSub, &wide, &ctx).unwrap());
        assert!(!param.matches(Operator::AsRangeSuper, &wide, &ctx).unwrap());
        assert!(!param.matches(Operator::AsRangeExact, &wide, &ctx).unwrap());
        assert!(param.matches(Operator::AsRangeIntersect, &wide, &ctx).unwrap());
    }

    #[test]
    fn test_bind_rejects_inverted_range() {
        let policy = mls_policy();
        let mut param = Parameter::parse(ParamType::Range, "s2 - s0", false).unwrap();
        assert!(param.bind(&policy).is_err());
    }

    #[test]
    fn test_mismatched_value() {
        let policy = mls_policy();
        let ctx = MatchContext {
            accessor: &policy,
            xnames: &[],
        };
        let param = Parameter::Bool(true);
        let err = param
            .matches(Operator::Is, &MatchValue::Str("x".to_string()), &ctx)
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleQuery(_)));
    }
}
