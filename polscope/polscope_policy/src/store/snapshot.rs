//! Policy snapshots.
//!
//! A snapshot is a serde description of a policy, written by hand or
//! exported by another tool, in TOML or JSON. Loading a snapshot resolves
//! every name it mentions and produces an [`InMemoryPolicy`].

use polscope_core::error::{ConsistencyError, ConstructionError, Error, ResolutionError, Result};
use polscope_core::types::{ElementKind, LevelSpec, RangeSpec, Relation, RuleTypes};
use polscope_core::{ElementHandle, PolicyAccessor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use super::in_memory::{InMemoryPolicy, RuleDef};
use crate::model::{MlsLevel, MlsRange};

/// A type declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDecl {
    pub name: String,
    pub aliases: Vec<String>,
    pub attributes: Vec<String>,
}

/// A declaration that only carries a name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedDecl {
    pub name: String,
}

/// A role declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleDecl {
    pub name: String,
    pub types: Vec<String>,
}

/// A user declaration. Levels and ranges are literals such as `s0:c1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDecl {
    pub name: String,
    pub roles: Vec<String>,
    pub default_level: Option<String>,
    pub range: Option<String>,
}

/// A common permission set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonDecl {
    pub name: String,
    pub permissions: Vec<String>,
}

/// An object class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassDecl {
    pub name: String,
    pub common: Option<String>,
    pub permissions: Vec<String>,
}

/// A sensitivity. `categories` may use dotted ranges such as `c0.c5`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityDecl {
    pub name: String,
    pub aliases: Vec<String>,
    pub categories: Vec<String>,
}

/// A category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryDecl {
    pub name: String,
    pub aliases: Vec<String>,
}

/// A boolean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoolDecl {
    pub name: String,
    pub state: bool,
}

/// An access vector rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvRuleDecl {
    pub rule: String,
    pub source: String,
    pub target: String,
    pub class: String,
    pub permissions: Vec<String>,
    pub conditional: Vec<String>,
}

/// A type rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeRuleDecl {
    pub rule: String,
    pub source: String,
    pub target: String,
    pub class: String,
    pub default: String,
    pub conditional: Vec<String>,
}

/// A role allow rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleAllowDecl {
    pub source: String,
    pub target: String,
}

/// A role_transition rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleTransDecl {
    pub source: String,
    pub target: String,
    pub default: String,
}

/// A range_transition rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeTransDecl {
    pub source: String,
    pub target: String,
    pub class: String,
    pub range: String,
}

/// A complete policy description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySnapshot {
    pub types: Vec<TypeDecl>,
    pub attributes: Vec<NamedDecl>,
    pub roles: Vec<RoleDecl>,
    pub users: Vec<UserDecl>,
    pub commons: Vec<CommonDecl>,
    pub classes: Vec<ClassDecl>,
    pub sensitivities: Vec<SensitivityDecl>,
    pub categories: Vec<CategoryDecl>,
    pub booleans: Vec<BoolDecl>,
    pub av_rules: Vec<AvRuleDecl>,
    pub te_rules: Vec<TeRuleDecl>,
    pub role_allows: Vec<RoleAllowDecl>,
    pub role_transitions: Vec<RoleTransDecl>,
    pub range_transitions: Vec<RangeTransDecl>,
}

impl PolicySnapshot {
    /// Parse a snapshot from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load a snapshot from a file.
    ///
    /// Files ending in `.json` are read as JSON, anything else as TOML.
    ///
    /// # Arguments
    ///
    /// * `path` - The snapshot file.
    ///
    /// # Returns
    ///
    /// * `Ok(PolicySnapshot)` - The parsed snapshot.
    /// * `Err` - If the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        }
    }

    /// Serialize the snapshot as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Build an in-memory policy from the snapshot.
    ///
    /// Declarations are added in dependency order, so a section may refer
    /// to names declared in any other section.
    ///
    /// # Returns
    ///
    /// * `Ok(InMemoryPolicy)` - The populated policy.
    /// * `Err` - `ResolutionError` for unknown names, `ConsistencyError`
    ///   for invalid levels or ranges, `ConstructionError` for bad literals.
    pub fn into_policy(self) -> Result<InMemoryPolicy> {
        let policy = InMemoryPolicy::new();

        for attr in &self.attributes {
            policy.add_element(ElementKind::Attribute, &attr.name)?;
        }
        for decl in &self.types {
            let handle = policy.add_element(ElementKind::Type, &decl.name)?;
            for alias in &decl.aliases {
                policy.add_alias(handle, alias)?;
            }
            for attr in &decl.attributes {
                let attr = policy.resolve_by_name(ElementKind::Attribute, attr)?;
                policy.assign_attribute(handle, attr)?;
            }
        }

        for decl in &self.categories {
            let handle = policy.add_element(ElementKind::Category, &decl.name)?;
            for alias in &decl.aliases {
                policy.add_alias(handle, alias)?;
            }
        }
        for decl in &self.sensitivities {
            let handle = policy.add_element(ElementKind::Level, &decl.name)?;
            for alias in &decl.aliases {
                policy.add_alias(handle, alias)?;
            }
        }
        for decl in &self.sensitivities {
            let handle = policy.resolve_by_name(ElementKind::Level, &decl.name)?;
            if decl.categories.is_empty() {
                continue;
            }
            let literal = format!("{}:{}", decl.name, decl.categories.join(","));
            let level = MlsLevel::parse(&policy, &literal)?;
            for cat in level.categories() {
                let cat = policy.resolve_by_name(ElementKind::Category, cat)?;
                policy.relate(handle, Relation::Categories, cat)?;
            }
        }

        for decl in &self.roles {
            let handle = policy.add_element(ElementKind::Role, &decl.name)?;
            for name in &decl.types {
                let type_handle = resolve_type_or_attribute(&policy, name)?;
                policy.add_role_type(handle, type_handle)?;
            }
        }

        for decl in &self.commons {
            let handle = policy.add_element(ElementKind::Common, &decl.name)?;
            for perm in &decl.permissions {
                let perm = permission(&policy, perm)?;
                policy.relate(handle, Relation::Permissions, perm)?;
            }
        }
        for decl in &self.classes {
            let handle = policy.add_element(ElementKind::Class, &decl.name)?;
            if let Some(common) = &decl.common {
                let common = policy.resolve_by_name(ElementKind::Common, common)?;
                policy.relate(handle, Relation::Common, common)?;
            }
            for perm in &decl.permissions {
                let perm = permission(&policy, perm)?;
                policy.relate(handle, Relation::Permissions, perm)?;
            }
        }

        for decl in &self.booleans {
            let handle = policy.add_element(ElementKind::Bool, &decl.name)?;
            policy.set_bool_state(handle, decl.state)?;
        }

        for decl in &self.users {
            let handle = policy.add_element(ElementKind::User, &decl.name)?;
            for role in &decl.roles {
                let role = policy.resolve_by_name(ElementKind::Role, role)?;
                policy.add_user_role(handle, role)?;
            }
            if let Some(literal) = &decl.default_level {
                let level = MlsLevel::parse(&policy, literal)?;
                if !level.validate(&policy)? {
                    return Err(ConsistencyError::InvalidLevel(literal.clone()).into());
                }
                policy.set_default_level(handle, level_spec(&policy, &level)?)?;
            }
            if let Some(literal) = &decl.range {
                let range = MlsRange::parse(&policy, literal)?;
                range.ensure_valid(&policy)?;
                policy.set_range(handle, range_spec(&policy, &range)?)?;
            }
        }

        self.add_rules(&policy)?;

        debug!(
            types = policy.count(ElementKind::Type),
            roles = policy.count(ElementKind::Role),
            users = policy.count(ElementKind::User),
            av_rules = policy.count(ElementKind::AvRule),
            te_rules = policy.count(ElementKind::TeRule),
            "loaded policy snapshot"
        );
        Ok(policy)
    }

    fn add_rules(&self, policy: &InMemoryPolicy) -> Result<()> {
        for decl in &self.av_rules {
            let rule_type = rule_type(&decl.rule, RuleTypes::AV_RULES, "av rule type")?;
            if decl.permissions.is_empty() {
                warn!(rule = %decl.rule, source = %decl.source, target = %decl.target, "skipping av rule without permissions");
                continue;
            }
            let mut def = RuleDef::new(
                ElementKind::AvRule,
                rule_type,
                resolve_type_or_attribute(policy, &decl.source)?,
                resolve_type_or_attribute(policy, &decl.target)?,
            );
            def.class = Some(policy.resolve_by_name(ElementKind::Class, &decl.class)?);
            def.permissions = decl
                .permissions
                .iter()
                .map(|p| policy.resolve_by_name(ElementKind::Permission, p))
                .collect::<Result<_>>()?;
            def.cond_booleans = resolve_all(policy, ElementKind::Bool, &decl.conditional)?;
            policy.add_rule(def)?;
        }

        for decl in &self.te_rules {
            let rule_type = rule_type(&decl.rule, RuleTypes::TE_RULES, "type rule type")?;
            let mut def = RuleDef::new(
                ElementKind::TeRule,
                rule_type,
                resolve_type_or_attribute(policy, &decl.source)?,
                resolve_type_or_attribute(policy, &decl.target)?,
            );
            def.class = Some(policy.resolve_by_name(ElementKind::Class, &decl.class)?);
            def.default = Some(policy.resolve_by_name(ElementKind::Type, &decl.default)?);
            def.cond_booleans = resolve_all(policy, ElementKind::Bool, &decl.conditional)?;
            policy.add_rule(def)?;
        }

        for decl in &self.role_allows {
            policy.add_rule(RuleDef::new(
                ElementKind::RoleAllow,
                RuleTypes::ALLOW,
                policy.resolve_by_name(ElementKind::Role, &decl.source)?,
                policy.resolve_by_name(ElementKind::Role, &decl.target)?,
            ))?;
        }

        for decl in &self.role_transitions {
            let mut def = RuleDef::new(
                ElementKind::RoleTrans,
                RuleTypes::empty(),
                policy.resolve_by_name(ElementKind::Role, &decl.source)?,
                resolve_type_or_attribute(policy, &decl.target)?,
            );
            def.default = Some(policy.resolve_by_name(ElementKind::Role, &decl.default)?);
            policy.add_rule(def)?;
        }

        for decl in &self.range_transitions {
            let range = MlsRange::parse(policy, &decl.range)?;
            range.ensure_valid(policy)?;
            let mut def = RuleDef::new(
                ElementKind::RangeTrans,
                RuleTypes::empty(),
                resolve_type_or_attribute(policy, &decl.source)?,
                resolve_type_or_attribute(policy, &decl.target)?,
            );
            def.class = Some(policy.resolve_by_name(ElementKind::Class, &decl.class)?);
            def.range = Some(range_spec(policy, &range)?);
            policy.add_rule(def)?;
        }
        Ok(())
    }
}

/// Describe a bound level in terms of handles.
pub fn level_spec(accessor: &dyn PolicyAccessor, level: &MlsLevel) -> Result<LevelSpec> {
    if !level.is_bound() {
        return Err(ResolutionError::Unbound(level.to_string()).into());
    }
    Ok(LevelSpec {
        sensitivity: accessor.resolve_by_name(ElementKind::Level, level.sensitivity())?,
        categories: resolve_all(accessor, ElementKind::Category, level.categories())?,
    })
}

/// Describe a bound range in terms of handles.
pub fn range_spec(accessor: &dyn PolicyAccessor, range: &MlsRange) -> Result<RangeSpec> {
    Ok(RangeSpec {
        low: level_spec(accessor, range.low())?,
        high: range.high().map(|high| level_spec(accessor, high)).transpose()?,
    })
}

fn resolve_all(
    accessor: &dyn PolicyAccessor,
    kind: ElementKind,
    names: &[String],
) -> Result<Vec<ElementHandle>> {
    names
        .iter()
        .map(|name| accessor.resolve_by_name(kind, name))
        .collect()
}

fn resolve_type_or_attribute(accessor: &dyn PolicyAccessor, name: &str) -> Result<ElementHandle> {
    accessor
        .resolve_by_name(ElementKind::Type, name)
        .or_else(|_| accessor.resolve_by_name(ElementKind::Attribute, name))
}

fn permission(policy: &InMemoryPolicy, name: &str) -> Result<ElementHandle> {
    match policy.resolve_by_name(ElementKind::Permission, name) {
        Ok(handle) => Ok(handle),
        Err(_) => policy.add_element(ElementKind::Permission, name),
    }
}

fn rule_type(keyword: &str, allowed: RuleTypes, what: &'static str) -> Result<RuleTypes> {
    let parsed: RuleTypes = keyword.parse()?;
    if parsed.keyword().is_none() || !allowed.contains(parsed) {
        return Err(ConstructionError::UnknownKeyword {
            what,
            value: keyword.to_string(),
        }
        .into());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_fixtures::{mls_policy, POLICY_TOML};

    #[test]
    fn test_fixture_loads() {
        let policy = mls_policy();
        let httpd = policy.resolve_by_name(ElementKind::Type, "httpd_t").unwrap();
        let web = policy.resolve_by_name(ElementKind::Type, "web_t").unwrap();
        assert_eq!(policy.primary(web).unwrap(), httpd);

        let s0 = policy.resolve_by_name(ElementKind::Level, "s0").unwrap();
        let legal = policy.related(s0, Relation::Categories).unwrap();
        assert_eq!(legal.len(), 6);

        assert!(policy.count(ElementKind::AvRule) > 0);
    }

    #[test]
    fn test_rule_text() {
        let policy = mls_policy();
        let names: Vec<String> = policy
            .enumerate(ElementKind::RangeTrans)
            .unwrap()
            .into_iter()
            .map(|h| policy.render_name(h).unwrap())
            .collect();
        assert_eq!(names, vec!["range_transition sshd_t httpd_exec_t:process s0 - s1:c0.c3;"]);
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = PolicySnapshot::from_toml_str(POLICY_TOML).unwrap();
        let json = snapshot.to_json().unwrap();
        assert_eq!(PolicySnapshot::from_json_str(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("policy.toml");
        std::fs::write(&toml_path, POLICY_TOML).unwrap();
        let snapshot = PolicySnapshot::load(&toml_path).unwrap();

        let json_path = dir.path().join("policy.json");
        std::fs::write(&json_path, snapshot.to_json().unwrap()).unwrap();
        assert_eq!(PolicySnapshot::load(&json_path).unwrap(), snapshot);

        assert!(matches!(
            PolicySnapshot::load(dir.path().join("missing.toml")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_unknown_reference() {
        let text = r#"
            [[types]]
            name = "httpd_t"
            attributes = ["nosuch"]
        "#;
        let err = PolicySnapshot::from_toml_str(text).unwrap().into_policy().unwrap_err();
        assert!(matches!(err, Error::Resolution(ResolutionError::NotFound { .. })));
    }

    #[test]
    fn test_inverted_user_range() {
        let text = r#"
            [[sensitivities]]
            name = "s0"
            [[sensitivities]]
            name = "s1"
            [[users]]
            name = "u"
            range = "s1 - s0"
        "#;
        let err = PolicySnapshot::from_toml_str(text).unwrap().into_policy().unwrap_err();
        assert!(matches!(err, Error::Consistency(ConsistencyError::RangeOrder { .. })));
    }

    #[test]
    fn test_bad_rule_keyword() {
        let text = r#"
            [[types]]
            name = "a_t"
            [[classes]]
            name = "file"
            permissions = ["read"]
            [[av_rules]]
            rule = "type_transition"
            source = "a_t"
            target = "a_t"
            class = "file"
            permissions = ["read"]
        "#;
        let err = PolicySnapshot::from_toml_str(text).unwrap().into_policy().unwrap_err();
        assert!(matches!(err, Error::Construction(ConstructionError::UnknownKeyword { .. })));
    }

    #[test]
    fn test_av_rule_without_permissions_is_skipped() {
        let text = r#"
            [[types]]
            name = "a_t"
            [[classes]]
            name = "file"
            [[av_rules]]
            rule = "allow"
            source = "a_t"
            target = "a_t"
            class = "file"
        "#;
        let policy = PolicySnapshot::from_toml_str(text).unwrap().into_policy().unwrap();
        assert_eq!(policy.count(ElementKind::AvRule), 0);
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            PolicySnapshot::from_toml_str("[[types]\nname = 1"),
            Err(Error::Serialization(_))
        ));
    }
}
