//! In-memory policy accessor.
//!
//! This module provides an in-memory implementation of `PolicyAccessor`.
//! Elements are inserted through `&self` methods while the policy is being
//! assembled, after which the policy is only read.

use dashmap::DashMap;
use parking_lot::RwLock;
use polscope_core::error::{ResolutionError, Result, UsageError};
use polscope_core::types::{ElementKind, LevelSpec, RangeSpec, Relation, RuleTypes};
use polscope_core::{ElementHandle, PolicyAccessor};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::model::MlsRange;

/// Everything stored about one element.
#[derive(Debug, Clone, Default)]
struct ElementRecord {
    name: String,
    ordinal: u32,
    alias_of: Option<ElementHandle>,
    relations: HashMap<Relation, Vec<ElementHandle>>,
    rule_type: Option<RuleTypes>,
    state: Option<bool>,
    default_level: Option<LevelSpec>,
    range: Option<RangeSpec>,
}

/// The parts of a rule, given as handles.
#[derive(Debug, Clone)]
pub struct RuleDef {
    /// The kind of rule: av, te, role allow, role_transition or range_transition.
    pub kind: ElementKind,

    /// The rule type flag.
    pub rule_type: RuleTypes,

    /// The source type, attribute or role.
    pub source: ElementHandle,

    /// The target type, attribute or role.
    pub target: ElementHandle,

    /// The object class, when the rule has one.
    pub class: Option<ElementHandle>,

    /// The default type or role, when the rule has one.
    pub default: Option<ElementHandle>,

    /// The permissions of an av rule.
    pub permissions: Vec<ElementHandle>,

    /// The booleans of the conditional the rule sits in.
    pub cond_booleans: Vec<ElementHandle>,

    /// The new range of a range_transition rule.
    pub range: Option<RangeSpec>,
}

impl RuleDef {
    /// Create a rule with a source and target and nothing else.
    pub fn new(kind: ElementKind, rule_type: RuleTypes, source: ElementHandle, target: ElementHandle) -> Self {
        Self {
            kind,
            rule_type,
            source,
            target,
            class: None,
            default: None,
            permissions: Vec::new(),
            cond_booleans: Vec::new(),
            range: None,
        }
    }
}

/// An in-memory policy.
#[derive(Clone, Debug)]
pub struct InMemoryPolicy {
    /// The element records, indexed by handle.
    records: Arc<DashMap<ElementHandle, ElementRecord>>,

    /// Name lookup for symbols and aliases.
    names: Arc<DashMap<(ElementKind, String), ElementHandle>>,

    /// Handles of each kind in declaration order.
    order: Arc<RwLock<HashMap<ElementKind, Vec<ElementHandle>>>>,

    /// Number of primary (non-alias) elements of each kind.
    primaries: Arc<DashMap<ElementKind, u32>>,
}

impl InMemoryPolicy {
    /// Create a new, empty policy.
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            names: Arc::new(DashMap::new()),
            order: Arc::new(RwLock::new(HashMap::new())),
            primaries: Arc::new(DashMap::new()),
        }
    }

    /// Declare a named element.
    ///
    /// # Arguments
    ///
    /// * `kind` - The element kind.
    /// * `name` - The element's primary name.
    ///
    /// # Returns
    ///
    /// * `Ok(ElementHandle)` - The new element.
    /// * `Err` - If an element of that kind and name already exists.
    pub fn add_element(&self, kind: ElementKind, name: &str) -> Result<ElementHandle> {
        self.declare(kind, name, None)
    }

    // `alias_of` carries the primary and its ordinal; primaries take the
    // next ordinal of their kind.
    fn declare(
        &self,
        kind: ElementKind,
        name: &str,
        alias_of: Option<(ElementHandle, u32)>,
    ) -> Result<ElementHandle> {
        if self.names.contains_key(&(kind, name.to_string())) {
            return Err(UsageError::Invalid(format!("{} {} is declared twice", kind, name)).into());
        }

        let handle = {
            let mut order = self.order.write();
            let handles = order.entry(kind).or_default();
            let ordinal = match alias_of {
                Some((_, ordinal)) => ordinal,
                None => {
                    let mut count = self.primaries.entry(kind).or_insert(0);
                    *count += 1;
                    *count
                }
            };
            let handle = ElementHandle::new(kind, handles.len() as u32);
            handles.push(handle);
            self.records.insert(
                handle,
                ElementRecord {
                    name: name.to_string(),
                    ordinal,
                    alias_of: alias_of.map(|(primary, _)| primary),
                    ..Default::default()
                },
            );
            handle
        };

        self.names.insert((kind, name.to_string()), handle);
        trace!(%handle, name, "declared element");
        Ok(handle)
    }

    /// Declare an alias of an existing element.
    ///
    /// The alias shares its primary's ordinal.
    pub fn add_alias(&self, primary: ElementHandle, alias: &str) -> Result<ElementHandle> {
        let kind = primary.kind();
        if !kind.has_aliases() {
            return Err(UsageError::Invalid(format!("{} elements cannot have aliases", kind)).into());
        }
        let ordinal = self.ordinal(primary)?;
        let handle = self.declare(kind, alias, Some((primary, ordinal)))?;
        self.relate(primary, Relation::Aliases, handle)?;
        Ok(handle)
    }

    /// Add `to` to the `relation` list of `from`.
    pub fn relate(&self, from: ElementHandle, relation: Relation, to: ElementHandle) -> Result<()> {
        if !self.records.contains_key(&to) {
            return Err(ResolutionError::UnknownHandle(to).into());
        }
        let mut record = self
            .records
            .get_mut(&from)
            .ok_or(ResolutionError::UnknownHandle(from))?;
        let related = record.relations.entry(relation).or_default();
        if !related.contains(&to) {
            related.push(to);
        }
        Ok(())
    }

    /// Assign an attribute to a type, recording both directions.
    pub fn assign_attribute(&self, type_handle: ElementHandle, attribute: ElementHandle) -> Result<()> {
        self.relate(type_handle, Relation::Attributes, attribute)?;
        self.relate(attribute, Relation::Types, type_handle)
    }

    /// Authorise a type for a role, recording both directions.
    pub fn add_role_type(&self, role: ElementHandle, type_handle: ElementHandle) -> Result<()> {
        self.relate(role, Relation::Types, type_handle)?;
        self.relate(type_handle, Relation::Roles, role)
    }

    /// Authorise a role for a user, recording both directions.
    pub fn add_user_role(&self, user: ElementHandle, role: ElementHandle) -> Result<()> {
        self.relate(user, Relation::Roles, role)?;
        self.relate(role, Relation::Users, user)
    }

    /// Set the default state of a boolean.
    pub fn set_bool_state(&self, boolean: ElementHandle, state: bool) -> Result<()> {
        self.update(boolean, |record| record.state = Some(state))
    }

    /// Set the default level of a user.
    pub fn set_default_level(&self, user: ElementHandle, level: LevelSpec) -> Result<()> {
        self.update(user, |record| record.default_level = Some(level))
    }

    /// Set the range of a user.
    pub fn set_range(&self, user: ElementHandle, range: RangeSpec) -> Result<()> {
        self.update(user, |record| record.range = Some(range))
    }

    /// Add a rule.
    ///
    /// The rule's name is its rendered text, which is what proofs show.
    ///
    /// # Returns
    ///
    /// * `Ok(ElementHandle)` - The new rule.
    /// * `Err` - If `def.kind` is not a rule kind or a handle is unknown.
    pub fn add_rule(&self, def: RuleDef) -> Result<ElementHandle> {
        if !def.kind.is_rule() {
            return Err(UsageError::Invalid(format!("{} is not a rule kind", def.kind)).into());
        }
        let text = self.rule_text(&def)?;

        let handle = {
            let mut order = self.order.write();
            let handles = order.entry(def.kind).or_default();
            let handle = ElementHandle::new(def.kind, handles.len() as u32);
            handles.push(handle);
            handle
        };
        self.records.insert(
            handle,
            ElementRecord {
                name: text,
                ordinal: handle.index() + 1,
                rule_type: Some(def.rule_type),
                range: def.range,
                ..Default::default()
            },
        );

        self.relate(handle, Relation::Source, def.source)?;
        self.relate(handle, Relation::Target, def.target)?;
        if let Some(class) = def.class {
            self.relate(handle, Relation::Class, class)?;
        }
        if let Some(default) = def.default {
            self.relate(handle, Relation::Default, default)?;
        }
        for perm in def.permissions {
            self.relate(handle, Relation::Permissions, perm)?;
        }
        for boolean in def.cond_booleans {
            self.relate(handle, Relation::CondBooleans, boolean)?;
        }
        trace!(%handle, "added rule");
        Ok(handle)
    }

    /// Count the elements of a kind, aliases included.
    pub fn count(&self, kind: ElementKind) -> usize {
        self.order.read().get(&kind).map_or(0, Vec::len)
    }

    fn update(&self, handle: ElementHandle, f: impl FnOnce(&mut ElementRecord)) -> Result<()> {
        let mut record = self
            .records
            .get_mut(&handle)
            .ok_or(ResolutionError::UnknownHandle(handle))?;
        f(&mut record);
        Ok(())
    }

    fn with_record<R>(&self, handle: ElementHandle, f: impl FnOnce(&ElementRecord) -> R) -> Result<R> {
        let record = self
            .records
            .get(&handle)
            .ok_or(ResolutionError::UnknownHandle(handle))?;
        Ok(f(&record))
    }

    fn rule_text(&self, def: &RuleDef) -> Result<String> {
        let source = self.render_name(def.source)?;
        let target = self.render_name(def.target)?;
        let object = match def.class {
            Some(class) => format!("{}:{}", target, self.render_name(class)?),
            None => target,
        };

        let tail = match def.kind {
            ElementKind::AvRule => {
                let perms = def
                    .permissions
                    .iter()
                    .map(|p| self.render_name(*p))
                    .collect::<Result<Vec<_>>>()?;
                match perms.as_slice() {
                    [single] => single.clone(),
                    many => format!("{{ {} }}", many.join(" ")),
                }
            }
            ElementKind::TeRule | ElementKind::RoleTrans => match def.default {
                Some(default) => self.render_name(default)?,
                None => String::new(),
            },
            ElementKind::RangeTrans => match &def.range {
                Some(spec) => MlsRange::from_spec(self, spec)?.render(self)?,
                None => String::new(),
            },
            _ => String::new(),
        };

        let keyword = match def.kind {
            ElementKind::RoleAllow => "allow",
            ElementKind::RoleTrans => "role_transition",
            ElementKind::RangeTrans => "range_transition",
            _ => def.rule_type.keyword().unwrap_or("rule"),
        };

        let mut text = format!("{} {} {}", keyword, source, object);
        if !tail.is_empty() {
            text.push(' ');
            text.push_str(&tail);
        }
        text.push(';');
        Ok(text)
    }
}

impl Default for InMemoryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyAccessor for InMemoryPolicy {
    fn enumerate(&self, kind: ElementKind) -> Result<Vec<ElementHandle>> {
        if matches!(
            kind,
            ElementKind::String
                | ElementKind::FcEntry
                | ElementKind::MlsLevel
                | ElementKind::MlsRange
                | ElementKind::BoolState
        ) {
            return Err(UsageError::Invalid(format!("{} elements are not stored in a policy", kind)).into());
        }
        Ok(self.order.read().get(&kind).cloned().unwrap_or_default())
    }

    fn resolve_by_name(&self, kind: ElementKind, name: &str) -> Result<ElementHandle> {
        self.names
            .get(&(kind, name.to_string()))
            .map(|h| *h.value())
            .ok_or_else(|| {
                ResolutionError::NotFound {
                    kind,
                    name: name.to_string(),
                }
                .into()
            })
    }

    fn ordinal(&self, handle: ElementHandle) -> Result<u32> {
        self.with_record(handle, |r| r.ordinal)
    }

    fn related(&self, handle: ElementHandle, relation: Relation) -> Result<Vec<ElementHandle>> {
        self.with_record(handle, |r| match relation {
            Relation::Primary => r.alias_of.into_iter().collect(),
            other => r.relations.get(&other).cloned().unwrap_or_default(),
        })
    }

    fn render_name(&self, handle: ElementHandle) -> Result<String> {
        self.with_record(handle, |r| r.name.clone())
    }

    fn is_alias(&self, handle: ElementHandle) -> Result<bool> {
        self.with_record(handle, |r| r.alias_of.is_some())
    }

    fn rule_type(&self, handle: ElementHandle) -> Result<RuleTypes> {
        self.with_record(handle, |r| r.rule_type)?.ok_or_else(|| {
            ResolutionError::WrongKind {
                handle,
                expected: ElementKind::AvRule,
            }
            .into()
        })
    }

    fn bool_state(&self, handle: ElementHandle) -> Result<bool> {
        self.with_record(handle, |r| r.state)?.ok_or_else(|| {
            ResolutionError::WrongKind {
                handle,
                expected: ElementKind::Bool,
            }
            .into()
        })
    }

    fn default_level(&self, handle: ElementHandle) -> Result<Option<LevelSpec>> {
        if handle.kind() != ElementKind::User {
            return Err(ResolutionError::WrongKind {
                handle,
                expected: ElementKind::User,
            }
            .into());
        }
        self.with_record(handle, |r| r.default_level.clone())
    }

    fn mls_range(&self, handle: ElementHandle) -> Result<Option<RangeSpec>> {
        if !matches!(handle.kind(), ElementKind::User | ElementKind::RangeTrans) {
            return Err(ResolutionError::WrongKind {
                handle,
                expected: ElementKind::User,
            }
            .into());
        }
        self.with_record(handle, |r| r.range.clone())
    }
}
