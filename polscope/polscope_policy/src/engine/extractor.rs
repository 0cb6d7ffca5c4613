//! Test candidates and value extraction.
//!
//! A test does not look at the top-level candidate directly. It gathers
//! sub-elements (the candidate's attributes, every av rule, its default
//! level, ...) and extracts from each one the value a criterion's operator
//! compares.

use polscope_core::error::{Result, UsageError};
use polscope_core::types::{ElementKind, Relation};
use polscope_core::{ElementHandle, PolicyAccessor};

use crate::model::{
    FcEntry, FileContextList, MatchValue, MlsLevel, MlsRange, Operator, Proof, TestCondition,
};

/// A sub-element a test examines.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// A bare name, such as the candidate's name or one of its aliases.
    Name(String),
    /// A policy element.
    Element(ElementHandle),
    /// An MLS level.
    Level(MlsLevel),
    /// An MLS range.
    Range(MlsRange),
    /// A boolean state.
    State(bool),
    /// An entry of the file-context list, by position.
    FcEntry(usize),
}

/// Gathers test candidates and extracts comparison values from them.
pub struct ValueExtractor<'a> {
    /// The policy.
    accessor: &'a dyn PolicyAccessor,

    /// File contexts, when supplied.
    fclist: Option<&'a FileContextList>,
}

impl<'a> ValueExtractor<'a> {
    /// Create a new extractor.
    ///
    /// # Arguments
    ///
    /// * `accessor` - The policy.
    /// * `fclist` - File contexts for `FcEntry` tests.
    pub fn new(accessor: &'a dyn PolicyAccessor, fclist: Option<&'a FileContextList>) -> Self {
        Self { accessor, fclist }
    }

    /// Gather the sub-elements a test with `condition` examines for one
    /// top-level candidate.
    ///
    /// Rule and file-context conditions examine every rule or entry; the
    /// identifier `X` is what ties them to the candidate.
    ///
    /// # Arguments
    ///
    /// * `condition` - The test condition.
    /// * `handle` - The top-level candidate.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Candidate>)` - The sub-elements, possibly empty.
    /// * `Err` - If the policy cannot answer, or a file-context test has
    ///   no list.
    pub fn candidates(&self, condition: TestCondition, handle: ElementHandle) -> Result<Vec<Candidate>> {
        let accessor = self.accessor;
        let subject = accessor.primary(handle)?;
        let elements = |relation: Relation| -> Result<Vec<Candidate>> {
            Ok(accessor
                .related(subject, relation)?
                .into_iter()
                .map(Candidate::Element)
                .collect())
        };

        match condition {
            TestCondition::Name => Ok(vec![Candidate::Name(accessor.render_name(handle)?)]),
            TestCondition::Alias => accessor
                .related(subject, Relation::Aliases)?
                .into_iter()
                .map(|alias| accessor.render_name(alias).map(Candidate::Name))
                .collect(),
            TestCondition::Attributes => elements(Relation::Attributes),
            TestCondition::Roles => elements(Relation::Roles),
            TestCondition::Types => elements(Relation::Types),
            TestCondition::Users => elements(Relation::Users),
            TestCondition::Common => elements(Relation::Common),
            TestCondition::Categories => elements(Relation::Categories),
            TestCondition::Permissions => {
                let mut perms = accessor.related(subject, Relation::Permissions)?;
                for common in accessor.related(subject, Relation::Common)? {
                    for perm in accessor.related(common, Relation::Permissions)? {
                        if !perms.contains(&perm) {
                            perms.push(perm);
                        }
                    }
                }
                Ok(perms.into_iter().map(Candidate::Element).collect())
            }
            TestCondition::AvRule
            | TestCondition::TeRule
            | TestCondition::RoleAllow
            | TestCondition::RoleTrans
            | TestCondition::RangeTrans => Ok(accessor
                .enumerate(condition.candidate_kind())?
                .into_iter()
                .map(Candidate::Element)
                .collect()),
            TestCondition::FcEntry => {
                let fclist = self.file_contexts()?;
                Ok((0..fclist.len()).map(Candidate::FcEntry).collect())
            }
            TestCondition::DefaultLevel => Ok(accessor
                .default_level(subject)?
                .map(|spec| MlsLevel::from_spec(accessor, &spec))
                .transpose()?
                .map(Candidate::Level)
                .into_iter()
                .collect()),
            TestCondition::Range => Ok(accessor
                .mls_range(subject)?
                .map(|spec| MlsRange::from_spec(accessor, &spec))
                .transpose()?
                .map(Candidate::Range)
                .into_iter()
                .collect()),
            TestCondition::State => Ok(vec![Candidate::State(accessor.bool_state(subject)?)]),
        }
    }

    /// Extract the value an operator compares.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(MatchValue))` - The value.
    /// * `Ok(None)` - The candidate has nothing for this operator, such as
    ///   a rule without a default.
    /// * `Err` - If the policy cannot answer.
    pub fn extract(&self, operator: Operator, candidate: &Candidate) -> Result<Option<MatchValue>> {
        let value = match candidate {
            Candidate::Name(name) => match operator {
                Operator::Is | Operator::MatchRegex => Some(MatchValue::Str(name.clone())),
                _ => None,
            },
            Candidate::State(state) => match operator {
                Operator::Is => Some(MatchValue::Bool(*state)),
                _ => None,
            },
            Candidate::Level(level) => match operator {
                Operator::AsLevelExact | Operator::AsLevelDom | Operator::AsLevelDomby => {
                    Some(MatchValue::Level(level.clone()))
                }
                _ => None,
            },
            Candidate::Range(range) if operator.is_range_operator() => Some(MatchValue::Range(range.clone())),
            Candidate::Range(_) => None,
            Candidate::Element(handle) => self.extract_from_element(operator, *handle)?,
            Candidate::FcEntry(index) => self.extract_from_entry(operator, *index)?,
        };
        Ok(value)
    }

    /// Build the proof a surviving candidate yields.
    pub fn proof(&self, condition: TestCondition, candidate: &Candidate) -> Result<Proof> {
        let kind = condition.candidate_kind();
        let (element, text) = match candidate {
            Candidate::Name(name) => (None, name.clone()),
            Candidate::Element(handle) => (Some(*handle), self.accessor.render_name(*handle)?),
            Candidate::Level(level) => (None, level.render(self.accessor)?),
            Candidate::Range(range) => (None, range.render(self.accessor)?),
            Candidate::State(state) => (None, state.to_string()),
            Candidate::FcEntry(index) => (None, self.entry(*index)?.to_string()),
        };
        Ok(Proof::new(condition, kind, element, text))
    }

    fn extract_from_element(&self, operator: Operator, handle: ElementHandle) -> Result<Option<MatchValue>> {
        let names = |relations: &[Relation]| -> Result<Option<MatchValue>> {
            let mut names = Vec::new();
            for relation in relations {
                for related in self.accessor.related(handle, *relation)? {
                    for name in self.expanded_names(related)? {
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
            }
            Ok((!names.is_empty()).then_some(MatchValue::NameList(names)))
        };

        match operator {
            Operator::Include => Ok(Some(MatchValue::NameList(self.accessor.all_names(handle)?))),
            Operator::RuleType => Ok(Some(MatchValue::RuleType(self.accessor.rule_type(handle)?))),
            Operator::AsSource => names(&[Relation::Source]),
            Operator::AsTarget => names(&[Relation::Target]),
            Operator::AsClass => names(&[Relation::Class]),
            Operator::AsDefault => names(&[Relation::Default]),
            Operator::AsPerm => names(&[Relation::Permissions]),
            Operator::InCond => names(&[Relation::CondBooleans]),
            Operator::AsSrcTgt => names(&[Relation::Source, Relation::Target]),
            Operator::AsSrcDflt => names(&[Relation::Source, Relation::Default]),
            Operator::AsSrcTgtDflt => names(&[Relation::Source, Relation::Target, Relation::Default]),
            op if op.is_range_operator() => Ok(self
                .accessor
                .mls_range(handle)?
                .map(|spec| MlsRange::from_spec(self.accessor, &spec))
                .transpose()?
                .map(MatchValue::Range)),
            _ => Ok(None),
        }
    }

    fn extract_from_entry(&self, operator: Operator, index: usize) -> Result<Option<MatchValue>> {
        let entry = self.entry(index)?;
        let Some(context) = &entry.context else {
            return Ok(None);
        };
        let value = match operator {
            Operator::AsUser => Some(MatchValue::Str(context.user.clone())),
            Operator::AsRole => Some(MatchValue::Str(context.role.clone())),
            Operator::AsType => Some(MatchValue::Str(context.type_name.clone())),
            Operator::AsClass => entry
                .class
                .class_name()
                .map(|name| MatchValue::Str(name.to_string())),
            op if op.is_range_operator() => entry.range(self.accessor)?.map(MatchValue::Range),
            _ => None,
        };
        Ok(value)
    }

    /// Every name an element answers to, with indirect names: an
    /// attribute also answers to its member types and a type to its
    /// attributes.
    fn expanded_names(&self, handle: ElementHandle) -> Result<Vec<String>> {
        let mut names = self.accessor.all_names(handle)?;
        let indirect = match handle.kind() {
            ElementKind::Attribute => Some(Relation::Types),
            ElementKind::Type => Some(Relation::Attributes),
            _ => None,
        };
        if let Some(relation) = indirect {
            let primary = self.accessor.primary(handle)?;
            for related in self.accessor.related(primary, relation)? {
                names.extend(self.accessor.all_names(related)?);
            }
        }
        Ok(names)
    }

    fn file_contexts(&self) -> Result<&'a FileContextList> {
        self.fclist.ok_or_else(|| {
            UsageError::MissingFileContexts(TestCondition::FcEntry.keyword().to_string()).into()
        })
    }

    fn entry(&self, index: usize) -> Result<&'a FcEntry> {
        self.file_contexts()?.get(index).ok_or_else(|| {
            UsageError::Invalid(format!("file context entry {} does not exist", index)).into()
        })
    }
}
