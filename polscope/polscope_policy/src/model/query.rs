//! Queries, tests and criteria.
//!
//! A [`Query`] selects elements of one kind. Each [`Test`] examines one
//! aspect of a candidate (its name, its attributes, the rules it appears
//! in, ...) through a list of [`Criterion`]s. Every combination is checked
//! against the compatibility tables as it is added, so a query that has
//! been built can always be run.
//!
//! # Examples
//!
//! ```ignore
//! let mut query = Query::new(ElementKind::Type, MatchMode::All)?;
//!
//! let mut name = Test::new(ElementKind::Type, TestCondition::Name)?;
//! name.add_criterion(Criterion::parse(&name, Operator::MatchRegex, false, "^httpd_", false)?)?;
//! query.add_test(name)?;
//!
//! let results = query.run(&policy, None)?;
//! ```

use polscope_core::error::{IncompatibleQueryError, Result};
use polscope_core::types::ElementKind;
use polscope_core::PolicyAccessor;

use super::condition::{MatchMode, Operator, ParamType, TestCondition};
use super::fc::FileContextList;
use super::parameter::Parameter;
use super::result::SearchResult;
use crate::engine::QueryEvaluator;

/// One comparison inside a test.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    operator: Operator,
    negated: bool,
    parameter: Parameter,
}

impl Criterion {
    /// Create a criterion.
    ///
    /// The combination is checked when the criterion is added to a test.
    pub fn new(operator: Operator, negated: bool, parameter: Parameter) -> Self {
        Self {
            operator,
            negated,
            parameter,
        }
    }

    /// Build a criterion whose parameter is parsed from text.
    ///
    /// # Arguments
    ///
    /// * `test` - The test the criterion is meant for; it fixes the parameter type.
    /// * `operator` - The operator.
    /// * `negated` - Whether the outcome is inverted.
    /// * `text` - The parameter as written.
    /// * `ignore_case` - Case sensitivity for a regular expression.
    ///
    /// # Returns
    ///
    /// * `Ok(Criterion)` - The criterion.
    /// * `Err` - If the operator does not fit the test or the text does not
    ///   parse as the operator's parameter type.
    pub fn parse(test: &Test, operator: Operator, negated: bool, text: &str, ignore_case: bool) -> Result<Self> {
        let param_type = test.param_type(operator)?;
        Ok(Self::new(
            operator,
            negated,
            Parameter::parse(param_type, text, ignore_case)?,
        ))
    }

    /// Get the operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Check whether the outcome is inverted.
    pub fn negated(&self) -> bool {
        self.negated
    }

    /// Get the parameter.
    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    /// Resolve a level or range parameter against a policy.
    pub(crate) fn bind(&mut self, accessor: &dyn PolicyAccessor) -> Result<()> {
        self.parameter.bind(accessor)
    }
}

/// A condition and the criteria a sub-element must all satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct Test {
    element_kind: ElementKind,
    condition: TestCondition,
    criteria: Vec<Criterion>,
}

impl Test {
    /// Create a test with no criteria.
    ///
    /// # Returns
    ///
    /// * `Ok(Test)` - The test.
    /// * `Err` - `IncompatibleQueryError::Condition` if the condition does
    ///   not apply to `element_kind`.
    pub fn new(element_kind: ElementKind, condition: TestCondition) -> Result<Self> {
        if !condition.is_valid_for(element_kind) {
            return Err(IncompatibleQueryError::Condition {
                element_kind: element_kind.to_string(),
                condition: condition.to_string(),
            }
            .into());
        }
        Ok(Self {
            element_kind,
            condition,
            criteria: Vec::new(),
        })
    }

    /// Get the element kind this test was built for.
    pub fn element_kind(&self) -> ElementKind {
        self.element_kind
    }

    /// Get the condition.
    pub fn condition(&self) -> TestCondition {
        self.condition
    }

    /// Get the criteria.
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Get the operators this test accepts.
    pub fn valid_operators(&self) -> &'static [Operator] {
        self.condition.valid_operators(self.element_kind)
    }

    /// Get the parameter type an operator takes in this test.
    ///
    /// # Returns
    ///
    /// * `Ok(ParamType)` - The parameter type.
    /// * `Err` - `IncompatibleQueryError::Operator` if the operator is not
    ///   valid here.
    pub fn param_type(&self, operator: Operator) -> Result<ParamType> {
        if !self.valid_operators().contains(&operator) {
            return Err(IncompatibleQueryError::Operator {
                element_kind: self.element_kind.to_string(),
                condition: self.condition.to_string(),
                operator: operator.to_string(),
            }
            .into());
        }
        Ok(operator.param_type(self.condition))
    }

    /// Add a criterion.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The criterion was added.
    /// * `Err` - `IncompatibleQueryError` if the operator is not valid for
    ///   this test, the parameter has the wrong type, or the parameter
    ///   uses `X` where the operator does not compare names of the queried
    ///   kind.
    pub fn add_criterion(&mut self, criterion: Criterion) -> Result<()> {
        let expected = self.param_type(criterion.operator)?;
        let actual = criterion.parameter.param_type();
        if actual != expected {
            return Err(IncompatibleQueryError::ParameterType {
                operator: criterion.operator.to_string(),
                parameter: actual.to_string(),
                expected: expected.to_string(),
            }
            .into());
        }
        if criterion.parameter.uses_x()
            && !criterion
                .operator
                .compared_kinds(self.condition)
                .contains(&self.element_kind)
        {
            return Err(IncompatibleQueryError::InvalidX {
                element_kind: self.element_kind.to_string(),
                operator: criterion.operator.to_string(),
            }
            .into());
        }
        self.criteria.push(criterion);
        Ok(())
    }

    /// Copy the test with every level and range parameter bound.
    pub(crate) fn bound(&self, accessor: &dyn PolicyAccessor) -> Result<Test> {
        let mut test = self.clone();
        for criterion in &mut test.criteria {
            criterion.bind(accessor)?;
        }
        Ok(test)
    }
}

/// A search for elements of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    element_kind: ElementKind,
    match_mode: MatchMode,
    include_aliases: bool,
    tests: Vec<Test>,
}

impl Query {
    /// Create a query with no tests.
    ///
    /// # Returns
    ///
    /// * `Ok(Query)` - The query.
    /// * `Err` - `IncompatibleQueryError::NotQueryable` if `element_kind`
    ///   is not a policy symbol.
    pub fn new(element_kind: ElementKind, match_mode: MatchMode) -> Result<Self> {
        if !element_kind.is_symbol() {
            return Err(IncompatibleQueryError::NotQueryable(element_kind.to_string()).into());
        }
        Ok(Self {
            element_kind,
            match_mode,
            include_aliases: false,
            tests: Vec::new(),
        })
    }

    /// Keep or drop alias entries among the candidates. They are dropped by default.
    pub fn with_aliases(mut self, include: bool) -> Self {
        self.include_aliases = include;
        self
    }

    /// Get the queried element kind.
    pub fn element_kind(&self) -> ElementKind {
        self.element_kind
    }

    /// Get the match mode.
    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// Set the match mode.
    pub fn set_match_mode(&mut self, match_mode: MatchMode) {
        self.match_mode = match_mode;
    }

    /// Check whether alias entries are candidates.
    pub fn include_aliases(&self) -> bool {
        self.include_aliases
    }

    /// Get the tests.
    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    /// Add a test.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The test was added.
    /// * `Err` - `IncompatibleQueryError::Condition` if the test was built
    ///   for another element kind.
    pub fn add_test(&mut self, test: Test) -> Result<()> {
        if test.element_kind != self.element_kind {
            return Err(IncompatibleQueryError::Condition {
                element_kind: self.element_kind.to_string(),
                condition: test.condition.to_string(),
            }
            .into());
        }
        self.tests.push(test);
        Ok(())
    }

    /// Check whether any test needs a file-context list.
    pub fn needs_file_contexts(&self) -> bool {
        self.tests
            .iter()
            .any(|t| t.condition == TestCondition::FcEntry)
    }

    /// Run the query.
    ///
    /// # Arguments
    ///
    /// * `accessor` - The policy to search.
    /// * `fclist` - File contexts, required if any test examines them.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<SearchResult>)` - The matching elements in policy order.
    /// * `Err` - `UsageError::MissingFileContexts` if a file-context test
    ///   has no list, or any error resolving parameters or elements.
    pub fn run(
        &self,
        accessor: &dyn PolicyAccessor,
        fclist: Option<&FileContextList>,
    ) -> Result<Vec<SearchResult>> {
        QueryEvaluator::new(accessor, fclist).evaluate(self)
    }
}
