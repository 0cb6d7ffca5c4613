//! The search command
//!
//! Builds a query from `--test` specs, runs it against a policy snapshot,
//! and prints the matched elements with their proofs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use polscope_core::ElementKind;
use polscope_policy::{
    Criterion, FileContextList, MatchMode, Operator, Query, SearchResult, Test, TestCondition,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use super::load_policy;
use crate::settings::{OutputFormat, SearchSettings};

/// Errors in the textual form of a test.
#[derive(Debug, Error)]
pub enum TestSpecError {
    /// The text does not have the `condition:operator[:!]:parameter` shape
    #[error("Malformed test {0:?}: expected condition:operator[:!]:parameter")]
    Malformed(String),
}

/// Arguments for the search command
#[derive(Args)]
pub struct SearchArgs {
    /// Policy snapshot (TOML, or JSON by extension)
    #[clap(long)]
    pub policy: PathBuf,

    /// Element kind to search (type, attribute, role, user, class, common,
    /// category, level, bool)
    #[clap(long)]
    pub kind: ElementKind,

    /// How tests combine (all or any)
    #[clap(long)]
    pub mode: Option<MatchMode>,

    /// Make regex parameters case-insensitive
    #[clap(long)]
    pub ignore_case: bool,

    /// Keep alias entries as candidates
    #[clap(long)]
    pub aliases: bool,

    /// File-context list for fcentry tests
    #[clap(long)]
    pub fc: Option<PathBuf>,

    /// Output format
    #[clap(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// A test, as condition:operator[:!]:parameter; may be repeated
    #[clap(long = "test", required = true)]
    pub tests: Vec<String>,
}

/// One criterion as written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSpec {
    pub condition: String,
    pub operator: String,
    pub negated: bool,
    pub parameter: String,
}

impl TestSpec {
    /// Split a spec into its parts.
    ///
    /// The parameter is everything after the operator (and the optional
    /// `!`), so it may itself contain colons, as levels do.
    pub fn parse(text: &str) -> std::result::Result<Self, TestSpecError> {
        let mut parts = text.splitn(3, ':');
        let (condition, operator, rest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(c), Some(o), Some(r)) if !c.is_empty() && !o.is_empty() => (c, o, r),
            _ => return Err(TestSpecError::Malformed(text.to_string())),
        };

        let (negated, parameter) = match rest.strip_prefix("!:") {
            Some(parameter) => (true, parameter),
            None => (false, rest),
        };

        Ok(Self {
            condition: condition.to_string(),
            operator: operator.to_string(),
            negated,
            parameter: parameter.to_string(),
        })
    }
}

/// Build a query from test specs.
///
/// Specs naming the same condition become criteria of one test, in the
/// order the condition first appears.
///
/// # Arguments
///
/// * `kind` - The element kind to search.
/// * `mode` - How tests combine.
/// * `specs` - The raw `--test` values.
/// * `ignore_case` - Whether regex parameters ignore case.
///
/// # Returns
///
/// * `Ok(Query)` - The assembled query.
/// * `Err` - If a spec is malformed or does not fit the element kind.
pub fn build_query(
    kind: ElementKind,
    mode: MatchMode,
    specs: &[String],
    ignore_case: bool,
) -> Result<Query> {
    let mut tests: Vec<Test> = Vec::new();

    for raw in specs {
        let spec = TestSpec::parse(raw)?;
        let condition: TestCondition = spec.condition.parse()?;
        let operator: Operator = spec.operator.parse()?;

        let position = match tests.iter().position(|t| t.condition() == condition) {
            Some(position) => position,
            None => {
                tests.push(Test::new(kind, condition)?);
                tests.len() - 1
            }
        };
        let test = &mut tests[position];
        let criterion = Criterion::parse(test, operator, spec.negated, &spec.parameter, ignore_case)
            .with_context(|| format!("Invalid test {:?}", raw))?;
        test.add_criterion(criterion)
            .with_context(|| format!("Invalid test {:?}", raw))?;
    }

    let mut query = Query::new(kind, mode)?;
    for test in tests {
        query.add_test(test)?;
    }
    Ok(query)
}

#[derive(Serialize)]
struct ResultRecord {
    name: String,
    proofs: Vec<String>,
}

impl From<&SearchResult> for ResultRecord {
    fn from(result: &SearchResult) -> Self {
        Self {
            name: result.name.clone(),
            proofs: result.proofs.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Serialize)]
struct SearchReport {
    generated_at: DateTime<Utc>,
    element_kind: ElementKind,
    match_mode: MatchMode,
    results: Vec<ResultRecord>,
}

/// Implementation of the search command
pub fn execute_search(args: &SearchArgs, settings: &SearchSettings) -> Result<()> {
    let policy = load_policy(&args.policy)?;

    let fclist = match &args.fc {
        Some(path) => Some(
            FileContextList::from_file(path)
                .with_context(|| format!("Failed to load file contexts from {}", path.display()))?,
        ),
        None => None,
    };

    let mode = args.mode.unwrap_or(settings.search.match_mode);
    let ignore_case = args.ignore_case || settings.search.ignore_case;
    let query = build_query(args.kind, mode, &args.tests, ignore_case)?
        .with_aliases(args.aliases || settings.search.include_aliases);

    let results = query.run(&policy, fclist.as_ref())?;
    info!(kind = %args.kind, results = results.len(), "search finished");

    match args.format.unwrap_or(settings.output.format) {
        OutputFormat::Text => {
            for result in &results {
                println!("{}", result);
            }
        }
        OutputFormat::Json => {
            let report = SearchReport {
                generated_at: Utc::now(),
                element_kind: args.kind,
                match_mode: mode,
                results: results.iter().map(ResultRecord::from).collect(),
            };
            debug!("rendering json report");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec() {
        let spec = TestSpec::parse("name:regex:^httpd_").unwrap();
        assert_eq!(spec.condition, "name");
        assert_eq!(spec.operator, "regex");
        assert!(!spec.negated);
        assert_eq!(spec.parameter, "^httpd_");
    }

    #[test]
    fn test_parse_negated_spec_with_colons() {
        let spec = TestSpec::parse("default_level:level_dom:!:s1:c0.c3").unwrap();
        assert!(spec.negated);
        assert_eq!(spec.parameter, "s1:c0.c3");

        let spec = TestSpec::parse("range:range_sub:s0:c1 - s1").unwrap();
        assert!(!spec.negated);
        assert_eq!(spec.parameter, "s0:c1 - s1");
    }

    #[test]
    fn test_parse_malformed_spec() {
        assert!(TestSpec::parse("name").is_err());
        assert!(TestSpec::parse("name:regex").is_err());
        assert!(TestSpec::parse(":regex:x").is_err());
    }

    #[test]
    fn test_build_query_groups_by_condition() {
        let specs = vec![
            "name:regex:^httpd_".to_string(),
            "attributes:include:file_type".to_string(),
            "name:regex:!:_log_t$".to_string(),
        ];
        let query = build_query(ElementKind::Type, MatchMode::All, &specs, false).unwrap();

        assert_eq!(query.tests().len(), 2);
        assert_eq!(query.tests()[0].condition(), TestCondition::Name);
        assert_eq!(query.tests()[0].criteria().len(), 2);
        assert!(query.tests()[0].criteria()[1].negated());
        assert_eq!(query.tests()[1].condition(), TestCondition::Attributes);
    }

    #[test]
    fn test_build_query_rejects_misfits() {
        let specs = vec!["state:is:true".to_string()];
        assert!(build_query(ElementKind::Type, MatchMode::All, &specs, false).is_err());

        let specs = vec!["nonsense:regex:x".to_string()];
        assert!(build_query(ElementKind::Type, MatchMode::All, &specs, false).is_err());
    }
}
