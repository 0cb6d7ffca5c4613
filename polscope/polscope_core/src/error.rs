//! Error types for the polscope toolkit.
//!
//! Errors are organized by failure class rather than by module. The root
//! error type, `Error`, wraps each class so callers can either match on the
//! precise failure or propagate uniformly with `?`.
//!
//! Note that a legitimate "incomparable" outcome of a level or range
//! comparison is never an error; it is a regular value of the comparison
//! result type.

use crate::handle::ElementHandle;
use crate::types::ElementKind;
use thiserror::Error;

/// Root error type for polscope.
#[derive(Debug, Error)]
pub enum Error {
    /// A literal or encoded value could not be built
    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    /// A query combines a condition, operator, or parameter that do not fit
    #[error("Incompatible query: {0}")]
    IncompatibleQuery(#[from] IncompatibleQueryError),

    /// A name or handle could not be resolved against the policy
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// A value violates a structural invariant
    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    /// An operation was invoked without the context it requires
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while building a value from its textual or binary form.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// A level literal is malformed
    #[error("Malformed level literal: {0:?}")]
    MalformedLevel(String),

    /// A range literal is malformed
    #[error("Malformed range literal: {0:?}")]
    MalformedRange(String),

    /// A regular expression failed to compile
    #[error("Invalid regular expression {expression:?}: {reason}")]
    InvalidRegex {
        /// The offending expression
        expression: String,

        /// Why the compiler rejected it
        reason: String,
    },

    /// A string expression could not be parsed
    #[error("Invalid string expression: {0}")]
    InvalidExpression(String),

    /// A serialized bitmap ended early
    #[error("Truncated input: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Offset where the read started
        offset: usize,

        /// Bytes required by the read
        needed: usize,
    },

    /// A bitmap reaches past the largest high bit the wire format holds
    #[error("Bitmap high bit {0} does not fit the 32-bit wire format")]
    Unencodable(u64),

    /// A file-context line could not be parsed
    #[error("Malformed file context on line {line}: {reason}")]
    MalformedFileContext {
        /// 1-based line number
        line: usize,

        /// What was wrong with it
        reason: String,
    },

    /// A textual keyword (rule type, mode, kind) is unknown
    #[error("Unknown {what}: {value:?}")]
    UnknownKeyword {
        /// What kind of keyword was expected
        what: &'static str,

        /// The value that was supplied
        value: String,
    },
}

/// Errors raised when a query is assembled from parts that do not fit.
#[derive(Debug, Error)]
pub enum IncompatibleQueryError {
    /// The test condition does not apply to the queried element kind
    #[error("Condition {condition} is not valid for {element_kind}")]
    Condition {
        /// The queried element kind
        element_kind: String,

        /// The rejected condition
        condition: String,
    },

    /// The operator does not apply to the condition
    #[error("Operator {operator} is not valid for condition {condition} on {element_kind}")]
    Operator {
        /// The queried element kind
        element_kind: String,

        /// The test condition
        condition: String,

        /// The rejected operator
        operator: String,
    },

    /// The parameter type does not fit the operator
    #[error("Parameter type {parameter} is not valid for operator {operator} (expected {expected})")]
    ParameterType {
        /// The operator
        operator: String,

        /// The supplied parameter type
        parameter: String,

        /// The parameter type the operator takes
        expected: String,
    },

    /// The special identifier `X` is not meaningful here
    #[error("The identifier X cannot be used with operator {operator} on {element_kind}")]
    InvalidX {
        /// The queried element kind
        element_kind: String,

        /// The operator
        operator: String,
    },

    /// The element kind cannot be queried at top level
    #[error("Element kind {0} cannot be queried")]
    NotQueryable(String),
}

/// Errors raised when a name or handle is unknown to the policy.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No element of this kind has the given name
    #[error("No {kind} named {name:?}")]
    NotFound {
        /// The kind that was searched
        kind: ElementKind,

        /// The name that was not found
        name: String,
    },

    /// The handle does not refer to an element in this policy
    #[error("Unknown handle {0}")]
    UnknownHandle(ElementHandle),

    /// The handle refers to an element of an unexpected kind
    #[error("Handle {handle} is not a {expected}")]
    WrongKind {
        /// The handle supplied
        handle: ElementHandle,

        /// The kind the operation needs
        expected: ElementKind,
    },

    /// A category range whose ends are out of order
    #[error("Category range {low}.{high} is not ascending")]
    DescendingRange {
        /// Lower end as written
        low: String,

        /// Upper end as written
        high: String,
    },

    /// The level has not been bound to a policy yet
    #[error("Level {0:?} has unresolved categories")]
    Unbound(String),
}

/// Errors raised when a value violates a structural invariant.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    /// A serialized bitmap uses a word width other than 64
    #[error("Unsupported bitmap word width {0}")]
    WordWidth(u32),

    /// A serialized bitmap's high bit is not word aligned
    #[error("Bitmap high bit {0} is not a multiple of the word width")]
    HighBit(u32),

    /// A serialized node is misaligned, out of order, out of range or empty
    #[error("Bitmap node {index} is invalid: {reason}")]
    BitmapNode {
        /// Position of the node in the stream
        index: u32,

        /// Which invariant failed
        reason: String,
    },

    /// A range whose high level does not dominate its low level
    #[error("Range high level {high} does not dominate low level {low}")]
    RangeOrder {
        /// Rendered low level
        low: String,

        /// Rendered high level
        high: String,
    },

    /// A level uses a category that is not legal for its sensitivity
    #[error("Level {0} is not valid in this policy")]
    InvalidLevel(String),

    /// Two results that describe different elements cannot be merged
    #[error("Cannot merge results for different elements: {0} and {1}")]
    ResultMismatch(String, String),
}

/// Errors raised when an operation lacks required context.
#[derive(Debug, Error)]
pub enum UsageError {
    /// A file-context test was run without a file-context list
    #[error("Condition {0} requires a file context list")]
    MissingFileContexts(String),

    /// Generic misuse with an explanation
    #[error("{0}")]
    Invalid(String),
}

/// Result type used throughout polscope.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err: Error = ConstructionError::MalformedLevel(":c0".to_string()).into();
        assert!(matches!(err, Error::Construction(_)));

        let err: Error = UsageError::MissingFileContexts("fcentry".to_string()).into();
        assert!(matches!(err, Error::Usage(_)));

        let err: Error = ConsistencyError::WordWidth(32).into();
        assert!(matches!(err, Error::Consistency(ConsistencyError::WordWidth(32))));
    }

    #[test]
    fn test_error_display() {
        let err: Error = ResolutionError::NotFound {
            kind: ElementKind::Category,
            name: "c99".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Resolution error: No category named \"c99\""
        );

        let err: Error = ConsistencyError::RangeOrder {
            low: "s1".to_string(),
            high: "s0".to_string(),
        }
        .into();
        assert!(err.to_string().contains("does not dominate"));
    }
}
