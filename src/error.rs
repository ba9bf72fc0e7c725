//! Error types for rqlx.

use thiserror::Error;

use crate::ast::CompareOp;

/// The query string could not be turned into a [`Query`](crate::ast::Query).
///
/// Always terminal: a string that does not parse is never re-interpreted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown operator: '{0}'")]
    UnknownOperator(String),

    #[error("Unterminated group opened at position {position}")]
    UnterminatedGroup { position: usize },

    #[error("{operator}({field}, ...) requires a non-empty value list")]
    EmptyArraySet { operator: CompareOp, field: String },

    #[error("{operator}({field}, ...) requires a value list like (a,b)")]
    ExpectedArray { operator: CompareOp, field: String },

    #[error("{operator}({field}, ...) requires a single value, found a list")]
    ExpectedScalar { operator: CompareOp, field: String },

    #[error("Query nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("{name}() takes {expected} argument(s), found {found}")]
    WrongArity {
        name: String,
        expected: &'static str,
        found: usize,
    },

    #[error("{0}() is only allowed at the top level of a query")]
    MisplacedModifier(String),

    #[error("{0}() appears more than once")]
    DuplicateModifier(String),

    #[error("Invalid {name}() argument '{value}': {reason}")]
    InvalidModifier {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid value '{0}'")]
    InvalidValue(String),
}

impl ParseError {
    /// Create a syntax error at the given position.
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// A table or column that does not exist.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotFound {
    #[error("Table '{name}' not found{}", hint(.suggestion))]
    Table {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Column '{column}' not found in table '{table}'{}", hint(.suggestion))]
    Column {
        table: String,
        column: String,
        suggestion: Option<String>,
    },
}

fn hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'?", s),
        None => String::new(),
    }
}

/// The parsed query cannot be compiled for this table and operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The query is valid but cannot be rendered as parameterized SQL.
    /// Reads recover by filtering in memory; writes fail.
    #[error("Cannot express as parameterized SQL: {0}")]
    UnsupportedConstruct(String),

    #[error("{modifier}() is not applicable to {operation} operations")]
    NotApplicable {
        modifier: &'static str,
        operation: &'static str,
    },

    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("Operator {operator} cannot be applied to column '{column}': {reason}")]
    InvalidOperator {
        operator: CompareOp,
        column: String,
        reason: String,
    },

    #[error("Invalid value for {operator}({field}, ...): {reason}")]
    InvalidValue {
        operator: CompareOp,
        field: String,
        reason: String,
    },

    #[error("Update requires at least one column to set")]
    EmptyPatch,

    #[error("Sort key '{0}' must be selected when distinct() is used")]
    UnselectedSortKey(String),
}

/// The main error type for rqlx operations.
#[derive(Debug, Error)]
pub enum RqlError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Compile error: {0}")]
    Compile(CompileError),

    #[error(transparent)]
    NotFound(NotFound),

    /// An update or delete without a predicate needs an explicit opt-in.
    #[error("{operation} on '{table}' has no filter and would touch every row; confirmation required")]
    RequiresConfirmation {
        table: String,
        operation: &'static str,
    },

    #[error("Table '{table}' is read-only")]
    ReadOnly { table: String },

    #[error("In-memory filtering of '{table}' would scan {rows} rows (limit {limit})")]
    FallbackTooLarge { table: String, rows: u64, limit: u64 },

    /// Engine errors are carried verbatim.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CompileError> for RqlError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::NotFound(nf) => RqlError::NotFound(nf),
            other => RqlError::Compile(other),
        }
    }
}

impl From<NotFound> for RqlError {
    fn from(err: NotFound) -> Self {
        RqlError::NotFound(err)
    }
}

/// Result type alias for rqlx operations.
pub type RqlResult<T> = Result<T, RqlError>;

/// Result type alias for the compiler.
pub type CompileResult<T> = Result<T, CompileError>;
