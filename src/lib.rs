//! # rqlx: resource queries over SQLite
//!
//! rqlx compiles compact resource-query strings into parameterized SQL,
//! runs them on SQLite, and returns uniform row sets.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rqlx::prelude::*;
//!
//! let db = RqlDb::connect("sqlite://app.db", Config::default()).await?;
//!
//! let rows = db.read("users", "and(eq(name,Alice),lt(age,40))&sort(-age)").await?;
//! let same = db.read("users", "name=Alice&age=lt=40&sort(-age)").await?;
//!
//! db.update("users", "eq(id,2)", &Row::new().with("age", 26), WriteOptions::default()).await?;
//! ```
//!
//! ## Grammar
//!
//! | Form                         | Meaning                        |
//! |------------------------------|--------------------------------|
//! | `eq(f,v)` / `f=eq=v` / `f=v` | comparison (`eq ne lt le gt ge contains excludes`) |
//! | `in(f,(a,b))` / `out(...)`   | set membership                 |
//! | `and(...)` / `or(...)`       | boolean combination            |
//! | `sort(-a,+b)`                | ordering                       |
//! | `select(a,b)`                | projection                     |
//! | `limit(n,offset)`            | pagination                     |
//! | `count()`                    | row count instead of rows      |
//! | `distinct()`                 | drop duplicate projected rows  |
//! | `&`                          | implicit AND between clauses   |

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod parser;
pub mod schema;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::Config;
    pub use crate::engine::{CreateResult, Explain, ReadResult, RqlDb, WriteOptions, WriteResult};
    pub use crate::error::*;
    pub use crate::parser::parse;
    pub use crate::schema::{Catalog, ColumnDef, TableDef};
    pub use crate::transpiler::{compile, CompiledStatement, Compiler, OperationKind};
    pub use crate::value::{Row, RowSet, Value};
}

/// Parse an RQL query string into a query AST.
///
/// # Example
///
/// ```
/// use rqlx::parse;
///
/// let query = parse("age=gt=30&sort(-age)&limit(10)").unwrap();
/// assert_eq!(query.limit, Some(10));
/// assert_eq!(query.to_string(), "gt(age,30)&sort(-age)&limit(10)");
/// ```
pub fn parse(input: &str) -> Result<ast::Query, error::ParseError> {
    parser::parse(input)
}
