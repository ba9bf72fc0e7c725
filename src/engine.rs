//! Query execution engine for rqlx.
//!
//! [`RqlDb`] is the single entry point every interface goes through: it
//! parses a query string, compiles it against the table's schema, runs the
//! statement on SQLite through sqlx, and falls back to in-memory filtering
//! for reads the compiler cannot express.
//!
//! ```text
//! parse ──► compile ──► execute ──────────────► rows
//!              │
//!              └─ UnsupportedConstruct (reads only)
//!                    └─► fetch table ──► fallback::evaluate ──► rows
//! ```

use std::sync::Arc;

use serde::Serialize;
use sqlx::query::Query as SqlQuery;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row as _;
use sqlx::{Column, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::ast::Query;
use crate::config::Config;
use crate::error::{CompileError, RqlError, RqlResult};
use crate::fallback;
use crate::parser;
use crate::schema::{Catalog, TableDef};
use crate::transpiler::{CompiledStatement, Compiler, OperationKind};
use crate::value::{Row, RowSet, Value};

/// Rows returned by a read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadResult {
    pub rows: RowSet,
    pub row_count: usize,
}

impl ReadResult {
    fn new(rows: RowSet) -> Self {
        Self {
            row_count: rows.len(),
            rows,
        }
    }
}

/// The row as stored by the engine, defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateResult {
    pub row: Row,
}

/// Rows touched by an update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WriteResult {
    pub affected: u64,
}

/// Caller opt-ins for update and delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Allow a write with no filter, touching every row.
    pub confirm_unfiltered: bool,
}

impl WriteOptions {
    pub fn confirmed() -> Self {
        Self {
            confirm_unfiltered: true,
        }
    }
}

/// How a read would run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Explain {
    Compiled(CompiledStatement),
    Fallback { reason: String },
}

/// A database handle for running RQL queries.
#[derive(Clone)]
pub struct RqlDb {
    pool: SqlitePool,
    catalog: Arc<Catalog>,
    config: Config,
    compiler: Compiler,
}

impl RqlDb {
    /// Connect to a SQLite database and discover its tables.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let db = RqlDb::connect("sqlite://app.db", Config::default()).await?;
    /// let adults = db.read("users", "ge(age,18)&sort(-age)").await?;
    /// ```
    pub async fn connect(url: &str, config: Config) -> RqlResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await?;
        Self::new(pool, config).await
    }

    /// Wrap an existing pool, discovering the catalog from it.
    pub async fn new(pool: SqlitePool, config: Config) -> RqlResult<Self> {
        let catalog = Catalog::discover(&pool).await?;
        Ok(Self::with_catalog(pool, catalog, config))
    }

    /// Wrap an existing pool with a known catalog.
    pub fn with_catalog(pool: SqlitePool, catalog: Catalog, config: Config) -> Self {
        info!("Serving {} tables", catalog.tables.len());
        Self {
            compiler: Compiler::new(config.max_bind_params),
            pool,
            catalog: Arc::new(catalog),
            config,
        }
    }

    /// Re-read the catalog after schema changes.
    pub async fn refresh(&mut self) -> RqlResult<()> {
        self.catalog = Arc::new(Catalog::discover(&self.pool).await?);
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Read rows matching `query`.
    pub async fn read(&self, table: &str, query: &str) -> RqlResult<ReadResult> {
        let def = self.catalog.table(table)?;
        let query = self.parse_read(query)?;

        let rows = match self.compiler.compile(def, &query, OperationKind::Read) {
            Ok(statement) => self.fetch(&statement, def).await?,
            Err(CompileError::UnsupportedConstruct(reason)) => {
                warn!("Filtering {} in memory: {}", table, reason);
                self.fallback(def, &query).await?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ReadResult::new(rows))
    }

    /// Insert `row` and return it as stored.
    pub async fn create(&self, table: &str, row: &Row) -> RqlResult<CreateResult> {
        let def = self.writable(table)?;
        let statement = self.compiler.insert(def, row)?;

        debug!("Executing: {}", statement.sql);
        let stored = bind_params(&statement.sql, &statement.params)
            .fetch_one(&self.pool)
            .await?;
        Ok(CreateResult {
            row: decode_row(&stored, def)?,
        })
    }

    /// Set the columns in `patch` on every row matching `query`.
    pub async fn update(
        &self,
        table: &str,
        query: &str,
        patch: &Row,
        options: WriteOptions,
    ) -> RqlResult<WriteResult> {
        let def = self.writable(table)?;
        let query = parser::parse(query)?;
        let statement = self.compiler.compile(def, &query, OperationKind::Update(patch))?;
        self.confirm(def, &query, "update", options)?;
        self.execute(&statement).await
    }

    /// Delete every row matching `query`.
    pub async fn delete(&self, table: &str, query: &str, options: WriteOptions) -> RqlResult<WriteResult> {
        let def = self.writable(table)?;
        let query = parser::parse(query)?;
        let statement = self.compiler.compile(def, &query, OperationKind::Delete)?;
        self.confirm(def, &query, "delete", options)?;
        self.execute(&statement).await
    }

    /// Show the statement a read would run, or why it would fall back.
    pub fn explain(&self, table: &str, query: &str) -> RqlResult<Explain> {
        let def = self.catalog.table(table)?;
        let query = self.parse_read(query)?;
        match self.compiler.compile(def, &query, OperationKind::Read) {
            Ok(statement) => Ok(Explain::Compiled(statement)),
            Err(CompileError::UnsupportedConstruct(reason)) => Ok(Explain::Fallback { reason }),
            Err(e) => Err(e.into()),
        }
    }

    fn parse_read(&self, input: &str) -> RqlResult<Query> {
        let mut query = parser::parse(input)?;
        if query.limit.is_none() && !query.count {
            query.limit = self.config.default_limit;
        }
        debug!("Parsed read: {}", query);
        Ok(query)
    }

    fn writable(&self, table: &str) -> RqlResult<&TableDef> {
        let def = self.catalog.table(table)?;
        if self.config.is_read_only(table) {
            return Err(RqlError::ReadOnly {
                table: table.to_string(),
            });
        }
        Ok(def)
    }

    fn confirm(
        &self,
        table: &TableDef,
        query: &Query,
        operation: &'static str,
        options: WriteOptions,
    ) -> RqlResult<()> {
        if query.filter.is_none() && !options.confirm_unfiltered {
            return Err(RqlError::RequiresConfirmation {
                table: table.name.clone(),
                operation,
            });
        }
        Ok(())
    }

    async fn fallback(&self, table: &TableDef, query: &Query) -> RqlResult<RowSet> {
        if let Some(limit) = self.config.fallback_row_limit {
            let count = Query {
                count: true,
                ..Query::default()
            };
            let statement = self.compiler.compile(table, &count, OperationKind::Read)?;
            let rows = self.fetch(&statement, table).await?;
            let total = match rows.first().and_then(|row| row.get("count")) {
                Some(Value::Int(n)) => u64::try_from(*n).unwrap_or(0),
                _ => 0,
            };
            if total > limit {
                return Err(RqlError::FallbackTooLarge {
                    table: table.name.clone(),
                    rows: total,
                    limit,
                });
            }
        }

        let statement = self.compiler.compile(table, &Query::default(), OperationKind::Read)?;
        let rows = self.fetch(&statement, table).await?;
        debug!("Fallback scanned {} rows of {}", rows.len(), table.name);
        Ok(fallback::evaluate(&rows, query, table))
    }

    async fn fetch(&self, statement: &CompiledStatement, table: &TableDef) -> RqlResult<RowSet> {
        debug!("Executing: {}", statement.sql);
        let rows = bind_params(&statement.sql, &statement.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| decode_row(row, table)).collect()
    }

    async fn execute(&self, statement: &CompiledStatement) -> RqlResult<WriteResult> {
        debug!("Executing: {}", statement.sql);
        let result = bind_params(&statement.sql, &statement.params)
            .execute(&self.pool)
            .await?;
        Ok(WriteResult {
            affected: result.rows_affected(),
        })
    }
}

fn bind_params<'q>(sql: &'q str, params: &[Value]) -> SqlQuery<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Blob(v) => query.bind(v.clone()),
        };
    }
    query
}

/// Convert a SqliteRow by its runtime storage classes.
///
/// Columns declared boolean come back as `Bool` rather than 0/1.
fn decode_row(row: &SqliteRow, table: &TableDef) -> RqlResult<Row> {
    let mut out = Row::with_capacity(row.columns().len());

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(i)?;
        if raw.is_null() {
            out.insert(name, Value::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();

        let value = match type_name.as_str() {
            "INTEGER" => {
                let n: i64 = row.try_get_unchecked(i)?;
                if table.column_def(name).is_ok_and(|c| c.is_boolean()) {
                    Value::Bool(n != 0)
                } else {
                    Value::Int(n)
                }
            }
            "REAL" => Value::Float(row.try_get_unchecked(i)?),
            "BLOB" => Value::Blob(row.try_get_unchecked(i)?),
            _ => Value::Text(row.try_get_unchecked(i)?),
        };
        out.insert(name, value);
    }

    Ok(out)
}
