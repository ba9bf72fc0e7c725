//! Table catalog.
//!
//! Holds the tables and columns a query may reference. Built from the live
//! engine with [`Catalog::discover`], or loaded from JSON for offline use.
//!
//! # Example
//! ```
//! use rqlx::schema::Catalog;
//!
//! let json = r#"{
//!     "tables": [{
//!         "name": "users",
//!         "columns": [
//!             { "name": "id", "type": "INTEGER", "primary_key": true },
//!             { "name": "name", "type": "TEXT" }
//!         ]
//!     }]
//! }"#;
//!
//! let catalog = Catalog::from_json(json).unwrap();
//! assert!(catalog.table("users").is_ok());
//! ```

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strsim::levenshtein;

use crate::error::NotFound;

/// Database catalog: every table the service exposes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub tables: Vec<TableDef>,
}

/// Table definition with columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// Column definition with its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type", alias = "typ", default)]
    pub typ: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
}

/// SQLite type affinity, derived from a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// Apply SQLite's affinity rules to a declared type name.
    pub fn of(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Affinity::Integer
        } else if ["CHAR", "CLOB", "TEXT"].iter().any(|t| upper.contains(t)) {
            Affinity::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            Affinity::Blob
        } else if ["REAL", "FLOA", "DOUB"].iter().any(|t| upper.contains(t)) {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// Add a table to the catalog.
    pub fn add_table(&mut self, table: TableDef) {
        self.tables.push(table);
    }

    /// Load a catalog from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read every user table and its columns from the engine.
    pub async fn discover(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await?;

        let mut catalog = Catalog::new();
        for name in names {
            let pragma = format!("PRAGMA table_info({})", quote_identifier(&name));
            let columns: Vec<(i64, String, String, i64, Option<String>, i64)> =
                sqlx::query_as(&pragma).fetch_all(pool).await?;

            let mut table = TableDef::new(&name);
            for (_cid, column, typ, notnull, _default, pk) in columns {
                table.add_column(ColumnDef {
                    name: column,
                    typ,
                    nullable: notnull == 0,
                    primary_key: pk > 0,
                });
            }
            tracing::info!("Discovered table: {} ({} columns)", name, table.columns.len());
            catalog.add_table(table);
        }
        Ok(catalog)
    }

    /// Get list of all table names.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Look up a table. If missing, returns a structured error with suggestion.
    pub fn table(&self, name: &str) -> Result<&TableDef, NotFound> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| NotFound::Table {
                name: name.to_string(),
                suggestion: did_you_mean(name, &self.table_names()),
            })
    }
}

impl TableDef {
    /// Create a new table definition.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
        }
    }

    /// Add a column to the table.
    pub fn add_column(&mut self, col: ColumnDef) {
        self.columns.push(col);
    }

    /// Builder: add a simple column.
    pub fn column(mut self, name: &str, typ: &str) -> Self {
        self.columns.push(ColumnDef {
            name: name.to_string(),
            typ: typ.to_string(),
            nullable: true,
            primary_key: false,
        });
        self
    }

    /// Builder: add a primary key column.
    pub fn pk(mut self, name: &str, typ: &str) -> Self {
        self.columns.push(ColumnDef {
            name: name.to_string(),
            typ: typ.to_string(),
            nullable: false,
            primary_key: true,
        });
        self
    }

    /// Look up a column. If missing, returns a structured error with suggestion.
    pub fn column_def(&self, name: &str) -> Result<&ColumnDef, NotFound> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| NotFound::Column {
                table: self.name.clone(),
                column: name.to_string(),
                suggestion: did_you_mean(name, &self.column_names()),
            })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key columns, in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.primary_key)
    }
}

impl ColumnDef {
    pub fn affinity(&self) -> Affinity {
        Affinity::of(&self.typ)
    }

    /// Declared as a boolean; the engine stores these as 0/1.
    pub fn is_boolean(&self) -> bool {
        self.typ.to_ascii_uppercase().contains("BOOL")
    }
}

/// Quote an identifier for SQLite.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Closest candidate within an edit-distance threshold scaled to input length.
fn did_you_mean(input: &str, candidates: &[&str]) -> Option<String> {
    let mut best_match = None;
    let mut min_dist = usize::MAX;

    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };

    for cand in candidates {
        let dist = levenshtein(input, cand);
        if dist <= threshold && dist < min_dist {
            min_dist = dist;
            best_match = Some(cand.to_string());
        }
    }

    best_match
}
