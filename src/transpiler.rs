//! SQL compiler for RQL queries.
//!
//! Converts a parsed [`Query`] into a parameterized SQLite statement. Values
//! reach the engine only as bound parameters; the SQL text is built from
//! quoted identifiers and fixed keywords.

use serde::Serialize;

use crate::ast::{CompareOp, Filter, Literal, Logic, Query, SortKey};
use crate::error::{CompileError, CompileResult};
use crate::schema::{quote_identifier, Affinity, TableDef};
use crate::value::{Row, Value};

/// SQLite's historical `SQLITE_MAX_VARIABLE_NUMBER`.
pub const DEFAULT_MAX_BIND_PARAMS: usize = 999;

/// SQLite's `SQLITE_MAX_LIKE_PATTERN_LENGTH`, in bytes.
pub const MAX_LIKE_PATTERN_BYTES: usize = 50_000;

/// What the compiled statement does with the matching rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperationKind<'a> {
    Read,
    /// Set the given columns on every matching row.
    Update(&'a Row),
    Delete,
}

impl OperationKind<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Update(_) => "update",
            OperationKind::Delete => "delete",
        }
    }
}

/// What the engine hands back for a compiled statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// Rows with these columns, in this order.
    Rows(Vec<String>),
    /// One row holding a `count` column.
    Count,
    /// Only the number of rows touched.
    Affected,
}

/// SQL text with positional `?` placeholders and the values to bind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Value>,
    pub shape: ResultShape,
}

/// Query compiler, parameterized by the engine's bind limit.
#[derive(Debug, Clone, Copy)]
pub struct Compiler {
    max_bind_params: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BIND_PARAMS)
    }
}

impl Compiler {
    pub fn new(max_bind_params: usize) -> Self {
        Self { max_bind_params }
    }

    /// Compile `query` against `table` for the given operation.
    ///
    /// The whole query is validated before any SQL is produced, so a
    /// statement is either complete or not built at all.
    pub fn compile(
        &self,
        table: &TableDef,
        query: &Query,
        op: OperationKind<'_>,
    ) -> CompileResult<CompiledStatement> {
        validate(table, query)?;
        check_applicable(query, &op)?;

        let mut writer = Writer::new(table);
        match op {
            OperationKind::Read => writer.select(query)?,
            OperationKind::Update(patch) => writer.update(query, patch)?,
            OperationKind::Delete => writer.delete(query)?,
        }
        let statement = writer.finish(self.max_bind_params)?;
        tracing::debug!(
            "Compiled {} on {}: {} ({} params)",
            op.name(),
            table.name,
            statement.sql,
            statement.params.len()
        );
        Ok(statement)
    }

    /// Compile an insert of `row`, returning the stored row.
    pub fn insert(&self, table: &TableDef, row: &Row) -> CompileResult<CompiledStatement> {
        for column in row.columns() {
            table.column_def(column)?;
        }

        let mut writer = Writer::new(table);
        writer.sql.push_str("INSERT INTO ");
        writer.sql.push_str(&quote_identifier(&table.name));
        if row.is_empty() {
            writer.sql.push_str(" DEFAULT VALUES");
        } else {
            let columns: Vec<String> = row.columns().map(quote_identifier).collect();
            writer.sql.push_str(" (");
            writer.sql.push_str(&columns.join(", "));
            writer.sql.push_str(") VALUES (");
            writer.sql.push_str(&placeholders(row.len()));
            writer.sql.push(')');
            writer.params.extend(row.iter().map(|(_, value)| value.clone()));
        }
        writer.sql.push_str(" RETURNING *");
        writer.shape = ResultShape::Rows(all_columns(table));

        let statement = writer.finish(self.max_bind_params)?;
        tracing::debug!("Compiled create on {}: {}", table.name, statement.sql);
        Ok(statement)
    }
}

/// Compile with the default bind limit.
pub fn compile(table: &TableDef, query: &Query, op: OperationKind<'_>) -> CompileResult<CompiledStatement> {
    Compiler::default().compile(table, query, op)
}

/// Compile an insert with the default bind limit.
pub fn insert(table: &TableDef, row: &Row) -> CompileResult<CompiledStatement> {
    Compiler::default().insert(table, row)
}

/// Check every field, operator and value shape in `query` against `table`.
pub fn validate(table: &TableDef, query: &Query) -> CompileResult<()> {
    for field in query.fields() {
        table.column_def(field)?;
    }
    if query.distinct {
        if let Some(select) = &query.select {
            if let Some(key) = query.sort.iter().find(|k| !select.contains(&k.field)) {
                return Err(CompileError::UnselectedSortKey(key.field.clone()));
            }
        }
    }
    match &query.filter {
        Some(filter) => validate_filter(table, filter),
        None => Ok(()),
    }
}

fn validate_filter(table: &TableDef, filter: &Filter) -> CompileResult<()> {
    match filter {
        Filter::Boolean { children, .. } => children
            .iter()
            .try_for_each(|child| validate_filter(table, child)),
        Filter::Comparison { field, op, value } => {
            let column = table.column_def(field)?;
            if op.takes_array() != value.is_array() {
                return Err(shape_error(*op, field));
            }
            if matches!(op, CompareOp::Contains | CompareOp::Excludes)
                && column.affinity() != Affinity::Text
            {
                return Err(CompileError::InvalidOperator {
                    operator: *op,
                    column: field.clone(),
                    reason: format!("substring matching needs a text column, not '{}'", column.typ),
                });
            }
            Ok(())
        }
    }
}

fn shape_error(op: CompareOp, field: &str) -> CompileError {
    let reason = if op.takes_array() {
        "expected a value list"
    } else {
        "expected a single value"
    };
    CompileError::InvalidValue {
        operator: op,
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn check_applicable(query: &Query, op: &OperationKind<'_>) -> CompileResult<()> {
    let operation = match op {
        OperationKind::Read if query.count => "count",
        OperationKind::Read => return Ok(()),
        write => {
            if query.count {
                return Err(not_applicable("count", write.name()));
            }
            write.name()
        }
    };
    if query.distinct {
        return Err(not_applicable("distinct", operation));
    }
    if !query.sort.is_empty() {
        return Err(not_applicable("sort", operation));
    }
    if query.limit.is_some() || query.offset.is_some() {
        return Err(not_applicable("limit", operation));
    }
    // Writes ignore select; count has no columns to project.
    if query.count && query.select.is_some() {
        return Err(not_applicable("select", operation));
    }
    Ok(())
}

fn not_applicable(modifier: &'static str, operation: &'static str) -> CompileError {
    CompileError::NotApplicable { modifier, operation }
}

/// Sort keys for a read: the requested keys, then tie-breakers not already
/// present, ascending.
///
/// Tie-breakers are the primary key columns, or for a distinct read every
/// projected column, so duplicates end up adjacent.
pub(crate) fn order_keys(table: &TableDef, query: &Query) -> Vec<SortKey> {
    let tie_breakers: Vec<&str> = match (&query.select, query.distinct) {
        (Some(select), true) => select.iter().map(String::as_str).collect(),
        (None, true) => table.column_names(),
        (_, false) => table.primary_key().map(|c| c.name.as_str()).collect(),
    };
    let mut keys = query.sort.clone();
    for column in tie_breakers {
        if !keys.iter().any(|k| k.field == column) {
            keys.push(SortKey::asc(column));
        }
    }
    keys
}

fn all_columns(table: &TableDef) -> Vec<String> {
    table.column_names().into_iter().map(String::from).collect()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// SQL operator for each comparison.
fn sql_operator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
        CompareOp::Contains => "LIKE",
        CompareOp::Excludes => "NOT LIKE",
        CompareOp::In => "IN",
        CompareOp::Out => "NOT IN",
    }
}

/// Escape `LIKE` wildcards; pairs with `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn like_pattern(literal: &Literal) -> CompileResult<Value> {
    match Value::coerce(literal, Affinity::Text) {
        Value::Text(text) => {
            let pattern = format!("%{}%", escape_like(&text));
            if pattern.len() > MAX_LIKE_PATTERN_BYTES {
                return Err(CompileError::UnsupportedConstruct(format!(
                    "LIKE pattern of {} bytes exceeds the engine's {}",
                    pattern.len(),
                    MAX_LIKE_PATTERN_BYTES
                )));
            }
            Ok(Value::Text(pattern))
        }
        other => Ok(other),
    }
}

fn bound(modifier: &str, n: u64) -> CompileResult<Value> {
    i64::try_from(n).map(Value::Int).map_err(|_| {
        CompileError::UnsupportedConstruct(format!("{} value {} exceeds the engine's integer range", modifier, n))
    })
}

/// Accumulates SQL text and bound values for one statement.
struct Writer<'t> {
    table: &'t TableDef,
    sql: String,
    params: Vec<Value>,
    shape: ResultShape,
}

impl<'t> Writer<'t> {
    fn new(table: &'t TableDef) -> Self {
        Self {
            table,
            sql: String::new(),
            params: Vec::new(),
            shape: ResultShape::Affected,
        }
    }

    fn finish(self, max_bind_params: usize) -> CompileResult<CompiledStatement> {
        if self.params.len() > max_bind_params {
            return Err(CompileError::UnsupportedConstruct(format!(
                "statement needs {} bound parameters, more than the engine's {}",
                self.params.len(),
                max_bind_params
            )));
        }
        Ok(CompiledStatement {
            sql: self.sql,
            params: self.params,
            shape: self.shape,
        })
    }

    fn select(&mut self, query: &Query) -> CompileResult<()> {
        if query.count {
            self.sql.push_str("SELECT COUNT(*) AS \"count\" FROM ");
            self.shape = ResultShape::Count;
        } else {
            self.sql.push_str(if query.distinct { "SELECT DISTINCT " } else { "SELECT " });
            match &query.select {
                Some(fields) => {
                    let cols: Vec<String> = fields.iter().map(|f| quote_identifier(f)).collect();
                    self.sql.push_str(&cols.join(", "));
                    self.shape = ResultShape::Rows(fields.clone());
                }
                None => {
                    self.sql.push('*');
                    self.shape = ResultShape::Rows(all_columns(self.table));
                }
            }
            self.sql.push_str(" FROM ");
        }
        self.sql.push_str(&quote_identifier(&self.table.name));
        self.where_clause(query)?;
        if query.count {
            return Ok(());
        }

        let keys = order_keys(self.table, query);
        if !keys.is_empty() {
            let keys: Vec<String> = keys
                .iter()
                .map(|k| {
                    let dir = if k.ascending { "ASC" } else { "DESC" };
                    format!("{} {}", quote_identifier(&k.field), dir)
                })
                .collect();
            self.sql.push_str(" ORDER BY ");
            self.sql.push_str(&keys.join(", "));
        }

        match (query.limit, query.offset) {
            (Some(limit), offset) => {
                self.sql.push_str(" LIMIT ?");
                self.params.push(bound("limit", limit)?);
                if let Some(offset) = offset {
                    self.sql.push_str(" OFFSET ?");
                    self.params.push(bound("offset", offset)?);
                }
            }
            // SQLite needs a LIMIT before OFFSET; -1 means unbounded.
            (None, Some(offset)) => {
                self.sql.push_str(" LIMIT -1 OFFSET ?");
                self.params.push(bound("offset", offset)?);
            }
            (None, None) => {}
        }
        Ok(())
    }

    fn update(&mut self, query: &Query, patch: &Row) -> CompileResult<()> {
        if patch.is_empty() {
            return Err(CompileError::EmptyPatch);
        }
        self.sql.push_str("UPDATE ");
        self.sql.push_str(&quote_identifier(&self.table.name));
        self.sql.push_str(" SET ");
        for (i, (column, value)) in patch.iter().enumerate() {
            self.table.column_def(column)?;
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.sql.push_str(&quote_identifier(column));
            self.sql.push_str(" = ?");
            self.params.push(value.clone());
        }
        self.where_clause(query)?;
        self.shape = ResultShape::Affected;
        Ok(())
    }

    fn delete(&mut self, query: &Query) -> CompileResult<()> {
        self.sql.push_str("DELETE FROM ");
        self.sql.push_str(&quote_identifier(&self.table.name));
        self.where_clause(query)?;
        self.shape = ResultShape::Affected;
        Ok(())
    }

    fn where_clause(&mut self, query: &Query) -> CompileResult<()> {
        if let Some(filter) = &query.filter {
            self.sql.push_str(" WHERE ");
            self.predicate(filter)?;
        }
        Ok(())
    }

    fn predicate(&mut self, filter: &Filter) -> CompileResult<()> {
        match filter {
            Filter::Boolean { logic, children } => {
                if children.is_empty() {
                    // Identity of the combinator: and() matches all, or() none.
                    self.sql.push(match logic {
                        Logic::And => '1',
                        Logic::Or => '0',
                    });
                    return Ok(());
                }
                let joiner = match logic {
                    Logic::And => " AND ",
                    Logic::Or => " OR ",
                };
                self.sql.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(joiner);
                    }
                    self.predicate(child)?;
                }
                self.sql.push(')');
                Ok(())
            }
            Filter::Comparison { field, op, value } => self.comparison(field, *op, value),
        }
    }

    fn comparison(&mut self, field: &str, op: CompareOp, value: &Literal) -> CompileResult<()> {
        let affinity = self.table.column_def(field)?.affinity();
        let column = quote_identifier(field);
        let operator = sql_operator(op);

        match (op, value) {
            (CompareOp::Eq, Literal::Null) => {
                self.sql.push_str(&format!("{} IS NULL", column));
            }
            (CompareOp::Ne, Literal::Null) => {
                self.sql.push_str(&format!("{} IS NOT NULL", column));
            }
            (CompareOp::In | CompareOp::Out, Literal::Array(items)) => {
                if items.iter().any(Literal::is_array) {
                    return Err(CompileError::UnsupportedConstruct(format!(
                        "nested value list in {}({}, ...)",
                        op, field
                    )));
                }
                self.sql.push_str(&format!("{} {} ({})", column, operator, placeholders(items.len())));
                self.params
                    .extend(items.iter().map(|item| Value::coerce(item, affinity)));
            }
            (CompareOp::In | CompareOp::Out, _) | (_, Literal::Array(_)) => {
                return Err(shape_error(op, field));
            }
            (CompareOp::Contains | CompareOp::Excludes, _) => {
                let pattern = like_pattern(value)?;
                self.sql.push_str(&format!("{} {} ? ESCAPE '\\'", column, operator));
                self.params.push(pattern);
            }
            _ => {
                self.sql.push_str(&format!("{} {} ?", column, operator));
                self.params.push(Value::coerce(value, affinity));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::NotFound;
    use crate::parser::parse;

    fn users() -> TableDef {
        TableDef::new("users")
            .pk("id", "INTEGER")
            .column("name", "TEXT")
            .column("age", "INTEGER")
    }

    fn read(query: &str) -> CompiledStatement {
        compile(&users(), &parse(query).unwrap(), OperationKind::Read).unwrap()
    }

    fn read_err(query: &str) -> CompileError {
        compile(&users(), &parse(query).unwrap(), OperationKind::Read).unwrap_err()
    }

    #[test]
    fn test_simple_read() {
        let stmt = read("gt(age,26)");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE \"age\" > ? ORDER BY \"id\" ASC"
        );
        assert_eq!(stmt.params, vec![Value::Int(26)]);
        assert_eq!(
            stmt.shape,
            ResultShape::Rows(vec!["id".into(), "name".into(), "age".into()])
        );
    }

    #[test]
    fn test_nesting_is_parenthesized() {
        let stmt = read("or(and(eq(name,Alice),lt(age,40)),eq(id,3))");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE ((\"name\" = ? AND \"age\" < ?) OR \"id\" = ?) ORDER BY \"id\" ASC"
        );
        assert_eq!(
            stmt.params,
            vec![Value::Text("Alice".into()), Value::Int(40), Value::Int(3)]
        );
    }

    #[test]
    fn test_literals_coerced_to_column_affinity() {
        let stmt = read("and(eq(name,42),eq(age,string:30))");
        assert_eq!(stmt.params, vec![Value::Text("42".into()), Value::Int(30)]);
    }

    #[test]
    fn test_null_comparisons() {
        let stmt = read("and(eq(name,null),ne(age,null))");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE (\"name\" IS NULL AND \"age\" IS NOT NULL) ORDER BY \"id\" ASC"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        let stmt = read("contains(name,50%_a\\b)");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE \"name\" LIKE ? ESCAPE '\\' ORDER BY \"id\" ASC"
        );
        assert_eq!(stmt.params, vec![Value::Text("%50\\%\\_a\\\\b%".into())]);

        let stmt = read("excludes(name,x)");
        assert!(stmt.sql.contains("\"name\" NOT LIKE ? ESCAPE '\\'"));
    }

    #[test]
    fn test_value_never_in_sql_text() {
        let stmt = read("eq(name,Robert'; DROP TABLE users;--)");
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params, vec![Value::Text("Robert'; DROP TABLE users;--".into())]);
    }

    #[test]
    fn test_in_and_out() {
        let stmt = read("in(age,(25,30))");
        assert!(stmt.sql.contains("\"age\" IN (?, ?)"));
        assert_eq!(stmt.params, vec![Value::Int(25), Value::Int(30)]);

        let stmt = read("out(name,(a))");
        assert!(stmt.sql.contains("\"name\" NOT IN (?)"));
    }

    #[test]
    fn test_read_modifiers() {
        let stmt = read("sort(-age)&select(name)&limit(10,5)");
        assert_eq!(
            stmt.sql,
            "SELECT \"name\" FROM \"users\" ORDER BY \"age\" DESC, \"id\" ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(stmt.params, vec![Value::Int(10), Value::Int(5)]);
        assert_eq!(stmt.shape, ResultShape::Rows(vec!["name".into()]));
    }

    #[test]
    fn test_offset_without_limit() {
        let query = Query {
            offset: Some(3),
            ..Query::default()
        };
        let stmt = compile(&users(), &query, OperationKind::Read).unwrap();
        assert!(stmt.sql.ends_with(" LIMIT -1 OFFSET ?"));
        assert_eq!(stmt.params, vec![Value::Int(3)]);
    }

    #[test]
    fn test_count() {
        let stmt = read("gt(age,18)&count()");
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) AS \"count\" FROM \"users\" WHERE \"age\" > ?"
        );
        assert_eq!(stmt.shape, ResultShape::Count);

        assert_eq!(
            read_err("count()&sort(age)"),
            CompileError::NotApplicable {
                modifier: "sort",
                operation: "count"
            }
        );
        assert_eq!(
            read_err("count()&select(age)"),
            CompileError::NotApplicable {
                modifier: "select",
                operation: "count"
            }
        );
    }

    #[test]
    fn test_unknown_field_suggests() {
        assert_eq!(
            read_err("eq(nmae,Alice)"),
            CompileError::NotFound(NotFound::Column {
                table: "users".into(),
                column: "nmae".into(),
                suggestion: Some("name".into()),
            })
        );
        assert!(matches!(read_err("sort(missing)"), CompileError::NotFound(_)));
        assert!(matches!(read_err("select(missing)"), CompileError::NotFound(_)));
    }

    #[test]
    fn test_contains_requires_text_column() {
        assert!(matches!(
            read_err("contains(age,3)"),
            CompileError::InvalidOperator { operator: CompareOp::Contains, .. }
        ));
    }

    #[test]
    fn test_programmatic_shape_mismatch() {
        let query = Query::filtered(Filter::compare("age", CompareOp::In, 3));
        let err = compile(&users(), &query, OperationKind::Read).unwrap_err();
        assert!(matches!(err, CompileError::InvalidValue { operator: CompareOp::In, .. }));
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(
            read_err("in(age,((1,2),3))"),
            CompileError::UnsupportedConstruct(_)
        ));

        let query = parse("in(age,(1,2,3))").unwrap();
        let err = Compiler::new(2)
            .compile(&users(), &query, OperationKind::Read)
            .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct(_)));

        let query = Query {
            limit: Some(u64::MAX),
            ..Query::default()
        };
        let err = compile(&users(), &query, OperationKind::Read).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_update() {
        let patch = Row::new().with("age", 26);
        let stmt = compile(&users(), &parse("eq(id,2)").unwrap(), OperationKind::Update(&patch)).unwrap();
        assert_eq!(stmt.sql, "UPDATE \"users\" SET \"age\" = ? WHERE \"id\" = ?");
        assert_eq!(stmt.params, vec![Value::Int(26), Value::Int(2)]);
        assert_eq!(stmt.shape, ResultShape::Affected);
    }

    #[test]
    fn test_update_patch_checks() {
        let query = parse("eq(id,2)").unwrap();
        let empty = Row::new();
        assert_eq!(
            compile(&users(), &query, OperationKind::Update(&empty)).unwrap_err(),
            CompileError::EmptyPatch
        );

        let bad = Row::new().with("agee", 1);
        assert!(matches!(
            compile(&users(), &query, OperationKind::Update(&bad)).unwrap_err(),
            CompileError::NotFound(NotFound::Column { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let stmt = compile(&users(), &parse("lt(age,18)").unwrap(), OperationKind::Delete).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM \"users\" WHERE \"age\" < ?");

        // An empty predicate compiles; the orchestrator decides whether to run it.
        let stmt = compile(&users(), &Query::default(), OperationKind::Delete).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM \"users\"");
    }

    #[test]
    fn test_modifiers_rejected_on_writes() {
        for (query, modifier) in [
            ("sort(age)", "sort"),
            ("limit(1)", "limit"),
            ("count()", "count"),
            ("distinct()", "distinct"),
        ] {
            let err = compile(&users(), &parse(query).unwrap(), OperationKind::Delete).unwrap_err();
            assert_eq!(
                err,
                CompileError::NotApplicable {
                    modifier,
                    operation: "delete"
                }
            );
        }
    }

    #[test]
    fn test_select_ignored_on_writes() {
        let query = parse("eq(id,2)&select(name)").unwrap();
        let stmt = compile(&users(), &query, OperationKind::Delete).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM \"users\" WHERE \"id\" = ?");
        assert_eq!(stmt.shape, ResultShape::Affected);

        let patch = Row::new().with("age", 26);
        let stmt = compile(&users(), &query, OperationKind::Update(&patch)).unwrap();
        assert_eq!(stmt.sql, "UPDATE \"users\" SET \"age\" = ? WHERE \"id\" = ?");
        assert_eq!(stmt.params, vec![Value::Int(26), Value::Int(2)]);

        // Selected columns are still checked.
        let query = parse("eq(id,2)&select(nme)").unwrap();
        assert!(matches!(
            compile(&users(), &query, OperationKind::Delete).unwrap_err(),
            CompileError::NotFound(NotFound::Column { .. })
        ));
    }

    #[test]
    fn test_distinct() {
        let stmt = read("gt(age,18)&select(name)&sort(-name)&distinct()&limit(5)");
        assert_eq!(
            stmt.sql,
            "SELECT DISTINCT \"name\" FROM \"users\" WHERE \"age\" > ? ORDER BY \"name\" DESC LIMIT ?"
        );
        assert_eq!(stmt.params, vec![Value::Int(18), Value::Int(5)]);

        let stmt = read("select(age,name)&distinct()");
        assert_eq!(
            stmt.sql,
            "SELECT DISTINCT \"age\", \"name\" FROM \"users\" ORDER BY \"age\" ASC, \"name\" ASC"
        );

        let stmt = read("distinct()");
        assert_eq!(
            stmt.sql,
            "SELECT DISTINCT * FROM \"users\" ORDER BY \"id\" ASC, \"name\" ASC, \"age\" ASC"
        );

        assert_eq!(
            read_err("select(name)&sort(age)&distinct()"),
            CompileError::UnselectedSortKey("age".into())
        );
        assert_eq!(
            read_err("count()&distinct()"),
            CompileError::NotApplicable {
                modifier: "distinct",
                operation: "count"
            }
        );
    }

    #[test]
    fn test_like_pattern_length_limit() {
        // Two wildcards are added around the escaped needle.
        let fits = format!("contains(name,{})", "a".repeat(MAX_LIKE_PATTERN_BYTES - 2));
        let stmt = read(&fits);
        assert!(matches!(&stmt.params[0], Value::Text(p) if p.len() == MAX_LIKE_PATTERN_BYTES));

        let too_long = format!("contains(name,{})", "a".repeat(MAX_LIKE_PATTERN_BYTES - 1));
        assert!(matches!(read_err(&too_long), CompileError::UnsupportedConstruct(_)));

        // Escaping counts toward the limit.
        let escaped = format!("excludes(name,{})", "_".repeat(MAX_LIKE_PATTERN_BYTES / 2));
        assert!(matches!(read_err(&escaped), CompileError::UnsupportedConstruct(_)));

        let query = parse(&too_long).unwrap();
        assert!(matches!(
            compile(&users(), &query, OperationKind::Delete).unwrap_err(),
            CompileError::UnsupportedConstruct(_)
        ));
    }

    #[test]
    fn test_insert() {
        let row = Row::new().with("name", "Carol").with("age", 41);
        let stmt = insert(&users(), &row).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"name\", \"age\") VALUES (?, ?) RETURNING *"
        );
        assert_eq!(stmt.params, vec![Value::Text("Carol".into()), Value::Int(41)]);

        let stmt = insert(&users(), &Row::new()).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"users\" DEFAULT VALUES RETURNING *");
    }
}
