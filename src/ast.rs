//! Abstract Syntax Tree for RQL queries.
//!
//! This module defines the structures a parsed query string turns into.
//! Both surface syntaxes (`eq(age,30)` and `age=eq=30`) produce the same
//! tree; nothing downstream knows which one was used.

use serde::{Deserialize, Serialize};

/// A fully parsed query: predicate tree plus modifiers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    /// Predicate tree, `None` when the query matches every row.
    pub filter: Option<Filter>,
    /// Sort keys, applied in order.
    #[serde(default)]
    pub sort: Vec<SortKey>,
    /// Projected columns, `None` for all columns.
    #[serde(default)]
    pub select: Option<Vec<String>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Return the number of matching rows instead of the rows.
    #[serde(default)]
    pub count: bool,
    /// Drop duplicate rows from the projected result.
    #[serde(default)]
    pub distinct: bool,
}

impl Query {
    /// Create a query with only a predicate.
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    /// Every field name the query references, in order of appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(filter) = &self.filter {
            filter.collect_fields(&mut out);
        }
        out.extend(self.sort.iter().map(|k| k.field.as_str()));
        if let Some(select) = &self.select {
            out.extend(select.iter().map(String::as_str));
        }
        out
    }
}

/// A node of the predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Comparison {
        field: String,
        op: CompareOp,
        value: Literal,
    },
    Boolean {
        logic: Logic,
        children: Vec<Filter>,
    },
}

impl Filter {
    /// Build a comparison node.
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Literal>) -> Self {
        Filter::Comparison {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Build an `and(...)` node.
    pub fn and(children: Vec<Filter>) -> Self {
        Filter::Boolean {
            logic: Logic::And,
            children,
        }
    }

    /// Build an `or(...)` node.
    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Boolean {
            logic: Logic::Or,
            children,
        }
    }

    /// Depth of the tree; a lone comparison is 1.
    pub fn depth(&self) -> usize {
        match self {
            Filter::Comparison { .. } => 1,
            Filter::Boolean { children, .. } => {
                1 + children.iter().map(Filter::depth).max().unwrap_or(0)
            }
        }
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Comparison { field, .. } => out.push(field),
            Filter::Boolean { children, .. } => {
                for child in children {
                    child.collect_fields(out);
                }
            }
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Excludes,
    In,
    Out,
}

impl CompareOp {
    pub const ALL: [CompareOp; 10] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
        CompareOp::Contains,
        CompareOp::Excludes,
        CompareOp::In,
        CompareOp::Out,
    ];

    /// Look up an operator by its RQL name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// The operator's RQL name.
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Contains => "contains",
            CompareOp::Excludes => "excludes",
            CompareOp::In => "in",
            CompareOp::Out => "out",
        }
    }

    /// `in` and `out` take a value list; everything else a scalar.
    pub fn takes_array(self) -> bool {
        matches!(self, CompareOp::In | CompareOp::Out)
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Boolean combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn name(self) -> &'static str {
        match self {
            Logic::And => "and",
            Logic::Or => "or",
        }
    }
}

/// A sort key: `+field` (ascending) or `-field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

/// A literal value as written in the query string.
///
/// Literals carry no knowledge of the column they are compared against;
/// coercion to the column's type happens when the query is compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Literal>),
}

impl Literal {
    pub fn is_array(&self) -> bool {
        matches!(self, Literal::Array(_))
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Int(n as i64)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Int(n)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Float(n)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl<T: Into<Literal>> From<Vec<T>> for Literal {
    fn from(items: Vec<T>) -> Self {
        Literal::Array(items.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{:?}", n),
            Literal::String(s) => {
                // Strings that would re-parse as another type keep their prefix.
                let ambiguous = matches!(s.as_str(), "null" | "true" | "false")
                    || s.parse::<f64>().is_ok()
                    || s.contains(':');
                if ambiguous {
                    write!(f, "string:{}", s)
                } else {
                    write!(f, "{}", s)
                }
            }
            Literal::Array(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Comparison { field, op, value } => write!(f, "{}({},{})", op, field, value),
            Filter::Boolean { logic, children } => {
                write!(f, "{}(", logic.name())?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Renders the canonical functional form, e.g.
/// `and(gt(age,18),lt(age,65))&sort(-age)&limit(10,5)`.
impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut clauses: Vec<String> = Vec::new();
        if let Some(filter) = &self.filter {
            clauses.push(filter.to_string());
        }
        if !self.sort.is_empty() {
            let keys: Vec<String> = self
                .sort
                .iter()
                .map(|k| format!("{}{}", if k.ascending { '+' } else { '-' }, k.field))
                .collect();
            clauses.push(format!("sort({})", keys.join(",")));
        }
        if let Some(select) = &self.select {
            clauses.push(format!("select({})", select.join(",")));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => clauses.push(format!("limit({},{})", limit, offset)),
            (Some(limit), None) => clauses.push(format!("limit({})", limit)),
            // An offset alone only arises from programmatic construction.
            (None, Some(offset)) => clauses.push(format!("limit({},{})", u64::MAX, offset)),
            (None, None) => {}
        }
        if self.count {
            clauses.push("count()".to_string());
        }
        if self.distinct {
            clauses.push("distinct()".to_string());
        }
        write!(f, "{}", clauses.join("&"))
    }
}
