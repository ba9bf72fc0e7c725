//! RQL parser using nom.
//!
//! Parses a resource query string into a [`Query`].
//!
//! # Syntax Overview
//!
//! ```text
//! and(eq(name,Alice),lt(age,40))&sort(-age,+name)&select(id,name)&limit(10,20)
//! ─────────────┬──────────────── ───────┬─────── ───────┬─────── ──────┬──────
//!              │                        │               │              └── limit, offset
//!              │                        │               └── Projection
//!              │                        └── Sort keys (+ asc, - desc)
//!              └── Filter (functional form)
//!
//! name=Alice&age=lt=40                     infix form, same AST
//! ```
//!
//! Clauses are separated by `&` and combine with an implicit AND. Each clause
//! is tokenized by [`functional`] or [`infix`] into a [`Call`]; the builder
//! below turns calls into AST nodes and is the only place grammar rules live.

pub mod functional;
pub mod infix;
pub mod token;


use nom::character::complete::{char, multispace0};
use nom::Offset;

use crate::ast::{CompareOp, Filter, Literal, Logic, Query, SortKey};
use crate::error::ParseError;
use token::{Arg, Call, TokenError, TokenErrorKind, MAX_DEPTH};

/// Parse a complete RQL query string. An empty string is an empty query.
pub fn parse(input: &str) -> Result<Query, ParseError> {
    let calls = tokenize(input)?;
    let mut builder = Builder::new(input);
    for call in calls {
        builder.clause(call)?;
    }
    Ok(builder.finish())
}

/// Split the query into `&`-separated clauses, tokenizing each one.
fn tokenize(source: &str) -> Result<Vec<Call<'_>>, ParseError> {
    let mut calls = Vec::new();
    let (mut rest, _) = multispace0::<_, TokenError>(source).map_err(|e| token_error(source, e))?;
    if rest.is_empty() {
        return Ok(calls);
    }

    loop {
        let call = match functional::clause(rest) {
            Ok((after, call)) => {
                rest = after;
                call
            }
            Err(nom::Err::Error(_)) => match infix::clause(rest) {
                Ok((after, call)) => {
                    rest = after;
                    call
                }
                Err(nom::Err::Error(_)) => {
                    return Err(ParseError::syntax(
                        source.offset(rest),
                        "expected a filter expression or modifier",
                    ));
                }
                Err(e) => return Err(token_error(source, e)),
            },
            Err(e) => return Err(token_error(source, e)),
        };
        calls.push(call);

        let (after, _) = multispace0::<_, TokenError>(rest).map_err(|e| token_error(source, e))?;
        if after.is_empty() {
            return Ok(calls);
        }
        match char::<_, TokenError>('&')(after) {
            Ok((after, _)) => rest = after.trim_start(),
            Err(_) => {
                return Err(ParseError::syntax(
                    source.offset(after),
                    format!("unexpected '{}', expected '&' or end of query", preview(after)),
                ));
            }
        }
    }
}

fn preview(rest: &str) -> &str {
    let end = rest.char_indices().nth(12).map(|(i, _)| i).unwrap_or(rest.len());
    &rest[..end]
}

fn token_error(source: &str, err: nom::Err<TokenError<'_>>) -> ParseError {
    match err {
        nom::Err::Incomplete(_) => ParseError::syntax(source.len(), "unexpected end of query"),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = source.offset(e.input);
            match e.kind {
                TokenErrorKind::Unterminated => ParseError::UnterminatedGroup { position },
                TokenErrorKind::TooDeep => ParseError::TooDeep { limit: MAX_DEPTH },
                TokenErrorKind::Expected(what) => {
                    ParseError::syntax(position, format!("expected {}", what))
                }
                TokenErrorKind::Nom(kind) => {
                    ParseError::syntax(position, format!("unexpected input ({:?})", kind))
                }
            }
        }
    }
}

const MODIFIERS: [&str; 5] = ["sort", "select", "limit", "count", "distinct"];

/// Validates calls into AST nodes. Shared by both surface syntaxes.
struct Builder<'s> {
    source: &'s str,
    filters: Vec<Filter>,
    query: Query,
    seen: Vec<&'static str>,
}

impl<'s> Builder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            filters: Vec::new(),
            query: Query::default(),
            seen: Vec::new(),
        }
    }

    fn finish(mut self) -> Query {
        self.query.filter = match self.filters.len() {
            0 => None,
            1 => self.filters.pop(),
            _ => Some(Filter::and(self.filters)),
        };
        self.query
    }

    fn clause(&mut self, call: Call<'_>) -> Result<(), ParseError> {
        match call.name {
            "sort" => {
                self.once("sort")?;
                self.query.sort = self.sort(&call)?;
            }
            "select" => {
                self.once("select")?;
                self.query.select = Some(self.select(&call)?);
            }
            "limit" => {
                self.once("limit")?;
                let (limit, offset) = self.limit(&call)?;
                self.query.limit = Some(limit);
                self.query.offset = offset;
            }
            "count" => {
                self.once("count")?;
                if !call.args.is_empty() {
                    return Err(arity("count", "0", call.args.len()));
                }
                self.query.count = true;
            }
            "distinct" => {
                self.once("distinct")?;
                if !call.args.is_empty() {
                    return Err(arity("distinct", "0", call.args.len()));
                }
                self.query.distinct = true;
            }
            _ => {
                let filter = self.filter(&call)?;
                self.filters.push(filter);
            }
        }
        Ok(())
    }

    fn once(&mut self, name: &'static str) -> Result<(), ParseError> {
        if self.seen.contains(&name) {
            return Err(ParseError::DuplicateModifier(name.to_string()));
        }
        self.seen.push(name);
        Ok(())
    }

    fn filter(&self, call: &Call<'_>) -> Result<Filter, ParseError> {
        match call.name {
            "and" => self.boolean(Logic::And, call),
            "or" => self.boolean(Logic::Or, call),
            name if MODIFIERS.contains(&name) => Err(ParseError::MisplacedModifier(name.to_string())),
            name => match CompareOp::from_name(name) {
                Some(op) => self.comparison(op, call),
                None => Err(ParseError::UnknownOperator(name.to_string())),
            },
        }
    }

    fn boolean(&self, logic: Logic, call: &Call<'_>) -> Result<Filter, ParseError> {
        if call.args.is_empty() {
            return Err(arity(logic.name(), "1 or more", 0));
        }
        let mut children = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            match arg {
                Arg::Call(inner) => children.push(self.filter(inner)?),
                Arg::Group(group) => {
                    return Err(self.unexpected(group.span, "expected a filter expression, found a value list"));
                }
                Arg::Atom(text) => {
                    return Err(self.unexpected(text, "expected a filter expression"));
                }
            }
        }
        // A single-child combinator is the child itself.
        if children.len() == 1 {
            return Ok(children.remove(0));
        }
        Ok(Filter::Boolean { logic, children })
    }

    fn comparison(&self, op: CompareOp, call: &Call<'_>) -> Result<Filter, ParseError> {
        let [field, value] = call.args.as_slice() else {
            return Err(arity(op.name(), "2", call.args.len()));
        };
        let field = match field {
            Arg::Atom(text) if !text.is_empty() => text.to_string(),
            Arg::Atom(text) => return Err(self.unexpected(text, "expected a field name")),
            Arg::Call(inner) => return Err(self.unexpected(inner.span, "expected a field name")),
            Arg::Group(group) => return Err(self.unexpected(group.span, "expected a field name")),
        };

        let value = self.literal(value)?;
        if op.takes_array() {
            match &value {
                Literal::Array(items) if items.is_empty() => {
                    return Err(ParseError::EmptyArraySet { operator: op, field });
                }
                Literal::Array(_) => {}
                _ => return Err(ParseError::ExpectedArray { operator: op, field }),
            }
        } else if value.is_array() {
            return Err(ParseError::ExpectedScalar { operator: op, field });
        }
        Ok(Filter::Comparison { field, op, value })
    }

    fn literal(&self, arg: &Arg<'_>) -> Result<Literal, ParseError> {
        match arg {
            Arg::Atom(text) => scalar(text),
            Arg::Group(group) => group
                .items
                .iter()
                .map(|item| self.literal(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Literal::Array),
            Arg::Call(inner) => Err(self.unexpected(inner.span, "expected a value, found a call")),
        }
    }

    fn sort(&self, call: &Call<'_>) -> Result<Vec<SortKey>, ParseError> {
        if call.args.is_empty() {
            return Err(arity("sort", "1 or more", 0));
        }
        call.args
            .iter()
            .map(|arg| {
                let text = self.name_arg(arg)?;
                let key = match text.as_bytes()[0] {
                    b'+' => SortKey::asc(text[1..].trim()),
                    b'-' => SortKey::desc(text[1..].trim()),
                    _ => SortKey::asc(text),
                };
                if key.field.is_empty() {
                    return Err(self.unexpected(text, "expected a field name after sign"));
                }
                Ok(key)
            })
            .collect()
    }

    fn select(&self, call: &Call<'_>) -> Result<Vec<String>, ParseError> {
        if call.args.is_empty() {
            return Err(arity("select", "1 or more", 0));
        }
        let mut fields: Vec<String> = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let name = self.name_arg(arg)?;
            if !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        }
        Ok(fields)
    }

    fn limit(&self, call: &Call<'_>) -> Result<(u64, Option<u64>), ParseError> {
        let count = |arg: &Arg<'_>| -> Result<u64, ParseError> {
            let text = self.name_arg(arg)?;
            text.parse::<u64>().map_err(|_| ParseError::InvalidModifier {
                name: "limit".to_string(),
                value: text.to_string(),
                reason: "expected a non-negative integer".to_string(),
            })
        };
        match call.args.as_slice() {
            [limit] => Ok((count(limit)?, None)),
            [limit, offset] => Ok((count(limit)?, Some(count(offset)?))),
            args => Err(arity("limit", "1 or 2", args.len())),
        }
    }

    /// A non-empty bare word inside a modifier.
    fn name_arg<'a>(&self, arg: &Arg<'a>) -> Result<&'a str, ParseError> {
        match arg {
            Arg::Atom(text) if !text.is_empty() => Ok(*text),
            Arg::Atom(text) => Err(self.unexpected(text, "expected a name")),
            Arg::Call(inner) => Err(self.unexpected(inner.span, "expected a name, found a call")),
            Arg::Group(group) => Err(self.unexpected(group.span, "expected a name, found a value list")),
        }
    }

    fn unexpected(&self, at: &str, message: &str) -> ParseError {
        ParseError::syntax(self.source.offset(at), message)
    }
}

fn arity(name: &str, expected: &'static str, found: usize) -> ParseError {
    ParseError::WrongArity {
        name: name.to_string(),
        expected,
        found,
    }
}

/// Interpret a bare value: `null`, booleans, numbers, typed prefixes, or text.
fn scalar(text: &str) -> Result<Literal, ParseError> {
    if let Some(rest) = text.strip_prefix("string:") {
        return Ok(Literal::String(rest.to_string()));
    }
    if let Some(rest) = text.strip_prefix("number:") {
        return number(rest).ok_or_else(|| ParseError::InvalidValue(text.to_string()));
    }
    if let Some(rest) = text.strip_prefix("boolean:") {
        return match rest {
            "true" => Ok(Literal::Bool(true)),
            "false" => Ok(Literal::Bool(false)),
            _ => Err(ParseError::InvalidValue(text.to_string())),
        };
    }
    Ok(match text {
        "null" => Literal::Null,
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        _ => number(text).unwrap_or_else(|| Literal::String(text.to_string())),
    })
}

fn number(text: &str) -> Option<Literal> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(Literal::Int(n));
    }
    let numeric = text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if numeric {
        text.parse::<f64>().ok().filter(|n| n.is_finite()).map(Literal::Float)
    } else {
        None
    }
}
