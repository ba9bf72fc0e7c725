//! Tokenizer for the infix syntax: `field=op=value` and `field=value`.
//!
//! Each clause is rewritten into the same [`Call`] shape the functional
//! tokenizer produces: `age=gt=30` becomes `gt(age,30)`, and the implied
//! equality `name=Alice` becomes `eq(name,Alice)`.

use nom::bytes::complete::take_while1;
use nom::character::complete::char;

use super::token::{atom, is_delimiter, list, Arg, Call, Group, TokenError, TokenErrorKind, TokenResult};

/// Operator name used when a clause has no explicit operator.
const IMPLIED_OPERATOR: &str = "eq";

fn field(input: &str) -> TokenResult<'_, &str> {
    let (rest, name) = take_while1(|c: char| !is_delimiter(c))(input)?;
    Ok((rest, name.trim()))
}

fn operator(input: &str) -> TokenResult<'_, &str> {
    let (rest, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    let (rest, _) = char('=')(rest)?;
    Ok((rest, name))
}

/// Parse one top-level clause written in infix form.
pub fn clause(input: &str) -> TokenResult<'_, Call<'_>> {
    let (rest, name) = field(input)?;
    let (rest, _) = char('=')(rest)?;

    let (rest, op) = match operator(rest) {
        Ok((rest, op)) => (rest, op),
        Err(nom::Err::Error(_)) => (rest, IMPLIED_OPERATOR),
        Err(e) => return Err(e),
    };

    let (rest, value) = value(rest)?;
    Ok((
        rest,
        Call {
            name: op,
            args: vec![Arg::Atom(name), value],
            span: input,
        },
    ))
}

/// A value is either a bare atom or a flat list `(a,b,...)`.
fn value(input: &str) -> TokenResult<'_, Arg<'_>> {
    if input.starts_with('(') {
        let (rest, items) = list(input, 1, group_item)?;
        return Ok((rest, Arg::Group(Group { items, span: input })));
    }
    let (rest, value) = atom(input)?;
    Ok((rest, Arg::Atom(value)))
}

fn group_item(input: &str, depth: usize) -> TokenResult<'_, Arg<'_>> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('(') {
        let (rest, items) = list(trimmed, depth + 1, group_item)?;
        return Ok((rest, Arg::Group(Group { items, span: trimmed })));
    }
    let (rest, value) = atom(input)?;
    if rest.starts_with('=') {
        return TokenError::failure(rest, TokenErrorKind::Expected("',' or ')'"));
    }
    Ok((rest, Arg::Atom(value)))
}
