//! Tokenizer for the functional syntax: `op(arg,...)`.
//!
//! ```text
//! and(eq(name,Alice),in(status,(active,pending)))
//! ─┬─ ─┬──────────── ─┬─────── ─┬──────────────
//!  │   │              │         └── Group (value list)
//!  │   │              └── Atom (field name)
//!  │   └── Call (nested)
//!  └── Call name
//! ```

use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0};

use super::token::{atom, list, Arg, Call, Group, TokenResult};

/// Parse an identifier (operator or modifier name).
fn identifier(input: &str) -> TokenResult<'_, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Parse one top-level clause written as a call.
pub fn clause(input: &str) -> TokenResult<'_, Call<'_>> {
    call(input, 1)
}

/// Parse `name(args)`. Fails softly when `input` is not a call at all.
fn call(input: &str, depth: usize) -> TokenResult<'_, Call<'_>> {
    let (rest, name) = identifier(input)?;
    let (rest, _) = multispace0(rest)?;
    // Only an identifier directly followed by '(' is a call.
    char('(')(rest)?;
    let (rest, args) = list(rest, depth, arg)?;
    Ok((
        rest,
        Call {
            name,
            args,
            span: input,
        },
    ))
}

/// Parse one argument: a nested call, a value list, or a bare value.
fn arg(input: &str, depth: usize) -> TokenResult<'_, Arg<'_>> {
    let (input, _) = multispace0(input)?;

    if input.starts_with('(') {
        let (rest, items) = list(input, depth + 1, arg)?;
        return Ok((rest, Arg::Group(Group { items, span: input })));
    }

    match call(input, depth + 1) {
        Ok((rest, call)) => Ok((rest, Arg::Call(call))),
        Err(nom::Err::Error(_)) => {
            let (rest, value) = atom(input)?;
            Ok((rest, Arg::Atom(value)))
        }
        Err(e) => Err(e),
    }
}
