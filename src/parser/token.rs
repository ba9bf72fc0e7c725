//! Token tree shared by both surface syntaxes.
//!
//! The functional and infix tokenizers each turn one clause into a [`Call`];
//! the builder in `parser/mod.rs` validates calls into the AST without
//! knowing which tokenizer produced them.

use nom::character::complete::{char, multispace0};
use nom::error::{ErrorKind, ParseError};
use nom::IResult;

/// Maximum nesting of calls and value lists.
pub const MAX_DEPTH: usize = 32;

/// `name(arg, ...)`. `span` starts where the clause starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Call<'a> {
    pub name: &'a str,
    pub args: Vec<Arg<'a>>,
    pub span: &'a str,
}

/// One argument inside a call or a value list.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<'a> {
    Call(Call<'a>),
    Group(Group<'a>),
    Atom(&'a str),
}

/// A parenthesized value list `(a,b,...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub items: Vec<Arg<'a>>,
    pub span: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenErrorKind {
    Nom(ErrorKind),
    Unterminated,
    TooDeep,
    Expected(&'static str),
}

/// nom error carrying the remaining input, so positions can be recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenError<'a> {
    pub input: &'a str,
    pub kind: TokenErrorKind,
}

impl<'a> TokenError<'a> {
    pub fn new(input: &'a str, kind: TokenErrorKind) -> Self {
        Self { input, kind }
    }

    /// Unrecoverable: stops `alt` from trying other branches.
    pub fn failure<T>(input: &'a str, kind: TokenErrorKind) -> TokenResult<'a, T> {
        Err(nom::Err::Failure(Self::new(input, kind)))
    }
}

impl<'a> ParseError<&'a str> for TokenError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::new(input, TokenErrorKind::Nom(kind))
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

pub type TokenResult<'a, T> = IResult<&'a str, T, TokenError<'a>>;

/// Characters that end a bare value.
pub fn is_delimiter(c: char) -> bool {
    matches!(c, '(' | ')' | ',' | '&' | '=')
}

/// Parse a bare value, trimmed of surrounding whitespace. May be empty.
pub fn atom(input: &str) -> TokenResult<'_, &str> {
    let end = input.find(is_delimiter).unwrap_or(input.len());
    Ok((&input[end..], input[..end].trim()))
}

/// Parse `(item, item, ...)`, where `item` parses one argument at `depth`.
///
/// An unclosed list fails at its opening parenthesis.
pub fn list<'a, F>(input: &'a str, depth: usize, mut item: F) -> TokenResult<'a, Vec<Arg<'a>>>
where
    F: FnMut(&'a str, usize) -> TokenResult<'a, Arg<'a>>,
{
    if depth > MAX_DEPTH {
        return TokenError::failure(input, TokenErrorKind::TooDeep);
    }
    let (mut rest, _) = char('(')(input)?;
    let mut items = Vec::new();

    let (after, _) = multispace0(rest)?;
    if let Ok((after, _)) = char::<_, TokenError>(')')(after) {
        return Ok((after, items));
    }

    loop {
        let (after, arg) = item(rest, depth)?;
        items.push(arg);
        let (after, _) = multispace0(after)?;
        if let Ok((after, _)) = char::<_, TokenError>(',')(after) {
            rest = after;
            continue;
        }
        if let Ok((after, _)) = char::<_, TokenError>(')')(after) {
            return Ok((after, items));
        }
        if after.is_empty() {
            return TokenError::failure(input, TokenErrorKind::Unterminated);
        }
        return TokenError::failure(after, TokenErrorKind::Expected("',' or ')'"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_stops_at_delimiters() {
        assert_eq!(atom("alice,bob"), Ok((",bob", "alice")));
        assert_eq!(atom(" padded )"), Ok((")", "padded")));
        assert_eq!(atom(""), Ok(("", "")));
    }

    #[test]
    fn test_list_of_atoms() {
        let parsed = list("(a, b,c)rest", 1, |i, _| atom(i).map(|(r, a)| (r, Arg::Atom(a))));
        assert_eq!(
            parsed,
            Ok(("rest", vec![Arg::Atom("a"), Arg::Atom("b"), Arg::Atom("c")]))
        );
    }

    #[test]
    fn test_unterminated_list_points_at_open_paren() {
        let input = "(a,b";
        let err = list(input, 1, |i, _| atom(i).map(|(r, a)| (r, Arg::Atom(a)))).unwrap_err();
        match err {
            nom::Err::Failure(e) => {
                assert_eq!(e.kind, TokenErrorKind::Unterminated);
                assert_eq!(e.input, input);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
