use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, recognize},
    error::{context, ContextError, ParseError},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use crate::entity_catalog::AggregateFunction;

use super::errors::{SearchParseError, SearchSyntaxError};

pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

/// Property selector: a dotted path, optionally wrapped in an aggregate call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector<'a> {
    pub path: &'a str,
    pub aggregate: Option<AggregateFunction>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

pub fn identifier<'a, E>(input: &'a str) -> IResult<&'a str, &'a str, E>
where
    E: ParseError<&'a str> + ContextError<&'a str>,
{
    context("expected property name", take_while1(is_name_char)).parse(input)
}

// e.g. "bookTitle", "reviews.book.ownerInfo.name"
pub fn property_path<'a, E>(input: &'a str) -> IResult<&'a str, &'a str, E>
where
    E: ParseError<&'a str> + ContextError<&'a str>,
{
    recognize(pair(identifier, many0(preceded(char('.'), identifier)))).parse(input)
}

/// `count(path)` or a bare `path`
pub fn selector(input: &str) -> IResult<&str, Selector<'_>, SearchSyntaxError<'_>> {
    let count = map(
        delimited(
            pair(tag("count"), ws(char('('))),
            property_path,
            context("expected `)` closing count(", preceded(multispace0, char(')'))),
        ),
        |path| Selector {
            path,
            aggregate: Some(AggregateFunction::Count),
        },
    );
    let plain = map(property_path, |path| Selector {
        path,
        aggregate: None,
    });
    context("expected property selector", nom::branch::alt((count, plain))).parse(input)
}

/// Bracket balance check run before the grammar so unbalanced input gets a
/// precise message. Brackets inside `quote`-delimited literals are skipped.
pub fn check_brackets(expression: &str, quote: Option<char>) -> Result<(), SearchParseError> {
    let mut level = 0i32;
    let mut quoted = false;
    for (idx, c) in expression.char_indices() {
        if Some(c) == quote {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        match c {
            '(' => level += 1,
            ')' => {
                level -= 1;
                if level < 0 {
                    return Err(SearchParseError::UnexpectedClosingBracket { position: idx });
                }
            }
            _ => {}
        }
    }
    if level != 0 {
        return Err(SearchParseError::UnmatchedBrackets {
            expression: expression.to_string(),
        });
    }
    Ok(())
}

/// The `;`/`,`/bracket delimited term surrounding byte offset `position`.
pub fn enclosing_term(expression: &str, position: usize) -> &str {
    let position = position.min(expression.len());
    let is_delimiter = |c: char| matches!(c, ';' | ',' | '(' | ')');
    let start = expression[..position]
        .rfind(is_delimiter)
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = expression[position..]
        .find(is_delimiter)
        .map(|i| i + position)
        .unwrap_or(expression.len());
    &expression[start..end]
}
