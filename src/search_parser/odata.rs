//! OData `$filter` grammar subset.
//!
//! ```text
//! or_expression  := and_expression ( 'or' and_expression )*
//! and_expression := term ( 'and' term )*
//! term           := '(' or_expression ')' | comparison
//! comparison     := selector operator value
//! operator       := 'eq' | 'ne' | 'lt' | 'le' | 'gt' | 'ge'
//! value          := '\'' ( [^'] | '\'\'' )* '\'' | bare-token
//! ```
//!
//! Keywords are case-insensitive; `and` binds tighter than `or`.

use std::borrow::Cow;
use std::collections::HashMap;

use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{alpha1, char, multispace0, multispace1, satisfy},
    combinator::{all_consuming, cut, not},
    error::{context, ContextError, ParseError},
    multi::many0,
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

use super::ast::{RawComparison, RawNode};
use super::common::{check_brackets, selector, ws};
use super::errors::{SearchParseError, SearchSyntaxError};
use crate::search_condition::{CompositeKind, ConditionType};

lazy_static! {
    static ref ODATA_OPERATORS: HashMap<&'static str, ConditionType> = {
        let mut m = HashMap::new();
        m.insert("eq", ConditionType::Equals);
        m.insert("ne", ConditionType::NotEquals);
        m.insert("lt", ConditionType::LessThan);
        m.insert("le", ConditionType::LessOrEquals);
        m.insert("gt", ConditionType::GreaterThan);
        m.insert("ge", ConditionType::GreaterOrEquals);
        m
    };
}

pub fn odata_operator(token: &str) -> Option<ConditionType> {
    ODATA_OPERATORS
        .get(token.to_ascii_lowercase().as_str())
        .copied()
}

fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = SearchSyntaxError<'a>> {
    delimited(
        multispace1,
        tag_no_case(word),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

fn or_expression(input: &str) -> IResult<&str, RawNode<'_>, SearchSyntaxError<'_>> {
    let (input, first) = and_expression(input)?;
    let (input, rest) = many0(preceded(
        keyword("or"),
        cut(preceded(multispace0, and_expression)),
    ))
    .parse(input)?;

    let mut children = Vec::with_capacity(rest.len() + 1);
    children.push(first);
    children.extend(rest);
    Ok((input, RawNode::group(CompositeKind::Or, children)))
}

fn and_expression(input: &str) -> IResult<&str, RawNode<'_>, SearchSyntaxError<'_>> {
    let (input, first) = term(input)?;
    let (input, rest) =
        many0(preceded(keyword("and"), cut(preceded(multispace0, term)))).parse(input)?;

    let mut children = Vec::with_capacity(rest.len() + 1);
    children.push(first);
    children.extend(rest);
    Ok((input, RawNode::group(CompositeKind::And, children)))
}

fn term(input: &str) -> IResult<&str, RawNode<'_>, SearchSyntaxError<'_>> {
    alt((
        delimited(
            terminated(char('('), multispace0),
            or_expression,
            context("expected `)`", cut(preceded(multispace0, char(')')))),
        ),
        comparison,
    ))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, RawNode<'_>, SearchSyntaxError<'_>> {
    let (input, selector) = selector(input)?;
    let (input, operator) = context(
        "expected comparison operator",
        cut(delimited(multispace1, alpha1, multispace1)),
    )
    .parse(input)?;
    let (input, value) =
        context("expected value", cut(alt((quoted_string, bare_value)))).parse(input)?;

    Ok((
        input,
        RawNode::Comparison(RawComparison {
            selector,
            operator,
            value,
        }),
    ))
}

fn bare_value<'a, E>(input: &'a str) -> IResult<&'a str, Cow<'a, str>, E>
where
    E: ParseError<&'a str> + ContextError<&'a str>,
{
    take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')')
        .map(Cow::Borrowed)
        .parse(input)
}

/// Single-quoted literal; `''` stands for one quote.
fn quoted_string(input: &str) -> IResult<&str, Cow<'_, str>, SearchSyntaxError<'_>> {
    let (body, _) = char('\'').parse(input)?;
    let mut unescaped: Option<String> = None;
    let mut chars = body.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != '\'' {
            if let Some(buf) = unescaped.as_mut() {
                buf.push(c);
            }
            continue;
        }
        if let Some((_, '\'')) = chars.peek() {
            chars.next();
            unescaped
                .get_or_insert_with(|| body[..idx].to_string())
                .push('\'');
            continue;
        }
        let value = match unescaped {
            Some(s) => Cow::Owned(s),
            None => Cow::Borrowed(&body[..idx]),
        };
        return Ok((&body[idx + 1..], value));
    }
    Err(nom::Err::Failure(SearchSyntaxError {
        errors: vec![(input, "unterminated string literal")],
    }))
}

/// Parse an OData filter expression into the untyped tree.
pub fn parse_odata(expression: &str) -> Result<RawNode<'_>, SearchParseError> {
    if expression.trim().is_empty() {
        return Err(SearchParseError::EmptyCondition);
    }
    check_brackets(expression, Some('\''))?;
    check_dangling(expression)?;

    match all_consuming(ws(or_expression)).parse(expression) {
        Ok((_, node)) => Ok(node),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e.into_parse_error(expression)),
        Err(nom::Err::Incomplete(_)) => Err(SearchParseError::Syntax {
            position: expression.len(),
            message: "incomplete input".to_string(),
        }),
    }
}

fn check_dangling(expression: &str) -> Result<(), SearchParseError> {
    let trimmed = expression.trim_end();
    let lower = trimmed.to_ascii_lowercase();
    for word in [" and", " or"] {
        if lower.ends_with(word) {
            let start = trimmed.len() - word.len();
            let before = trimmed[..start].rsplit(' ').next().unwrap_or_default();
            return Err(SearchParseError::DanglingOperator {
                fragment: format!("{}{}", before, &trimmed[start..]),
            });
        }
    }
    Ok(())
}
