//! FIQL grammar.
//!
//! ```text
//! or_expression  := and_expression ( ',' and_expression )*
//! and_expression := term ( ';' term )*
//! term           := '(' or_expression ')' | comparison
//! comparison     := selector operator value
//! operator       := '==' | '!=' | '=' alpha+ '=' | '='   (last one only when enabled)
//! ```
//!
//! `;` binds tighter than `,`.

use std::borrow::Cow;
use std::collections::HashMap;

use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, char},
    combinator::{all_consuming, cut, recognize},
    error::context,
    multi::many0,
    sequence::{delimited, preceded},
    IResult, Parser,
};

use super::ast::{RawComparison, RawNode};
use super::common::{check_brackets, enclosing_term, selector};
use super::errors::{SearchParseError, SearchSyntaxError};
use crate::search_condition::{CompositeKind, ConditionType};

pub const OR: char = ',';
pub const AND: char = ';';

lazy_static! {
    static ref FIQL_OPERATORS: HashMap<&'static str, ConditionType> = {
        let mut m = HashMap::new();
        m.insert("==", ConditionType::Equals);
        m.insert("!=", ConditionType::NotEquals);
        m.insert("=lt=", ConditionType::LessThan);
        m.insert("=le=", ConditionType::LessOrEquals);
        m.insert("=gt=", ConditionType::GreaterThan);
        m.insert("=ge=", ConditionType::GreaterOrEquals);
        m
    };
}

/// Maps a FIQL operator token; `=` is only accepted when `single_equals` is set.
pub fn fiql_operator(token: &str, single_equals: bool) -> Option<ConditionType> {
    if single_equals && token == "=" {
        return Some(ConditionType::Equals);
    }
    FIQL_OPERATORS.get(token).copied()
}

struct FiqlGrammar {
    single_equals: bool,
}

impl FiqlGrammar {
    fn or_expression<'a>(
        &self,
        input: &'a str,
    ) -> IResult<&'a str, RawNode<'a>, SearchSyntaxError<'a>> {
        let (input, first) = self.and_expression(input)?;
        let (input, rest) =
            many0(preceded(char(OR), cut(|i| self.and_expression(i)))).parse(input)?;

        let mut children = Vec::with_capacity(rest.len() + 1);
        children.push(first);
        children.extend(rest);
        Ok((input, RawNode::group(CompositeKind::Or, children)))
    }

    fn and_expression<'a>(
        &self,
        input: &'a str,
    ) -> IResult<&'a str, RawNode<'a>, SearchSyntaxError<'a>> {
        let (input, first) = self.term(input)?;
        let (input, rest) = many0(preceded(char(AND), cut(|i| self.term(i)))).parse(input)?;

        let mut children = Vec::with_capacity(rest.len() + 1);
        children.push(first);
        children.extend(rest);
        Ok((input, RawNode::group(CompositeKind::And, children)))
    }

    fn term<'a>(&self, input: &'a str) -> IResult<&'a str, RawNode<'a>, SearchSyntaxError<'a>> {
        alt((
            delimited(
                char('('),
                |i| self.or_expression(i),
                context("expected `)`", cut(char(')'))),
            ),
            |i| self.comparison(i),
        ))
        .parse(input)
    }

    fn comparison<'a>(
        &self,
        input: &'a str,
    ) -> IResult<&'a str, RawNode<'a>, SearchSyntaxError<'a>> {
        let (input, selector) = selector(input)?;
        let (input, operator) =
            context("expected comparison operator", cut(|i| self.operator(i))).parse(input)?;
        let (input, value) = context(
            "expected value",
            cut(take_while1(|c| !matches!(c, AND | OR | '(' | ')'))),
        )
        .parse(input)?;

        Ok((
            input,
            RawNode::Comparison(RawComparison {
                selector,
                operator,
                value: Cow::Borrowed(value),
            }),
        ))
    }

    fn operator<'a>(&self, input: &'a str) -> IResult<&'a str, &'a str, SearchSyntaxError<'a>> {
        let result = alt((
            tag("=="),
            tag("!="),
            recognize(delimited(char('='), alpha1, char('='))),
        ))
        .parse(input);
        match result {
            Err(nom::Err::Error(_)) if self.single_equals => tag("=").parse(input),
            other => other,
        }
    }
}

/// Parse a FIQL expression into the untyped tree.
pub fn parse_fiql(expression: &str, single_equals: bool) -> Result<RawNode<'_>, SearchParseError> {
    if expression.trim().is_empty() {
        return Err(SearchParseError::EmptyCondition);
    }
    check_brackets(expression, None)?;
    check_dangling(expression)?;

    let grammar = FiqlGrammar { single_equals };
    let result = all_consuming(|i| grammar.or_expression(i)).parse(expression);
    match result {
        Ok((_, node)) => Ok(node),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(diagnose(expression, e)),
        Err(nom::Err::Incomplete(_)) => Err(SearchParseError::Syntax {
            position: expression.len(),
            message: "incomplete input".to_string(),
        }),
    }
}

fn check_dangling(expression: &str) -> Result<(), SearchParseError> {
    let Some(last) = expression.chars().last() else {
        return Ok(());
    };
    if last != AND && last != OR {
        return Ok(());
    }
    let body = &expression[..expression.len() - 1];
    let mut level = 0i32;
    let mut start = 0;
    for (idx, c) in body.char_indices() {
        match c {
            '(' => level += 1,
            ')' => level -= 1,
            AND | OR if level == 0 => start = idx + 1,
            _ => {}
        }
    }
    Err(SearchParseError::DanglingOperator {
        fragment: expression[start..].to_string(),
    })
}

fn diagnose(expression: &str, error: SearchSyntaxError<'_>) -> SearchParseError {
    let parse_error = error.into_parse_error(expression);
    match parse_error {
        SearchParseError::Syntax {
            position,
            ref message,
        } if message == "expected value" || message == "expected comparison operator" => {
            SearchParseError::NotAComparison {
                expression: enclosing_term(expression, position).to_string(),
            }
        }
        other => other,
    }
}
