use std::borrow::Cow;

use super::common::Selector;
use crate::search_condition::CompositeKind;

/// Untyped parse tree shared by both grammars, before property resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum RawNode<'a> {
    Comparison(RawComparison<'a>),
    Composite {
        kind: CompositeKind,
        children: Vec<RawNode<'a>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawComparison<'a> {
    pub selector: Selector<'a>,
    /// Operator token exactly as written
    pub operator: &'a str,
    pub value: Cow<'a, str>,
}

impl<'a> RawNode<'a> {
    /// Join `children` under `kind`, keeping a lone child as is
    pub fn group(kind: CompositeKind, mut children: Vec<RawNode<'a>>) -> RawNode<'a> {
        if children.len() == 1 {
            if let Some(only) = children.pop() {
                return only;
            }
        }
        RawNode::Composite { kind, children }
    }
}
