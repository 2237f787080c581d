//! Query text front-ends.
//!
//! Both grammars parse into the same untyped [`ast::RawNode`] tree, which is
//! then resolved against the entity metamodel and type-coerced into a
//! [`SearchCondition`]. Property paths are validated eagerly here, so a tree
//! handed to a visitor only references attributes that exist.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity_catalog::{MetadataProvider, PropertyResolver};
use crate::search_condition::{
    AggregateComparison, CompositeKind, ConditionType, PrimitiveStatement, SearchCondition,
};

pub mod ast;
mod common;
pub(crate) mod errors;
pub mod fiql;
pub mod odata;
pub mod value_coercion;

use ast::{RawComparison, RawNode};
pub use common::Selector;
pub use errors::{SearchParseError, SearchSyntaxError};
use value_coercion::{coerce, percent_decode, CoercionOptions};

pub const DATE_FORMAT_PROPERTY: &str = "search.date-format";
pub const DATETIME_FORMAT_PROPERTY: &str = "search.datetime-format";
pub const TIMEZONE_SUPPORT_PROPERTY: &str = "search.timezone.support";
pub const LAX_PROPERTY_MATCH: &str = "search.lax.property.match";
pub const SUPPORT_SINGLE_EQUALS: &str = "fiql.support.single.equals.operator";
pub const DECODE_QUERY_VALUES: &str = "search.decode.values";

/// Parses query text into a resolved, typed condition tree.
pub trait SearchConditionParser {
    fn parse(&self, expression: &str) -> Result<SearchCondition, SearchParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchGrammar {
    #[default]
    Fiql,
    OData,
}

impl FromStr for SearchGrammar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fiql" => Ok(SearchGrammar::Fiql),
            "odata" => Ok(SearchGrammar::OData),
            other => Err(format!("unknown grammar `{}` (expected fiql or odata)", other)),
        }
    }
}

impl fmt::Display for SearchGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchGrammar::Fiql => write!(f, "fiql"),
            SearchGrammar::OData => write!(f, "odata"),
        }
    }
}

impl SearchGrammar {
    pub fn parser<'a>(&self, context: ParserContext<'a>) -> Box<dyn SearchConditionParser + 'a> {
        match self {
            SearchGrammar::Fiql => Box::new(FiqlParser::new(context)),
            SearchGrammar::OData => Box::new(ODataParser::new(context)),
        }
    }
}

/// Everything a parser needs besides the query text: the metamodel, the root
/// entity, property mappings and free-form context properties.
#[derive(Clone)]
pub struct ParserContext<'a> {
    metadata: &'a dyn MetadataProvider,
    root: String,
    bean_properties: HashMap<String, String>,
    aliases: HashMap<String, String>,
    properties: HashMap<String, String>,
}

impl<'a> ParserContext<'a> {
    pub fn new(metadata: &'a dyn MetadataProvider, root: impl Into<String>) -> Self {
        ParserContext {
            metadata,
            root: root.into(),
            bean_properties: HashMap::new(),
            aliases: HashMap::new(),
            properties: HashMap::new(),
        }
    }

    /// Bean-property map, consulted before the alias map
    pub fn with_bean_properties(mut self, map: HashMap<String, String>) -> Self {
        self.bean_properties = map;
        self
    }

    pub fn with_aliases(mut self, map: HashMap<String, String>) -> Self {
        self.aliases = map;
        self
    }

    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn metadata(&self) -> &'a dyn MetadataProvider {
        self.metadata
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Boolean context property; only `true` (any case) enables it
    pub fn flag(&self, key: &str) -> bool {
        self.property(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn coercion_options(&self) -> CoercionOptions {
        let defaults = CoercionOptions::default();
        CoercionOptions {
            date_format: self
                .property(DATE_FORMAT_PROPERTY)
                .map(str::to_string)
                .unwrap_or(defaults.date_format),
            datetime_format: self
                .property(DATETIME_FORMAT_PROPERTY)
                .map(str::to_string)
                .unwrap_or(defaults.datetime_format),
            timezone_support: self.flag(TIMEZONE_SUPPORT_PROPERTY),
        }
    }

    pub fn resolver(&self) -> Result<PropertyResolver<'_>, SearchParseError> {
        Ok(PropertyResolver::new(self.metadata, &self.root)?
            .with_bean_properties(&self.bean_properties)
            .with_aliases(&self.aliases))
    }
}

pub struct FiqlParser<'a> {
    context: ParserContext<'a>,
}

impl<'a> FiqlParser<'a> {
    pub fn new(context: ParserContext<'a>) -> Self {
        FiqlParser { context }
    }

    pub fn context(&self) -> &ParserContext<'a> {
        &self.context
    }
}

impl SearchConditionParser for FiqlParser<'_> {
    fn parse(&self, expression: &str) -> Result<SearchCondition, SearchParseError> {
        log::debug!("Parsing FIQL expression: {}", expression);
        let single_equals = self.context.flag(SUPPORT_SINGLE_EQUALS);
        let raw = fiql::parse_fiql(expression, single_equals)?;
        let operators = move |token: &str| fiql::fiql_operator(token, single_equals);
        ConditionBuilder::new(&self.context, &operators)?.build_root(raw)
    }
}

pub struct ODataParser<'a> {
    context: ParserContext<'a>,
}

impl<'a> ODataParser<'a> {
    pub fn new(context: ParserContext<'a>) -> Self {
        ODataParser { context }
    }

    pub fn context(&self) -> &ParserContext<'a> {
        &self.context
    }
}

impl SearchConditionParser for ODataParser<'_> {
    fn parse(&self, expression: &str) -> Result<SearchCondition, SearchParseError> {
        log::debug!("Parsing OData expression: {}", expression);
        let raw = odata::parse_odata(expression)?;
        ConditionBuilder::new(&self.context, &odata::odata_operator)?.build_root(raw)
    }
}

/// Turns a raw tree into a [`SearchCondition`], resolving and coercing every leaf.
struct ConditionBuilder<'c> {
    resolver: PropertyResolver<'c>,
    operators: &'c dyn Fn(&str) -> Option<ConditionType>,
    options: CoercionOptions,
    lax: bool,
    decode: bool,
}

impl<'c> ConditionBuilder<'c> {
    fn new(
        context: &'c ParserContext<'_>,
        operators: &'c dyn Fn(&str) -> Option<ConditionType>,
    ) -> Result<Self, SearchParseError> {
        Ok(ConditionBuilder {
            resolver: context.resolver()?,
            operators,
            options: context.coercion_options(),
            lax: context.flag(LAX_PROPERTY_MATCH),
            decode: context.flag(DECODE_QUERY_VALUES),
        })
    }

    fn build_root(&self, node: RawNode<'_>) -> Result<SearchCondition, SearchParseError> {
        self.build(node)?.ok_or(SearchParseError::EmptyCondition)
    }

    fn build(&self, node: RawNode<'_>) -> Result<Option<SearchCondition>, SearchParseError> {
        match node {
            RawNode::Comparison(comparison) => self.build_comparison(comparison),
            RawNode::Composite { kind, children } => {
                let mut built = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(condition) = self.build(child)? {
                        built.push(condition);
                    }
                }
                if built.is_empty() {
                    return Ok(None);
                }
                Ok(Some(match kind {
                    CompositeKind::And => SearchCondition::and(built),
                    CompositeKind::Or => SearchCondition::or(built),
                }))
            }
        }
    }

    fn build_comparison(
        &self,
        comparison: RawComparison<'_>,
    ) -> Result<Option<SearchCondition>, SearchParseError> {
        let RawComparison {
            selector,
            operator,
            value,
        } = comparison;

        let condition =
            (self.operators)(operator).ok_or_else(|| SearchParseError::UnknownOperator {
                operator: operator.to_string(),
            })?;

        let path = match self.resolver.resolve_path(selector.path, selector.aggregate) {
            Ok(path) => path,
            Err(source) if self.lax => {
                log::warn!(
                    "Ignoring comparison on unknown property `{}`: {}",
                    selector.path,
                    source
                );
                return Ok(None);
            }
            Err(source) => {
                return Err(SearchParseError::PropertyNotFound {
                    property: selector.path.to_string(),
                    value: value.into_owned(),
                    source,
                })
            }
        };

        let raw = if self.decode {
            percent_decode(&value)?
        } else {
            value.into_owned()
        };

        let target = path.comparison_type();
        if target.is_string() && !raw.is_empty() && raw.chars().all(|c| c == '*') {
            return Err(SearchParseError::InvalidWildcard { value: raw });
        }
        let typed = coerce(&raw, &target, &self.options)?;
        log::debug!(
            "Comparison {} {} {:?} on `{}`",
            selector.path,
            condition,
            typed,
            path.real_path
        );

        let statement = PrimitiveStatement::new(selector.path, condition, typed, path);
        Ok(Some(match selector.aggregate {
            Some(function) => {
                SearchCondition::Aggregate(AggregateComparison::new(function, statement))
            }
            None => SearchCondition::Comparison(statement),
        }))
    }
}
