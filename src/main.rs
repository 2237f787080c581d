use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use serde_json::{Map, Value};

use searchcriteria::config::{self, SearchConfig};
use searchcriteria::criteria::CriteriaQueryVisitor;
use searchcriteria::entity_catalog::EntitySchemaConfig;
use searchcriteria::executor::{InMemoryDatabase, QueryExecutor, ResultRow};
use searchcriteria::search_parser::{ParserContext, SearchConditionParser, SearchGrammar};
use searchcriteria::sql_generator::{self, generate_sql};

/// searchcriteria - translate FIQL / OData search expressions into SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Search expression, e.g. `id=lt=10,bookTitle==num*`
    expression: String,

    /// YAML entity schema
    #[arg(long)]
    schema: PathBuf,

    /// Root entity the expression applies to
    #[arg(long)]
    entity: String,

    /// YAML search configuration (overrides the flags below)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Expression grammar: fiql or odata
    #[arg(long, default_value = "fiql")]
    grammar: SearchGrammar,

    /// chrono format for date values
    #[arg(long)]
    date_format: Option<String>,

    /// chrono format for datetime values
    #[arg(long)]
    datetime_format: Option<String>,

    /// Accept UTC offsets on datetime values
    #[arg(long)]
    timezone_support: bool,

    /// Ignore comparisons on unknown properties
    #[arg(long)]
    lax: bool,

    /// Accept `=` as FIQL equality
    #[arg(long)]
    single_equals: bool,

    /// Percent-decode values
    #[arg(long)]
    decode_values: bool,

    /// Property alias, `name=real.path` (repeatable)
    #[arg(long = "alias", value_parser = parse_mapping)]
    aliases: Vec<(String, String)>,

    /// Bean property mapping, `name=real.path` (repeatable)
    #[arg(long = "bean", value_parser = parse_mapping)]
    beans: Vec<(String, String)>,

    /// Navigation paths to join up front (repeatable)
    #[arg(long = "join")]
    joins: Vec<String>,

    /// Comma-separated attributes to select instead of the whole entity
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,

    /// Comma-separated attributes to order by
    #[arg(long, value_delimiter = ',')]
    order_by: Vec<String>,

    /// Order descending
    #[arg(long)]
    desc: bool,

    /// Count matching rows instead of selecting them
    #[arg(long)]
    count: bool,

    /// JSON tables to run the query against
    #[arg(long)]
    data: Option<PathBuf>,

    /// Also print the flat condition SQL for this table
    #[arg(long)]
    print_condition: Option<String>,
}

impl From<&Cli> for config::CliConfig {
    fn from(cli: &Cli) -> Self {
        config::CliConfig {
            date_format: cli.date_format.clone(),
            datetime_format: cli.datetime_format.clone(),
            timezone_support: cli.timezone_support,
            lax_property_match: cli.lax,
            single_equals: cli.single_equals,
            decode_values: cli.decode_values,
            grammar: cli.grammar,
        }
    }
}

fn parse_mapping(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .ok_or_else(|| format!("expected name=path, got `{}`", raw))
}

fn row_to_json(row: ResultRow) -> Value {
    match row {
        ResultRow::Entity(value) => value,
        ResultRow::Tuple(tuple) => {
            let names = tuple.names().to_vec();
            Value::Object(names.into_iter().zip(tuple.into_values()).collect::<Map<_, _>>())
        }
        ResultRow::Array(values) => Value::Array(values),
        ResultRow::Count(n) => Value::from(n),
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Initialize logger - defaults to WARN level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let search_config = match &cli.config {
        Some(path) => SearchConfig::from_yaml_file(path),
        None => SearchConfig::from_cli((&cli).into()),
    }
    .context("Configuration error")?;

    let metamodel = EntitySchemaConfig::from_yaml_file(&cli.schema)
        .and_then(|schema| schema.to_metamodel())
        .with_context(|| format!("Failed to load schema {}", cli.schema.display()))?;

    let aliases: HashMap<String, String> = cli.aliases.iter().cloned().collect();
    let context = ParserContext::new(&metamodel, cli.entity.as_str())
        .with_aliases(aliases.clone())
        .with_bean_properties(cli.beans.iter().cloned().collect())
        .with_properties(search_config.to_context_properties());

    let condition = search_config
        .grammar
        .parser(context)
        .parse(&cli.expression)
        .map_err(|e| anyhow!("Invalid expression: {}", e))?;

    if let Some(table) = &cli.print_condition {
        println!("{}\n", sql_generator::to_sql(&condition, table));
    }

    let joins: Vec<&str> = cli.joins.iter().map(String::as_str).collect();
    let mut visitor = CriteriaQueryVisitor::new(&metamodel, &cli.entity)?
        .with_aliases(aliases)
        .with_joins(&joins)?;
    condition.accept(&mut visitor)?;

    if !cli.order_by.is_empty() {
        let order_by: Vec<&str> = cli.order_by.iter().map(String::as_str).collect();
        visitor = visitor.order_by(&order_by, !cli.desc)?;
    }
    let select: Vec<&str> = cli.select.iter().map(String::as_str).collect();
    let query = if cli.count {
        visitor.count_query()?
    } else if select.is_empty() {
        visitor.query()?
    } else {
        visitor.select_tuple(&select)?
    };

    println!("{}", generate_sql(&query));

    if let Some(path) = &cli.data {
        let database = InMemoryDatabase::from_json_file(path)?;
        let rows: Vec<Value> = database
            .execute(&query)?
            .into_iter()
            .map(row_to_json)
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    Ok(())
}
