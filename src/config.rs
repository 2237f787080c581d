use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::search_parser::{
    SearchGrammar, DATETIME_FORMAT_PROPERTY, DATE_FORMAT_PROPERTY, DECODE_QUERY_VALUES,
    LAX_PROPERTY_MATCH, SUPPORT_SINGLE_EQUALS, TIMEZONE_SUPPORT_PROPERTY,
};
use crate::search_parser::value_coercion::{DEFAULT_DATETIME_FORMAT, DEFAULT_DATE_FORMAT};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Parser settings shared by every search expression
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// chrono format for `date` attributes
    #[validate(custom(function = "validate_format"))]
    pub date_format: String,

    /// chrono format for `datetime` attributes
    #[validate(custom(function = "validate_format"))]
    pub datetime_format: String,

    /// Accept offsets such as `+01:00` on datetime values
    pub timezone_support: bool,

    /// Drop comparisons on unknown properties instead of failing
    pub lax_property_match: bool,

    /// Accept `=` as FIQL equality
    pub single_equals: bool,

    /// Percent-decode values before coercion
    pub decode_values: bool,

    pub grammar: SearchGrammar,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            timezone_support: false,
            lax_property_match: false,
            single_equals: false,
            decode_values: false,
            grammar: SearchGrammar::Fiql,
        }
    }
}

impl SearchConfig {
    /// Create configuration from `SEARCH_*` environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let grammar = env::var("SEARCH_GRAMMAR").unwrap_or_else(|_| "fiql".to_string());
        let config = Self {
            date_format: env::var("SEARCH_DATE_FORMAT")
                .unwrap_or_else(|_| DEFAULT_DATE_FORMAT.to_string()),
            datetime_format: env::var("SEARCH_DATETIME_FORMAT")
                .unwrap_or_else(|_| DEFAULT_DATETIME_FORMAT.to_string()),
            timezone_support: parse_env_var("SEARCH_TIMEZONE_SUPPORT", "false")?,
            lax_property_match: parse_env_var("SEARCH_LAX_PROPERTY_MATCH", "false")?,
            single_equals: parse_env_var("SEARCH_SINGLE_EQUALS", "false")?,
            decode_values: parse_env_var("SEARCH_DECODE_VALUES", "false")?,
            grammar: grammar.parse().map_err(|e: String| ConfigError::Parse {
                field: "SEARCH_GRAMMAR".to_string(),
                value: grammar.clone(),
                source: e.into(),
            })?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            date_format: cli.date_format.unwrap_or(defaults.date_format),
            datetime_format: cli.datetime_format.unwrap_or(defaults.datetime_format),
            timezone_support: cli.timezone_support,
            lax_property_match: cli.lax_property_match,
            single_equals: cli.single_equals,
            decode_values: cli.decode_values,
            grammar: cli.grammar,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file; missing keys take their defaults
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parser context properties equivalent to this configuration
    pub fn to_context_properties(&self) -> HashMap<String, String> {
        let mut properties = HashMap::new();
        properties.insert(DATE_FORMAT_PROPERTY.to_string(), self.date_format.clone());
        properties.insert(
            DATETIME_FORMAT_PROPERTY.to_string(),
            self.datetime_format.clone(),
        );
        for (key, flag) in [
            (TIMEZONE_SUPPORT_PROPERTY, self.timezone_support),
            (LAX_PROPERTY_MATCH, self.lax_property_match),
            (SUPPORT_SINGLE_EQUALS, self.single_equals),
            (DECODE_QUERY_VALUES, self.decode_values),
        ] {
            properties.insert(key.to_string(), flag.to_string());
        }
        properties
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub date_format: Option<String>,
    pub datetime_format: Option<String>,
    pub timezone_support: bool,
    pub lax_property_match: bool,
    pub single_equals: bool,
    pub decode_values: bool,
    pub grammar: SearchGrammar,
}

/// A chrono format needs at least one `%` specifier
fn validate_format(format: &str) -> Result<(), ValidationError> {
    if format.contains('%') {
        Ok(())
    } else {
        let mut error = ValidationError::new("format");
        error.message = Some("must contain at least one chrono specifier such as %Y".into());
        Err(error)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
