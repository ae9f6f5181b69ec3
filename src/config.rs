//! Configuration document loading for chaind.
use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::ConfigError;
use crate::value::Value;

/// Represents the structure of the configuration file.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Ordered list of process declarations.
    pub processes: Vec<ProcessConfig>,
}

/// One declared process: a name and an ordered statement list.
#[derive(Debug, Deserialize, Clone)]
pub struct ProcessConfig {
    /// Process name, used in log prefixes.
    pub name: String,
    /// Ordered statements; each is brought up in order and torn down in
    /// reverse order.
    #[serde(default)]
    pub statements: Vec<StatementConfig>,
}

/// One declared statement within a process.
#[derive(Debug, Deserialize, Clone)]
pub struct StatementConfig {
    /// Optional local name; absent means the statement cannot be referenced
    /// by later statements.
    pub name: Option<String>,
    /// Dotted module type name, resolved against the registry at load time.
    pub module: String,
    /// Ordered argument list.
    #[serde(default)]
    pub args: Vec<ArgConfig>,
}

/// An argument as written in the document: a variable reference or a literal.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ArgConfig {
    /// Variable reference: `{ var: "stmt" }` or `{ var: "stmt.path" }`.
    Var {
        /// Target statement name, optionally followed by a dotted path.
        var: String,
    },
    /// A literal string or nested list of strings.
    Literal(LiteralConfig),
}

/// A literal argument: a string or a nested list of literals.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum LiteralConfig {
    /// A string literal.
    Str(String),
    /// A list of literals.
    List(Vec<LiteralConfig>),
}

impl LiteralConfig {
    /// Converts the parsed literal into a runtime value.
    pub fn to_value(&self) -> Value {
        match self {
            LiteralConfig::Str(s) => Value::str(s.clone()),
            LiteralConfig::List(items) => {
                Value::list(items.iter().map(LiteralConfig::to_value).collect())
            }
        }
    }
}

/// Loads and parses the configuration document at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path)?;
    parse_config(&text)
}

/// Parses a configuration document from text.
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(text)?;
    Ok(config)
}
