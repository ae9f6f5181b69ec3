//! Loaded process and statement templates.
//!
//! Templates are the immutable result of resolving the configuration
//! document against the module registry. Loading is per-process atomic: a
//! process with any unresolvable statement is skipped whole.

use std::{collections::HashSet, sync::Arc};

use tracing::error;

use crate::config::{ArgConfig, Config, ProcessConfig, StatementConfig};
use crate::error::LoadError;
use crate::module::{Module, ModuleRegistry};
use crate::value::Value;

/// A variable reference: target statement name plus dotted lookup path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    /// Name of the earlier statement the reference resolves against.
    pub target: String,
    /// Dotted path handed to the target's variable lookup; may be empty.
    pub path: String,
}

/// A loaded argument.
#[derive(Debug, Clone)]
pub enum Argument {
    /// A literal value, copied into the argument list on every advance.
    Literal(Value),
    /// A variable reference, resolved on every advance.
    Var(VarRef),
}

/// Immutable description of one statement.
#[derive(Clone)]
pub struct StatementTemplate {
    /// Optional local name; absent means unreferenceable.
    pub name: Option<String>,
    /// Dotted module type name, kept for log lines.
    pub module_type: String,
    /// The resolved module implementation.
    pub module: Arc<dyn Module>,
    /// Ordered argument list.
    pub args: Vec<Argument>,
}

/// Immutable description of one process.
#[derive(Clone)]
pub struct ProcessTemplate {
    /// Process name, used in log prefixes.
    pub name: String,
    /// Ordered statement templates.
    pub statements: Vec<StatementTemplate>,
}

/// Loads every process that resolves cleanly against the registry. Failing
/// processes are logged at error and skipped.
pub fn load_processes(config: &Config, registry: &ModuleRegistry) -> Vec<ProcessTemplate> {
    config
        .processes
        .iter()
        .filter_map(|pc| match load_process(pc, registry) {
            Ok(template) => Some(template),
            Err(err) => {
                error!("process {}: load failed: {}", pc.name, err);
                None
            }
        })
        .collect()
}

fn load_process(
    pc: &ProcessConfig,
    registry: &ModuleRegistry,
) -> Result<ProcessTemplate, LoadError> {
    let mut seen = HashSet::new();
    let mut statements = Vec::with_capacity(pc.statements.len());
    for (index, sc) in pc.statements.iter().enumerate() {
        statements.push(load_statement(index, sc, &mut seen, registry)?);
    }
    Ok(ProcessTemplate {
        name: pc.name.clone(),
        statements,
    })
}

fn load_statement(
    index: usize,
    sc: &StatementConfig,
    seen: &mut HashSet<String>,
    registry: &ModuleRegistry,
) -> Result<StatementTemplate, LoadError> {
    let module = registry
        .lookup(&sc.module)
        .ok_or_else(|| LoadError::UnknownModule {
            index,
            module: sc.module.clone(),
        })?;

    if let Some(name) = &sc.name
        && !seen.insert(name.clone())
    {
        return Err(LoadError::DuplicateName {
            index,
            name: name.clone(),
        });
    }

    let mut args = Vec::with_capacity(sc.args.len());
    for arg in &sc.args {
        args.push(match arg {
            ArgConfig::Literal(lit) => Argument::Literal(lit.to_value()),
            ArgConfig::Var { var } => Argument::Var(parse_var_ref(index, var)?),
        });
    }

    Ok(StatementTemplate {
        name: sc.name.clone(),
        module_type: sc.module.clone(),
        module,
        args,
    })
}

fn parse_var_ref(index: usize, var: &str) -> Result<VarRef, LoadError> {
    let (target, path) = match var.split_once('.') {
        Some((target, path)) => (target, path),
        None => (var, ""),
    };
    if target.is_empty() {
        return Err(LoadError::BadVariableReference {
            index,
            var: var.to_string(),
        });
    }
    Ok(VarRef {
        target: target.to_string(),
        path: path.to_string(),
    })
}
