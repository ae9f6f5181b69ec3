//! Module capability traits, instance plumbing, and the registry.
//!
//! A module type is a capability set: an optional one-shot global init, an
//! instance init, and a per-instance termination request and variable lookup.
//! The engine depends only on these traits and the [`StatementNotifier`]
//! callbacks it hands each instance.

use std::{collections::BTreeMap, sync::Arc};

use strum_macros::AsRefStr;
use thiserror::Error;
use tracing::warn;

use crate::procmgr::ProcessManager;
use crate::reactor::{Event, EventSender, StmtKey};
use crate::value::Value;

/// Errors reported by modules during global init, instance init, or variable
/// lookup.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The materialized argument list does not fit the module.
    #[error("invalid arguments: {0}")]
    BadArguments(String),

    /// The requested variable path does not exist on this instance.
    #[error("no such variable '{0}'")]
    NoSuchVariable(String),

    /// Any other module-specific failure.
    #[error("{0}")]
    Failed(String),

    /// An I/O failure, typically from spawning a child process.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// State change reported by a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ModuleEvent {
    /// The instance is up.
    Up,
    /// The instance went down and may come up again.
    Down,
    /// The instance is shutting down and will report died.
    Dying,
}

/// The event and died callbacks bound to one statement.
///
/// Instances post through the reactor queue instead of calling the engine, so
/// a notification is safe from any thread and from inside `init` or `die`.
#[derive(Clone)]
pub struct StatementNotifier {
    key: StmtKey,
    sender: EventSender,
}

impl StatementNotifier {
    /// Binds a notifier to a statement address.
    pub fn new(key: StmtKey, sender: EventSender) -> Self {
        StatementNotifier { key, sender }
    }

    /// The statement this notifier is bound to.
    pub fn key(&self) -> StmtKey {
        self.key
    }

    /// Reports the instance up.
    pub fn up(&self) {
        self.event(ModuleEvent::Up);
    }

    /// Reports the instance down.
    pub fn down(&self) {
        self.event(ModuleEvent::Down);
    }

    /// Reports the instance dying.
    pub fn dying(&self) {
        self.event(ModuleEvent::Dying);
    }

    /// Reports a state change.
    pub fn event(&self, event: ModuleEvent) {
        self.sender.send(Event::Module {
            key: self.key,
            event,
        });
    }

    /// Reports that the instance has finished terminating.
    pub fn died(&self, is_error: bool) {
        self.sender.send(Event::Died {
            key: self.key,
            is_error,
        });
    }
}

/// Everything a module needs to bring up one instance.
pub struct InstanceCtx {
    /// The statement's local name, if it has one.
    pub name: Option<String>,
    /// Materialized argument list; ownership transfers to the instance.
    pub args: Value,
    /// Prefix for the instance's own log lines.
    pub log_prefix: String,
    /// Callbacks bound to the owning statement.
    pub notifier: StatementNotifier,
    /// Shared child process manager.
    pub procmgr: Arc<ProcessManager>,
}

/// A module type.
pub trait Module: Send + Sync {
    /// The dotted type name this module registers under.
    fn type_name(&self) -> &'static str;

    /// One-shot hook invoked at daemon start. Failure aborts startup.
    fn global_init(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Brings up one instance for a statement.
    fn init(&self, ctx: InstanceCtx) -> Result<Box<dyn ModuleInstance>, ModuleError>;
}

/// A live module instance bound to one statement.
pub trait ModuleInstance {
    /// Asks the instance to terminate. The instance must eventually report
    /// `died` through its notifier; it is dropped once that arrives.
    fn die(&mut self);

    /// Resolves a dotted variable path to a value owned by the caller.
    fn get_var(&self, path: &str) -> Result<Value, ModuleError>;
}

/// Table of module implementations keyed by dotted type name.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<&'static str, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module under its type name. A duplicate registration
    /// replaces the previous module.
    pub fn register(&mut self, module: Arc<dyn Module>) {
        let name = module.type_name();
        if self.modules.insert(name, module).is_some() {
            warn!("module type '{name}' registered twice; keeping the later one");
        }
    }

    /// Looks up a module by dotted type name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Runs every module's one-shot global init hook.
    pub fn global_init(&self) -> Result<(), (&'static str, ModuleError)> {
        for (name, module) in &self.modules {
            module.global_init().map_err(|err| (*name, err))?;
        }
        Ok(())
    }
}
