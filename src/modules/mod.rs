//! Built-in modules.

use std::sync::Arc;

use crate::module::ModuleRegistry;

/// `concat`: string concatenation.
pub mod concat;

/// `list`: holds its argument list.
pub mod list;

/// `log.msg`: logs its arguments.
pub mod logmsg;

/// `run.daemon`: runs an external command.
pub mod run;

/// `sleep`: delayed up and delayed died.
pub mod sleep;

/// `var`: holds a single value.
pub mod var;

/// Registry with every built-in module registered.
pub fn builtin_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(Arc::new(var::VarModule));
    registry.register(Arc::new(list::ListModule));
    registry.register(Arc::new(concat::ConcatModule));
    registry.register(Arc::new(logmsg::LogMsgModule));
    registry.register(Arc::new(sleep::SleepModule));
    registry.register(Arc::new(run::RunDaemonModule));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_all_types() {
        let registry = builtin_registry();
        for name in ["var", "list", "concat", "log.msg", "sleep", "run.daemon"] {
            assert!(registry.lookup(name).is_some(), "missing module '{name}'");
        }
        assert!(registry.lookup("no.such").is_none());
    }
}
