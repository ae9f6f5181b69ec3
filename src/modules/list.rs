//! `list`: holds its whole argument list and exposes length and elements.

use crate::module::{InstanceCtx, Module, ModuleError, ModuleInstance, StatementNotifier};
use crate::value::Value;

/// The `list` module type.
pub struct ListModule;

struct ListInstance {
    value: Value,
    notifier: StatementNotifier,
}

impl Module for ListModule {
    fn type_name(&self) -> &'static str {
        "list"
    }

    fn init(&self, ctx: InstanceCtx) -> Result<Box<dyn ModuleInstance>, ModuleError> {
        if ctx.args.as_list().is_none() {
            return Err(ModuleError::BadArguments("expected an argument list".into()));
        }
        ctx.notifier.up();
        Ok(Box::new(ListInstance {
            value: ctx.args,
            notifier: ctx.notifier,
        }))
    }
}

impl ModuleInstance for ListInstance {
    fn die(&mut self) {
        self.notifier.died(false);
    }

    fn get_var(&self, path: &str) -> Result<Value, ModuleError> {
        let items = self.value.as_list().unwrap_or(&[]);
        if path.is_empty() {
            return Ok(self.value.clone());
        }
        if path == "length" {
            return Ok(Value::str(items.len().to_string()));
        }
        if let Ok(index) = path.parse::<usize>()
            && let Some(item) = items.get(index)
        {
            return Ok(item.clone());
        }
        Err(ModuleError::NoSuchVariable(path.to_string()))
    }
}
