//! `log.msg`: logs the concatenation of its arguments and reports up.

use std::fmt::Write as _;

use tracing::info;

use crate::module::{InstanceCtx, Module, ModuleError, ModuleInstance, StatementNotifier};
use crate::value::Value;

/// The `log.msg` module type.
pub struct LogMsgModule;

struct LogMsgInstance {
    notifier: StatementNotifier,
}

impl Module for LogMsgModule {
    fn type_name(&self) -> &'static str {
        "log.msg"
    }

    fn init(&self, ctx: InstanceCtx) -> Result<Box<dyn ModuleInstance>, ModuleError> {
        let args = ctx
            .args
            .as_list()
            .ok_or_else(|| ModuleError::BadArguments("expected an argument list".into()))?;
        let mut message = String::new();
        for arg in args {
            let _ = write!(message, "{arg}");
        }
        info!("{}{}", ctx.log_prefix, message);
        ctx.notifier.up();
        Ok(Box::new(LogMsgInstance {
            notifier: ctx.notifier,
        }))
    }
}

impl ModuleInstance for LogMsgInstance {
    fn die(&mut self) {
        self.notifier.died(false);
    }

    fn get_var(&self, path: &str) -> Result<Value, ModuleError> {
        Err(ModuleError::NoSuchVariable(path.to_string()))
    }
}
