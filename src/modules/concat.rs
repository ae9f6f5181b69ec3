//! `concat`: concatenates string arguments into one value.

use crate::module::{InstanceCtx, Module, ModuleError, ModuleInstance, StatementNotifier};
use crate::value::Value;

/// The `concat` module type.
pub struct ConcatModule;

struct ConcatInstance {
    value: Value,
    notifier: StatementNotifier,
}

impl Module for ConcatModule {
    fn type_name(&self) -> &'static str {
        "concat"
    }

    fn init(&self, ctx: InstanceCtx) -> Result<Box<dyn ModuleInstance>, ModuleError> {
        let args = ctx
            .args
            .as_list()
            .ok_or_else(|| ModuleError::BadArguments("expected an argument list".into()))?;
        let mut joined = String::new();
        for arg in args {
            let part = arg.as_str().ok_or_else(|| {
                ModuleError::BadArguments("concat arguments must be strings".into())
            })?;
            joined.push_str(part);
        }
        ctx.notifier.up();
        Ok(Box::new(ConcatInstance {
            value: Value::str(joined),
            notifier: ctx.notifier,
        }))
    }
}

impl ModuleInstance for ConcatInstance {
    fn die(&mut self) {
        self.notifier.died(false);
    }

    fn get_var(&self, path: &str) -> Result<Value, ModuleError> {
        if path.is_empty() {
            Ok(self.value.clone())
        } else {
            Err(ModuleError::NoSuchVariable(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::Reactor;
    use crate::test_utils::instance_ctx;

    #[test]
    fn joins_string_arguments() {
        let reactor = Reactor::new();
        let ctx = instance_ctx(
            &reactor,
            Value::list(vec![Value::str("10.0."), Value::str("0.1")]),
        );
        let inst = ConcatModule.init(ctx).unwrap();
        assert_eq!(inst.get_var("").unwrap(), Value::str("10.0.0.1"));
    }

    #[test]
    fn rejects_list_arguments() {
        let reactor = Reactor::new();
        let ctx = instance_ctx(&reactor, Value::list(vec![Value::empty_list()]));
        assert!(matches!(
            ConcatModule.init(ctx),
            Err(ModuleError::BadArguments(_))
        ));
    }
}
