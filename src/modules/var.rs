//! `var`: holds a single value for later statements to reference.

use crate::module::{InstanceCtx, Module, ModuleError, ModuleInstance, StatementNotifier};
use crate::value::Value;

/// The `var` module type.
pub struct VarModule;

struct VarInstance {
    value: Value,
    notifier: StatementNotifier,
}

impl Module for VarModule {
    fn type_name(&self) -> &'static str {
        "var"
    }

    fn init(&self, ctx: InstanceCtx) -> Result<Box<dyn ModuleInstance>, ModuleError> {
        let args = ctx
            .args
            .as_list()
            .ok_or_else(|| ModuleError::BadArguments("expected an argument list".into()))?;
        let [value] = args else {
            return Err(ModuleError::BadArguments(
                "var takes exactly one argument".into(),
            ));
        };
        let value = value.clone();
        ctx.notifier.up();
        Ok(Box::new(VarInstance {
            value,
            notifier: ctx.notifier,
        }))
    }
}

impl ModuleInstance for VarInstance {
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
    use crate::reactor::{Event, Reactor};
    use crate::test_utils::instance_ctx;

    #[test]
    fn holds_its_value_and_reports_up() {
        let mut reactor = Reactor::new();
        let ctx = instance_ctx(&reactor, Value::list(vec![Value::str("payload")]));

        let inst = VarModule.init(ctx).unwrap();
        assert!(matches!(reactor.try_recv(), Some(Event::Module { .. })));
        assert_eq!(inst.get_var("").unwrap(), Value::str("payload"));
        assert!(inst.get_var("nope").is_err());
    }

    #[test]
    fn rejects_wrong_arity() {
        let reactor = Reactor::new();
        let ctx = instance_ctx(&reactor, Value::empty_list());
        assert!(matches!(
            VarModule.init(ctx),
            Err(ModuleError::BadArguments(_))
        ));
    }

    #[test]
    fn die_reports_died_without_error() {
        let mut reactor = Reactor::new();
        let ctx = instance_ctx(&reactor, Value::list(vec![Value::str("x")]));
        let mut inst = VarModule.init(ctx).unwrap();
        let _ = reactor.try_recv();

        inst.die();
        assert!(matches!(
            reactor.try_recv(),
            Some(Event::Died {
                is_error: false,
                ..
            })
        ));
    }
}
