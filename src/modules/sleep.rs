//! `sleep`: reports up after a delay, and died after a delay.
//!
//! Args: `[up_ms]` or `[up_ms, down_ms]`, both decimal millisecond strings.
//! Exists mainly to exercise asynchronous up and died paths; delays run on
//! worker threads that post back through the notifier.

use std::{thread, time::Duration};

use crate::module::{InstanceCtx, Module, ModuleError, ModuleInstance, StatementNotifier};
use crate::value::Value;

/// The `sleep` module type.
pub struct SleepModule;

struct SleepInstance {
    down: Duration,
    notifier: StatementNotifier,
}

impl Module for SleepModule {
    fn type_name(&self) -> &'static str {
        "sleep"
    }

    fn init(&self, ctx: InstanceCtx) -> Result<Box<dyn ModuleInstance>, ModuleError> {
        let args = ctx
            .args
            .as_list()
            .ok_or_else(|| ModuleError::BadArguments("expected an argument list".into()))?;
        let (up, down) = match args {
            [up] => (parse_ms(up)?, Duration::ZERO),
            [up, down] => (parse_ms(up)?, parse_ms(down)?),
            _ => {
                return Err(ModuleError::BadArguments(
                    "sleep takes one or two millisecond durations".into(),
                ));
            }
        };

        let notifier = ctx.notifier.clone();
        thread::spawn(move || {
            thread::sleep(up);
            notifier.up();
        });

        Ok(Box::new(SleepInstance {
            down,
            notifier: ctx.notifier,
        }))
    }
}

impl ModuleInstance for SleepInstance {
    fn die(&mut self) {
        let down = self.down;
        let notifier = self.notifier.clone();
        thread::spawn(move || {
            thread::sleep(down);
            notifier.died(false);
        });
    }

    fn get_var(&self, path: &str) -> Result<Value, ModuleError> {
        Err(ModuleError::NoSuchVariable(path.to_string()))
    }
}

fn parse_ms(value: &Value) -> Result<Duration, ModuleError> {
    let text = value
        .as_str()
        .ok_or_else(|| ModuleError::BadArguments("duration must be a string".into()))?;
    let ms: u64 = text.trim().parse().map_err(|_| {
        ModuleError::BadArguments(format!("invalid milliseconds value '{text}'"))
    })?;
    Ok(Duration::from_millis(ms))
}
