//! `run.daemon`: runs an external command for the lifetime of the statement.
//!
//! Args are the argv, all strings. The statement is up once the child is
//! spawned. An unexpected child exit reports dying and then died-with-error,
//! which sends the statement through the engine's retry path; a requested
//! termination sends SIGTERM and reports a clean died once the child is
//! reaped.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::module::{InstanceCtx, Module, ModuleError, ModuleInstance};
use crate::procmgr::{ProcessManager, SpawnedChild};
use crate::value::Value;

/// The `run.daemon` module type.
pub struct RunDaemonModule;

#[derive(Default)]
struct ChildShared {
    dying: bool,
}

struct RunDaemonInstance {
    child: SpawnedChild,
    procmgr: Arc<ProcessManager>,
    shared: Arc<Mutex<ChildShared>>,
}

impl Module for RunDaemonModule {
    fn type_name(&self) -> &'static str {
        "run.daemon"
    }

    fn init(&self, ctx: InstanceCtx) -> Result<Box<dyn ModuleInstance>, ModuleError> {
        let args = ctx
            .args
            .as_list()
            .ok_or_else(|| ModuleError::BadArguments("expected an argument list".into()))?;
        let argv: Vec<String> = args
            .iter()
            .map(|arg| {
                arg.as_str().map(str::to_string).ok_or_else(|| {
                    ModuleError::BadArguments("argv elements must be strings".into())
                })
            })
            .collect::<Result<_, _>>()?;
        if argv.is_empty() {
            return Err(ModuleError::BadArguments("empty argv".into()));
        }

        let shared = Arc::new(Mutex::new(ChildShared::default()));
        let exit_shared = Arc::clone(&shared);
        let notifier = ctx.notifier.clone();
        let prefix = ctx.log_prefix.clone();
        let child = ctx.procmgr.spawn(
            &argv,
            &ctx.log_prefix,
            Box::new(move |result| {
                // A requested termination reaps cleanly; anything else is a
                // broken daemon and goes through the error path.
                let requested = exit_shared.lock().map(|shared| shared.dying).unwrap_or(true);
                match result {
                    Ok(status) if requested => {
                        info!("{prefix}exited after termination request: {status}");
                        notifier.died(false);
                    }
                    Ok(status) => {
                        warn!("{prefix}exited unexpectedly: {status}");
                        notifier.dying();
                        notifier.died(true);
                    }
                    Err(err) if requested => {
                        warn!("{prefix}wait failed: {err}");
                        notifier.died(false);
                    }
                    Err(err) => {
                        warn!("{prefix}wait failed: {err}");
                        notifier.dying();
                        notifier.died(true);
                    }
                }
            }),
        )?;

        ctx.notifier.up();
        Ok(Box::new(RunDaemonInstance {
            child,
            procmgr: ctx.procmgr,
            shared,
        }))
    }
}

impl ModuleInstance for RunDaemonInstance {
    fn die(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.dying = true;
        }
        self.procmgr.terminate(self.child);
    }

    fn get_var(&self, path: &str) -> Result<Value, ModuleError> {
        if path == "pid" {
            Ok(Value::str(self.child.pid.to_string()))
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
    use std::{thread, time::Duration, time::Instant};

    fn wait_for(reactor: &mut Reactor, mut accept: impl FnMut(&Event) -> bool) -> Event {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(event) = reactor.try_recv() {
                if accept(&event) {
                    return event;
                }
                continue;
            }
            assert!(Instant::now() < deadline, "expected event never arrived");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn spawn_reports_up_and_exposes_pid() {
        let mut reactor = Reactor::new();
        let ctx = instance_ctx(
            &reactor,
            Value::list(vec![Value::str("sleep"), Value::str("30")]),
        );
        let mut inst = RunDaemonModule.init(ctx).unwrap();

        assert!(matches!(
            wait_for(&mut reactor, |event| matches!(event, Event::Module { .. })),
            Event::Module { .. }
        ));
        assert!(inst.get_var("pid").is_ok());
        assert!(inst.get_var("status").is_err());

        inst.die();
        assert!(matches!(
            wait_for(&mut reactor, |event| matches!(event, Event::Died { .. })),
            Event::Died { is_error: false, .. }
        ));
    }

    #[test]
    fn unexpected_exit_reports_dying_then_error_died() {
        let mut reactor = Reactor::new();
        let ctx = instance_ctx(&reactor, Value::list(vec![Value::str("true")]));
        let _inst = RunDaemonModule.init(ctx).unwrap();

        // The waiter races the up notification, so collect until died.
        let mut saw_dying = false;
        let died = wait_for(&mut reactor, |event| match event {
            Event::Module {
                event: crate::module::ModuleEvent::Dying,
                ..
            } => {
                saw_dying = true;
                false
            }
            Event::Died { .. } => true,
            _ => false,
        });
        assert!(saw_dying);
        assert!(matches!(died, Event::Died { is_error: true, .. }));
    }

    #[test]
    fn non_string_argv_is_rejected() {
        let reactor = Reactor::new();
        let ctx = instance_ctx(&reactor, Value::list(vec![Value::empty_list()]));
        assert!(matches!(
            RunDaemonModule.init(ctx),
            Err(ModuleError::BadArguments(_))
        ));
    }
}
