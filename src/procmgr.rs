//! Child process spawning and termination for module instances.

use std::{
    io,
    process::{Command, ExitStatus, Stdio},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tracing::{debug, warn};

/// Handle to a spawned child.
#[derive(Debug, Clone, Copy)]
pub struct SpawnedChild {
    /// Operating system process id.
    pub pid: u32,
}

/// Spawns children for module instances and reaps them on waiter threads.
#[derive(Debug, Default)]
pub struct ProcessManager {
    active: AtomicUsize,
}

impl ProcessManager {
    /// Creates a manager with no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of children spawned and not yet reaped.
    pub fn active_children(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawns `argv` with inherited stdio. `on_exit` runs on a waiter thread
    /// once the child has been reaped.
    pub fn spawn(
        self: &Arc<Self>,
        argv: &[String],
        log_prefix: &str,
        on_exit: Box<dyn FnOnce(io::Result<ExitStatus>) + Send>,
    ) -> io::Result<SpawnedChild> {
        let Some((program, args)) = argv.split_first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty argument vector",
            ));
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        let mut child = cmd.spawn()?;
        let pid = child.id();
        self.active.fetch_add(1, Ordering::SeqCst);
        debug!("{log_prefix}spawned pid {pid}");

        let manager = Arc::clone(self);
        let prefix = log_prefix.to_string();
        thread::spawn(move || {
            let result = child.wait();
            manager.active.fetch_sub(1, Ordering::SeqCst);
            match &result {
                Ok(status) => debug!("{prefix}pid {pid} exited: {status}"),
                Err(err) => warn!("{prefix}failed to wait for pid {pid}: {err}"),
            }
            on_exit(result);
        });

        Ok(SpawnedChild { pid })
    }

    /// Sends SIGTERM to a spawned child.
    pub fn terminate(&self, child: SpawnedChild) {
        if let Err(err) = signal::kill(Pid::from_raw(child.pid as i32), Signal::SIGTERM) {
            // Already-reaped children are fine; the waiter delivers the exit.
            debug!("failed to signal pid {}: {err}", child.pid);
        }
    }
}
