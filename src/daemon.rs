//! Daemon controller.
//!
//! Owns the set of running processes and routes reactor events into the
//! engine. On a termination request every process is told to retreat;
//! once the set empties the reactor is asked to exit.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::engine::{Process, WorkCx, WorkOutcome};
use crate::procmgr::ProcessManager;
use crate::program::ProcessTemplate;
use crate::reactor::{Event, EventSender, Reactor};

/// The process set and the shared engine environment.
pub struct Daemon {
    processes: BTreeMap<usize, Process>,
    terminating: bool,
    procmgr: Arc<ProcessManager>,
    sender: EventSender,
    retry_interval: Duration,
}

impl Daemon {
    /// Builds the daemon from loaded process templates. Process ids follow
    /// declaration order.
    pub fn new(
        templates: Vec<ProcessTemplate>,
        procmgr: Arc<ProcessManager>,
        sender: EventSender,
        retry_interval: Duration,
    ) -> Self {
        let processes = templates
            .into_iter()
            .enumerate()
            .map(|(pid, template)| (pid, Process::new(pid, template)))
            .collect();
        Daemon {
            processes,
            terminating: false,
            procmgr,
            sender,
            retry_interval,
        }
    }

    /// Kicks every process forward once. Module events posted during init
    /// continue the climb on the reactor.
    pub fn start(&mut self, reactor: &mut Reactor) {
        let pids: Vec<usize> = self.processes.keys().copied().collect();
        for pid in pids {
            self.run_work(pid, reactor);
        }
    }

    /// Routes one reactor event into the engine.
    pub fn dispatch(&mut self, event: Event, reactor: &mut Reactor) {
        match event {
            Event::Terminate => self.begin_termination(reactor),
            Event::Module { key, event } => {
                let Some(process) = self.processes.get_mut(&key.process) else {
                    debug!("module event for unknown process {}", key.process);
                    return;
                };
                process.apply_module_event(key.index, event);
                self.run_work(key.process, reactor);
            }
            Event::Died { key, is_error } => {
                let retry_interval = self.retry_interval;
                let Some(process) = self.processes.get_mut(&key.process) else {
                    debug!("died event for unknown process {}", key.process);
                    return;
                };
                process.apply_module_died(key.index, is_error, retry_interval);
                self.run_work(key.process, reactor);
            }
            Event::Retry {
                process: pid,
                generation,
            } => {
                let Some(process) = self.processes.get_mut(&pid) else {
                    debug!("retry timer for unknown process {pid}");
                    return;
                };
                if process.take_retry(generation) {
                    self.run_work(pid, reactor);
                } else {
                    debug!("process {pid}: stale retry timer generation {generation}");
                }
            }
        }
    }

    fn begin_termination(&mut self, reactor: &mut Reactor) {
        if self.terminating {
            debug!("termination already in progress");
            return;
        }
        info!("termination requested");
        self.terminating = true;
        if self.processes.is_empty() {
            reactor.request_quit();
            return;
        }
        let pids: Vec<usize> = self.processes.keys().copied().collect();
        for pid in pids {
            self.run_work(pid, reactor);
        }
    }

    /// Runs one `work` dispatch for a process and reaps it if its retreat
    /// finished.
    pub(crate) fn run_work(&mut self, pid: usize, reactor: &mut Reactor) {
        let outcome = {
            let Self {
                processes,
                terminating,
                procmgr,
                sender,
                retry_interval,
            } = &mut *self;
            let Some(process) = processes.get_mut(&pid) else {
                return;
            };
            let mut cx = WorkCx {
                terminating: *terminating,
                reactor: &mut *reactor,
                sender: &*sender,
                procmgr: &*procmgr,
                retry_interval: *retry_interval,
            };
            process.work(&mut cx)
        };

        if outcome == WorkOutcome::Finished {
            if let Some(process) = self.processes.remove(&pid) {
                info!("process {}: terminated", process.name());
            }
            if self.processes.is_empty() {
                info!("all processes terminated");
                reactor.request_quit();
            }
        }
    }

    /// Whether a termination request has been accepted.
    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// Number of live processes.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Read access to one process.
    pub fn process(&self, pid: usize) -> Option<&Process> {
        self.processes.get(&pid)
    }

    #[cfg(test)]
    pub(crate) fn process_mut(&mut self, pid: usize) -> Option<&mut Process> {
        self.processes.get_mut(&pid)
    }

    /// Iterates the live processes in id order.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::StmtKey;

    fn empty_daemon(reactor: &Reactor) -> Daemon {
        Daemon::new(
            Vec::new(),
            Arc::new(ProcessManager::new()),
            reactor.sender(),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn termination_with_no_processes_quits_immediately() {
        let mut reactor = Reactor::new();
        let mut daemon = empty_daemon(&reactor);

        daemon.dispatch(Event::Terminate, &mut reactor);
        assert!(daemon.is_terminating());
        assert!(reactor.quit_requested());
    }

    #[test]
    fn repeated_termination_requests_are_ignored() {
        let mut reactor = Reactor::new();
        let mut daemon = empty_daemon(&reactor);

        daemon.dispatch(Event::Terminate, &mut reactor);
        daemon.dispatch(Event::Terminate, &mut reactor);
        assert!(daemon.is_terminating());
    }

    #[test]
    fn events_for_unknown_processes_are_dropped() {
        let mut reactor = Reactor::new();
        let mut daemon = empty_daemon(&reactor);

        daemon.dispatch(
            Event::Died {
                key: StmtKey {
                    process: 9,
                    index: 0,
                },
                is_error: false,
            },
            &mut reactor,
        );
        daemon.dispatch(
            Event::Retry {
                process: 9,
                generation: 1,
            },
            &mut reactor,
        );
        assert_eq!(daemon.process_count(), 0);
        assert!(!reactor.quit_requested());
    }
}
