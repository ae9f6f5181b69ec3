//! Event reactor for the chaind daemon.
//!
//! All engine transitions run on the reactor thread, one event at a time,
//! run-to-completion. Module instances and signal handlers never call into
//! the engine directly; they post events through an [`EventSender`] and the
//! reactor dispatches them into the daemon controller. Single-shot timers
//! (the per-process retry timer) live on a heap next to the event queue.

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    time::Instant,
};

use tracing::trace;

use crate::daemon::Daemon;
use crate::module::ModuleEvent;

/// Stable address of one statement: owning process id and statement index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtKey {
    /// Id of the owning process.
    pub process: usize,
    /// Index of the statement within the process.
    pub index: usize,
}

/// Events dispatched on the reactor thread.
#[derive(Debug, Clone)]
pub enum Event {
    /// A module instance reported a state change.
    Module {
        /// The statement the instance belongs to.
        key: StmtKey,
        /// The reported state change.
        event: ModuleEvent,
    },
    /// A module instance finished terminating.
    Died {
        /// The statement the instance belonged to.
        key: StmtKey,
        /// Whether termination reported an error.
        is_error: bool,
    },
    /// A statement retry timer fired.
    Retry {
        /// Id of the owning process.
        process: usize,
        /// Generation the timer was armed with; stale generations are dropped.
        generation: u64,
    },
    /// Daemon termination was requested.
    Terminate,
}

/// Cloneable handle for posting events onto the reactor queue.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Posts an event. Events sent after the reactor is gone are dropped;
    /// late module callbacks during shutdown have nothing left to update.
    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    event: Event,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    // Reversed so the earliest deadline sits on top of the max-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The event queue, timer heap, and run loop.
pub struct Reactor {
    tx: Sender<Event>,
    rx: Receiver<Event>,
    timers: BinaryHeap<TimerEntry>,
    next_seq: u64,
    quit: bool,
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor {
    /// Creates an empty reactor.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Reactor {
            tx,
            rx,
            timers: BinaryHeap::new(),
            next_seq: 0,
            quit: false,
        }
    }

    /// Returns a handle for posting events from module instances, waiter
    /// threads, and signal handlers.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Schedules `event` for delivery at `deadline`.
    pub fn schedule_at(&mut self, deadline: Instant, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        trace!("timer {seq} armed for {deadline:?}");
        self.timers.push(TimerEntry {
            deadline,
            seq,
            event,
        });
    }

    /// Asks the run loop to stop after the current dispatch.
    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// Whether a quit has been requested.
    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Runs until a quit is requested, blocking between events.
    pub fn run(&mut self, daemon: &mut Daemon) {
        while !self.quit {
            self.fire_due(daemon);
            if self.quit {
                break;
            }
            let received = match self.next_deadline() {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match self.rx.recv_timeout(timeout) {
                        Ok(event) => Some(event),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.rx.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                },
            };
            if let Some(event) = received {
                daemon.dispatch(event, self);
            }
        }
    }

    /// Drains queued events and due timers without blocking. Used at startup
    /// boundaries and by tests that step the engine deterministically.
    pub fn run_pending(&mut self, daemon: &mut Daemon) {
        while !self.quit {
            self.fire_due(daemon);
            match self.rx.try_recv() {
                Ok(event) => daemon.dispatch(event, self),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    if !self.has_due_timer() {
                        break;
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.peek().map(|entry| entry.deadline)
    }

    fn has_due_timer(&self) -> bool {
        self.timers
            .peek()
            .is_some_and(|entry| entry.deadline <= Instant::now())
    }

    fn fire_due(&mut self, daemon: &mut Daemon) {
        loop {
            if self.quit {
                return;
            }
            let due = self
                .timers
                .peek()
                .is_some_and(|entry| entry.deadline <= Instant::now());
            if !due {
                return;
            }
            if let Some(entry) = self.timers.pop() {
                trace!("timer {} fired", entry.seq);
                daemon.dispatch(entry.event, self);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sender_delivers_events_in_order() {
        let mut reactor = Reactor::new();
        let sender = reactor.sender();
        sender.send(Event::Terminate);
        sender.send(Event::Retry {
            process: 7,
            generation: 3,
        });

        assert!(matches!(reactor.try_recv(), Some(Event::Terminate)));
        assert!(matches!(
            reactor.try_recv(),
            Some(Event::Retry {
                process: 7,
                generation: 3
            })
        ));
        assert!(reactor.try_recv().is_none());
    }

    #[test]
    fn timer_heap_orders_by_deadline() {
        let mut reactor = Reactor::new();
        let base = Instant::now() + Duration::from_secs(60);
        reactor.schedule_at(
            base + Duration::from_secs(2),
            Event::Retry {
                process: 2,
                generation: 0,
            },
        );
        reactor.schedule_at(
            base,
            Event::Retry {
                process: 0,
                generation: 0,
            },
        );
        reactor.schedule_at(
            base + Duration::from_secs(1),
            Event::Retry {
                process: 1,
                generation: 0,
            },
        );

        let mut popped = Vec::new();
        while let Some(entry) = reactor.timers.pop() {
            match entry.event {
                Event::Retry { process, .. } => popped.push(process),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(popped, vec![0, 1, 2]);
    }

    #[test]
    fn future_timer_is_not_due() {
        let mut reactor = Reactor::new();
        reactor.schedule_at(
            Instant::now() + Duration::from_secs(60),
            Event::Terminate,
        );
        assert!(!reactor.has_due_timer());

        reactor.schedule_at(Instant::now(), Event::Terminate);
        assert!(reactor.has_due_timer());
    }
}
