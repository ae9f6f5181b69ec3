//! # Process State Engine
//!
//! Drives one process's statements through their lifecycle. A process owns an
//! ordered statement vector and two pointers: `ap`, the index of the next
//! statement to instantiate, and `fp`, one past the last statement with a
//! live instance. Forward progress ("fight") instantiates statements in index
//! order; a statement going down or dying forces everything after it to be
//! torn down in reverse order before the engine advances again. Termination
//! ("retreat") tears the whole process down in reverse order.
//!
//! Invariants on every reactor boundary: `ap <= fp`; everything strictly
//! before `ap - 1` is adult; everything in `[ap, fp)` has a live instance;
//! everything from `fp` on is forgotten. The retry timer is armed only while
//! the statement at `ap` is backing off after a failure.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use strum_macros::AsRefStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::module::{InstanceCtx, ModuleError, ModuleEvent, ModuleInstance, StatementNotifier};
use crate::procmgr::ProcessManager;
use crate::program::{Argument, ProcessTemplate, StatementTemplate, VarRef};
use crate::reactor::{Event, EventSender, Reactor, StmtKey};
use crate::value::Value;

/// Lifecycle state of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum StatementState {
    /// No live module instance.
    Forgotten,
    /// Instance created, not yet reported up.
    Child,
    /// Instance reported up and has not gone down since.
    Adult,
    /// Instance asked to terminate; awaiting its died event.
    Dying,
}

/// Runtime state of one statement within a process.
pub struct ProcessStatement {
    template: StatementTemplate,
    state: StatementState,
    /// Backoff deadline after a failure. Set when an advance or a terminating
    /// instance reports an error, cleared by the retry timer or a clean died.
    retry_at: Option<Instant>,
    inst: Option<Box<dyn ModuleInstance>>,
}

impl ProcessStatement {
    fn new(template: StatementTemplate) -> Self {
        ProcessStatement {
            template,
            state: StatementState::Forgotten,
            retry_at: None,
            inst: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Backoff deadline, if the statement failed recently.
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// The statement's immutable template.
    pub fn template(&self) -> &StatementTemplate {
        &self.template
    }
}

/// Outcome of one `work` dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// The process is still alive.
    Running,
    /// Retreat finished; the controller removes and drops the process.
    Finished,
}

/// Context handed down from the daemon controller for one `work` dispatch.
pub struct WorkCx<'a> {
    /// Whether the daemon is terminating.
    pub terminating: bool,
    /// Reactor, for arming the retry timer.
    pub reactor: &'a mut Reactor,
    /// Sender cloned into each new instance's notifier.
    pub sender: &'a EventSender,
    /// Shared child process manager handed to new instances.
    pub procmgr: &'a Arc<ProcessManager>,
    /// Backoff applied when a statement fails.
    pub retry_interval: Duration,
}

#[derive(Debug, Error)]
enum AdvanceError {
    #[error("no statement named '{0}' to resolve a variable against")]
    UnknownReference(String),

    #[error("variable '{path}' of statement '{target}': {source}")]
    Resolve {
        target: String,
        path: String,
        #[source]
        source: ModuleError,
    },

    #[error("module init failed: {0}")]
    Init(ModuleError),
}

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    generation: u64,
    deadline: Instant,
}

/// One running process.
pub struct Process {
    pid: usize,
    name: String,
    stmts: Vec<ProcessStatement>,
    /// Advance pointer: index of the next statement to instantiate.
    ap: usize,
    /// Live pointer: one past the last statement with a live instance.
    fp: usize,
    timer: Option<ArmedTimer>,
    timer_gen: u64,
}

impl Process {
    /// Builds a process from its loaded template. All statements start
    /// forgotten; the first `work` begins the climb.
    pub(crate) fn new(pid: usize, template: ProcessTemplate) -> Self {
        Process {
            pid,
            name: template.name,
            stmts: template
                .statements
                .into_iter()
                .map(ProcessStatement::new)
                .collect(),
            ap: 0,
            fp: 0,
            timer: None,
            timer_gen: 0,
        }
    }

    /// Process name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advance pointer.
    pub fn ap(&self) -> usize {
        self.ap
    }

    /// Live pointer.
    pub fn fp(&self) -> usize {
        self.fp
    }

    /// The statement vector.
    pub fn statements(&self) -> &[ProcessStatement] {
        &self.stmts
    }

    /// Deadline of the armed retry timer, if any.
    pub fn armed_deadline(&self) -> Option<Instant> {
        self.timer.map(|timer| timer.deadline)
    }

    /// Single entry point for every external event. Disarms the retry timer,
    /// then either retreats (daemon terminating) or fights forward.
    pub(crate) fn work(&mut self, cx: &mut WorkCx<'_>) -> WorkOutcome {
        self.timer = None;
        if cx.terminating {
            self.retreat()
        } else {
            self.fight(cx);
            WorkOutcome::Running
        }
    }

    fn fight(&mut self, cx: &mut WorkCx<'_>) {
        if self.ap < self.fp {
            // A statement beyond the active prefix must die before progress
            // can be made at `ap`.
            let index = self.fp - 1;
            if self.stmts[index].state != StatementState::Dying {
                self.request_die(index);
            }
            return;
        }

        if self.ap > 0 && self.stmts[self.ap - 1].state == StatementState::Child {
            // Waiting for the frontier statement to come up.
            return;
        }

        self.advance(cx);
    }

    fn advance(&mut self, cx: &mut WorkCx<'_>) {
        debug_assert_eq!(self.ap, self.fp);
        if self.ap == self.stmts.len() {
            info!("process {}: victory", self.name);
            return;
        }

        let index = self.ap;
        debug_assert_eq!(self.stmts[index].state, StatementState::Forgotten);

        if let Some(retry_at) = self.stmts[index].retry_at
            && retry_at > Instant::now()
        {
            self.wait(cx, retry_at);
            return;
        }

        let args = match self.materialize_args(index) {
            Ok(args) => args,
            Err(err) => {
                warn!("process {}: statement {}: {}", self.name, index, err);
                let deadline = self.set_statement_error(index, cx.retry_interval);
                self.wait(cx, deadline);
                return;
            }
        };

        let template = &self.stmts[index].template;
        let ctx = InstanceCtx {
            name: template.name.clone(),
            args,
            log_prefix: format!("process {}: statement {}: module: ", self.name, index),
            notifier: StatementNotifier::new(
                StmtKey {
                    process: self.pid,
                    index,
                },
                cx.sender.clone(),
            ),
            procmgr: Arc::clone(cx.procmgr),
        };

        match template.module.init(ctx) {
            Ok(inst) => {
                let ps = &mut self.stmts[index];
                ps.inst = Some(inst);
                ps.state = StatementState::Child;
                ps.retry_at = None;
                self.ap += 1;
                self.fp += 1;
                debug!(
                    "process {}: statement {}: instantiated ({})",
                    self.name, index, self.stmts[index].template.module_type
                );
            }
            Err(err) => {
                warn!(
                    "process {}: statement {}: {}",
                    self.name,
                    index,
                    AdvanceError::Init(err)
                );
                let deadline = self.set_statement_error(index, cx.retry_interval);
                self.wait(cx, deadline);
            }
        }
    }

    /// Arms the retry timer for the statement at `ap`.
    fn wait(&mut self, cx: &mut WorkCx<'_>, deadline: Instant) {
        debug_assert!(self.ap == self.fp && self.ap < self.stmts.len());
        self.timer_gen += 1;
        self.timer = Some(ArmedTimer {
            generation: self.timer_gen,
            deadline,
        });
        cx.reactor.schedule_at(
            deadline,
            Event::Retry {
                process: self.pid,
                generation: self.timer_gen,
            },
        );
        debug!(
            "process {}: statement {}: retrying in {:?}",
            self.name,
            self.ap,
            deadline.saturating_duration_since(Instant::now())
        );
    }

    fn retreat(&mut self) -> WorkOutcome {
        if self.fp == 0 {
            info!("process {}: retreat complete", self.name);
            return WorkOutcome::Finished;
        }
        let index = self.fp - 1;
        if self.stmts[index].state != StatementState::Dying {
            self.request_die(index);
            if self.ap > index {
                self.ap = index;
            }
        }
        WorkOutcome::Running
    }

    fn request_die(&mut self, index: usize) {
        debug!("process {}: statement {}: terminating", self.name, index);
        let ps = &mut self.stmts[index];
        if let Some(inst) = ps.inst.as_mut() {
            inst.die();
        }
        ps.state = StatementState::Dying;
    }

    fn set_statement_error(&mut self, index: usize, retry_interval: Duration) -> Instant {
        debug_assert_eq!(self.stmts[index].state, StatementState::Forgotten);
        let deadline = Instant::now() + retry_interval;
        self.stmts[index].retry_at = Some(deadline);
        deadline
    }

    fn materialize_args(&self, index: usize) -> Result<Value, AdvanceError> {
        let template = &self.stmts[index].template;
        let mut items = Vec::with_capacity(template.args.len());
        for arg in &template.args {
            let value = match arg {
                Argument::Literal(value) => value.clone(),
                Argument::Var(var) => self.resolve_var(index, var)?,
            };
            items.push(value);
        }
        Ok(Value::list(items))
    }

    /// Resolves a variable reference against the closest earlier statement
    /// with the target name. Invariants guarantee every statement before
    /// `ap` is adult at the advance point.
    fn resolve_var(&self, index: usize, var: &VarRef) -> Result<Value, AdvanceError> {
        for i in (0..index).rev() {
            let ps = &self.stmts[i];
            if ps.template.name.as_deref() != Some(var.target.as_str()) {
                continue;
            }
            let inst = match (&ps.inst, ps.state) {
                (Some(inst), StatementState::Adult) => inst,
                _ => {
                    return Err(AdvanceError::Resolve {
                        target: var.target.clone(),
                        path: var.path.clone(),
                        source: ModuleError::Failed(format!(
                            "statement is {}",
                            ps.state.as_ref()
                        )),
                    });
                }
            };
            return inst.get_var(&var.path).map_err(|source| AdvanceError::Resolve {
                target: var.target.clone(),
                path: var.path.clone(),
                source,
            });
        }
        Err(AdvanceError::UnknownReference(var.target.clone()))
    }

    /// Applies an up/down/dying event reported by a statement's instance.
    /// Events cross the reactor queue, so one can overtake an engine-side
    /// transition; events that no longer match their precondition are
    /// dropped.
    pub(crate) fn apply_module_event(&mut self, index: usize, event: ModuleEvent) {
        let Some(ps) = self.stmts.get_mut(index) else {
            debug!("process {}: event for unknown statement {}", self.name, index);
            return;
        };
        match (event, ps.state) {
            (ModuleEvent::Up, StatementState::Child) => {
                debug!("process {}: statement {}: up", self.name, index);
                ps.state = StatementState::Adult;
            }
            (ModuleEvent::Down, StatementState::Adult) => {
                debug!("process {}: statement {}: down", self.name, index);
                ps.state = StatementState::Child;
                // Statements strictly after this one lost their prerequisite.
                if self.ap > index + 1 {
                    self.ap = index + 1;
                }
            }
            (ModuleEvent::Dying, StatementState::Child | StatementState::Adult) => {
                debug!("process {}: statement {}: dying", self.name, index);
                ps.state = StatementState::Dying;
                if self.ap > index {
                    self.ap = index;
                }
            }
            (event, state) => {
                debug!(
                    "process {}: statement {}: ignoring {} event in state {}",
                    self.name,
                    index,
                    event.as_ref(),
                    state.as_ref()
                );
            }
        }
    }

    /// Applies a died report: drops the instance and its argument list,
    /// forgets the statement, and pulls the pointers back.
    pub(crate) fn apply_module_died(
        &mut self,
        index: usize,
        is_error: bool,
        retry_interval: Duration,
    ) {
        let Some(ps) = self.stmts.get_mut(index) else {
            debug!("process {}: died for unknown statement {}", self.name, index);
            return;
        };
        if ps.state == StatementState::Forgotten {
            debug!(
                "process {}: statement {}: ignoring stale died",
                self.name, index
            );
            return;
        }
        debug!(
            "process {}: statement {}: died{}",
            self.name,
            index,
            if is_error { " with error" } else { "" }
        );
        ps.inst = None;
        ps.state = StatementState::Forgotten;
        ps.retry_at = if is_error {
            Some(Instant::now() + retry_interval)
        } else {
            None
        };
        if self.ap > index {
            self.ap = index;
        }
        while self.fp > 0 && self.stmts[self.fp - 1].state == StatementState::Forgotten {
            self.fp -= 1;
        }
    }

    /// Consumes a retry timer fire. Returns false for stale generations.
    pub(crate) fn take_retry(&mut self, generation: u64) -> bool {
        match self.timer {
            Some(timer) if timer.generation == generation => {
                self.timer = None;
                if let Some(ps) = self.stmts.get_mut(self.ap) {
                    ps.retry_at = None;
                }
                true
            }
            _ => false,
        }
    }

    /// Overrides the backoff deadline of one statement. Test hook.
    #[cfg(test)]
    pub(crate) fn set_retry_at(&mut self, index: usize, deadline: Instant) {
        self.stmts[index].retry_at = Some(deadline);
    }
}
