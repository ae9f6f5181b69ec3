use std::sync::Arc;

use crate::module::{InstanceCtx, StatementNotifier};
use crate::procmgr::ProcessManager;
use crate::reactor::{Reactor, StmtKey};
use crate::value::Value;

/// Builds an instance context wired to the given reactor, for module tests.
pub fn instance_ctx(reactor: &Reactor, args: Value) -> InstanceCtx {
    InstanceCtx {
        name: Some("test".into()),
        args,
        log_prefix: "process test: statement 0: module: ".into(),
        notifier: StatementNotifier::new(
            StmtKey {
                process: 0,
                index: 0,
            },
            reactor.sender(),
        ),
        procmgr: Arc::new(ProcessManager::new()),
    }
}
