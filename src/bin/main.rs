use std::{process::ExitCode, sync::Arc, time::Duration};

use tracing::info;

use chaind::{
    cli::{Cli, parse_args},
    config::load_config,
    daemon::Daemon,
    error::DaemonError,
    logging::{self, LoggerSettings},
    modules::builtin_registry,
    procmgr::ProcessManager,
    program::load_processes,
    reactor::{Event, Reactor},
};

fn main() -> ExitCode {
    let args = parse_args();
    if let Err(err) = run(args) {
        eprintln!("chaind: {err}");
    }
    // The daemon itself never exits successfully; only --help/--version do.
    ExitCode::FAILURE
}

fn run(args: Cli) -> Result<(), DaemonError> {
    init_logging(&args)?;
    info!("chaind starting");

    let config = load_config(&args.config_file)?;
    let registry = builtin_registry();
    registry
        .global_init()
        .map_err(|(module, source)| DaemonError::GlobalInit {
            module: module.to_string(),
            source,
        })?;

    let processes = load_processes(&config, &registry);
    if processes.is_empty() {
        return Err(DaemonError::NoProcesses);
    }

    let mut reactor = Reactor::new();
    let terminate = reactor.sender();
    ctrlc::set_handler(move || terminate.send(Event::Terminate))?;

    let mut daemon = Daemon::new(
        processes,
        Arc::new(ProcessManager::new()),
        reactor.sender(),
        Duration::from_millis(args.retry_time),
    );
    daemon.start(&mut reactor);
    reactor.run(&mut daemon);

    info!("chaind exiting");
    Ok(())
}

fn init_logging(args: &Cli) -> Result<(), DaemonError> {
    let channel_levels = args
        .channel_levels()
        .map_err(logging::LoggingError::BadChannelLevel)?;
    let settings = LoggerSettings {
        sink: args.logger,
        default_level: args.loglevel.level(),
        channel_levels,
        syslog_ident: args.syslog_ident.clone(),
        syslog_facility: args.syslog_facility.clone(),
    };
    logging::init(&settings)?;
    Ok(())
}
