//! Logging sinks and per-channel filters.
//!
//! The default level and any `--channel-loglevel` overrides become an
//! `EnvFilter`; channels map to crate module paths. The syslog sink routes
//! formatted events through `libc::syslog`.

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Log channels that `--channel-loglevel` may target. Each maps to a crate
/// module path.
pub const LOG_CHANNELS: &[&str] = &[
    "cli", "config", "daemon", "engine", "logging", "module", "modules", "procmgr",
    "program", "reactor", "value",
];

/// Logging initialization errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// `--channel-loglevel` named a channel outside [`LOG_CHANNELS`].
    #[error("unknown log channel '{0}'")]
    UnknownChannel(String),

    /// A channel/level pair could not be parsed.
    #[error("invalid channel log level: {0}")]
    BadChannelLevel(String),

    /// A constructed filter directive failed to parse.
    #[error("invalid filter directive '{0}'")]
    Directive(String),

    /// `--logger syslog` on a platform without syslog.
    #[error("syslog is not supported on this platform")]
    SyslogUnsupported,

    /// Unrecognized `--syslog-facility` value.
    #[error("invalid syslog facility '{0}'")]
    BadFacility(String),

    /// `--syslog-ident` could not be turned into a C string.
    #[error("invalid syslog identity: {0}")]
    BadIdent(String),
}

/// Which sink receives formatted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    /// Format to standard output.
    Stdout,
    /// Send each line to syslog (unix only).
    Syslog,
}

/// Everything logger initialization needs from the CLI.
pub struct LoggerSettings {
    /// Selected sink.
    pub sink: LogSink,
    /// Default level for all channels.
    pub default_level: LevelFilter,
    /// Per-channel overrides.
    pub channel_levels: Vec<(String, LevelFilter)>,
    /// Syslog identity string.
    pub syslog_ident: String,
    /// Syslog facility name.
    pub syslog_facility: String,
}

/// Builds the filter for the default level plus per-channel overrides.
pub fn build_filter(
    default: LevelFilter,
    overrides: &[(String, LevelFilter)],
) -> Result<EnvFilter, LoggingError> {
    let mut filter = EnvFilter::default().add_directive(default.into());
    for (channel, level) in overrides {
        if !LOG_CHANNELS.contains(&channel.as_str()) {
            return Err(LoggingError::UnknownChannel(channel.clone()));
        }
        let directive = format!("chaind::{channel}={level}");
        let parsed = directive
            .parse()
            .map_err(|_| LoggingError::Directive(directive.clone()))?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

/// Installs the global tracing subscriber.
pub fn init(settings: &LoggerSettings) -> Result<(), LoggingError> {
    let filter = build_filter(settings.default_level, &settings.channel_levels)?;
    match settings.sink {
        LogSink::Stdout => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(())
        }
        #[cfg(unix)]
        LogSink::Syslog => {
            syslog::open(&settings.syslog_ident, &settings.syslog_facility)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(syslog::SyslogMakeWriter)
                .with_ansi(false)
                .with_target(false)
                .without_time()
                .init();
            Ok(())
        }
        #[cfg(not(unix))]
        LogSink::Syslog => Err(LoggingError::SyslogUnsupported),
    }
}

#[cfg(unix)]
mod syslog {
    use std::{
        ffi::CString,
        io::{self, Write as _},
        sync::OnceLock,
    };

    use tracing::{Level, Metadata};
    use tracing_subscriber::fmt::MakeWriter;

    use super::LoggingError;

    // openlog keeps the identity pointer, so it is pinned for the process
    // lifetime.
    static IDENT: OnceLock<CString> = OnceLock::new();

    pub(super) fn open(ident: &str, facility: &str) -> Result<(), LoggingError> {
        let facility = parse_facility(facility)?;
        let ident =
            CString::new(ident).map_err(|err| LoggingError::BadIdent(err.to_string()))?;
        let ident = IDENT.get_or_init(|| ident);
        unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, facility) };
        Ok(())
    }

    fn parse_facility(name: &str) -> Result<libc::c_int, LoggingError> {
        let facility = match name.to_ascii_lowercase().as_str() {
            "auth" => libc::LOG_AUTH,
            "cron" => libc::LOG_CRON,
            "daemon" => libc::LOG_DAEMON,
            "syslog" => libc::LOG_SYSLOG,
            "user" => libc::LOG_USER,
            "local0" => libc::LOG_LOCAL0,
            "local1" => libc::LOG_LOCAL1,
            "local2" => libc::LOG_LOCAL2,
            "local3" => libc::LOG_LOCAL3,
            "local4" => libc::LOG_LOCAL4,
            "local5" => libc::LOG_LOCAL5,
            "local6" => libc::LOG_LOCAL6,
            "local7" => libc::LOG_LOCAL7,
            _ => return Err(LoggingError::BadFacility(name.to_string())),
        };
        Ok(facility)
    }

    /// Hands each formatted event a buffer that forwards to syslog on flush.
    pub(super) struct SyslogMakeWriter;

    pub(super) struct SyslogEntry {
        priority: libc::c_int,
        buffer: Vec<u8>,
    }

    impl io::Write for SyslogEntry {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            for line in self.buffer.split(|byte| *byte == b'\n') {
                if line.is_empty() {
                    continue;
                }
                if let Ok(message) = CString::new(line) {
                    unsafe {
                        libc::syslog(self.priority, c"%s".as_ptr(), message.as_ptr())
                    };
                }
            }
            self.buffer.clear();
            Ok(())
        }
    }

    impl Drop for SyslogEntry {
        fn drop(&mut self) {
            let _ = self.flush();
        }
    }

    impl<'a> MakeWriter<'a> for SyslogMakeWriter {
        type Writer = SyslogEntry;

        fn make_writer(&'a self) -> Self::Writer {
            SyslogEntry {
                priority: libc::LOG_INFO,
                buffer: Vec::new(),
            }
        }

        fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
            let priority = match *meta.level() {
                Level::ERROR => libc::LOG_ERR,
                Level::WARN => libc::LOG_WARNING,
                Level::INFO => libc::LOG_INFO,
                Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
            };
            SyslogEntry {
                priority,
                buffer: Vec::new(),
            }
        }
    }

}
