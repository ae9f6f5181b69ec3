//! Command-line interface for chaind.
use clap::Parser;
use clap::error::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

use crate::constants::{DEFAULT_RETRY_INTERVAL, DEFAULT_SYSLOG_FACILITY, DEFAULT_SYSLOG_IDENT};
use crate::logging::LogSink;

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("notice", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// The wrapped level filter.
    pub fn level(&self) -> LevelFilter {
        self.0
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let lowercase = trimmed.to_ascii_lowercase();
        let level = match lowercase.as_str() {
            "none" | "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "notice" | "info" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

impl FromStr for LogSink {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(LogSink::Stdout),
            "syslog" => Ok(LogSink::Syslog),
            other => Err(format!("invalid logger '{other}' (expected stdout or syslog)")),
        }
    }
}

/// Command-line interface for chaind.
#[derive(Parser)]
#[command(name = "chaind", version, author)]
#[command(about = "A declarative process configuration daemon", long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long = "config-file", value_name = "PATH")]
    pub config_file: PathBuf,

    /// Logging sink: stdout or syslog.
    #[arg(long, value_name = "SINK", default_value = "stdout")]
    pub logger: LogSink,

    /// Syslog facility (daemon, user, local0-local7, ...).
    #[arg(
        long = "syslog-facility",
        value_name = "FACILITY",
        default_value = DEFAULT_SYSLOG_FACILITY
    )]
    pub syslog_facility: String,

    /// Syslog identity string.
    #[arg(
        long = "syslog-ident",
        value_name = "IDENT",
        default_value = DEFAULT_SYSLOG_IDENT
    )]
    pub syslog_ident: String,

    /// Default logging verbosity: 0-5 or none|error|warning|notice|info|debug.
    #[arg(long = "loglevel", value_name = "LEVEL", default_value = "info")]
    pub loglevel: LogLevelArg,

    /// Per-channel verbosity override; repeatable.
    #[arg(
        long = "channel-loglevel",
        num_args = 2,
        value_names = ["CHANNEL", "LEVEL"],
        action = clap::ArgAction::Append
    )]
    pub channel_loglevel: Vec<String>,

    /// Delay in milliseconds before a failed statement is retried.
    #[arg(
        long = "retry-time",
        value_name = "MS",
        default_value_t = DEFAULT_RETRY_INTERVAL.as_millis() as u64
    )]
    pub retry_time: u64,
}

impl Cli {
    /// Splits the flattened `--channel-loglevel` values into channel/level
    /// pairs.
    pub fn channel_levels(&self) -> Result<Vec<(String, LevelFilter)>, String> {
        let mut levels = Vec::with_capacity(self.channel_loglevel.len() / 2);
        for pair in self.channel_loglevel.chunks(2) {
            let [channel, level] = pair else {
                return Err("channel log level needs a channel and a level".into());
            };
            let level = level.parse::<LogLevelArg>()?;
            levels.push((channel.clone(), level.level()));
        }
        Ok(levels)
    }
}

/// Parses command-line arguments. Help and version exit 0; any argument
/// error exits 1.
pub fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => std::process::exit(0),
                _ => std::process::exit(1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_parse_from_numbers_and_names() {
        assert_eq!("0".parse::<LogLevelArg>().unwrap().level(), LevelFilter::OFF);
        assert_eq!(
            "5".parse::<LogLevelArg>().unwrap().level(),
            LevelFilter::TRACE
        );
        assert_eq!(
            "none".parse::<LogLevelArg>().unwrap().level(),
            LevelFilter::OFF
        );
        assert_eq!(
            "warning".parse::<LogLevelArg>().unwrap().level(),
            LevelFilter::WARN
        );
        assert_eq!(
            "notice".parse::<LogLevelArg>().unwrap().level(),
            LevelFilter::INFO
        );
        assert_eq!(
            "Debug".parse::<LogLevelArg>().unwrap().level(),
            LevelFilter::DEBUG
        );
        assert!("6".parse::<LogLevelArg>().is_err());
        assert!("verbose".parse::<LogLevelArg>().is_err());
        assert!("".parse::<LogLevelArg>().is_err());
    }

    #[test]
    fn logger_sink_parses() {
        assert_eq!("stdout".parse::<LogSink>().unwrap(), LogSink::Stdout);
        assert_eq!("Syslog".parse::<LogSink>().unwrap(), LogSink::Syslog);
        assert!("journal".parse::<LogSink>().is_err());
    }

    #[test]
    fn config_file_is_required() {
        assert!(Cli::try_parse_from(["chaind"]).is_err());
        let cli = Cli::try_parse_from(["chaind", "--config-file", "chaind.yaml"]).unwrap();
        assert_eq!(cli.config_file, PathBuf::from("chaind.yaml"));
        assert_eq!(cli.logger, LogSink::Stdout);
        assert_eq!(cli.retry_time, 10_000);
    }

    #[test]
    fn channel_loglevels_collect_in_pairs() {
        let cli = Cli::try_parse_from([
            "chaind",
            "--config-file",
            "c.yaml",
            "--channel-loglevel",
            "engine",
            "debug",
            "--channel-loglevel",
            "modules",
            "2",
        ])
        .unwrap();

        let levels = cli.channel_levels().unwrap();
        assert_eq!(
            levels,
            vec![
                ("engine".to_string(), LevelFilter::DEBUG),
                ("modules".to_string(), LevelFilter::WARN),
            ]
        );
    }

    #[test]
    fn channel_loglevel_with_bad_level_fails() {
        let cli = Cli::try_parse_from([
            "chaind",
            "--config-file",
            "c.yaml",
            "--channel-loglevel",
            "engine",
            "chatty",
        ])
        .unwrap();
        assert!(cli.channel_levels().is_err());
    }
}
