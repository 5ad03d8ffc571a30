use std::io::Write;

use log::LevelFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevel(pub LevelFilter);
impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" | "warning" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" | "none" => LevelFilter::Off,
            _ => return Err(format!("Invalid log level: {}", s)),
        };
        Ok(LogLevel(level))
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        level.0
    }
}

/// Pick the effective level. An explicit level wins, --quiet lowers the
/// default to warnings, and without either RUST_LOG decides
pub fn resolve_log_level(explicit: Option<LogLevel>, quiet: bool) -> Option<LevelFilter> {
    match (explicit, quiet) {
        (Some(level), _) => Some(level.0),
        (None, true) => Some(LevelFilter::Warn),
        (None, false) => None,
    }
}

pub fn setup_global_logger(level: Option<LevelFilter>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{} {:<5} {}] {}",
            buf.timestamp_seconds(),
            record.level(),
            record.target(),
            record.args()
        )
    });

    //Tests and library users may have installed a logger already
    let _ = builder.try_init();
}
