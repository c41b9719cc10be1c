//! Colored stderr logging.
//!
//! Configuration is an explicit value threaded through component
//! constructors rather than process-wide state, so two components in the
//! same process can log at different verbosities.

use std::fmt::Display;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Log level for filtering messages. `Off` silences a logger entirely.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Off => write!(f, "OFF"),
            Level::Error => write!(f, "ERROR"),
            Level::Warn => write!(f, "WARN"),
            Level::Info => write!(f, "INFO"),
        }
    }
}

/// Converts days since Unix epoch to (year, month, day).
///
/// Algorithm based on Howard Hinnant's date algorithms.
fn days_to_date(days: u64) -> (u32, u32, u32) {
    let z = days as i64 + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as u32, m, d)
}

/// Logging configuration handed to component constructors.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Most verbose level that still gets written.
    pub level: Level,
    /// Prefix each line with a UTC timestamp.
    pub timestamps: bool,
}

impl LogConfig {
    pub fn verbose() -> Self {
        Self {
            level: Level::Info,
            timestamps: true,
        }
    }

    pub fn quiet() -> Self {
        Self {
            level: Level::Off,
            timestamps: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::verbose()
    }
}

/// Handle writing leveled, colored lines to stderr.
///
/// Cheap to clone; components hold their own copy.
#[derive(Debug, Clone)]
pub struct Logger {
    config: LogConfig,
}

impl Logger {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    /// Logger that drops everything. The default for tests.
    pub fn quiet() -> Self {
        Self::new(LogConfig::quiet())
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn log(&self, level: Level, message: &str) {
        if level == Level::Off || level > self.config.level {
            return;
        }

        let mut stderr = StandardStream::stderr(ColorChoice::Auto);
        let mut spec = ColorSpec::new();
        match level {
            Level::Warn => {
                spec.set_fg(Some(Color::Yellow)).set_bold(true);
            }
            Level::Error => {
                spec.set_fg(Some(Color::Red)).set_bold(true);
            }
            Level::Info | Level::Off => {
                spec.clear();
            }
        }
        let _ = stderr.set_color(&spec);

        if self.config.timestamps {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default();
            let secs = now.as_secs();
            let (year, month, day) = days_to_date(secs / 86400);
            let hours = (secs / 3600) % 24;
            let mins = (secs / 60) % 60;
            let s = secs % 60;
            let _ = write!(
                stderr,
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03} ",
                year,
                month,
                day,
                hours,
                mins,
                s,
                now.subsec_millis()
            );
        }
        let _ = write!(stderr, "[{:5}] ", level);
        let _ = writeln!(stderr, "{}", message);
        let _ = stderr.reset();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}
