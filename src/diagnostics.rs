// src/diagnostics.rs
//! Logger setup and crash reports for binaries built on this crate.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::path::PathBuf;

use log::LevelFilter;

/// Default crash report file, relative to the working directory.
pub const CRASH_LOG: &str = "native_sync_crash.log";

/// Debug builds log at `Debug`, release builds at `Warn`; `RUST_LOG` overrides
/// either. Safe to call more than once.
pub fn init_logging() {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .try_init();
}

/// Text of a panic payload, for the two payload types `panic!` produces.
pub fn payload_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "Box<dyn Any>"
    }
}

#[derive(Debug, Clone)]
pub struct CrashReport {
    pub thread: String,
    pub reason: String,
    pub location: Option<String>,
    pub backtrace: String,
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== NATIVE SYNC CRASH ===")?;
        writeln!(f, "Thread: {}", self.thread)?;
        writeln!(f, "Reason: {}", self.reason)?;
        writeln!(f, "Location: {}", self.location.as_deref().unwrap_or("unknown"))?;
        write!(f, "\nStack Trace:\n{}", self.backtrace)
    }
}

/// Installs a panic hook that prints a report to stderr and writes it to
/// `path`. Write failures are reported on stderr only.
pub fn install_crash_hook(path: impl Into<PathBuf>) {
    let path = path.into();
    std::panic::set_hook(Box::new(move |info| {
        let report = CrashReport {
            thread: std::thread::current().name().unwrap_or("<unnamed>").to_owned(),
            reason: payload_message(info.payload()).to_owned(),
            location: info.location().map(|l| format!("{}:{}", l.file(), l.line())),
            backtrace: Backtrace::force_capture().to_string(),
        };
        let text = report.to_string();
        eprintln!("\x1b[31;1m{}\x1b[0m", text);
        match std::fs::write(&path, text.as_bytes()) {
            Ok(()) => eprintln!("Crash report saved to {}", path.display()),
            Err(e) => eprintln!("Could not write crash report to {}: {}", path.display(), e),
        }
    }));
}
