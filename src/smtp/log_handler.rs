//! The embedder-facing logging hook.
//!
//! The library also traces its own operation unconditionally through the
//! `log` crate, exactly as the rest of the codebase does. `LogHandler` is
//! a second, optional channel so an embedder can route session-level
//! events (a greeting, a rejected sender, a completed delivery) wherever
//! it likes without scraping `log` output.

/// Severity of a [`LogHandler`] event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Success,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Receives session-level events from the connection driver.
pub trait LogHandler: Send + Sync {
    fn log(&self, level: LogLevel, msg: &str);
}

/// Forwards every event to the `log` crate at the matching level.
/// `Success` and `Fatal` don't have direct `log` equivalents, so they
/// map to `info!` and `error!` respectively.
pub struct DefaultLogHandler;

impl LogHandler for DefaultLogHandler {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Success => log::info!("{msg}"),
            LogLevel::Debug => log::debug!("{msg}"),
            LogLevel::Info => log::info!("{msg}"),
            LogLevel::Warn => log::warn!("{msg}"),
            LogLevel::Error => log::error!("{msg}"),
            LogLevel::Fatal => log::error!("{msg}"),
        }
    }
}
