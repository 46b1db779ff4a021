//! An opaque, leveled logging sink for sandboxes.
//!
//! The engine never picks an application's logging backend; it only defines
//! the thin [`Logger`] trait a sandbox can be handed. [`LogFacadeLogger`]
//! bridges straight to the `log` crate's global macros, so embedders who
//! already initialize `env_logger`, `tracing-log`, or similar get output for
//! free without the engine depending on any particular subscriber.

use std::fmt;

pub use log::Level;

/// A structured message sink. Implementors should be cheap to call on every
/// event dispatch.
pub trait Logger {
    fn log(&self, level: Level, target: &str, message: &str);
}

impl fmt::Debug for dyn Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Logger")
    }
}

/// Forwards every message to `log::log!`, i.e. whatever global logger the
/// embedding application has installed.
#[derive(Debug, Default)]
pub struct LogFacadeLogger;

impl Logger for LogFacadeLogger {
    fn log(&self, level: Level, target: &str, message: &str) {
        log::log!(target: target, level, "{}", message);
    }
}

/// Discards every message. Useful for tests that don't want `log`
/// initialized, or for embedders who genuinely want silence.
#[derive(Debug, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _target: &str, _message: &str) {}
}
