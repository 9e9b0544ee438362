//! Logging capability handed to the decision engine

use shared::LogLevel;

/// Sink for human-readable trace lines. Never influences a verdict.
pub trait PolicyLogger {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Emits lines as `tracing` events; used when the engine runs natively.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl PolicyLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "policy", "{}", message),
            LogLevel::Debug => tracing::debug!(target: "policy", "{}", message),
            LogLevel::Info => tracing::info!(target: "policy", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "policy", "{}", message),
            LogLevel::Error => tracing::error!(target: "policy", "{}", message),
        }
    }
}

/// Forwards lines to the host through the `host.log` import.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct HostLogger;

#[cfg(target_arch = "wasm32")]
#[link(wasm_import_module = "host")]
extern "C" {
    fn log(level: i32, ptr: i32, len: i32);
}

#[cfg(target_arch = "wasm32")]
impl PolicyLogger for HostLogger {
    fn log(&self, level: LogLevel, message: &str) {
        unsafe { log(level.as_i32(), message.as_ptr() as i32, message.len() as i32) }
    }
}
