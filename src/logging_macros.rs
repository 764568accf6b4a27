#![warn(clippy::all, rust_2018_idioms)]

/// Unified logging macros that prefix every record with file, module and line context.
///
/// Records go through `tracing` only; `log`-based dependencies (reqwest, hyper) reach the
/// same subscriber through the `tracing-log` bridge installed by [`crate::app::logging`].
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        tracing::trace!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        tracing::debug!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        tracing::info!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        tracing::warn!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

/*
Log level guidelines:

TRACE: raw ARM payloads, per-pattern match attempts
DEBUG: HTTP verbs and URLs, token cache hits/misses, credential selection
INFO:  run start/finish, resources listed, writes issued
WARN:  degraded behaviour (pattern fallback to literal match, token without expiry)
ERROR: listing failures, per-resource fetch/update failures

User-facing report lines are NOT logged; they are written to stdout by the batch driver.
Logs go to stderr so the report stays clean when piped.

Example output:
  [src/app/toggle.rs:azmon_toggle::app::toggle:88] Disabling metric alert 'cpu-high'
*/
