use std::cell::RefCell;
use std::future::Future;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

thread_local! {
    static THREAD_LOG_CONTEXT: RefCell<Option<String>> = const { RefCell::new(None) };
}

tokio::task_local! {
    /// Task-local logging context. Active inside [`scope_log_context`], so contexts survive `.await` points.
    pub static LOG_CONTEXT: RefCell<Option<String>>;
}

/// Trait representing a sink that receives every log record emitted by govboot.
///
/// # Examples
///
/// ```rust
/// use govboot::primitives::logger::{Logger, LogLevel};
///
/// struct MyLogger;
///
/// impl Logger for MyLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{:?}] {}", level, message);
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the deployment.
    Info,
    /// Designates potentially harmful situations, e.g. a failed explorer verification.
    Warn,
    /// Designates error events.
    Error,
}

impl LogLevel {
    /// Returns the upper-case label used in console output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    const fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Trace => log::LevelFilter::Trace,
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warn => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Writes `<timestamp> <LEVEL> <message>` lines to stderr.
///
/// Stdout stays reserved for command results (addresses, preprocessed sources).
pub struct ConsoleLogger;

impl ConsoleLogger {
    /// Renders a log line. The timestamp is RFC 3339 in UTC with millisecond precision.
    #[must_use]
    pub fn format_line(level: LogLevel, message: &str) -> String {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        format!("{now} {:<5} {message}", level.as_str())
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: String) {
        let line = Self::format_line(level, &message);
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }
}

/// Bridges the `log` facade to the installed [`Logger`].
struct BridgeLogger;

impl log::Log for BridgeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let is_record_from_govboot = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("govboot"));

        let is_debug_or_trace_level =
            record.level() == log::Level::Debug || record.level() == log::Level::Trace;

        // Dependencies (alloy, reqwest, hyper) are chatty below info.
        if is_debug_or_trace_level && !is_record_from_govboot {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs the global logger and sets the minimum level that reaches it.
///
/// Only the first call installs a logger; later calls only adjust the level.
#[allow(clippy::module_name_repetitions)]
pub fn set_logger(logger: Arc<dyn Logger>, min_level: LogLevel) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
    }

    static LOGGER: BridgeLogger = BridgeLogger;
    // `set_logger` fails only if another facade logger was installed first.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(min_level.to_level_filter());
}

/// Runs `future` with a fresh task-local logging context, so `LogContext` guards persist across `.await`.
pub async fn scope_log_context<F: Future>(future: F) -> F::Output {
    LOG_CONTEXT.scope(RefCell::new(None), future).await
}

/// Logs a trace-level message with automatic context prefixing
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        if let Some(ctx) = $crate::primitives::logger::get_context() {
            log::trace!("{} {}", ctx, format_args!($($arg)*))
        } else {
            log::trace!($($arg)*)
        }
    };
}

/// Logs a debug-level message with automatic context prefixing
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        if let Some(ctx) = $crate::primitives::logger::get_context() {
            log::debug!("{} {}", ctx, format_args!($($arg)*))
        } else {
            log::debug!($($arg)*)
        }
    };
}

/// Logs an info-level message with automatic context prefixing
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        if let Some(ctx) = $crate::primitives::logger::get_context() {
            log::info!("{} {}", ctx, format_args!($($arg)*))
        } else {
            log::info!($($arg)*)
        }
    };
}

/// Logs a warning-level message with automatic context prefixing
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        if let Some(ctx) = $crate::primitives::logger::get_context() {
            log::warn!("{} {}", ctx, format_args!($($arg)*))
        } else {
            log::warn!($($arg)*)
        }
    };
}

/// Logs an error-level message with automatic context prefixing
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        if let Some(ctx) = $crate::primitives::logger::get_context() {
            log::error!("{} {}", ctx, format_args!($($arg)*))
        } else {
            log::error!($($arg)*)
        }
    };
}

/// Tracks which backing storage a [`LogContext`] used, so `Drop` restores the correct one.
enum LogContextStorage {
    TaskLocal,
    ThreadLocal,
}

/// A scope guard that sets a logging context and restores the previous one when dropped.
///
/// # Examples
///
/// ```rust
/// use govboot::primitives::logger::{get_context, LogContext};
///
/// {
///     let _govboot_logger_ctx = LogContext::new("Deployer");
///     assert_eq!(get_context().as_deref(), Some("[govboot][Deployer]"));
/// }
/// assert_eq!(get_context(), None);
/// ```
pub struct LogContext {
    previous: Option<String>,
    storage: LogContextStorage,
}

impl LogContext {
    /// Creates a new logging context scope.
    #[must_use]
    pub fn new(module: &str) -> Self {
        let new_context = Some(format!("[govboot][{module}]"));

        match LOG_CONTEXT.try_with(|ctx| ctx.replace(new_context.clone())) {
            Ok(previous) => Self {
                previous,
                storage: LogContextStorage::TaskLocal,
            },
            Err(_) => {
                let previous = THREAD_LOG_CONTEXT.with(|ctx| ctx.replace(new_context));
                Self {
                    previous,
                    storage: LogContextStorage::ThreadLocal,
                }
            }
        }
    }
}

impl Drop for LogContext {
    fn drop(&mut self) {
        match self.storage {
            LogContextStorage::TaskLocal => {
                let _ = LOG_CONTEXT.try_with(|ctx| {
                    (*ctx.borrow_mut()).clone_from(&self.previous);
                });
            }
            LogContextStorage::ThreadLocal => {
                THREAD_LOG_CONTEXT.with(|ctx| {
                    (*ctx.borrow_mut()).clone_from(&self.previous);
                });
            }
        }
    }
}

/// Gets the current logging context, if any.
#[must_use]
pub fn get_context() -> Option<String> {
    LOG_CONTEXT
        .try_with(|ctx| ctx.borrow().clone())
        .unwrap_or_else(|_| THREAD_LOG_CONTEXT.with(|ctx| ctx.borrow().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_contexts_restore_previous() {
        let outer = LogContext::new("Deployer");
        {
            let _inner = LogContext::new("SafeWalletService");
            assert_eq!(
                get_context().as_deref(),
                Some("[govboot][SafeWalletService]")
            );
        }
        assert_eq!(get_context().as_deref(), Some("[govboot][Deployer]"));
        drop(outer);
        assert_eq!(get_context(), None);
    }

    #[tokio::test]
    async fn test_task_local_context_survives_await() {
        scope_log_context(async {
            let _ctx = LogContext::new("Deployer");
            tokio::task::yield_now().await;
            assert_eq!(get_context().as_deref(), Some("[govboot][Deployer]"));
        })
        .await;
    }

    #[test]
    fn test_log_level_parsing_and_ordering() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
        assert!(LogLevel::Debug < LogLevel::Error);
    }

    #[test]
    fn test_console_line_format() {
        let line = ConsoleLogger::format_line(LogLevel::Warn, "verification skipped");
        assert!(line.ends_with(" WARN  verification skipped"));
        assert!(line.contains('T'));
        assert!(line.contains('Z'));
    }
}
