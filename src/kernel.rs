//! Kernel-wide policy: log levels and the panic path.
//!
//! Mirrors `original_source/src/kernel.c`'s separation between the hardware UART (`serial.rs`,
//! this kernel's `vga.c`/`tty.c` analogue for the host-side sink) and the threshold-gated logging
//! policy layered on top of it (`kernel_log_*`, `kernel_get/set_log_level`, `kernel_panic`).

use core::sync::atomic::{AtomicU8, Ordering};

/// Severity levels, ordered so a call at `level` fires iff `level <= current threshold`.
/// Matches the original's `log_level_t` enum exactly, including the `None`/`All` bounds.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    None = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
    All = 6,
}

impl LogLevel {
    fn from_u8(value: u8) -> LogLevel {
        match value {
            0 => LogLevel::None,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::All,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            LogLevel::Error => "error: ",
            LogLevel::Warn => "warn: ",
            LogLevel::Info => "info: ",
            LogLevel::Debug => "debug: ",
            LogLevel::Trace => "trace: ",
            LogLevel::None | LogLevel::All => "",
        }
    }
}

/// Process-wide log threshold. Defaults to `Debug`, matching the original kernel's default.
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Debug as u8);

pub fn get_log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Sets the threshold, clamped to `[None, All]` (the clamp is a no-op here since every
/// `LogLevel` value is already in range, but it documents the contract the original enforces
/// explicitly with `min`/`max`).
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

#[doc(hidden)]
pub fn log_enabled(level: LogLevel) -> bool {
    level <= get_log_level()
}

#[doc(hidden)]
pub fn log_line(level: LogLevel, args: ::core::fmt::Arguments) {
    if log_enabled(level) {
        crate::serial::_print(format_args!("{}", level.prefix()));
        crate::serial::_print(args);
        crate::serial::_print(format_args!("\n"));
    }
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::kernel::log_line($crate::kernel::LogLevel::Error, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::kernel::log_line($crate::kernel::LogLevel::Warn, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::kernel::log_line($crate::kernel::LogLevel::Info, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::kernel::log_line($crate::kernel::LogLevel::Debug, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::kernel::log_line($crate::kernel::LogLevel::Trace, format_args!($($arg)*));
    };
}

/// A kernel invariant violation: logs at `Error`, then halts. There is no recovery path — callers
/// never get a `Result` for these (see `KernelError` in `error.rs` for the class that does).
#[cold]
pub fn panic(message: core::fmt::Arguments) -> ! {
    log_error!("kernel panic: {}", message);
    x86_64::instructions::interrupts::int3();
    loop {
        x86_64::instructions::interrupts::disable();
        x86_64::instructions::hlt();
    }
}

#[macro_export]
macro_rules! kernel_panic {
    ($($arg:tt)*) => {
        $crate::kernel::panic(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // LOG_LEVEL is a single process-wide atomic, so every assertion that depends on a specific
    // threshold lives in one test to avoid racing against other tests that change it.
    #[test]
    fn log_level_threshold_behavior() {
        assert_eq!(get_log_level(), LogLevel::Debug);

        set_log_level(LogLevel::Warn);
        assert_eq!(get_log_level(), LogLevel::Warn);
        assert!(log_enabled(LogLevel::Error));
        assert!(log_enabled(LogLevel::Warn));
        assert!(!log_enabled(LogLevel::Info));

        set_log_level(LogLevel::None);
        assert!(!log_enabled(LogLevel::Error));

        set_log_level(LogLevel::All);
        assert!(log_enabled(LogLevel::Trace));

        set_log_level(LogLevel::Debug);
    }
}
