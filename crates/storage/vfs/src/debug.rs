//! Debug/error logging channels for the VFS dispatch layer
//!
//! Follows the debug-macro idiom used throughout this kernel's driver
//! crates (see `watos-driver-traits`'s `debug_storage!`/`debug_network!`):
//! a `macro_rules!` per channel that compiles to nothing unless its Cargo
//! feature is enabled, delegating to a hookable sink. The sink defaults to
//! a no-op so the crate links standalone; the surrounding kernel installs a
//! real one (serial port, ring buffer, ...) at boot.

use core::fmt;

use spin::Mutex;

/// A debug/error log sink. The host kernel implements this once and
/// installs it with [`set_log_sink`].
pub trait LogSink: Send + Sync {
    fn log(&self, channel: &str, args: fmt::Arguments<'_>);
}

struct NullSink;
impl LogSink for NullSink {
    fn log(&self, _channel: &str, _args: fmt::Arguments<'_>) {}
}

static NULL_SINK: NullSink = NullSink;
static SINK: Mutex<Option<&'static dyn LogSink>> = Mutex::new(None);

/// Install the kernel-wide log sink for VFS debug/error output. Safe to
/// call more than once; the last call wins.
pub fn set_log_sink(sink: &'static dyn LogSink) {
    *SINK.lock() = Some(sink);
}

#[doc(hidden)]
pub fn _log(channel: &str, args: fmt::Arguments<'_>) {
    let guard = SINK.lock();
    let sink: &dyn LogSink = guard.unwrap_or(&NULL_SINK);
    sink.log(channel, args);
}

/// Debug-channel trace, compiled out entirely unless `debug-vfs` is enabled.
#[macro_export]
#[cfg(feature = "debug-vfs")]
macro_rules! vfs_debug {
    ($($arg:tt)*) => {
        $crate::debug::_log("debug", format_args!($($arg)*))
    };
}

#[macro_export]
#[cfg(not(feature = "debug-vfs"))]
macro_rules! vfs_debug {
    ($($arg:tt)*) => {};
}

/// Error-channel trace. Always compiled in: `BadFs` must emit a diagnostic
/// before returning regardless of build configuration.
#[macro_export]
macro_rules! vfs_error {
    ($($arg:tt)*) => {
        $crate::debug::_log("error", format_args!($($arg)*))
    };
}
