//! Compile-time gated dispatch logging.

/// Emit per-registration dispatch logs only when the `dispatch_debug_logs`
/// Cargo feature is enabled.
///
/// With the feature disabled (default), this macro compiles to a no-op while
/// still type-checking format arguments.
#[macro_export]
macro_rules! dispatch_debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "dispatch_debug_logs")]
        {
            ::log::trace!($($arg)*);
        }
        #[cfg(not(feature = "dispatch_debug_logs"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
