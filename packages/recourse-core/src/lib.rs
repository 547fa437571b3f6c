//! recourse: a condition signalling and handling runtime.
//!
//! Conditions are typed, immutable records. Code signals them; handlers
//! installed by enclosing scopes decide what happens next.
//!
//! # Architecture
//!
//! - **Thread-local handler stack**: scopes push on entry and pop on every
//!   exit path through drop guards
//! - **Two handler modes**: exiting handlers unwind to their scope and supply
//!   its result; calling handlers run in place and let the signaller resume
//! - **Restarts**: signalling code offers named resumption points, muffling
//!   being the common one
//! - **Per-kind defaults**: uncaught errors abort to the top-level runner,
//!   warnings are batched, messages are emitted, custom conditions vanish
//!
//! ```
//! use recourse::{raise_error, TryCatch};
//!
//! let text = TryCatch::new()
//!     .on("error", |cnd| cnd.text().to_string())
//!     .run(|| raise_error("x must be numeric"));
//! assert_eq!(text, "x must be numeric");
//! ```
//!
//! Exiting transfers unwind the stack, so crates using this runtime must be
//! built with `panic = "unwind"` (the default).

pub mod condition;
pub mod config;
pub mod emitter;
pub mod error;
pub mod handler;
pub mod ids;
mod logging;
pub mod restart;
mod runtime;
mod scope;
pub mod signal;
pub mod stack;
pub mod trace;
pub mod value;

// Re-exports for convenience
pub use condition::{Condition, ConditionBuilder, ConditionKind, ConditionRecord, Origin};
pub use config::{RuntimeConfig, WarningPolicy};
pub use emitter::{Emitted, Emitter, MemoryEmitter, StderrEmitter, WarningBatch};
pub use error::ConditionError;
pub use handler::{HandlerMode, Predicate, Registration};
pub use ids::{RestartId, ScopeId, SignalId};
pub use restart::{
    computed_restarts, invoke_restart, muffle, Restart, MUFFLE, MUFFLE_MESSAGE, MUFFLE_WARNING,
};
pub use runtime::{
    configure, current_config, flush_warnings, handler_depth, last_warnings, restart_depth, run,
    set_emitter, take_warnings,
};
pub use scope::{
    catch_condition, suppress_messages, suppress_warnings, try_catch, with_handlers_calling,
    with_handlers_exiting, CallingHandler, CallingHandlers, ExitingHandler, ScopeExit, TryCatch,
};
pub use signal::{
    interrupt, notify, notify_condition, raise, raise_error, rethrow, signal, signal_custom,
    signal_with_restarts, warn, warn_condition, SignalOutcome,
};
pub use stack::{HandlerStack, ScopeToken};
pub use trace::{disable_trace, enable_trace, take_trace, DispatchEvent};
pub use value::Value;
