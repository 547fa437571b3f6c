//! Optional per-thread record of dispatch decisions.
//!
//! Off by default. When enabled, every handler that fires, every restart that
//! stops a signal, every exiting transfer and every condition that finds no
//! handler is appended to the thread's trace.

use crate::handler::HandlerMode;
use crate::ids::{ScopeId, SignalId};
use crate::runtime::with_runtime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    HandlerFired {
        signal: SignalId,
        scope: ScopeId,
        mode: HandlerMode,
        /// Predicate label that matched.
        label: String,
    },
    /// A calling handler in `scope` suppressed the condition.
    Muffled {
        signal: SignalId,
        scope: ScopeId,
    },
    Restarted {
        signal: SignalId,
        name: String,
    },
    Unwound {
        signal: SignalId,
        scope: ScopeId,
    },
    Unhandled {
        signal: SignalId,
        condition: String,
    },
}

impl DispatchEvent {
    pub fn signal(&self) -> SignalId {
        match self {
            DispatchEvent::HandlerFired { signal, .. }
            | DispatchEvent::Muffled { signal, .. }
            | DispatchEvent::Restarted { signal, .. }
            | DispatchEvent::Unwound { signal, .. }
            | DispatchEvent::Unhandled { signal, .. } => *signal,
        }
    }
}

pub fn enable_trace() {
    with_runtime(|rt| {
        let mut trace = rt.trace.borrow_mut();
        if trace.is_none() {
            *trace = Some(Vec::new());
        }
    });
}

pub fn disable_trace() {
    with_runtime(|rt| *rt.trace.borrow_mut() = None);
}

/// Drain recorded events. Tracing stays enabled.
pub fn take_trace() -> Vec<DispatchEvent> {
    with_runtime(|rt| {
        rt.trace
            .borrow_mut()
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    })
}

pub(crate) fn record(event: DispatchEvent) {
    with_runtime(|rt| {
        if let Some(events) = rt.trace.borrow_mut().as_mut() {
            events.push(event);
        }
    });
}
