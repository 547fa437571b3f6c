//! Core identifier types for the runtime.
//!
//! All IDs are lightweight Copy types using newtype pattern for type safety.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a handler scope.
///
/// Every `TryCatch` / `CallingHandlers` entry creates a fresh ScopeId. Exiting
/// unwinds carry it so the right scope can recognise its own transfer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ScopeId(pub u64);

/// Unique identifier for an established restart.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RestartId(pub u64);

/// Unique identifier for one signal dispatch.
///
/// Tracks the lifecycle of a condition through the handler stack.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SignalId(pub u64);

static SCOPE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static RESTART_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl ScopeId {
    /// Create a fresh unique ScopeId.
    pub fn fresh() -> Self {
        ScopeId(SCOPE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl RestartId {
    /// Create a fresh unique RestartId.
    pub fn fresh() -> Self {
        RestartId(RESTART_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl SignalId {
    /// Create a fresh unique SignalId.
    pub fn fresh() -> Self {
        SignalId(SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_id_fresh_is_unique() {
        let s1 = ScopeId::fresh();
        let s2 = ScopeId::fresh();
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_restart_id_fresh_is_unique() {
        let r1 = RestartId::fresh();
        let r2 = RestartId::fresh();
        assert_ne!(r1, r2);
    }

    #[test]
    fn test_signal_id_display() {
        let id = SignalId(7);
        assert_eq!(id.to_string(), "signal#7");
        assert_eq!(ScopeId(3).to_string(), "scope#3");
    }
}
