//! Restarts: resumable continuation points offered by signalling code.
//!
//! A signal may establish named restarts for the duration of its dispatch.
//! The condition handed to handlers lists them, and a calling handler invokes
//! one by name. Invocation does not jump: it marks the restart, the handler
//! returns, and the dispatch loop stops and reports the restart to the
//! signaller. Once the signal returns its restarts are gone.

use crate::condition::{Condition, ConditionKind};
use crate::error::ConditionError;
use crate::ids::{RestartId, SignalId};
use crate::runtime::with_runtime;
use crate::value::Value;

/// Restart established by `warn`.
pub const MUFFLE_WARNING: &str = "muffle_warning";
/// Restart established by `notify`.
pub const MUFFLE_MESSAGE: &str = "muffle_message";
/// Restart for custom conditions signalled with a muffle point.
pub const MUFFLE: &str = "muffle";

/// Conventional suppression restart for a condition kind.
pub fn muffle_restart_name(kind: &ConditionKind) -> &'static str {
    match kind {
        ConditionKind::Warning => MUFFLE_WARNING,
        ConditionKind::Message => MUFFLE_MESSAGE,
        _ => MUFFLE,
    }
}

pub(crate) fn is_muffle(name: &str) -> bool {
    matches!(name, MUFFLE_WARNING | MUFFLE_MESSAGE | MUFFLE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restart {
    id: RestartId,
    name: String,
}

impl Restart {
    pub fn id(&self) -> RestartId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
struct RestartFrame {
    restart: Restart,
    signal: SignalId,
    invoked: Option<Value>,
}

#[derive(Debug, Default)]
pub(crate) struct RestartStack {
    frames: Vec<RestartFrame>,
}

impl RestartStack {
    /// Push one frame per name; returns the base to release back to.
    pub(crate) fn establish(
        &mut self,
        signal: SignalId,
        names: &[&str],
    ) -> (usize, Vec<Restart>) {
        let base = self.frames.len();
        let restarts: Vec<Restart> = names
            .iter()
            .map(|name| Restart {
                id: RestartId::fresh(),
                name: (*name).to_string(),
            })
            .collect();
        self.frames.extend(restarts.iter().cloned().map(|restart| RestartFrame {
            restart,
            signal,
            invoked: None,
        }));
        (base, restarts)
    }

    pub(crate) fn release(&mut self, base: usize) {
        self.frames.truncate(base);
    }

    pub(crate) fn is_active(&self, id: RestartId) -> bool {
        self.frames.iter().any(|frame| frame.restart.id == id)
    }

    pub(crate) fn invoke(&mut self, restart: &Restart, value: Value) -> Result<(), ConditionError> {
        let frame = self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.restart.id == restart.id)
            .ok_or_else(|| ConditionError::invalid_restart(restart.name()))?;
        frame.invoked = Some(value);
        Ok(())
    }

    /// The first restart of `signal` that was invoked, if any, clearing it.
    pub(crate) fn take_invoked(&mut self, signal: SignalId) -> Option<(String, Value)> {
        self.frames
            .iter_mut()
            .filter(|frame| frame.signal == signal)
            .find_map(|frame| {
                frame
                    .invoked
                    .take()
                    .map(|value| (frame.restart.name.clone(), value))
            })
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Restarts of one signal, released on every exit path.
pub(crate) struct RestartGuard {
    base: usize,
}

impl RestartGuard {
    pub(crate) fn establish(signal: SignalId, names: &[&str]) -> (Self, Vec<Restart>) {
        let (base, restarts) =
            with_runtime(|rt| rt.restarts.borrow_mut().establish(signal, names));
        (RestartGuard { base }, restarts)
    }
}

impl Drop for RestartGuard {
    fn drop(&mut self) {
        with_runtime(|rt| rt.restarts.borrow_mut().release(self.base));
    }
}

/// Invoke the restart `name` offered by `condition`.
///
/// Dispatch stops once the current handler returns, and the signaller sees
/// the restart together with `value`.
pub fn invoke_restart(
    condition: &Condition,
    name: &str,
    value: impl Into<Value>,
) -> Result<(), ConditionError> {
    let restart = condition
        .find_restart(name)
        .ok_or_else(|| ConditionError::invalid_restart(name))?;
    log::debug!("invoking restart `{name}` for {condition}");
    with_runtime(|rt| rt.restarts.borrow_mut().invoke(restart, value.into()))
}

/// Suppress `condition`: no further handler and no default behavior sees it.
///
/// Fails with [`ConditionError::InvalidRestart`] when the condition was not
/// signalled through a path that offers a muffle point.
pub fn muffle(condition: &Condition) -> Result<(), ConditionError> {
    let preferred = muffle_restart_name(condition.kind());
    let name = if condition.find_restart(preferred).is_none()
        && condition.find_restart(MUFFLE).is_some()
    {
        MUFFLE
    } else {
        preferred
    };
    invoke_restart(condition, name, Value::Unit)
}

/// Restarts of `condition` that can still be invoked.
pub fn computed_restarts(condition: &Condition) -> Vec<Restart> {
    with_runtime(|rt| {
        let stack = rt.restarts.borrow();
        condition
            .restarts()
            .iter()
            .filter(|restart| stack.is_active(restart.id))
            .cloned()
            .collect()
    })
}
