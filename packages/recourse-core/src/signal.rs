//! The signalling engine.
//!
//! A signal walks the handler stack from the top down:
//!
//! - an exiting handler that matches ends the walk by unwinding to the scope
//!   that installed it, carrying the condition;
//! - a calling handler that matches runs in place with itself and everything
//!   above it hidden, then the walk continues below it unless the handler
//!   invoked one of the signal's restarts;
//! - when the stack is exhausted the caller applies the kind's default.
//!
//! Unwinding uses `resume_unwind` with private payloads, which skips the
//! panic hook. Scope guards release handlers and restarts innermost-first on
//! the way out; each exiting scope runs its `finally` action once it has
//! caught the unwind.

use std::panic;

use crate::condition::{Condition, ConditionKind};
use crate::config::WarningPolicy;
use crate::dispatch_debug_log;
use crate::handler::Action;
use crate::ids::{ScopeId, SignalId};
use crate::restart::{self, RestartGuard, MUFFLE_MESSAGE, MUFFLE_WARNING};
use crate::runtime::{self, with_runtime};
use crate::trace::{self, DispatchEvent};
use crate::value::Value;

/// What the signalling code observes when `signal` returns.
///
/// An exiting handler never produces an outcome here: control leaves the
/// signal point and resumes at the installing scope instead (see
/// [`ScopeExit::Handled`](crate::ScopeExit::Handled)).
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    /// At least one calling handler ran, or one muffled the condition.
    Resumed,
    /// A calling handler invoked a non-muffle restart.
    Restarted { name: String, value: Value },
    /// No handler matched.
    Unhandled,
}

/// Transfer to the exiting scope `scope`, whose handler `slot` matched.
pub(crate) struct ExitingUnwind {
    pub(crate) scope: ScopeId,
    pub(crate) slot: usize,
    pub(crate) condition: Condition,
}

/// An error or interrupt nothing caught, travelling to the top-level runner.
pub(crate) struct Abort(pub(crate) Condition);

#[derive(Debug)]
pub(crate) enum Delivery {
    Restarted { name: String, value: Value },
    Exhausted { observed: usize },
}

fn deliver(condition: &Condition, signal: SignalId) -> Delivery {
    let classes = condition.classes();
    let mut below = None;
    let mut observed = 0;

    loop {
        let found = with_runtime(|rt| {
            rt.stack
                .borrow()
                .find_next(classes, below)
                .map(|(pos, reg)| (pos, reg.clone()))
        });
        let Some((pos, registration)) = found else {
            dispatch_debug_log!("{signal}: stack exhausted after {observed} handler(s)");
            return Delivery::Exhausted { observed };
        };

        let scope = registration.scope();
        let label = registration
            .predicate()
            .first_match(classes)
            .unwrap_or_default()
            .to_string();
        dispatch_debug_log!("{signal}: `{label}` matched at {pos} in {scope}");
        trace::record(DispatchEvent::HandlerFired {
            signal,
            scope,
            mode: registration.mode(),
            label,
        });

        match registration.action() {
            Action::Exiting { slot } => {
                log::debug!("{signal}: unwinding {condition} to {scope}");
                trace::record(DispatchEvent::Unwound { signal, scope });
                panic::resume_unwind(Box::new(ExitingUnwind {
                    scope,
                    slot: *slot,
                    condition: condition.clone(),
                }));
            }
            Action::Calling(callback) => {
                observed += 1;
                {
                    let _hidden = runtime::hide_from(pos);
                    callback(condition);
                }
                let invoked =
                    with_runtime(|rt| rt.restarts.borrow_mut().take_invoked(signal));
                if let Some((name, value)) = invoked {
                    log::debug!("{signal}: restart `{name}` invoked by handler in {scope}");
                    if restart::is_muffle(&name) {
                        trace::record(DispatchEvent::Muffled { signal, scope });
                    } else {
                        trace::record(DispatchEvent::Restarted {
                            signal,
                            name: name.clone(),
                        });
                    }
                    return Delivery::Restarted { name, value };
                }
                below = Some(pos);
            }
        }
    }
}

/// Dispatch `condition` with `names` established as restarts for the
/// duration. Returns the condition as handlers saw it.
fn dispatch(condition: &Condition, names: &[&str]) -> (Condition, Delivery) {
    let signal = SignalId::fresh();
    let (guard, restarts) = RestartGuard::establish(signal, names);
    let condition = condition.with_restarts(restarts);
    let delivery = deliver(&condition, signal);
    drop(guard);

    if let Delivery::Exhausted { observed: 0 } = delivery {
        trace::record(DispatchEvent::Unhandled {
            signal,
            condition: condition.to_string(),
        });
    }
    (condition, delivery)
}

fn outcome(delivery: Delivery) -> SignalOutcome {
    match delivery {
        Delivery::Restarted { name, .. } if restart::is_muffle(&name) => SignalOutcome::Resumed,
        Delivery::Restarted { name, value } => SignalOutcome::Restarted { name, value },
        Delivery::Exhausted { observed: 0 } => SignalOutcome::Unhandled,
        Delivery::Exhausted { .. } => SignalOutcome::Resumed,
    }
}

/// Signal `condition` with no default behavior and no restarts.
///
/// Unhandled conditions are silently dropped.
pub fn signal(condition: &Condition) -> SignalOutcome {
    outcome(dispatch(condition, &[]).1)
}

/// Signal `condition` offering the named restarts to calling handlers.
pub fn signal_with_restarts(condition: &Condition, restarts: &[&str]) -> SignalOutcome {
    outcome(dispatch(condition, restarts).1)
}

/// Build and signal a custom condition. `kind_name` is its most specific
/// class, followed by `hierarchy`.
#[track_caller]
pub fn signal_custom<I, S, P, K, V>(
    kind_name: &str,
    hierarchy: I,
    text: impl Into<String>,
    payload: P,
) -> SignalOutcome
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    P: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let mut classes = vec![kind_name.to_string()];
    classes.extend(
        hierarchy
            .into_iter()
            .map(Into::<String>::into)
            .filter(|class| class != kind_name),
    );
    let condition = payload
        .into_iter()
        .fold(Condition::custom(classes, text), |builder, (k, v)| {
            builder.field(k, v)
        })
        .finish();
    signal(&condition)
}

/// Signal `condition` as an error. Returns only by unwinding: to an exiting
/// handler, or, when none matches, to the top-level runner after the
/// condition and its causes have been reported.
pub fn raise(condition: Condition) -> ! {
    let (condition, _) = dispatch(&condition, &[]);
    abort(condition)
}

#[track_caller]
pub fn raise_error(text: impl Into<String>) -> ! {
    raise(Condition::error(text))
}

/// Raise a new error that wraps `parent`.
#[track_caller]
pub fn rethrow(text: impl Into<String>, parent: Condition) -> ! {
    raise(
        Condition::build(ConditionKind::Error, text)
            .parent(parent)
            .finish(),
    )
}

/// Raise an interrupt. Only handlers naming `"interrupt"` (or
/// `"condition"`) see it, and it cannot be muffled.
#[track_caller]
pub fn interrupt() -> ! {
    raise(Condition::interrupt())
}

fn abort(condition: Condition) -> ! {
    let report = condition.report(runtime::current_config().report_chain);
    log::error!("unhandled {condition}");
    runtime::emitter().error(&condition, &report);
    panic::resume_unwind(Box::new(Abort(condition)))
}

#[track_caller]
pub fn warn(text: impl Into<String>) {
    warn_condition(Condition::warning(text))
}

/// Signal `condition` as a warning with a `muffle_warning` restart, then
/// apply the configured warning policy unless a handler muffled it.
pub fn warn_condition(condition: Condition) {
    let (condition, delivery) = dispatch(&condition, &[MUFFLE_WARNING]);
    if let Delivery::Restarted { .. } = delivery {
        return;
    }

    match runtime::current_config().warning_policy {
        WarningPolicy::Deferred => runtime::defer_warning(condition),
        WarningPolicy::Immediate => {
            log::warn!("{condition}");
            runtime::emitter().warning(&condition);
        }
        WarningPolicy::Error => {
            let origin = condition.origin().cloned();
            let mut promoted = Condition::build(
                ConditionKind::Error,
                format!("(converted from warning) {}", condition.text()),
            )
            .parent(condition);
            if let Some(origin) = origin {
                promoted = promoted.origin(origin);
            }
            raise(promoted.finish())
        }
    }
}

#[track_caller]
pub fn notify(text: impl Into<String>) {
    notify_condition(Condition::message(text))
}

/// Signal `condition` as a message with a `muffle_message` restart, then
/// emit it unless a handler muffled it.
pub fn notify_condition(condition: Condition) {
    let (condition, delivery) = dispatch(&condition, &[MUFFLE_MESSAGE]);
    if let Delivery::Restarted { .. } = delivery {
        return;
    }
    runtime::emitter().message(&condition);
}
