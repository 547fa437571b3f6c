//! Handler scopes.
//!
//! [`TryCatch`] installs exiting handlers: when one matches, the body is
//! abandoned and the handler's return value becomes the scope's result.
//! [`CallingHandlers`] installs calling handlers: they run where the condition
//! was signalled and the scope always returns the body's result.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::condition::Condition;
use crate::handler::{CallingFn, Predicate, Registration};
use crate::ids::ScopeId;
use crate::restart::muffle;
use crate::runtime;
use crate::signal::ExitingUnwind;

pub struct ExitingHandler<'a, T> {
    predicate: Predicate,
    callback: Box<dyn FnOnce(Condition) -> T + 'a>,
}

impl<'a, T> ExitingHandler<'a, T> {
    pub fn new(
        predicate: impl Into<Predicate>,
        callback: impl FnOnce(Condition) -> T + 'a,
    ) -> Self {
        ExitingHandler {
            predicate: predicate.into(),
            callback: Box::new(callback),
        }
    }
}

pub struct CallingHandler {
    predicate: Predicate,
    callback: CallingFn,
}

impl CallingHandler {
    pub fn new(predicate: impl Into<Predicate>, callback: impl Fn(&Condition) + 'static) -> Self {
        CallingHandler {
            predicate: predicate.into(),
            callback: Rc::new(callback),
        }
    }
}

/// How an exiting scope finished.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeExit<T> {
    /// The body ran to completion.
    Completed(T),
    /// An exiting handler fired; the body was abandoned.
    Handled { value: T, condition: Condition },
}

impl<T> ScopeExit<T> {
    pub fn into_value(self) -> T {
        match self {
            ScopeExit::Completed(value) | ScopeExit::Handled { value, .. } => value,
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, ScopeExit::Handled { .. })
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            ScopeExit::Completed(_) => None,
            ScopeExit::Handled { condition, .. } => Some(condition),
        }
    }
}

/// Runs the scope's `finally` action outside any destructor, so a condition
/// it raises unwinds normally and replaces whatever was in flight.
fn run_finally(finally: Option<Box<dyn FnOnce() + '_>>) {
    if let Some(action) = finally {
        action();
    }
}

/// Exiting scope builder.
///
/// Handlers are tried in the order given: put specific classes before
/// general ones.
pub struct TryCatch<'a, T> {
    handlers: Vec<ExitingHandler<'a, T>>,
    finally: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a, T> Default for TryCatch<'a, T> {
    fn default() -> Self {
        TryCatch {
            handlers: Vec::new(),
            finally: None,
        }
    }
}

impl<'a, T> TryCatch<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        self,
        predicate: impl Into<Predicate>,
        callback: impl FnOnce(Condition) -> T + 'a,
    ) -> Self {
        self.handler(ExitingHandler::new(predicate, callback))
    }

    pub fn handler(mut self, handler: ExitingHandler<'a, T>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Action run when the scope exits by any path, after a fired handler.
    pub fn finally(mut self, action: impl FnOnce() + 'a) -> Self {
        self.finally = Some(Box::new(action));
        self
    }

    pub fn run(self, body: impl FnOnce() -> T) -> T {
        self.run_outcome(body).into_value()
    }

    pub fn run_outcome(self, body: impl FnOnce() -> T) -> ScopeExit<T> {
        let TryCatch { handlers, finally } = self;
        let _entry = runtime::enter();

        let scope = ScopeId::fresh();
        let mut callbacks = Vec::with_capacity(handlers.len());
        let mut registrations = Vec::with_capacity(handlers.len());
        for (slot, handler) in handlers.into_iter().enumerate() {
            registrations.push(Registration::exiting(handler.predicate, scope, slot));
            callbacks.push(handler.callback);
        }
        log::debug!(
            "entering exiting {scope} with {} handler(s)",
            registrations.len()
        );

        let guard = runtime::push_scope(scope, registrations);
        let result = panic::catch_unwind(AssertUnwindSafe(body));
        drop(guard);

        let unwind = match result {
            Ok(value) => {
                run_finally(finally);
                return ScopeExit::Completed(value);
            }
            Err(payload) => match payload.downcast::<ExitingUnwind>() {
                Ok(unwind) if unwind.scope == scope => unwind,
                Ok(unwind) => {
                    run_finally(finally);
                    panic::resume_unwind(unwind)
                }
                Err(payload) => {
                    run_finally(finally);
                    panic::resume_unwind(payload)
                }
            },
        };

        let ExitingUnwind {
            slot, condition, ..
        } = *unwind;
        log::debug!("{scope} caught {condition}");
        let callback = callbacks.swap_remove(slot);
        let handled = panic::catch_unwind(AssertUnwindSafe(|| callback(condition.clone())));
        run_finally(finally);
        match handled {
            Ok(value) => ScopeExit::Handled { value, condition },
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// Calling scope builder.
#[derive(Default)]
pub struct CallingHandlers {
    handlers: Vec<CallingHandler>,
}

impl CallingHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        self,
        predicate: impl Into<Predicate>,
        callback: impl Fn(&Condition) + 'static,
    ) -> Self {
        self.handler(CallingHandler::new(predicate, callback))
    }

    pub fn handler(mut self, handler: CallingHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn run<T>(self, body: impl FnOnce() -> T) -> T {
        let _entry = runtime::enter();
        let scope = ScopeId::fresh();
        let registrations: Vec<Registration> = self
            .handlers
            .into_iter()
            .map(|h| Registration::calling(h.predicate, scope, h.callback))
            .collect();
        log::debug!(
            "entering calling {scope} with {} handler(s)",
            registrations.len()
        );
        let _guard = runtime::push_scope(scope, registrations);
        body()
    }
}

pub fn with_handlers_exiting<'a, T>(
    handlers: Vec<ExitingHandler<'a, T>>,
    body: impl FnOnce() -> T,
    finally: Option<Box<dyn FnOnce() + 'a>>,
) -> T {
    TryCatch {
        handlers,
        finally,
    }
    .run(body)
}

pub fn with_handlers_calling<T>(handlers: Vec<CallingHandler>, body: impl FnOnce() -> T) -> T {
    CallingHandlers { handlers }.run(body)
}

/// Run `body`, returning the first error it raises instead of unwinding.
pub fn try_catch<T>(body: impl FnOnce() -> T) -> Result<T, Condition> {
    TryCatch::new().on("error", Err).run(|| Ok(body()))
}

/// Run `body`, returning the first condition matching `predicate`.
pub fn catch_condition(
    predicate: impl Into<Predicate>,
    body: impl FnOnce(),
) -> Option<Condition> {
    TryCatch::new().on(predicate, Some).run(|| {
        body();
        None
    })
}

fn muffle_quietly(condition: &Condition) {
    if let Err(err) = muffle(condition) {
        log::debug!("cannot suppress {condition}: {err}");
    }
}

pub fn suppress_warnings<T>(body: impl FnOnce() -> T) -> T {
    CallingHandlers::new().on("warning", muffle_quietly).run(body)
}

pub fn suppress_messages<T>(body: impl FnOnce() -> T) -> T {
    CallingHandlers::new().on("message", muffle_quietly).run(body)
}
