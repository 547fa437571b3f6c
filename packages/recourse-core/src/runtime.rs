//! Per-thread runtime state.
//!
//! Each thread owns one handler stack, one restart stack, its configuration,
//! its emitter and its deferred-warning buffer. Nothing here is shared across
//! threads, so push/pop discipline is enforced purely by guard lifetimes on
//! the owning thread's call stack.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::condition::Condition;
use crate::config::RuntimeConfig;
use crate::emitter::{Emitter, StderrEmitter, WarningBatch};
use crate::error::ConditionError;
use crate::handler::Registration;
use crate::ids::ScopeId;
use crate::restart::RestartStack;
use crate::signal::Abort;
use crate::stack::{HandlerStack, ScopeToken};
use crate::trace::DispatchEvent;

pub(crate) struct Runtime {
    pub(crate) stack: RefCell<HandlerStack>,
    pub(crate) restarts: RefCell<RestartStack>,
    pub(crate) trace: RefCell<Option<Vec<DispatchEvent>>>,
    config: RefCell<RuntimeConfig>,
    emitter: RefCell<Rc<dyn Emitter>>,
    warnings: RefCell<WarningBuffer>,
    /// Runtime scopes currently entered on this thread.
    depth: Cell<usize>,
}

impl Runtime {
    fn new() -> Self {
        Runtime {
            stack: RefCell::new(HandlerStack::new()),
            restarts: RefCell::new(RestartStack::default()),
            trace: RefCell::new(None),
            config: RefCell::new(RuntimeConfig::default()),
            emitter: RefCell::new(Rc::new(StderrEmitter)),
            warnings: RefCell::new(WarningBuffer::default()),
            depth: Cell::new(0),
        }
    }
}

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

pub(crate) fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> R {
    RUNTIME.with(f)
}

#[derive(Debug, Default)]
struct WarningBuffer {
    pending: Vec<Condition>,
    dropped: usize,
    last: Vec<Condition>,
}

impl WarningBuffer {
    fn record(&mut self, warning: Condition, cap: usize) {
        if self.pending.len() < cap {
            self.pending.push(warning);
        } else {
            self.dropped += 1;
        }
    }

    fn take(&mut self) -> WarningBatch {
        WarningBatch {
            warnings: std::mem::take(&mut self.pending),
            dropped: std::mem::take(&mut self.dropped),
        }
    }
}

/// Replace this thread's configuration.
pub fn configure(config: RuntimeConfig) {
    log::debug!("configuring runtime: {config:?}");
    with_runtime(|rt| *rt.config.borrow_mut() = config);
}

pub fn current_config() -> RuntimeConfig {
    with_runtime(|rt| rt.config.borrow().clone())
}

/// Route default-behavior output for this thread to `emitter`.
pub fn set_emitter(emitter: impl Emitter + 'static) {
    let emitter: Rc<dyn Emitter> = Rc::new(emitter);
    with_runtime(|rt| *rt.emitter.borrow_mut() = emitter);
}

pub(crate) fn emitter() -> Rc<dyn Emitter> {
    with_runtime(|rt| Rc::clone(&rt.emitter.borrow()))
}

/// Registrations currently on this thread's handler stack.
pub fn handler_depth() -> usize {
    with_runtime(|rt| rt.stack.borrow().depth())
}

/// Restarts currently established on this thread.
pub fn restart_depth() -> usize {
    with_runtime(|rt| rt.restarts.borrow().depth())
}

/// Drain deferred warnings without reporting them.
pub fn take_warnings() -> WarningBatch {
    with_runtime(|rt| rt.warnings.borrow_mut().take())
}

/// Warnings reported by the most recent flush.
pub fn last_warnings() -> Vec<Condition> {
    with_runtime(|rt| rt.warnings.borrow().last.clone())
}

/// Report deferred warnings now instead of at outermost scope exit.
pub fn flush_warnings() {
    let batch = take_warnings();
    if batch.is_empty() {
        return;
    }
    log::warn!("reporting {} deferred warning(s)", batch.len());
    emitter().warning_batch(&batch);
    with_runtime(|rt| rt.warnings.borrow_mut().last = batch.warnings);
}

pub(crate) fn defer_warning(warning: Condition) {
    let cap = with_runtime(|rt| rt.config.borrow().max_deferred_warnings);
    with_runtime(|rt| rt.warnings.borrow_mut().record(warning, cap));
    if with_runtime(|rt| rt.depth.get()) == 0 {
        flush_warnings();
    }
}

/// Marks one runtime scope on the call stack. The outermost one flushes
/// deferred warnings when it is dropped, on every exit path.
pub(crate) struct EntryGuard(());

pub(crate) fn enter() -> EntryGuard {
    with_runtime(|rt| rt.depth.set(rt.depth.get() + 1));
    EntryGuard(())
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        let depth = with_runtime(|rt| {
            let depth = rt.depth.get().saturating_sub(1);
            rt.depth.set(depth);
            depth
        });
        if depth == 0 {
            flush_warnings();
        }
    }
}

/// Handlers of one scope, popped when dropped.
pub(crate) struct ScopeGuard {
    token: Option<ScopeToken>,
}

pub(crate) fn push_scope(scope: ScopeId, registrations: Vec<Registration>) -> ScopeGuard {
    let token = with_runtime(|rt| rt.stack.borrow_mut().push(scope, registrations));
    ScopeGuard { token: Some(token) }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            log::debug!("leaving {}", token.scope());
            with_runtime(|rt| rt.stack.borrow_mut().pop(token));
        }
    }
}

/// Handlers at and above a running calling handler, restored when dropped.
pub(crate) struct HiddenGuard {
    pos: usize,
    hidden: Vec<Registration>,
}

pub(crate) fn hide_from(pos: usize) -> HiddenGuard {
    let hidden = with_runtime(|rt| rt.stack.borrow_mut().hide_from(pos));
    HiddenGuard { pos, hidden }
}

impl Drop for HiddenGuard {
    fn drop(&mut self) {
        let hidden = std::mem::take(&mut self.hidden);
        with_runtime(|rt| rt.stack.borrow_mut().restore(self.pos, hidden));
    }
}

/// Run `body` as the outermost computation.
///
/// An error or interrupt that no exiting handler catches is reported through
/// the emitter and returned as [`ConditionError::Unhandled`]. Deferred
/// warnings are flushed when this returns. Panics that did not come from the
/// condition runtime keep unwinding.
pub fn run<T>(body: impl FnOnce() -> T) -> Result<T, ConditionError> {
    let _entry = enter();
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<Abort>() {
            Ok(abort) => Err(ConditionError::Unhandled(abort.0)),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}
