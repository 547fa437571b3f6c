//! The handler stack.
//!
//! Registrations live in one `Vec`, top of stack last. A scope pushes its
//! handlers in reverse so that, walking downward, the first handler it was
//! given is seen first: within a scope installation order wins, not
//! specificity.

use crate::handler::Registration;
use crate::ids::ScopeId;

/// Proof of one `push`, consumed by the matching `pop`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pushed scope must be popped"]
pub struct ScopeToken {
    scope: ScopeId,
    base: usize,
    count: usize,
}

impl ScopeToken {
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Stack depth below this scope's registrations.
    pub fn base(&self) -> usize {
        self.base
    }
}

#[derive(Debug, Default)]
pub struct HandlerStack {
    entries: Vec<Registration>,
}

impl HandlerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, scope: ScopeId, registrations: Vec<Registration>) -> ScopeToken {
        debug_assert!(registrations.iter().all(|r| r.scope() == scope));
        let base = self.entries.len();
        let count = registrations.len();
        self.entries.extend(registrations.into_iter().rev());
        ScopeToken { scope, base, count }
    }

    /// Remove exactly the registrations of `token`, restoring the stack to the
    /// state before the matching `push`.
    pub fn pop(&mut self, token: ScopeToken) {
        debug_assert_eq!(
            self.entries.len(),
            token.base + token.count,
            "handler scopes popped out of order"
        );
        debug_assert!(self.entries[token.base..]
            .iter()
            .all(|r| r.scope() == token.scope));
        self.entries.truncate(token.base);
    }

    /// Search downward for the first registration matching any of `classes`.
    ///
    /// With `below = Some(pos)` the search starts strictly below `pos`, which
    /// is how propagation continues past a handler already invoked.
    pub fn find_next(
        &self,
        classes: &[String],
        below: Option<usize>,
    ) -> Option<(usize, &Registration)> {
        let start = below.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries[..start]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, reg)| reg.predicate().matches(classes))
    }

    pub fn get(&self, pos: usize) -> Option<&Registration> {
        self.entries.get(pos)
    }

    /// Distinct scopes from top to bottom.
    pub fn scopes(&self) -> Vec<ScopeId> {
        let mut scopes: Vec<ScopeId> = Vec::new();
        for reg in self.entries.iter().rev() {
            if scopes.last() != Some(&reg.scope()) {
                scopes.push(reg.scope());
            }
        }
        scopes
    }

    /// Detach everything at `pos` and above while a calling handler runs, so
    /// conditions it signals only see the handlers below it.
    pub(crate) fn hide_from(&mut self, pos: usize) -> Vec<Registration> {
        self.entries.split_off(pos.min(self.entries.len()))
    }

    pub(crate) fn restore(&mut self, pos: usize, hidden: Vec<Registration>) {
        debug_assert_eq!(self.entries.len(), pos, "scope leaked out of a calling handler");
        self.entries.truncate(pos);
        self.entries.extend(hidden);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerMode, Predicate};

    fn classes(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn exiting(labels: &[&str], scope: ScopeId, slot: usize) -> Registration {
        Registration::exiting(Predicate::new(labels.iter().copied()), scope, slot)
    }

    #[test]
    fn test_push_pop_restores_depth() {
        let mut stack = HandlerStack::new();
        let outer = ScopeId::fresh();
        let t1 = stack.push(outer, vec![exiting(&["error"], outer, 0)]);
        let inner = ScopeId::fresh();
        let t2 = stack.push(
            inner,
            vec![exiting(&["warning"], inner, 0), exiting(&["message"], inner, 1)],
        );
        assert_eq!(stack.depth(), 3);
        assert_eq!(stack.scopes(), vec![inner, outer]);

        stack.pop(t2);
        assert_eq!(stack.depth(), 1);
        stack.pop(t1);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_find_next_prefers_most_recent_scope() {
        let mut stack = HandlerStack::new();
        let outer = ScopeId::fresh();
        let _t1 = stack.push(outer, vec![exiting(&["error"], outer, 0)]);
        let inner = ScopeId::fresh();
        let _t2 = stack.push(inner, vec![exiting(&["error"], inner, 0)]);

        let (pos, reg) = stack.find_next(&classes(&["error", "condition"]), None).unwrap();
        assert_eq!(reg.scope(), inner);

        let (_, reg) = stack
            .find_next(&classes(&["error", "condition"]), Some(pos))
            .unwrap();
        assert_eq!(reg.scope(), outer);
        assert_eq!(reg.mode(), HandlerMode::Exiting);
    }

    #[test]
    fn test_installation_order_beats_specificity() {
        let mut stack = HandlerStack::new();
        let scope = ScopeId::fresh();
        let _t = stack.push(
            scope,
            vec![
                exiting(&["error"], scope, 0),
                exiting(&["bad_argument_error"], scope, 1),
            ],
        );

        let hierarchy = classes(&["bad_argument_error", "error", "condition"]);
        let (_, reg) = stack.find_next(&hierarchy, None).unwrap();
        assert_eq!(reg.predicate().labels(), ["error"]);
    }

    #[test]
    fn test_find_next_none_when_nothing_matches() {
        let mut stack = HandlerStack::new();
        let scope = ScopeId::fresh();
        let _t = stack.push(scope, vec![exiting(&["error"], scope, 0)]);
        assert!(stack
            .find_next(&classes(&["message", "condition"]), None)
            .is_none());
        assert!(stack
            .find_next(&classes(&["error", "condition"]), Some(0))
            .is_none());
    }

    #[test]
    fn test_hide_and_restore() {
        let mut stack = HandlerStack::new();
        let outer = ScopeId::fresh();
        let _t1 = stack.push(outer, vec![exiting(&["error"], outer, 0)]);
        let inner = ScopeId::fresh();
        let _t2 = stack.push(inner, vec![exiting(&["error"], inner, 0)]);

        let hidden = stack.hide_from(1);
        assert_eq!(stack.depth(), 1);
        let (_, reg) = stack.find_next(&classes(&["error"]), None).unwrap();
        assert_eq!(reg.scope(), outer);

        stack.restore(1, hidden);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.get(1).map(Registration::scope), Some(inner));
    }
}
