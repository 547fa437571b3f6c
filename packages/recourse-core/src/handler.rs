//! Handler registrations.

use std::fmt;
use std::rc::Rc;

use crate::condition::Condition;
use crate::ids::ScopeId;

/// How a matched handler affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerMode {
    /// Unwinds to the installing scope; the handler's value becomes the
    /// scope's result.
    Exiting,
    /// Runs in place; the signalling code resumes afterwards.
    Calling,
}

/// Class labels a handler answers to. Matches when any label appears in the
/// condition's hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    labels: Vec<String>,
}

impl Predicate {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// First of this predicate's labels found in `classes`, if any.
    pub fn first_match(&self, classes: &[String]) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| classes.iter().any(|class| class == *label))
            .map(String::as_str)
    }

    pub fn matches(&self, classes: &[String]) -> bool {
        self.first_match(classes).is_some()
    }
}

impl From<&str> for Predicate {
    fn from(label: &str) -> Self {
        Predicate::new([label])
    }
}

impl From<String> for Predicate {
    fn from(label: String) -> Self {
        Predicate::new([label])
    }
}

impl<const N: usize> From<[&str; N]> for Predicate {
    fn from(labels: [&str; N]) -> Self {
        Predicate::new(labels)
    }
}

impl From<Vec<String>> for Predicate {
    fn from(labels: Vec<String>) -> Self {
        Predicate { labels }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels.join("|"))
    }
}

pub(crate) type CallingFn = Rc<dyn Fn(&Condition)>;

#[derive(Clone)]
pub(crate) enum Action {
    /// The callback stays with the installing scope; `slot` indexes it there.
    Exiting { slot: usize },
    Calling(CallingFn),
}

/// One installed handler on the stack.
#[derive(Clone)]
pub struct Registration {
    predicate: Predicate,
    action: Action,
    scope: ScopeId,
}

impl Registration {
    pub(crate) fn exiting(predicate: Predicate, scope: ScopeId, slot: usize) -> Self {
        Registration {
            predicate,
            action: Action::Exiting { slot },
            scope,
        }
    }

    pub(crate) fn calling(predicate: Predicate, scope: ScopeId, callback: CallingFn) -> Self {
        Registration {
            predicate,
            action: Action::Calling(callback),
            scope,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn mode(&self) -> HandlerMode {
        match self.action {
            Action::Exiting { .. } => HandlerMode::Exiting,
            Action::Calling(_) => HandlerMode::Calling,
        }
    }

    pub(crate) fn action(&self) -> &Action {
        &self.action
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("predicate", &self.predicate)
            .field("mode", &self.mode())
            .field("scope", &self.scope)
            .finish()
    }
}
