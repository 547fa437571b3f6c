//! Condition records.
//!
//! A [`Condition`] describes one signalled event: its kind, the ordered class
//! labels handlers match against, a human-readable text, an optional call-site
//! origin, a payload of named fields, and an optional parent it wraps.
//!
//! Conditions are immutable once built. Cloning is cheap (the data sits behind
//! an `Arc`), and the `parent` link can only point at a condition that already
//! exists, so causal chains always terminate.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use serde::Serialize;

use crate::restart::Restart;
use crate::value::Value;

/// Label every condition carries as its least-specific class.
pub const CONDITION_CLASS: &str = "condition";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Error,
    Warning,
    Message,
    Interrupt,
    Custom(String),
}

impl ConditionKind {
    /// Class label used for this kind in a hierarchy.
    pub fn label(&self) -> &str {
        match self {
            ConditionKind::Error => "error",
            ConditionKind::Warning => "warning",
            ConditionKind::Message => "message",
            ConditionKind::Interrupt => "interrupt",
            ConditionKind::Custom(name) => name,
        }
    }

    /// Errors and interrupts abort the computation when nothing catches them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConditionKind::Error | ConditionKind::Interrupt)
    }

    fn default_classes(&self) -> Vec<String> {
        vec![self.label().to_string(), CONDITION_CLASS.to_string()]
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::Error => write!(f, "Error"),
            ConditionKind::Warning => write!(f, "Warning"),
            ConditionKind::Message => write!(f, "Message"),
            ConditionKind::Interrupt => write!(f, "Interrupt"),
            ConditionKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Call-site context captured when a condition is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub file: Cow<'static, str>,
    pub line: u32,
    pub column: u32,
    /// Optional description of the call that signalled, e.g. `parse_config()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<String>,
}

impl Origin {
    /// Capture the location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        Origin::from_location(Location::caller())
    }

    pub fn from_location(location: &'static Location<'static>) -> Self {
        Origin {
            file: Cow::Borrowed(location.file()),
            line: location.line(),
            column: location.column(),
            call: None,
        }
    }

    pub fn with_call(mut self, call: impl Into<String>) -> Self {
        self.call = Some(call.into());
        self
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(call) = &self.call {
            write!(f, "{call} at ")?;
        }
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug)]
struct ConditionData {
    kind: ConditionKind,
    classes: Vec<String>,
    text: String,
    origin: Option<Origin>,
    payload: BTreeMap<String, Value>,
    parent: Option<Condition>,
}

/// An immutable, cheaply clonable signalled event.
#[derive(Debug, Clone)]
pub struct Condition {
    data: Arc<ConditionData>,
    restarts: Arc<[Restart]>,
}

impl Condition {
    /// Start building a condition of the given kind.
    #[track_caller]
    pub fn build(kind: ConditionKind, text: impl Into<String>) -> ConditionBuilder {
        ConditionBuilder::new(kind, text.into(), Origin::caller())
    }

    /// Start building a custom condition from its class hierarchy, most
    /// specific label first. The first label names the kind.
    #[track_caller]
    pub fn custom<I, S>(hierarchy: I, text: impl Into<String>) -> ConditionBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: Vec<String> = hierarchy.into_iter().map(Into::into).collect();
        let name = classes
            .first()
            .cloned()
            .unwrap_or_else(|| CONDITION_CLASS.to_string());
        ConditionBuilder::new(ConditionKind::Custom(name), text.into(), Origin::caller())
            .classes(classes)
    }

    #[track_caller]
    pub fn error(text: impl Into<String>) -> Self {
        Condition::build(ConditionKind::Error, text).finish()
    }

    #[track_caller]
    pub fn warning(text: impl Into<String>) -> Self {
        Condition::build(ConditionKind::Warning, text).finish()
    }

    #[track_caller]
    pub fn message(text: impl Into<String>) -> Self {
        Condition::build(ConditionKind::Message, text).finish()
    }

    #[track_caller]
    pub fn interrupt() -> Self {
        Condition::build(ConditionKind::Interrupt, "interrupted").finish()
    }

    pub fn kind(&self) -> &ConditionKind {
        &self.data.kind
    }

    /// Class labels, most specific first. Always ends with `"condition"`.
    pub fn classes(&self) -> &[String] {
        &self.data.classes
    }

    pub fn inherits(&self, class: &str) -> bool {
        self.data.classes.iter().any(|c| c == class)
    }

    pub fn text(&self) -> &str {
        &self.data.text
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.data.origin.as_ref()
    }

    pub fn payload(&self) -> &BTreeMap<String, Value> {
        &self.data.payload
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.payload.get(name)
    }

    pub fn parent(&self) -> Option<&Condition> {
        self.data.parent.as_ref()
    }

    /// Restarts established by the code that signalled this condition.
    pub fn restarts(&self) -> &[Restart] {
        &self.restarts
    }

    pub(crate) fn find_restart(&self, name: &str) -> Option<&Restart> {
        self.restarts.iter().find(|r| r.name() == name)
    }

    /// The same condition, offering a different set of restarts.
    pub(crate) fn with_restarts(&self, restarts: Vec<Restart>) -> Condition {
        Condition {
            data: Arc::clone(&self.data),
            restarts: restarts.into(),
        }
    }

    /// Iterate this condition followed by each ancestor.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    /// The oldest condition in the causal chain.
    pub fn root_cause(&self) -> &Condition {
        self.chain().last().unwrap_or(self)
    }

    /// Render the condition and its causal chain for a diagnostic report.
    pub fn report(&self, with_chain: bool) -> String {
        let mut out = self.to_string();
        if let Some(origin) = self.origin() {
            out.push_str(&format!("\n  at {origin}"));
        }
        if with_chain && self.parent().is_some() {
            out.push_str("\nCaused by:");
            for (idx, cause) in self.chain().skip(1).enumerate() {
                out.push_str(&format!("\n  {idx}: {cause}"));
            }
        }
        out
    }

    /// Plain-data snapshot suitable for serialization.
    pub fn to_record(&self) -> ConditionRecord {
        ConditionRecord {
            kind: self.data.kind.clone(),
            classes: self.data.classes.clone(),
            text: self.data.text.clone(),
            origin: self.data.origin.clone(),
            payload: self.data.payload.clone(),
            parent: self.parent().map(|p| Box::new(p.to_record())),
        }
    }
}

/// Handles are equal when they refer to the same created condition,
/// whatever restarts each currently offers.
impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.data.kind, self.data.text)
    }
}

/// Iterator over a causal chain.
pub struct Chain<'a> {
    next: Option<&'a Condition>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Condition;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Serializable snapshot of a condition and its ancestors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionRecord {
    pub kind: ConditionKind,
    pub classes: Vec<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    pub payload: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ConditionRecord>>,
}

/// Builder for [`Condition`]. The only way to set payload fields or a parent.
#[derive(Debug)]
pub struct ConditionBuilder {
    kind: ConditionKind,
    classes: Vec<String>,
    text: String,
    origin: Option<Origin>,
    payload: BTreeMap<String, Value>,
    parent: Option<Condition>,
}

impl ConditionBuilder {
    fn new(kind: ConditionKind, text: String, origin: Origin) -> Self {
        ConditionBuilder {
            classes: kind.default_classes(),
            kind,
            text,
            origin: Some(origin),
            payload: BTreeMap::new(),
            parent: None,
        }
    }

    /// Replace the class hierarchy. `"condition"` is appended when missing.
    pub fn classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        if !classes.iter().any(|c| c == CONDITION_CLASS) {
            classes.push(CONDITION_CLASS.to_string());
        }
        self.classes = classes;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    pub fn parent(mut self, parent: Condition) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn without_origin(mut self) -> Self {
        self.origin = None;
        self
    }

    pub fn finish(self) -> Condition {
        Condition {
            data: Arc::new(ConditionData {
                kind: self.kind,
                classes: self.classes,
                text: self.text,
                origin: self.origin,
                payload: self.payload,
                parent: self.parent,
            }),
            restarts: Arc::from(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_hierarchies() {
        assert_eq!(Condition::error("e").classes(), ["error", "condition"]);
        assert_eq!(Condition::warning("w").classes(), ["warning", "condition"]);
        assert_eq!(Condition::message("m").classes(), ["message", "condition"]);
        assert_eq!(Condition::interrupt().classes(), ["interrupt", "condition"]);
        assert!(!Condition::interrupt().inherits("error"));
    }

    #[test]
    fn test_custom_hierarchy_appends_condition() {
        let cnd = Condition::custom(["bad_argument_error", "error"], "`x` must be numeric")
            .field("arg", "x")
            .field("must", "numeric")
            .field("not", "character")
            .finish();

        assert_eq!(
            cnd.kind(),
            &ConditionKind::Custom("bad_argument_error".into())
        );
        assert_eq!(cnd.classes(), ["bad_argument_error", "error", "condition"]);
        assert!(cnd.inherits("error"));
        assert_eq!(cnd.field("arg").and_then(Value::as_str), Some("x"));
        assert_eq!(cnd.payload().len(), 3);
    }

    #[test]
    fn test_origin_tracks_caller() {
        let line = line!() + 1;
        let cnd = Condition::error("boom");
        let origin = cnd.origin().expect("origin captured");
        assert!(origin.file.ends_with("condition.rs"));
        assert_eq!(origin.line, line);

        let bare = Condition::build(ConditionKind::Message, "hi")
            .without_origin()
            .finish();
        assert!(bare.origin().is_none());
    }

    #[test]
    fn test_parent_chain_terminates() {
        let root = Condition::error("disk full");
        let mid = Condition::build(ConditionKind::Error, "write failed")
            .parent(root.clone())
            .finish();
        let top = Condition::build(ConditionKind::Error, "save failed")
            .parent(mid)
            .finish();

        let texts: Vec<&str> = top.chain().map(Condition::text).collect();
        assert_eq!(texts, ["save failed", "write failed", "disk full"]);
        assert_eq!(top.root_cause().text(), "disk full");
    }

    #[test]
    fn test_report_includes_chain() {
        let top = Condition::build(ConditionKind::Error, "save failed")
            .parent(Condition::error("disk full"))
            .without_origin()
            .finish();

        let report = top.report(true);
        assert!(report.starts_with("Error: save failed"));
        assert!(report.contains("Caused by:\n  0: Error: disk full"));
        assert!(!top.report(false).contains("Caused by"));
    }

    #[test]
    fn test_record_serializes_payload() {
        let cnd = Condition::custom(["bad_argument_error", "error"], "bad")
            .field("arg", "x")
            .without_origin()
            .finish();
        let json = serde_json::to_value(cnd.to_record()).expect("serialize");
        assert_eq!(json["text"], "bad");
        assert_eq!(json["payload"]["arg"], "x");
        assert!(json.get("parent").is_none());
    }
}
