//! Side channel for default condition behavior.
//!
//! Messages nobody muffles, warnings (immediate or batched) and unhandled
//! errors are handed to the thread's [`Emitter`]. The default writes to
//! stderr; [`MemoryEmitter`] records output instead.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::condition::Condition;

/// Warnings reported together when a deferred buffer is flushed.
#[derive(Debug, Clone, Default)]
pub struct WarningBatch {
    pub warnings: Vec<Condition>,
    /// Warnings past the buffer cap that were counted but not kept.
    pub dropped: usize,
}

impl WarningBatch {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.dropped == 0
    }

    pub fn len(&self) -> usize {
        self.warnings.len() + self.dropped
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.warnings.as_slice() {
            [] => {}
            [only] => {
                out.push_str("Warning message:\n");
                out.push_str(only.text());
            }
            many => {
                out.push_str("Warning messages:");
                for (idx, warning) in many.iter().enumerate() {
                    out.push_str(&format!("\n{}: {}", idx + 1, warning.text()));
                }
            }
        }
        if self.dropped > 0 {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("There were {} more warnings", self.dropped));
        }
        out
    }
}

pub trait Emitter {
    fn message(&self, condition: &Condition);
    fn warning(&self, condition: &Condition);
    fn warning_batch(&self, batch: &WarningBatch);
    /// `report` is the already-rendered message plus causal chain.
    fn error(&self, condition: &Condition, report: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StderrEmitter;

impl Emitter for StderrEmitter {
    fn message(&self, condition: &Condition) {
        writeln!(std::io::stderr().lock(), "{}", condition.text()).ok();
    }

    fn warning(&self, condition: &Condition) {
        writeln!(std::io::stderr().lock(), "Warning: {}", condition.text()).ok();
    }

    fn warning_batch(&self, batch: &WarningBatch) {
        writeln!(std::io::stderr().lock(), "{}", batch.render()).ok();
    }

    fn error(&self, _condition: &Condition, report: &str) {
        writeln!(std::io::stderr().lock(), "{report}").ok();
    }
}

/// One line of recorded output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    Message(String),
    Warning(String),
    WarningBatch(Vec<String>),
    Error(String),
}

/// Emitter that records everything it receives. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmitter {
    log: Arc<Mutex<Vec<Emitted>>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Emitted> {
        self.log.lock().clone()
    }

    pub fn take(&self) -> Vec<Emitted> {
        std::mem::take(&mut *self.log.lock())
    }
}

impl Emitter for MemoryEmitter {
    fn message(&self, condition: &Condition) {
        self.log
            .lock()
            .push(Emitted::Message(condition.text().to_string()));
    }

    fn warning(&self, condition: &Condition) {
        self.log
            .lock()
            .push(Emitted::Warning(condition.text().to_string()));
    }

    fn warning_batch(&self, batch: &WarningBatch) {
        let texts = batch.warnings.iter().map(|w| w.text().to_string()).collect();
        self.log.lock().push(Emitted::WarningBatch(texts));
    }

    fn error(&self, _condition: &Condition, report: &str) {
        self.log.lock().push(Emitted::Error(report.to_string()));
    }
}
