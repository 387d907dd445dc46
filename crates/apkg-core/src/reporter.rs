//! Reporter trait for dependency injection
//!
//! This trait allows the build and read pipelines to report progress and
//! findings without being coupled to a specific terminal implementation.

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Validating control files").
    fn section(&self, title: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);

    /// Log a secondary detail line (e.g. a listed archive entry).
    fn detail(&self, msg: &str);
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Clone, Copy, Debug)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn detail(&self, _: &str) {}
}

/// Reporter that records every call, for asserting on pipeline output in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    pub(crate) lines: std::sync::Mutex<Vec<(&'static str, String)>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub(crate) fn warnings(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, _)| *kind == "warning")
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    fn push(&self, kind: &'static str, msg: &str) {
        self.lines.lock().unwrap().push((kind, msg.to_string()));
    }
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn section(&self, title: &str) {
        self.push("section", title);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn success(&self, msg: &str) {
        self.push("success", msg);
    }
    fn warning(&self, msg: &str) {
        self.push("warning", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn detail(&self, msg: &str) {
        self.push("detail", msg);
    }
}
