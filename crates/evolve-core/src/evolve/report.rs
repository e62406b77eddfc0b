//! Reporting boundary for rendered suggestions.

use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::models::{sort_by_priority, Suggestion};

/// Receives the suggestions of one analysis pass.
pub trait Reporter: Send + Sync {
    fn report(&self, function_name: &str, suggestions: &[Suggestion]);

    /// An analysis pass failed unexpectedly; the call still went through.
    fn report_failure(&self, function_name: &str, message: &str) {
        warn!(function = %function_name, %message, "analysis failed");
    }
}

/// Render suggestions as the numbered, human-readable block.
pub fn render(function_name: &str, suggestions: &[Suggestion]) -> String {
    let mut ordered = suggestions.to_vec();
    sort_by_priority(&mut ordered);
    let mut out = format!("\nEvolution suggestions for {function_name}:\n");
    for (index, s) in ordered.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} (Priority: {}, Impact: {})\n",
            index + 1,
            s.title,
            s.priority,
            s.impact
        ));
        if !s.description.is_empty() {
            out.push_str(&format!("   {}\n", s.description));
        }
        if !s.code_sample.is_empty() {
            out.push_str(&format!("   Example: {}\n", s.code_sample.replace('\n', "\n            ")));
        }
    }
    out
}

/// Writes rendered suggestions to any writer (stdout by default).
pub struct ConsoleReporter<W: Write + Send = io::Stdout> {
    writer: Mutex<W>,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn report(&self, function_name: &str, suggestions: &[Suggestion]) {
        if suggestions.is_empty() {
            return;
        }
        let text = render(function_name, suggestions);
        let mut writer = self.writer.lock();
        if let Err(err) = writer.write_all(text.as_bytes()).and_then(|_| writer.flush()) {
            warn!(error = %err, "failed to write suggestions");
        }
    }
}

/// Emits one tracing event per suggestion.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, function_name: &str, suggestions: &[Suggestion]) {
        let mut ordered = suggestions.to_vec();
        sort_by_priority(&mut ordered);
        for s in &ordered {
            info!(
                function = %function_name,
                title = %s.title,
                priority = s.priority,
                impact = %s.impact,
                "evolution suggestion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Impact;

    fn sample() -> Vec<Suggestion> {
        vec![
            Suggestion::new("Second", "later").with_priority(2),
            Suggestion::new("First", "sooner")
                .with_priority(1)
                .with_impact(Impact::High)
                .with_code_sample("logging.info(x)"),
        ]
    }

    #[test]
    fn test_render_orders_by_priority() {
        let text = render("add", &sample());
        assert!(text.contains("Evolution suggestions for add:"));
        let first = text.find("1. First (Priority: 1, Impact: high)").unwrap();
        let second = text.find("2. Second (Priority: 2, Impact: medium)").unwrap();
        assert!(first < second);
        assert!(text.contains("   Example: logging.info(x)"));
    }

    #[test]
    fn test_console_reporter_writes() {
        let reporter = ConsoleReporter::new(Vec::new());
        reporter.report("add", &sample());
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.contains("1. First"));
    }

    #[test]
    fn test_console_reporter_skips_empty() {
        let reporter = ConsoleReporter::new(Vec::new());
        reporter.report("add", &[]);
        assert!(reporter.into_inner().is_empty());
    }
}
