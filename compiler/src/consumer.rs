// consumer.rs — Built-in diagnostic consumers
//
// Printing (human-readable with a source excerpt), JSON (buffered, written as
// one array on finalize), IDE (one `file:line:col: severity: message` line per
// diagnostic), and an in-memory collector for embedders and tests.
//
// Preconditions: none.
// Postconditions: printing and IDE consumers write as diagnostics arrive;
//   the JSON consumer writes only on finalize.
// Failure modes: write errors are ignored.
// Side effects: writes to the configured sink.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::diag::Diagnostic;
use crate::engine::DiagnosticConsumer;
use crate::source::{SourceLocation, SourceUnit};

type Sink = Box<dyn Write + Send>;

fn position(location: &SourceLocation) -> String {
    format!("{}:{}:{}", location.file, location.line, location.column)
}

// ── Printing ─────────────────────────────────────────────────────────────

pub struct PrintingConsumer {
    out: Sink,
    units: HashMap<Arc<str>, Arc<SourceUnit>>,
}

impl PrintingConsumer {
    pub fn new(out: Sink) -> Self {
        Self {
            out,
            units: HashMap::new(),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    fn excerpt(&self, location: &SourceLocation) -> Option<String> {
        let unit = self.units.get(&location.file)?;
        let line = unit.line_text(location.line)?;
        let gutter = location.line.to_string();
        let pad = " ".repeat(gutter.len());
        let caret = " ".repeat(location.column.saturating_sub(1) as usize);
        Some(format!("{pad} |\n{gutter} | {line}\n{pad} | {caret}^\n"))
    }

    fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "{}: {}", position(&diagnostic.location), diagnostic);
        if let Some(excerpt) = self.excerpt(&diagnostic.location) {
            text.push_str(&excerpt);
        }
        for fix_it in &diagnostic.fix_its {
            let _ = writeln!(text, "  = fix-it: {}", fix_it.message);
        }
        for note in &diagnostic.notes {
            let _ = writeln!(text, "{}: note: {}", position(&note.location), note.message);
        }
        text
    }
}

impl DiagnosticConsumer for PrintingConsumer {
    fn register(&mut self, unit: &Arc<SourceUnit>) {
        self.units.insert(Arc::clone(&unit.name), Arc::clone(unit));
    }

    fn handle(&mut self, diagnostic: &Diagnostic) {
        let text = self.render(diagnostic);
        let _ = self.out.write_all(text.as_bytes());
    }

    fn finalize(&mut self) {
        let _ = self.out.flush();
    }
}

// ── JSON ─────────────────────────────────────────────────────────────────

pub struct JsonConsumer {
    out: Sink,
    buffer: Vec<Diagnostic>,
}

impl JsonConsumer {
    pub fn new(out: Sink) -> Self {
        Self {
            out,
            buffer: Vec::new(),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }
}

impl DiagnosticConsumer for JsonConsumer {
    fn handle(&mut self, diagnostic: &Diagnostic) {
        self.buffer.push(diagnostic.clone());
    }

    fn finalize(&mut self) {
        if serde_json::to_writer_pretty(&mut self.out, &self.buffer).is_ok() {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
        self.buffer.clear();
    }
}

// ── IDE ──────────────────────────────────────────────────────────────────

pub struct IdeConsumer {
    out: Sink,
}

impl IdeConsumer {
    pub fn new(out: Sink) -> Self {
        Self { out }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }
}

impl DiagnosticConsumer for IdeConsumer {
    fn handle(&mut self, diagnostic: &Diagnostic) {
        let mut text = format!(
            "{}: {}: {}",
            position(&diagnostic.location),
            diagnostic.level,
            diagnostic.message
        );
        if let Some(code) = diagnostic.code {
            let _ = write!(text, " [{code}]");
        }
        text.push('\n');
        for note in &diagnostic.notes {
            let _ = writeln!(text, "{}: note: {}", position(&note.location), note.message);
        }
        let _ = self.out.write_all(text.as_bytes());
    }

    fn finalize(&mut self) {
        let _ = self.out.flush();
    }
}

// ── Collector ────────────────────────────────────────────────────────────

/// Read handle for diagnostics gathered by a `CollectingConsumer`.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog(Arc<Mutex<Vec<Diagnostic>>>);

impl DiagnosticLog {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.0.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.lock().iter().map(|d| d.message.clone()).collect()
    }
}

pub struct CollectingConsumer {
    log: DiagnosticLog,
}

impl CollectingConsumer {
    pub fn new() -> (Self, DiagnosticLog) {
        let log = DiagnosticLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl DiagnosticConsumer for CollectingConsumer {
    fn handle(&mut self, diagnostic: &Diagnostic) {
        self.log.0.lock().push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::codes;
    use crate::id::FileId;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    fn sample_unit() -> Arc<SourceUnit> {
        Arc::new(SourceUnit::parse(
            FileId(0),
            "hooks.x",
            "import Foo\nprivate class H: ClassHook<V> {}\n".to_string(),
        ))
    }

    fn sample_diagnostic(unit: &SourceUnit) -> Diagnostic {
        let start = unit.text.find("private").unwrap();
        Diagnostic::error(
            unit.location(start),
            "A class hook cannot be private, fileprivate, or final",
        )
        .with_code(codes::E0101)
        .with_fix_it(
            "Remove 'private'",
            unit.location(start),
            unit.location(start + 8),
            "",
        )
    }

    #[test]
    fn printing_includes_excerpt_and_fix_it() {
        let buffer = SharedBuffer::default();
        let mut consumer = PrintingConsumer::new(Box::new(buffer.clone()));
        let unit = sample_unit();
        consumer.register(&unit);
        consumer.handle(&sample_diagnostic(&unit));
        consumer.finalize();

        let text = buffer.text();
        assert!(text.starts_with(
            "hooks.x:2:1: error[E0101]: A class hook cannot be private, fileprivate, or final\n"
        ));
        assert!(text.contains("2 | private class H: ClassHook<V> {}\n"));
        assert!(text.contains("  | ^\n"));
        assert!(text.contains("  = fix-it: Remove 'private'\n"));
    }

    #[test]
    fn printing_without_registration_skips_excerpt() {
        let buffer = SharedBuffer::default();
        let mut consumer = PrintingConsumer::new(Box::new(buffer.clone()));
        let unit = sample_unit();
        consumer.handle(&sample_diagnostic(&unit));
        assert!(!buffer.text().contains(" | "));
    }

    #[test]
    fn json_is_written_on_finalize() {
        let buffer = SharedBuffer::default();
        let mut consumer = JsonConsumer::new(Box::new(buffer.clone()));
        let unit = sample_unit();
        consumer.handle(&sample_diagnostic(&unit));
        assert!(buffer.text().is_empty());

        consumer.finalize();
        let value: serde_json::Value = serde_json::from_str(&buffer.text()).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array[0]["code"], "E0101");
        assert_eq!(array[0]["level"], "error");
        assert_eq!(array[0]["location"]["line"], 2);
        assert_eq!(array[0]["fix_its"][0]["message"], "Remove 'private'");
    }

    #[test]
    fn ide_line_format() {
        let buffer = SharedBuffer::default();
        let mut consumer = IdeConsumer::new(Box::new(buffer.clone()));
        let unit = sample_unit();
        let diagnostic =
            sample_diagnostic(&unit).with_note(unit.location(0), "imported here");
        consumer.handle(&diagnostic);
        assert_eq!(
            buffer.text(),
            "hooks.x:2:1: error: A class hook cannot be private, fileprivate, or final [E0101]\n\
             hooks.x:1:1: note: imported here\n"
        );
    }

    #[test]
    fn collector_shares_log() {
        let (mut consumer, log) = CollectingConsumer::new();
        let unit = sample_unit();
        consumer.handle(&sample_diagnostic(&unit));
        assert_eq!(
            log.messages(),
            vec!["A class hook cannot be private, fileprivate, or final".to_string()]
        );
    }
}
