// engine.rs — Diagnostic engine
//
// The engine is the shared sink every stage reports into. Delivery to the
// registered consumers is serialized by one mutex, so each consumer sees
// diagnostics in the order `diagnose` calls acquired it.
//
// Preconditions: consumers are added before the first diagnostic.
// Postconditions: after `finalize`, every registered directive is marked used
//   and every consumer has been finalized exactly once. `finalize_without_unused`
//   finalizes consumers but leaves directives untouched.
// Failure modes: none; consumers swallow their own I/O errors.
// Side effects: consumers may write to stderr, stdout, or files.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::directive::DirectiveRegistry;
use crate::source::SourceUnit;

/// A destination for diagnostics. Every method except `handle` is optional.
pub trait DiagnosticConsumer: Send {
    /// Called once per source unit, before diagnostics that refer to it.
    fn register(&mut self, _unit: &Arc<SourceUnit>) {}

    fn handle(&mut self, diagnostic: &Diagnostic);

    /// Flush anything buffered. Called once, after the last diagnostic.
    fn finalize(&mut self) {}
}

#[derive(Default)]
struct EngineState {
    consumers: Vec<Box<dyn DiagnosticConsumer>>,
    errors: usize,
    warnings: usize,
    finalized: bool,
}

impl EngineState {
    fn deliver(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.level {
            DiagLevel::Error => self.errors += 1,
            DiagLevel::Warning => self.warnings += 1,
        }
        for consumer in &mut self.consumers {
            consumer.handle(diagnostic);
        }
    }
}

pub struct DiagnosticEngine {
    state: Mutex<EngineState>,
    directives: Arc<DirectiveRegistry>,
}

impl DiagnosticEngine {
    pub fn new(directives: Arc<DirectiveRegistry>) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            directives,
        }
    }

    pub fn directives(&self) -> &Arc<DirectiveRegistry> {
        &self.directives
    }

    pub fn add_consumer(&self, consumer: Box<dyn DiagnosticConsumer>) {
        self.state.lock().consumers.push(consumer);
    }

    /// Announce a source unit to every consumer.
    pub fn register(&self, unit: &Arc<SourceUnit>) {
        let mut state = self.state.lock();
        for consumer in &mut state.consumers {
            consumer.register(unit);
        }
    }

    pub fn diagnose(&self, diagnostic: Diagnostic) {
        self.state.lock().deliver(&diagnostic);
    }

    /// Deliver a batch under one lock acquisition, keeping it contiguous.
    pub fn diagnose_all(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        let mut state = self.state.lock();
        for diagnostic in diagnostics {
            state.deliver(&diagnostic);
        }
    }

    pub fn error_count(&self) -> usize {
        self.state.lock().errors
    }

    pub fn warning_count(&self) -> usize {
        self.state.lock().warnings
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Emit one warning per directive nothing consumed, then finalize every
    /// consumer. Later calls do nothing.
    pub fn finalize(&self) {
        self.finish(true);
    }

    /// Finalize every consumer without reporting unused directives.
    ///
    /// For runs that stopped before generation, where directives consumed
    /// only by the generator would otherwise be reported as unused.
    pub fn finalize_without_unused(&self) {
        self.finish(false);
    }

    fn finish(&self, report_unused: bool) {
        let mut state = self.state.lock();
        if state.finalized {
            return;
        }
        state.finalized = true;

        if report_unused {
            for base in self.directives.unused() {
                base.mark_used();
                let diagnostic = Diagnostic::warning(base.location.clone(), "Unused directive")
                    .with_code(codes::W0100);
                state.deliver(&diagnostic);
            }
        }
        for consumer in &mut state.consumers {
            consumer.finalize();
        }
        tracing::debug!(
            errors = state.errors,
            warnings = state.warnings,
            "diagnostics finalized"
        );
    }
}

impl std::fmt::Debug for DiagnosticEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DiagnosticEngine")
            .field("consumers", &state.consumers.len())
            .field("errors", &state.errors)
            .field("warnings", &state.warnings)
            .field("finalized", &state.finalized)
            .finish()
    }
}
