// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by every stage: the directive
// registry, the classifier, and the glue generator. Delivery to consumers is
// handled by `engine.rs`.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::source::SourceLocation;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `W0100`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // ── Syntax ──
    /// Lex or parse failure.
    pub const E0001: DiagCode = DiagCode("E0001");

    // ── Declarations ──
    /// More than one capability tag on a type.
    pub const E0100: DiagCode = DiagCode("E0100");
    /// Hook or tweak type declared with a forbidden modifier.
    pub const E0101: DiagCode = DiagCode("E0101");
    /// Hook method declared `static`.
    pub const E0102: DiagCode = DiagCode("E0102");
    /// Hook method declared `final` without `new`.
    pub const E0103: DiagCode = DiagCode("E0103");
    /// Function hook without a `function` method.
    pub const E0104: DiagCode = DiagCode("E0104");
    /// Function hook `function` declared with a forbidden modifier.
    pub const E0105: DiagCode = DiagCode("E0105");
    /// Teardown method declared as a type-level method.
    pub const E0106: DiagCode = DiagCode("E0106");

    // ── Generation ──
    /// More than one tweak in the project.
    pub const E0200: DiagCode = DiagCode("E0200");

    // ── Directives ──
    /// Directive comment that nothing consumed.
    pub const W0100: DiagCode = DiagCode("W0100");
    /// Unknown directive name.
    pub const W0101: DiagCode = DiagCode("W0101");
    /// Directive argument count or value rejected.
    pub const W0102: DiagCode = DiagCode("W0102");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Error,
    Warning,
}

impl fmt::Display for DiagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagLevel::Error => write!(f, "error"),
            DiagLevel::Warning => write!(f, "warning"),
        }
    }
}

// ── Notes and fix-its ────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub location: SourceLocation,
    pub message: String,
}

/// One textual replacement of the byte range `start..end`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edit {
    pub start: SourceLocation,
    pub end: SourceLocation,
    pub replacement: String,
}

/// A suggested source change that resolves the diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixIt {
    pub message: String,
    pub edits: Vec<Edit>,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub location: SourceLocation,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fix_its: Vec<FixIt>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, notes, or fix-its.
    pub fn new(level: DiagLevel, location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            location,
            message: message.into(),
            hint: None,
            notes: Vec::new(),
            fix_its: Vec::new(),
        }
    }

    pub fn error(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, location, message)
    }

    pub fn warning(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, location, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a note at a related location.
    pub fn with_note(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.notes.push(Note {
            location,
            message: message.into(),
        });
        self
    }

    /// Attach a fix-it made of a single edit.
    pub fn with_fix_it(
        mut self,
        message: impl Into<String>,
        start: SourceLocation,
        end: SourceLocation,
        replacement: impl Into<String>,
    ) -> Self {
        self.fix_its.push(FixIt {
            message: message.into(),
            edits: vec![Edit {
                start,
                end,
                replacement: replacement.into(),
            }],
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", self.level, code, self.message)?;
        } else {
            write!(f, "{}: {}", self.level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// True if any diagnostic in `diags` is an error.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn dummy_location() -> SourceLocation {
        SourceLocation {
            file: Arc::from("a.x"),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_location(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::warning(dummy_location(), "Unused directive").with_code(codes::W0100);
        assert_eq!(format!("{d}"), "warning[W0100]: Unused directive");
    }

    #[test]
    fn display_with_hint() {
        let d = Diagnostic::error(dummy_location(), "bad")
            .with_code(codes::E0001)
            .with_hint("try again");
        assert_eq!(format!("{d}"), "error[E0001]: bad\n  hint: try again");
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::error(dummy_location(), "A tweak cannot be private or fileprivate")
            .with_code(codes::E0101)
            .with_note(dummy_location(), "declared here")
            .with_fix_it("Remove 'private'", dummy_location(), dummy_location(), "");
        assert_eq!(d.code, Some(codes::E0101));
        assert_eq!(d.notes.len(), 1);
        assert_eq!(d.fix_its.len(), 1);
        assert_eq!(d.fix_its[0].edits[0].replacement, "");
        assert!(d.is_error());
        assert!(has_errors(&[d]));
    }

    #[test]
    fn serializes_level_lowercase() {
        let d = Diagnostic::warning(dummy_location(), "w");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["location"]["file"], "a.x");
        assert!(json.get("hint").is_none());
    }
}
