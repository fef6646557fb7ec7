//! Typed diagnostic accumulation shared by every compilation stage (component K).
//!
//! Every lexer, parser, resolver and generator in the pipeline pushes into a
//! single [`DiagnosticBag`] rather than returning early on the first problem,
//! so a run collects as much actionable feedback as the error cap allows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a single diagnostic, per spec.md's four-level taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// Coarse classification of what went wrong, independent of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCategory {
    Lexical,
    Syntax,
    Semantic,
    State,
    Import,
    Template,
    Constraint,
    Internal,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticCategory::Lexical => "lexical",
            DiagnosticCategory::Syntax => "syntax",
            DiagnosticCategory::Semantic => "semantic",
            DiagnosticCategory::State => "state",
            DiagnosticCategory::Import => "import",
            DiagnosticCategory::Template => "template",
            DiagnosticCategory::Constraint => "constraint",
            DiagnosticCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// A source position, tracked as (line, column, byte offset) per spec.md §4.C1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Position {
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Self { line, column, offset }
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: DiagnosticCategory,
    pub message: String,
    pub position: Position,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        category: DiagnosticCategory,
        message: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            position,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn error(category: DiagnosticCategory, message: impl Into<String>, position: Position) -> Self {
        Self::new(Severity::Error, category, message, position)
    }

    pub fn warning(category: DiagnosticCategory, message: impl Into<String>, position: Position) -> Self {
        Self::new(Severity::Warning, category, message, position)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} [{}] {}:{}: {}",
            self.severity, self.category, self.position.line, self.position.column, self.message
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (suggestion: {suggestion})")?;
        }
        Ok(())
    }
}

/// What a [`DiagnosticBag::push`] tells the caller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Accumulates diagnostics for one compilation unit, bounded by a max-errors cap.
///
/// Stages push into the bag and keep going on `Flow::Continue` (per spec.md
/// §7: "ERROR stops output of the affected subtree but the pipeline
/// continues"); a `Fatal` diagnostic or hitting the cap returns `Flow::Stop`.
#[derive(Debug, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
    max_errors: usize,
    halted: bool,
}

impl DiagnosticBag {
    pub fn new(max_errors: usize) -> Self {
        Self {
            diagnostics: Vec::new(),
            max_errors,
            halted: false,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) -> Flow {
        let is_fatal = diagnostic.severity == Severity::Fatal;
        self.diagnostics.push(diagnostic);
        let error_count = self
            .diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count();
        if is_fatal || error_count >= self.max_errors {
            self.halted = true;
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity >= Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn extend(&mut self, other: DiagnosticBag) {
        for d in other.diagnostics {
            let _ = self.push(d);
        }
    }
}

impl Default for DiagnosticBag {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_max_errors() {
        let mut bag = DiagnosticBag::new(2);
        assert_eq!(
            bag.push(Diagnostic::error(DiagnosticCategory::Syntax, "a", Position::default())),
            Flow::Continue
        );
        assert_eq!(
            bag.push(Diagnostic::error(DiagnosticCategory::Syntax, "b", Position::default())),
            Flow::Stop
        );
        assert!(bag.halted());
    }

    #[test]
    fn fatal_halts_immediately() {
        let mut bag = DiagnosticBag::new(100);
        assert_eq!(
            bag.push(Diagnostic::new(
                Severity::Fatal,
                DiagnosticCategory::Internal,
                "boom",
                Position::default()
            )),
            Flow::Stop
        );
    }

    #[test]
    fn warnings_never_halt() {
        let mut bag = DiagnosticBag::new(1);
        for _ in 0..10 {
            bag.push(Diagnostic::warning(DiagnosticCategory::Import, "skip", Position::default()));
        }
        assert!(!bag.halted());
        assert!(!bag.has_errors());
    }
}
