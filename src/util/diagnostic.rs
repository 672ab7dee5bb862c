//! Diagnostics accumulator
//!
//! `Errors` is the sink every fallible pass appends into: the binary reader,
//! the text parser, and the name resolver all report through it. The caller
//! owns the sink's storage and lifetime; passes only ever append. Rendering
//! is plain `file:line:col: severity: message` text.

use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Source location, 1-based line and column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(
        line: usize,
        column: usize,
    ) -> Self {
        Self { line, column }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::new(1, 1)
    }
}

impl fmt::Display for Location {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single rendered diagnostic
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
}

impl fmt::Display for Diagnostic {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{}: {}: {}", loc, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Append-only diagnostics sink
///
/// Passes may push entries; they never remove or reorder existing ones.
#[derive(Debug, Default)]
pub struct Errors {
    entries: Vec<Diagnostic>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error without a source location
    pub fn error(
        &mut self,
        message: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        });
    }

    /// Append an error at a source location
    pub fn error_at(
        &mut self,
        location: Location,
        message: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location: Some(location),
        });
    }

    /// Append a warning at a source location
    pub fn warning_at(
        &mut self,
        location: Location,
        message: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            location: Some(location),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any entry is an error (not just warnings)
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn get(
        &self,
        index: usize,
    ) -> Option<&Diagnostic> {
        self.entries.get(index)
    }

    /// Render all entries, one per line
    pub fn format(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }
}
