//! axenc error reporting — coloured, fail-fast diagnostics.
//!
//! Every diagnostic is fatal: it is printed to stderr and the process exits
//! with a non-zero status. No error is recovered and no partial output is
//! produced once a diagnostic fires.

use std::fmt;
use std::process;

/// The kind of a compiler diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Semantic,
    Codegen,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "Syntax Error"),
            ErrorKind::Semantic => write!(f, "Semantic Error"),
            ErrorKind::Codegen => write!(f, "Code Generation Error"),
            ErrorKind::Internal => write!(f, "Internal Compiler Error"),
        }
    }
}

/// Where in the source a diagnostic points. Empty fields are omitted from
/// the report.
#[derive(Debug, Clone, Default)]
pub struct SourceLocation {
    pub file: String,
    pub class: String,
    pub row: u32,
    pub col: u32,
    pub token: String,
}

/// A structured compiler diagnostic.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(loc) = &self.location {
            if loc.row > 0 && loc.col > 0 {
                write!(f, "\n  at line {}, column {}", loc.row, loc.col)?;
                if !loc.token.is_empty() {
                    write!(f, " (token: '{}')", loc.token)?;
                }
            }
            if !loc.class.is_empty() {
                write!(f, "\n  in class '{}'", loc.class)?;
            }
            if !loc.file.is_empty() {
                write!(f, "\n  in file '{}'", loc.file)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Print a diagnostic to stderr with red colouring (ANSI).
pub fn report(err: &CompileError) {
    eprintln!(
        "\x1b[1;31merror\x1b[0m\x1b[1m[{}]:\x1b[0m {}",
        err.kind, err.message,
    );
    if let Some(loc) = &err.location {
        if loc.row > 0 && loc.col > 0 {
            if loc.token.is_empty() {
                eprintln!("  at line {}, column {}", loc.row, loc.col);
            } else {
                eprintln!(
                    "  at line {}, column {} (token: '{}')",
                    loc.row, loc.col, loc.token,
                );
            }
        }
        if !loc.class.is_empty() {
            eprintln!("  in class '{}'", loc.class);
        }
        if !loc.file.is_empty() {
            eprintln!("  in file '{}'", loc.file);
        }
    }
}

/// Shorthand — build a diagnostic without a location, print it, and exit.
pub fn fatal(kind: ErrorKind, message: impl Into<String>) -> ! {
    let err = CompileError {
        kind,
        message: message.into(),
        location: None,
    };
    report(&err);
    process::exit(1);
}

/// Shorthand — build a located diagnostic, print it, and exit.
pub fn fatal_at(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> ! {
    let err = CompileError {
        kind,
        message: message.into(),
        location: Some(location),
    };
    report(&err);
    process::exit(1);
}

/// Print a status message with a coloured `[axenc]` prefix.
pub fn info(message: impl fmt::Display) {
    eprintln!("\x1b[1;34m[axenc]\x1b[0m {message}");
}
