//! Errors raised while loading `pagesmith.toml`.
//!
//! Validation never stops at the first problem: every section records into
//! one [`ConfigDiagnostics`], warnings are printed, and errors are returned
//! together as [`ConfigError::Invalid`].

use std::fmt;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use thiserror::Error;

use super::FieldPath;
use crate::log;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no `{0}` found in this directory or any parent")]
    NotFound(PathBuf),

    #[error("failed to read `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("malformed config file")]
    Parse(#[from] toml::de::Error),

    // Not #[source]: the report already lists every problem
    #[error("{0}")]
    Invalid(ConfigDiagnostics),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One problem, attached to the field it comes from.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub field: FieldPath,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {}: {}", self.field.as_str().cyan(), self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n    {} {hint}", "hint:".yellow())?;
        }
        Ok(())
    }
}

/// Problems found across all sections, in the order they were recorded.
#[derive(Debug, Default)]
pub struct ConfigDiagnostics {
    items: Vec<Diagnostic>,
}

impl ConfigDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, severity: Severity, field: FieldPath, message: String, hint: Option<String>) {
        self.items.push(Diagnostic {
            severity,
            field,
            message,
            hint,
        });
    }

    pub fn error(&mut self, field: FieldPath, message: impl Into<String>) {
        self.push(Severity::Error, field, message.into(), None);
    }

    pub fn error_with_hint(
        &mut self,
        field: FieldPath,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.push(Severity::Error, field, message.into(), Some(hint.into()));
    }

    /// Reported, but loading goes on.
    pub fn warn(&mut self, field: FieldPath, message: impl Into<String>) {
        self.push(Severity::Warning, field, message.into(), None);
    }

    fn of(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.severity == severity)
    }

    pub fn print_warnings(&self) {
        for warning in self.of(Severity::Warning) {
            log!("warning"; "{}: {}", warning.field.as_str(), warning.message);
        }
    }

    /// `Err(self)` when at least one error was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.of(Severity::Error).next().is_none() {
            Ok(())
        } else {
            Err(self)
        }
    }

    #[cfg(test)]
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.of(Severity::Error).collect()
    }

    #[cfg(test)]
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.of(Severity::Warning).collect()
    }
}

impl fmt::Display for ConfigDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.of(Severity::Error).count();
        write!(
            f,
            "{}",
            format!("invalid configuration ({})", crate::utils::fmt::plural_count(count, "error"))
                .red()
                .bold()
        )?;
        for error in self.of(Severity::Error) {
            write!(f, "\n{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigDiagnostics {}
