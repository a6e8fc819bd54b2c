//! Typed failures that callers need to tell apart.

use std::path::PathBuf;
use thiserror::Error;

/// Database addressing and loading errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// No entry at the requested address.
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-mapping value sits before the end of the address.
    #[error("can't go further in db ({0})")]
    CannotDescend(String),

    /// A value that must be a mapping is something else.
    #[error("{path}: expected a mapping")]
    NotAMapping { path: PathBuf },

    #[error("unsupported data format '{ext}' ({path})")]
    UnsupportedFormat { ext: String, path: PathBuf },
}

/// Filename tree construction errors.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Structural breach of the tree; always a bug, never bad input.
    #[error("internal error, please report: {0}")]
    Invariant(String),
}

/// Alternate-delimiter scanning errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DelimError {
    #[error("line {line}: unclosed '{delim}'")]
    Unclosed { line: usize, delim: String },
}

/// Render an address the way error messages show it.
pub(crate) fn address(xs: &[String]) -> String {
    xs.join(" -> ")
}
