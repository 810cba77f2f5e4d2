//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `flamerge` library. It uses the `thiserror` library to create a
//! comprehensive `Error` enum that covers all anticipated failure modes,
//! providing clear and descriptive error messages.
//!
//! Every variant carries enough context (the offending path, href, or symbol
//! name) to be logged meaningfully at the operation boundary. Failures are
//! surfaced once and never retried: this is an offline batch tool, so the
//! caller decides whether to abort or continue with the next container.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for flamerge operations
#[derive(Error, Debug)]
pub enum Error {
    /// The archive did not contain the expected top-level container document.
    ///
    /// Fatal to the load of a single container; the caller decides whether to
    /// abort or skip that input.
    #[error("invalid container {path}: {message}")]
    InvalidContainer { path: PathBuf, message: String },

    /// A symbol reference in the container document names a backing XML file
    /// that is not present in the extracted tree.
    ///
    /// Only raised under [`LoadPolicy::Strict`](crate::library::LoadPolicy);
    /// the lenient policy skips the symbol and records the omission instead.
    #[error("missing backing file for symbol '{href}' (expected at {path})")]
    MissingBackingFile { href: String, path: PathBuf },

    /// An instance inside a symbol's backing document refers to a library
    /// item that is not present in the owning library's symbol map.
    #[error("symbol '{referenced_from}' references unknown library item '{name}'")]
    UnresolvedSymbolReference {
        name: String,
        referenced_from: String,
    },

    /// Two symbols with the same name collided during a merge configured to
    /// reject conflicts rather than override.
    #[error("duplicate symbol key '{name}' in merge")]
    DuplicateSymbolKey { name: String },

    /// An error occurred while extracting or compressing an archive.
    #[error("archive error for {path}: {message}")]
    Archive { path: PathBuf, message: String },

    /// An error occurred during template substitution.
    ///
    /// May include the name of the problematic placeholder when applicable.
    #[error("template error: {message}{}", variable.as_ref().map(|v| format!(" (placeholder: {})", v)).unwrap_or_default())]
    Template {
        message: String,
        /// The template placeholder that caused the error, if applicable
        variable: Option<String>,
    },

    /// An error occurred with a path-related operation.
    #[error("path operation error: {message}")]
    Path { message: String },

    /// A backing document element or attribute could not be interpreted.
    #[error("malformed backing document: {message}")]
    MalformedDocument { message: String },

    /// An XML parsing error, wrapped from `quick_xml::Error`.
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An XML attribute error, wrapped from `quick_xml`'s attribute parser.
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
