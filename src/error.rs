//! Error types for the folio library.

use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Errors that occur while parsing documents and data files.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid front matter: {0}")]
    FrontMatter(String),

    #[error("Invalid BibTeX: {0}")]
    BibTeX(String),

    #[error("Invalid CSL-JSON: {0}")]
    CslJson(String),

    #[error("Invalid index: {0}")]
    Index(String),
}

/// Errors that occur while resolving citations against a bibliography.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Unknown citation key: {0}")]
    UnknownCitation(String),
}

/// Errors from fetching post content.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error {status} fetching {path}")]
    Status { path: String, status: u16 },

    #[error("Failed to fetch {path}: {message}")]
    Transport { path: String, message: String },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(std::path::PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}
