use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid schema {path}: {message}")]
    Schema { path: PathBuf, message: String },
    #[error("invalid wildcard `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source:  globset::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
