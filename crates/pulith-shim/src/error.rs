//! Error types for shim operations.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Couldn't find {file} in {dir}")]
    ConfigNotFound { file: String, dir: String },

    #[error("failed to read shim config {path}: {source}")]
    ReadConfig {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("shim config {0} has no 'path' entry")]
    MissingTarget(PathBuf),

    #[error("cannot locate the shim executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

impl Error {
    /// Exit status reported to the calling shell.
    pub fn exit_code(&self) -> i32 { 1 }
}

pub type Result<T> = std::result::Result<T, Error>;
