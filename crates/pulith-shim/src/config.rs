//! Sidecar configuration for a shim.
//!
//! The sidecar lives next to the shim executable and shares its base name:
//! `node.exe` reads `node.shim`. Each line is `key=value`; the first `=`
//! splits key from value and both sides are trimmed. Lines without `=` are
//! ignored.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File extension of the sidecar config.
pub const SIDECAR_EXTENSION: &str = "shim";

const KEY_PATH: &str = "path";
const KEY_ARGS: &str = "args";
const ENV_PREFIX: &str = "env::";

/// Parsed sidecar config. Keys compare case-insensitively; file order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShimConfig {
    origin:  PathBuf,
    entries: Vec<(String, String)>,
}

impl ShimConfig {
    /// Read and parse the sidecar at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => not_found(path),
            _ => Error::ReadConfig {
                path:   path.to_path_buf(),
                source: e,
            },
        })?;

        let mut config = Self::parse(&text);
        config.origin = path.to_path_buf();
        tracing::debug!(path = %path.display(), entries = config.entries.len(), "loaded shim config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            config.insert(key, value.trim());
        }
        config
    }

    fn insert(&mut self, key: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The configured target executable, with surrounding quotes removed.
    pub fn target(&self) -> Result<PathBuf> {
        self.get(KEY_PATH)
            .map(|p| p.trim_matches('"'))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| Error::MissingTarget(self.origin.clone()))
    }

    /// Extra arguments placed before the caller's, if any.
    pub fn extra_args(&self) -> Option<&str> { self.get(KEY_ARGS).filter(|a| !a.is_empty()) }

    /// `env::NAME=value` entries in file order, as `(NAME, value)`.
    pub fn env_overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(k, v)| {
            let prefix = k.get(..ENV_PREFIX.len())?;
            if !prefix.eq_ignore_ascii_case(ENV_PREFIX) {
                return None;
            }
            let name = &k[ENV_PREFIX.len()..];
            (!name.is_empty()).then_some((name, v.as_str()))
        })
    }

    pub fn has_env_overrides(&self) -> bool { self.env_overrides().next().is_some() }

    pub fn origin(&self) -> &Path { &self.origin }
}

/// Location of the sidecar for the shim executable at `exe`.
pub fn sidecar_path(exe: impl AsRef<Path>) -> PathBuf {
    let exe = exe.as_ref();
    let stem = exe.file_stem().unwrap_or_default();
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    exe.with_file_name(name)
}

fn not_found(path: &Path) -> Error {
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path
        .parent()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    Error::ConfigNotFound { file, dir }
}
