//! Manifest validation against a JSON schema.
//!
//! Each manifest produces a [`Report`]: either a pass, or a list of issues.
//! Issues carry the JSON pointer of the offending value and the schema
//! keyword that rejected it, and render as an indented listing (see
//! [`Report::render`]) in plain or CI style.

pub use error::{Error, Result};

mod error;

use globset::Glob;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that switches output to CI style when set to `true`.
pub const CI_ENV: &str = "CI";

pub fn ci_requested() -> bool {
    std::env::var(CI_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("true"))
}

pub struct Validator {
    schema: jsonschema::Validator,
}

impl Validator {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let schema = read_json(path)?;
        Self::from_value(&schema).map_err(|message| Error::Schema { path: path.to_path_buf(), message })
    }

    /// Compile `schema`. The error is the compiler's message.
    pub fn from_value(schema: &Value) -> std::result::Result<Self, String> {
        let schema = jsonschema::validator_for(schema).map_err(|e| e.to_string())?;
        Ok(Self { schema })
    }

    /// Validate the manifest at `path`. Unreadable or malformed files yield a
    /// failing report rather than an error, so one bad file does not stop a batch.
    pub fn validate_file(&self, path: impl AsRef<Path>) -> Report {
        let path = path.as_ref();
        let name = display_name(path);
        match read_json(path) {
            Ok(manifest) => self.validate_value(name, &manifest),
            Err(err) => Report { name, issues: vec![Issue::from_error(&err)] },
        }
    }

    pub fn validate_value(&self, name: impl Into<String>, manifest: &Value) -> Report {
        let issues = self
            .schema
            .iter_errors(manifest)
            .map(|err| Issue {
                message:       err.to_string(),
                instance_path: err.instance_path.to_string(),
                schema_path:   err.schema_path.to_string(),
                line:          None,
                column:        None,
            })
            .collect();
        Report { name: name.into(), issues }
    }
}

/// One problem found in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub message:       String,
    /// JSON pointer of the rejected value, empty for the document root.
    pub instance_path: String,
    /// JSON pointer into the schema of the failing keyword.
    pub schema_path:   String,
    pub line:          Option<usize>,
    pub column:        Option<usize>,
}

impl Issue {
    fn from_error(err: &Error) -> Self {
        let (message, line, column) = match err {
            Error::Json { source, .. } => (source.to_string(), Some(source.line()), Some(source.column())),
            Error::Read { source, .. } => (format!("cannot read manifest: {source}"), None, None),
            other => (other.to_string(), None, None),
        };
        Self {
            message,
            instance_path: String::new(),
            schema_path: String::new(),
            line,
            column,
        }
    }

    fn details(&self) -> Vec<String> {
        let mut details = Vec::new();
        if let (Some(line), Some(column)) = (self.line, self.column) {
            details.push(format!("line {line}, column {column}"));
        }
        if !self.schema_path.is_empty() {
            let at = if self.instance_path.is_empty() { "/" } else { &self.instance_path };
            details.push(format!("at {at} (schema {})", self.schema_path));
        }
        details
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub name:   String,
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn is_valid(&self) -> bool { self.issues.is_empty() }

    /// Render the report as output lines.
    ///
    /// ```text
    /// - app.json has 1 Error!
    /// app.json: "version" is a required property
    ///           ^ at / (schema /required)
    /// ```
    ///
    /// CI style prefixes summaries with `[+]`/`[-]`, issues with `[*]` and
    /// details with `[^]`.
    pub fn render(&self, ci: bool) -> Vec<String> {
        if self.is_valid() {
            let line = format!("{} validates against the schema!", self.name);
            return vec![if ci { format!("      [+] {line}") } else { format!("- {line}") }];
        }

        let count = self.issues.len();
        let plural = if count == 1 { "" } else { "s" };
        let summary = format!("{} has {count} Error{plural}!", self.name);
        let mut lines = vec![if ci { format!("      [-] {summary}") } else { format!("- {summary}") }];

        let indent = " ".repeat(self.name.len() + 2);
        for issue in &self.issues {
            let head = format!("{}: {}", self.name, issue.message);
            lines.push(if ci { format!("    [*] {head}") } else { head });
            for detail in issue.details() {
                lines.push(if ci {
                    format!("    [^] {indent}{detail}")
                } else {
                    format!("{indent}^ {detail}")
                });
            }
        }
        lines
    }
}

/// Expand wildcard arguments. Arguments without `*`, `?` or `[` pass through
/// unchanged; patterns match file names within their parent directory and
/// expand in sorted order.
pub fn expand_paths<I, S>(args: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut paths = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        if !arg.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(arg));
            continue;
        }

        let pattern = Path::new(arg);
        let dir = match pattern.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_glob = pattern.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let matcher = Glob::new(&file_glob)
            .map_err(|source| Error::Pattern { pattern: arg.to_string(), source })?
            .compile_matcher();

        let entries = fs::read_dir(&dir).map_err(|source| Error::Read { path: dir.clone(), source })?;
        let mut matched: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.file_name().is_some_and(|n| matcher.is_match(n)))
            .collect();
        if matched.is_empty() {
            tracing::warn!("`{arg}` matched no files");
        }
        matched.sort();
        paths.extend(matched);
    }
    Ok(paths)
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

fn display_name(path: &Path) -> String {
    path.file_name().unwrap_or(path.as_os_str()).to_string_lossy().into_owned()
}
