//! Command line synthesis.
//!
//! The rendered line has the shape
//! `"<target>" [<configured args>] [<caller args>]`. Caller arguments are
//! re-quoted only when they contain a space; nothing else is escaped. The
//! line is handed to the OS without a command interpreter in between.

use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Arguments the shim itself was invoked with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerArgs {
    /// Already split argument vector, program name excluded.
    List(Vec<OsString>),
    /// Raw command line tail, program name already stripped. Used verbatim.
    Raw(String),
}

impl Default for CallerArgs {
    fn default() -> Self { Self::List(Vec::new()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    extra:   Option<String>,
    caller:  CallerArgs,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra:   None,
            caller:  CallerArgs::default(),
        }
    }

    /// Configured arguments, always placed before the caller's.
    pub fn extra_args(mut self, extra: Option<&str>) -> Self {
        self.extra = extra
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        self
    }

    pub fn caller_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.caller = CallerArgs::List(args.into_iter().map(Into::into).collect());
        self
    }

    /// Use the caller's raw command line, as returned by the OS.
    pub fn raw_caller_line(mut self, raw: &str) -> Self {
        self.caller = CallerArgs::Raw(strip_program_name(raw).to_string());
        self
    }

    pub fn program(&self) -> &Path { &self.program }

    pub fn caller(&self) -> &CallerArgs { &self.caller }

    /// Full command line including the quoted program.
    pub fn render(&self) -> String {
        let tail = self.tail();
        let mut line = format!("\"{}\"", self.program.display());
        if !tail.is_empty() {
            line.push(' ');
            line.push_str(&tail);
        }
        line
    }

    /// Everything after the program: configured args, then caller args.
    pub fn tail(&self) -> String {
        let mut parts: Vec<Cow<'_, str>> = Vec::new();
        if let Some(extra) = &self.extra {
            parts.push(Cow::Borrowed(extra.as_str()));
        }
        match &self.caller {
            CallerArgs::List(args) => {
                for arg in args {
                    parts.push(Cow::Owned(quote_arg(&arg.to_string_lossy()).into_owned()));
                }
            }
            CallerArgs::Raw(raw) if !raw.is_empty() => parts.push(Cow::Borrowed(raw.as_str())),
            CallerArgs::Raw(_) => {}
        }
        parts.join(" ")
    }

    /// Argument vector for platforms that spawn from argv rather than a
    /// single line. Configured args are split with shell word rules.
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv: Vec<OsString> = self
            .extra
            .as_deref()
            .map(split_words)
            .unwrap_or_default()
            .into_iter()
            .map(OsString::from)
            .collect();

        match &self.caller {
            CallerArgs::List(args) => argv.extend(args.iter().cloned()),
            CallerArgs::Raw(raw) => argv.extend(split_words(raw).into_iter().map(OsString::from)),
        }
        argv
    }
}

/// Wrap `arg` in double quotes if it contains a space.
///
/// Empty arguments are quoted as well so they survive re-splitting.
/// Embedded quotes are not escaped.
pub fn quote_arg(arg: &str) -> Cow<'_, str> {
    if arg.is_empty() || arg.contains(' ') {
        Cow::Owned(format!("\"{arg}\""))
    } else {
        Cow::Borrowed(arg)
    }
}

/// Drop the invoking program's name from a raw command line.
///
/// A quoted name ends at the first `"` followed by a space, an unquoted one
/// at the first space. Without either, nothing remains.
pub fn strip_program_name(raw: &str) -> &str {
    let rest = if raw.starts_with('"') {
        raw.find("\" ").map(|pos| &raw[pos + 2..])
    } else {
        raw.find(' ').map(|pos| &raw[pos + 1..])
    };
    rest.unwrap_or("").trim_start_matches([' ', '\t'])
}

fn split_words(line: &str) -> Vec<String> {
    shlex::split(line).unwrap_or_else(|| line.split_whitespace().map(str::to_string).collect())
}
