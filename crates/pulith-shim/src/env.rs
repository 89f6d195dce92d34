//! Child environment built from the parent's plus `env::` overrides.

use crate::config::ShimConfig;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ffi::{OsStr, OsString};

static VAR_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"%([^%]+)%").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Vec<(OsString, OsString)>,
}

impl Environment {
    /// Overlay `overrides` on `parent`.
    ///
    /// Each override value has `%NAME%` references expanded against the
    /// overlay built so far, so later entries see earlier ones. Unknown
    /// references are left as written.
    pub fn overlay<P, K, V>(parent: P, overrides: impl IntoIterator<Item = (K, V)>) -> Self
    where
        P: IntoIterator<Item = (OsString, OsString)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut env = Self {
            vars: parent.into_iter().collect(),
        };
        for (name, value) in overrides {
            let expanded = env.expand(value.as_ref());
            env.set(name.as_ref(), expanded);
        }
        env
    }

    /// Environment for the child, or `None` when the config has no overrides
    /// and the parent's environment is inherited untouched.
    pub fn from_config(config: &ShimConfig) -> Option<Self> {
        if !config.has_env_overrides() {
            return None;
        }
        let env = Self::overlay(std::env::vars_os(), config.env_overrides());
        tracing::debug!(vars = env.vars.len(), "built child environment");
        Some(env)
    }

    pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&OsStr> {
        let name = name.as_ref();
        self.vars
            .iter()
            .find(|(k, _)| names_equal(k, name))
            .map(|(_, v)| v.as_os_str())
    }

    pub fn set(&mut self, name: impl Into<OsString>, value: impl Into<OsString>) {
        let name = name.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| names_equal(k, &name)) {
            Some(entry) => entry.1 = value,
            None => self.vars.push((name, value)),
        }
    }

    pub fn expand(&self, value: &str) -> String {
        VAR_REF
            .replace_all(value, |caps: &Captures<'_>| match self.get(&caps[1]) {
                Some(v) => v.to_string_lossy().into_owned(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn len(&self) -> usize { self.vars.len() }

    pub fn is_empty(&self) -> bool { self.vars.is_empty() }

    /// `NAME=value\0...\0\0` block for `CreateProcessW`.
    #[cfg(windows)]
    pub fn to_wide_block(&self) -> Vec<u16> {
        use std::os::windows::ffi::OsStrExt;

        let mut block = Vec::new();
        for (k, v) in &self.vars {
            block.extend(k.encode_wide());
            block.push(u16::from(b'='));
            block.extend(v.encode_wide());
            block.push(0);
        }
        if self.vars.is_empty() {
            block.push(0);
        }
        block.push(0);
        block
    }
}

#[cfg(windows)]
fn names_equal(a: &OsStr, b: &OsStr) -> bool { a.eq_ignore_ascii_case(b) }

#[cfg(not(windows))]
fn names_equal(a: &OsStr, b: &OsStr) -> bool { a == b }

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> Vec<(OsString, OsString)> {
        vec![
            (OsString::from("HOME"), OsString::from("/home/user")),
            (OsString::from("PATH"), OsString::from("/usr/bin")),
        ]
    }

    #[test]
    fn test_overlay_adds_and_replaces() {
        let env = Environment::overlay(parent(), [("PATH", "/opt/bin"), ("JAVA_HOME", "/opt/jdk")]);
        assert_eq!(env.get("PATH"), Some(OsStr::new("/opt/bin")));
        assert_eq!(env.get("JAVA_HOME"), Some(OsStr::new("/opt/jdk")));
        assert_eq!(env.get("HOME"), Some(OsStr::new("/home/user")));
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn test_overlay_expands_parent_references() {
        let env = Environment::overlay(parent(), [("PATH", "/opt/bin:%PATH%")]);
        assert_eq!(env.get("PATH"), Some(OsStr::new("/opt/bin:/usr/bin")));
    }

    #[test]
    fn test_overlay_sees_earlier_overrides() {
        let env = Environment::overlay(parent(), [("TOOL_HOME", "%HOME%/tool"), ("TOOL_BIN", "%TOOL_HOME%/bin")]);
        assert_eq!(env.get("TOOL_BIN"), Some(OsStr::new("/home/user/tool/bin")));
    }

    #[test]
    fn test_unknown_reference_left_literal() {
        let env = Environment::overlay(parent(), [("X", "%NOPE%-%HOME%-%%")]);
        assert_eq!(env.get("X"), Some(OsStr::new("%NOPE%-/home/user-%%")));
    }

    #[test]
    fn test_from_config_without_overrides_inherits() {
        let config = ShimConfig::parse("path=/bin/true");
        assert!(Environment::from_config(&config).is_none());
    }

    #[test]
    fn test_from_config_with_overrides() {
        let config = ShimConfig::parse("path=/bin/true\nenv::PULITH_SHIM_TEST_VAR=on");
        let env = Environment::from_config(&config).unwrap();
        assert_eq!(env.get("PULITH_SHIM_TEST_VAR"), Some(OsStr::new("on")));
    }

    #[cfg(windows)]
    #[test]
    fn test_names_case_insensitive_on_windows() {
        let env = Environment::overlay(parent(), [("path", "%Path%;C:\\bin")]);
        assert_eq!(env.get("PATH"), Some(OsStr::new("/usr/bin;C:\\bin")));
        assert_eq!(env.len(), 2);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_names_case_sensitive_elsewhere() {
        let env = Environment::overlay(parent(), [("path", "x")]);
        assert_eq!(env.get("PATH"), Some(OsStr::new("/usr/bin")));
        assert_eq!(env.get("path"), Some(OsStr::new("x")));
    }

    #[cfg(windows)]
    #[test]
    fn test_wide_block_layout() {
        let env = Environment::overlay(Vec::<(OsString, OsString)>::new(), [("A", "1")]);
        let block: Vec<u16> = "A=1\0\0".encode_utf16().collect();
        assert_eq!(env.to_wide_block(), block);
    }
}
