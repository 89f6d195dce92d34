//! Child process launch.
//!
//! # Architecture
//!
//! A [`Backend`] knows how to create a process on one platform. The
//! [`Launcher`] owns a direct backend and, optionally, an elevation-capable
//! one that is only tried when the direct launch reports
//! [`LaunchError::ElevationRequired`]. Children are released by dropping
//! them; no code path keeps a process handle past [`Launcher::run`].

mod process;
#[cfg(windows)]
mod win32;

pub use process::{StdBackend, StdioMode};
#[cfg(windows)]
pub use win32::{DirectBackend, ElevatedBackend};

use crate::cmdline::CommandLine;
use crate::env::Environment;
use crate::inspect::ExeType;
use std::io;
use thiserror::Error;

/// Set to any value to wait for GUI targets as well.
pub const FORCE_WAIT_VAR: &str = "PULITH_SHIM_WAIT";

/// `ERROR_ELEVATION_REQUIRED` on Windows.
pub const ELEVATION_REQUIRED_CODE: i32 = 740;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("the requested operation requires elevation")]
    ElevationRequired,

    #[error("launch failed (os error {0})")]
    Os(i32),
}

impl LaunchError {
    pub fn from_io(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(ELEVATION_REQUIRED_CODE) if cfg!(windows) => Self::ElevationRequired,
            Some(code) => Self::Os(code),
            None => Self::Os(1),
        }
    }

    /// Native code surfaced as the shim's own exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ElevationRequired => ELEVATION_REQUIRED_CODE,
            Self::Os(code) => *code,
        }
    }
}

/// A running child. Dropping it releases every OS resource it holds.
pub trait ChildProcess {
    fn id(&self) -> u32;

    /// Block until the child exits and return its exit code.
    fn wait(&mut self) -> Result<i32, LaunchError>;
}

pub trait Backend {
    fn name(&self) -> &'static str;

    fn launch(
        &self,
        command: &CommandLine,
        env: Option<&Environment>,
    ) -> Result<Box<dyn ChildProcess>, LaunchError>;

    /// Launch a child the shim will not wait for. Nothing drains pipes after
    /// the shim exits, so backends that pipe output must not do so here.
    fn launch_detached(
        &self,
        command: &CommandLine,
        env: Option<&Environment>,
    ) -> Result<Box<dyn ChildProcess>, LaunchError> {
        self.launch(command, env)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    Wait,
    Detach,
}

impl WaitPolicy {
    /// GUI targets are detached unless waiting is forced. Anything that is
    /// not positively identified as GUI is waited on.
    pub fn decide(kind: ExeType, force_wait: bool) -> Self {
        if kind.is_gui() && !force_wait {
            Self::Detach
        } else {
            Self::Wait
        }
    }

    pub fn from_env(kind: ExeType) -> Self { Self::decide(kind, force_wait_requested()) }
}

pub fn force_wait_requested() -> bool { std::env::var_os(FORCE_WAIT_VAR).is_some() }

pub struct Launcher {
    direct:   Box<dyn Backend>,
    elevated: Option<Box<dyn Backend>>,
}

impl Launcher {
    pub fn new(direct: impl Backend + 'static) -> Self {
        Self {
            direct:   Box::new(direct),
            elevated: None,
        }
    }

    pub fn with_elevation(mut self, elevated: impl Backend + 'static) -> Self {
        self.elevated = Some(Box::new(elevated));
        self
    }

    /// Inherited stdio with the platform's native backends.
    #[cfg(windows)]
    pub fn platform_default() -> Self { Self::new(DirectBackend).with_elevation(ElevatedBackend) }

    #[cfg(not(windows))]
    pub fn platform_default() -> Self { Self::new(StdBackend::inherit()) }

    /// Piped stdio relayed back to the parent's streams.
    #[cfg(windows)]
    pub fn relaying() -> Self { Self::new(StdBackend::relay()).with_elevation(ElevatedBackend) }

    #[cfg(not(windows))]
    pub fn relaying() -> Self { Self::new(StdBackend::relay()) }

    /// Launch `command` and return the exit code to report.
    pub fn run(&self, command: &CommandLine, env: Option<&Environment>, policy: WaitPolicy) -> i32 {
        tracing::debug!(backend = self.direct.name(), command = %command.render(), ?policy, "launching");

        let child = match start(self.direct.as_ref(), command, env, policy) {
            Ok(child) => child,
            Err(LaunchError::ElevationRequired) => return self.run_elevated(command, env, policy),
            Err(err) => {
                tracing::debug!(%err, "launch failed");
                return err.exit_code();
            }
        };
        finish(child, policy)
    }

    fn run_elevated(&self, command: &CommandLine, env: Option<&Environment>, policy: WaitPolicy) -> i32 {
        let Some(elevated) = &self.elevated else {
            tracing::debug!("elevation required but no elevated backend");
            return LaunchError::ElevationRequired.exit_code();
        };

        tracing::debug!(backend = elevated.name(), "retrying with elevation");
        match start(elevated.as_ref(), command, env, policy) {
            Ok(child) => finish(child, policy),
            Err(err) => {
                tracing::debug!(%err, "elevated launch failed");
                err.exit_code()
            }
        }
    }
}

fn start(
    backend: &dyn Backend,
    command: &CommandLine,
    env: Option<&Environment>,
    policy: WaitPolicy,
) -> Result<Box<dyn ChildProcess>, LaunchError> {
    match policy {
        WaitPolicy::Wait => backend.launch(command, env),
        WaitPolicy::Detach => backend.launch_detached(command, env),
    }
}

fn finish(mut child: Box<dyn ChildProcess>, policy: WaitPolicy) -> i32 {
    let id = child.id();
    match policy {
        WaitPolicy::Detach => {
            tracing::debug!(pid = id, "detached from GUI target");
            0
        }
        WaitPolicy::Wait => {
            let code = child.wait().unwrap_or_else(|err| err.exit_code());
            tracing::debug!(pid = id, code, "child exited");
            code
        }
    }
}
