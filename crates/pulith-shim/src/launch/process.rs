use super::{Backend, ChildProcess, LaunchError};
use crate::cmdline::CommandLine;
use crate::env::Environment;
use crate::relay::Relay;
use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// Child shares the shim's standard handles.
    Inherit,
    /// Child output is piped and forwarded by a [`Relay`].
    Relay,
}

/// Backend on top of `std::process::Command`.
#[derive(Debug, Clone, Copy)]
pub struct StdBackend {
    mode: StdioMode,
}

impl StdBackend {
    pub fn inherit() -> Self {
        Self {
            mode: StdioMode::Inherit,
        }
    }

    pub fn relay() -> Self {
        Self {
            mode: StdioMode::Relay,
        }
    }

    pub fn mode(&self) -> StdioMode { self.mode }

    fn spawn(&self, command: &CommandLine, env: Option<&Environment>) -> Result<StdChild, LaunchError> {
        let mut cmd = build_command(command);
        if let Some(env) = env {
            cmd.env_clear();
            cmd.envs(env.iter());
        }
        if self.mode == StdioMode::Relay {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|e| LaunchError::from_io(&e))?;

        let relay = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => Some(Relay::spawn(out, err, io::stdout(), io::stderr())),
            _ => None,
        };

        Ok(StdChild { child, relay })
    }
}

impl Backend for StdBackend {
    fn name(&self) -> &'static str {
        match self.mode {
            StdioMode::Inherit => "std",
            StdioMode::Relay => "std-relay",
        }
    }

    fn launch(
        &self,
        command: &CommandLine,
        env: Option<&Environment>,
    ) -> Result<Box<dyn ChildProcess>, LaunchError> {
        Ok(Box::new(self.spawn(command, env)?))
    }

    fn launch_detached(
        &self,
        command: &CommandLine,
        env: Option<&Environment>,
    ) -> Result<Box<dyn ChildProcess>, LaunchError> {
        Ok(Box::new(Self::inherit().spawn(command, env)?))
    }
}

#[cfg(windows)]
fn build_command(command: &CommandLine) -> Command {
    use std::os::windows::process::CommandExt;

    let mut cmd = Command::new(command.program());
    let tail = command.tail();
    if !tail.is_empty() {
        cmd.raw_arg(tail);
    }
    cmd
}

#[cfg(not(windows))]
fn build_command(command: &CommandLine) -> Command {
    let mut cmd = Command::new(command.program());
    cmd.args(command.argv());
    cmd
}

struct StdChild {
    child: Child,
    relay: Option<Relay>,
}

impl ChildProcess for StdChild {
    fn id(&self) -> u32 { self.child.id() }

    fn wait(&mut self) -> Result<i32, LaunchError> {
        let status = self.child.wait().map_err(|e| LaunchError::from_io(&e))?;
        if let Some(relay) = self.relay.take() {
            if let Err(err) = relay.finish() {
                tracing::debug!(%err, "output relay stopped early");
            }
        }
        Ok(status_code(status))
    }
}

fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
