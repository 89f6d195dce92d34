//! Shim binaries.
//!
//! # Usage
//!
//! Copy the `shim` executable next to the other shims under the command
//! name it should answer to, and write a sidecar with the same base name:
//!
//! ```text
//! shims/node.exe
//! shims/node.shim    path = C:\tools\node\20.11.0\node.exe
//! ```
//!
//! `shim-relay` behaves the same but pipes the target's output through the
//! shim instead of sharing the console.

use pulith_shim::{
    CallerArgs, CommandLine, Environment, Error, Launcher, ShimConfig, WaitPolicy, inspect,
    sidecar_path,
};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Filter directives for the shim's own diagnostics. Silent when unset.
pub const LOG_ENV: &str = "PULITH_SHIM_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Inherit,
    Relay,
}

impl Variant {
    fn launcher(self) -> Launcher {
        match self {
            Self::Inherit => Launcher::platform_default(),
            Self::Relay => Launcher::relaying(),
        }
    }
}

/// Run the shim and return the exit code for the process.
pub fn run(variant: Variant) -> i32 {
    init_logging();

    let outcome = env::current_exe()
        .map_err(Error::CurrentExe)
        .and_then(|exe| try_run(&exe, caller_args(), &variant.launcher()));

    match outcome {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(?err, "shim failed before launch");
            eprintln!("{err}");
            err.exit_code()
        }
    }
}

/// Resolve the sidecar of the shim at `exe` and launch its target.
pub fn try_run(exe: &Path, caller: CallerArgs, launcher: &Launcher) -> Result<i32, Error> {
    let config = ShimConfig::load(sidecar_path(exe))?;
    let target = config.target()?;

    let command = CommandLine::new(&target).extra_args(config.extra_args());
    let command = match caller {
        CallerArgs::List(args) => command.caller_args(args),
        CallerArgs::Raw(raw) => command.raw_caller_line(&raw),
    };

    let env = Environment::from_config(&config);
    let policy = WaitPolicy::from_env(inspect(&target));

    Ok(launcher.run(&command, env.as_ref(), policy))
}

/// The caller's arguments. On Windows this is the raw command line, so the
/// caller's own quoting reaches the target untouched.
#[cfg(windows)]
pub fn caller_args() -> CallerArgs {
    use windows::Win32::System::Environment::GetCommandLineW;

    match unsafe { GetCommandLineW().to_string() } {
        Ok(raw) => CallerArgs::Raw(raw),
        Err(_) => CallerArgs::List(env::args_os().skip(1).collect()),
    }
}

#[cfg(not(windows))]
pub fn caller_args() -> CallerArgs { CallerArgs::List(env::args_os().skip(1).collect()) }

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
