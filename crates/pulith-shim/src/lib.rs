//! Shim mechanism for command routing.
//!
//! # Architecture
//!
//! A shim is a stand-in executable. When invoked it reads the sidecar
//! config next to it, builds the target's command line, launches the target
//! and reports its exit code:
//!
//! ```text
//! ShimConfig -> CommandLine -> inspect() -> Launcher -> exit code
//! ```
//!
//! Shim is a mechanism, not policy. Where targets live and how sidecars are
//! written is up to the package manager installing the shim.
//!
//! # Example
//!
//! ```no_run
//! use pulith_shim::{CommandLine, Environment, Launcher, ShimConfig, WaitPolicy, inspect};
//!
//! let config = ShimConfig::load("/opt/shims/node.shim")?;
//! let target = config.target()?;
//! let command = CommandLine::new(&target)
//!     .extra_args(config.extra_args())
//!     .caller_args(std::env::args_os().skip(1));
//!
//! let env = Environment::from_config(&config);
//! let policy = WaitPolicy::from_env(inspect(&target));
//! let code = Launcher::platform_default().run(&command, env.as_ref(), policy);
//! std::process::exit(code);
//! # Ok::<(), pulith_shim::Error>(())
//! ```

pub use cmdline::{CallerArgs, CommandLine, quote_arg, strip_program_name};
pub use config::{SIDECAR_EXTENSION, ShimConfig, sidecar_path};
pub use env::Environment;
pub use error::{Error, Result};
pub use inspect::{ExeType, inspect, inspect_reader};
pub use launch::{
    Backend, ChildProcess, ELEVATION_REQUIRED_CODE, FORCE_WAIT_VAR, LaunchError, Launcher,
    StdBackend, StdioMode, WaitPolicy, force_wait_requested,
};
#[cfg(windows)]
pub use launch::{DirectBackend, ElevatedBackend};
pub use relay::Relay;

mod cmdline;
mod config;
mod env;
mod error;
mod inspect;
mod launch;
pub mod relay;
