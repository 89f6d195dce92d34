use anyhow::{Context, Result};
use clap::Parser;
use pulith_validator::{Validator, ci_requested, expand_paths};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pulith-validator", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Cli {
    /// JSON schema every manifest is checked against
    schema: PathBuf,
    /// Manifest files; wildcards are expanded
    #[arg(required = true)]
    manifests: Vec<String>,
    /// CI-style output (also enabled by CI=true)
    #[arg(long)]
    ci: bool,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let ci = cli.ci || ci_requested();
    let validator = Validator::from_file(&cli.schema).context("cannot load schema")?;
    let manifests = expand_paths(&cli.manifests)?;
    tracing::debug!("validating {} manifest(s) against {}", manifests.len(), cli.schema.display());

    let mut all_valid = true;
    for path in manifests {
        let report = validator.validate_file(&path);
        all_valid &= report.is_valid();
        for line in report.render(ci) {
            println!("{line}");
        }
    }
    Ok(all_valid)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
