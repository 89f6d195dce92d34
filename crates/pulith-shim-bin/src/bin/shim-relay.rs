//! Shim variant that pipes the target's stdout/stderr through itself.

use pulith_shim_bin::{Variant, run};

fn main() { std::process::exit(run(Variant::Relay)) }
