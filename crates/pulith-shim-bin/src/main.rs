use pulith_shim_bin::{Variant, run};

fn main() { std::process::exit(run(Variant::Inherit)) }
