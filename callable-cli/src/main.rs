mod process;

use anyhow::Result;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "callable-loci";
}

fn main() -> Result<()> {
    let matches = process::cli::create_process_cli().get_matches();

    process::handlers::init_logging(matches.get_flag(process::cli::VERBOSE_ARG));
    process::handlers::run_process(&matches)
}
