mod args;
mod output;

use anyhow::Result;
use dnssec_check::check_dnssec;
use tracing_subscriber::EnvFilter;

use crate::args::Cli;
use crate::output::Format;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    let options = cli.check_options()?;
    let format = Format::parse(&cli.output)?;

    let report = check_dnssec(&cli.domain, &options);
    println!("{}", output::render(&report, format)?);

    // codes de sortie : 0 OK, 2 job Failed, 1 fatal
    if !report.is_ok() {
        std::process::exit(2);
    }
    Ok(())
}

/// RUST_LOG prend le pas sur -v.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
