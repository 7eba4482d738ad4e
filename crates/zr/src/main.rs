//! Binary entry point: parse [`zr::cli::Cli`], install the tracing
//! subscriber, dispatch to the matched subcommand, and map the result onto
//! an exit code per spec.md §6.

use clap::Parser;
use zr::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Only fails if a subscriber is already installed (e.g. under a test
    // harness); proceed without one rather than treating it as fatal.
    let _ = zr::tracing::init(cli.verbose, cli.quiet, cli.no_color);

    match zr::dispatch(cli).await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(code);
        }
    }
}
