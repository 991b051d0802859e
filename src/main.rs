mod alert;
mod classifier;
mod cli;
mod ingest;
mod model;
mod navigation;
mod orchestrator;
mod storage;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_quiet = args.quiet;

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_quiet {
                // Keep quiet mode quiet on stdout; the error still lands on
                // stderr with a failing exit code.
                eprintln!("{}", e);
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
