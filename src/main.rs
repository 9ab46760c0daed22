//! RonyBase - JSON document collections on local disk.

use clap::Parser;
use std::process::ExitCode;

use ronybase::{logging, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = Commands::parse();

    // Initialize logging
    let _guard = match logging::init(args.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the command
    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
