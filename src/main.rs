//! Binary entrypoint for the `forge` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // API keys may live in a local .env file.
    dotenvy::dotenv().ok();
    forge::logging::init();

    match forge::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
