//! Binary entrypoint for the eco guide server.
//! Run with: cargo run --bin eco-guide-server

use std::process::ExitCode;

use eco_guide::start_eco_guide;

fn main() -> ExitCode {
    start_eco_guide::run()
}
