//! Trellis CLI - Task hierarchy and dependency monitoring

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = trellis_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
