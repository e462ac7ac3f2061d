//! Apex AI web app: chat, reasoning, recipe lookup and vector-store pages.
//! Run with: cargo run --bin apex-server

use std::process::ExitCode;

use apex_ai::start_apex_ai;

fn main() -> ExitCode {
    start_apex_ai::run()
}
