//! `isolens` executable: JSON request on stdin, JSON response on stdout
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::io::{self, Read};
use std::process::ExitCode;

use log::error;

use isolens::{handle, BindingError, Response, EXIT_FAILURE};
use isolens_core::execution::Capabilities;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let mut input = String::new();
    let response = match io::stdin().read_to_string(&mut input) {
        Ok(_) => handle(&input, Capabilities::resolve()),
        Err(e) => Response::failure(&BindingError::from(e)),
    };

    match response.to_json() {
        Ok(json) => {
            println!("{}", json);
            ExitCode::from(response.exit_code())
        }
        Err(e) => {
            error!("Failed to encode response: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
