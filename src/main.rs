//! # Command Line Interface
//!
//! Dispatch to `commands`.

#[cfg(windows)]
use colored;
use pb1211::commands;
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    let matches = cli::build_cli().get_matches();
    commands::execute(&matches)
}
