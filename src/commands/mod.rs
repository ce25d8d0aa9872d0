//! # CLI command
//!
//! Thin glue between parsed arguments and the `Interpreter` facade, in the
//! style of this codebase's subcommand modules: read the matches, call one
//! library entry point, print, and translate the crate's own error type
//! into the process exit code `main` reports.

use crate::host::StdioHost;
use crate::interpreter::Interpreter;
use crate::STDRESULT;

/// Load the source file named by the `SOURCE` positional, then perform
/// whichever of `--list`/`--dump`/`--run` were given, in that order (list
/// and dump both print something to look at before a run, which is what a
/// user debugging a program usually wants).
pub fn execute(matches: &clap::ArgMatches) -> STDRESULT {
    let path = matches.get_one::<String>("SOURCE").expect("required by clap");
    let source = std::fs::read_to_string(path)?;

    let mut interp = Interpreter::new(Box::new(StdioHost::default()));
    interp.load_source(&source)?;

    if let Some(value) = matches.get_one::<f64>("aread-value") {
        interp.set_aread_value(*value);
    }
    if let Some(text) = matches.get_one::<String>("aread-string") {
        interp.set_aread_string(text);
    }

    if matches.get_flag("list") {
        print!("{}", interp.list());
    }
    if matches.get_flag("dump") {
        print!("{}", interp.dump());
    }
    if matches.get_flag("run") {
        interp.run()?;
    }

    Ok(())
}
