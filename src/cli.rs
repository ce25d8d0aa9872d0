//! # Command Line Interface
//!
//! Argument surface of spec §6 "CLI surface": one positional source file,
//! and a handful of flags selecting what to do with it once loaded.

use clap::{arg, crate_version, Command};

pub fn build_cli() -> Command {
    let long_help = "pb1211 loads a text source file of line-numbered BASIC statements,
tokenizes it into the in-memory program store, and then lists, dumps, and/or
runs it depending on which flags are given. Giving none of --list/--dump/--run
still loads (and thus syntax-checks) the file without producing output.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error";

    Command::new("pb1211")
        .about("Pocket BASIC interpreter modeled on the Sharp PC-1211")
        .after_long_help(long_help)
        .version(crate_version!())
        .arg(arg!(<SOURCE> "path to a BASIC source file"))
        .arg(arg!(--list "print a human-readable rendering of all loaded lines").required(false))
        .arg(arg!(--dump "print a byte-level disassembly of every record").required(false))
        .arg(arg!(--run "execute the loaded program").required(false))
        .arg(
            arg!(--"aread-value" <N> "preload the AREAD register with a numeric value")
                .required(false)
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            arg!(--"aread-string" <S> "preload the AREAD register with a string value")
                .required(false)
                .conflicts_with("aread-value"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_a_source_path() {
        let result = build_cli().try_get_matches_from(["pb1211"]);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_flags_and_source() {
        let m = build_cli().try_get_matches_from(["pb1211", "prog.bas", "--run", "--list"]).unwrap();
        assert_eq!(m.get_one::<String>("SOURCE").unwrap(), "prog.bas");
        assert!(m.get_flag("run"));
        assert!(m.get_flag("list"));
    }

    #[test]
    fn aread_value_and_string_are_mutually_exclusive() {
        let result =
            build_cli().try_get_matches_from(["pb1211", "prog.bas", "--aread-value", "1", "--aread-string", "HI"]);
        assert!(result.is_err());
    }
}
