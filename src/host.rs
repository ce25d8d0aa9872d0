//! # Host I/O
//!
//! The VM never touches `std::io` directly; it goes through the `Host`
//! trait, per spec §6 "External Interfaces". `StdioHost` is the default,
//! terminal-facing implementation used by `main`. `BufferHost` records
//! output and serves canned input, for the integration tests.

use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Everything the VM can do to the outside world: `PRINT`/`PAUSE` output,
/// `INPUT` line reads, `BEEP`, and the millisecond sleep `PAUSE` uses.
pub trait Host {
    fn print(&mut self, text: &str);
    fn read_line(&mut self) -> io::Result<String>;
    fn beep(&mut self);
    fn sleep_ms(&mut self, ms: u64);
}

/// Talks to the real terminal: stdout for output, stdin for `INPUT`, and
/// a literal bell character (`\x07`) plus `std::thread::sleep` for `BEEP`/`PAUSE`.
pub struct StdioHost {
    stdin: io::Stdin,
}

impl Default for StdioHost {
    fn default() -> Self {
        StdioHost { stdin: io::stdin() }
    }
}

impl Host for StdioHost {
    fn print(&mut self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.stdin.lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn beep(&mut self) {
        print!("\x07");
        let _ = io::stdout().flush();
    }

    fn sleep_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// In-memory `Host` for tests: `INPUT` reads from a pre-loaded queue of
/// lines, `PRINT`/`BEEP` accumulate into a transcript string, `PAUSE`
/// records the requested duration instead of actually sleeping.
#[derive(Default)]
pub struct BufferHost {
    pub input: std::collections::VecDeque<String>,
    pub output: String,
    pub bells: u32,
    pub slept_ms: Vec<u64>,
}

impl BufferHost {
    pub fn with_input<I: IntoIterator<Item = S>, S: Into<String>>(lines: I) -> Self {
        BufferHost { input: lines.into_iter().map(Into::into).collect(), ..Default::default() }
    }
}

impl Host for BufferHost {
    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn read_line(&mut self) -> io::Result<String> {
        Ok(self.input.pop_front().unwrap_or_default())
    }

    fn beep(&mut self) {
        self.bells += 1;
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.slept_ms.push(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_host_feeds_queued_input_lines() {
        let mut h = BufferHost::with_input(["1", "2"]);
        assert_eq!(h.read_line().unwrap(), "1");
        assert_eq!(h.read_line().unwrap(), "2");
        assert_eq!(h.read_line().unwrap(), "");
    }

    #[test]
    fn buffer_host_records_output_and_bells() {
        let mut h = BufferHost::default();
        h.print("hi");
        h.beep();
        assert_eq!(h.output, "hi");
        assert_eq!(h.bells, 1);
    }
}
