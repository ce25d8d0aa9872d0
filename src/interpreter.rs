//! # Interpreter facade
//!
//! Owns the one `ProgramStore`, one `Vm`, and one `Host` a single
//! invocation needs (spec §9 "Global mutable state": exactly these three,
//! nothing shared beyond them). `load_source` runs the per-line tokenizer
//! pipeline of spec §4.2; `list`/`dump` are the two textual renderings the
//! CLI surface calls for; `run` hands control to the VM.

use crate::error::BasicError;
use crate::host::Host;
use crate::store::ProgramStore;
use crate::token::{self, Keyword, KEYWORDS};
use crate::tokenizer;
use crate::vm::{AreadRegister, Vm};
use colored::Colorize;
use log::debug;

pub struct Interpreter {
    store: ProgramStore,
    vm: Vm,
    host: Box<dyn Host>,
}

impl Interpreter {
    pub fn new(host: Box<dyn Host>) -> Self {
        Interpreter { store: ProgramStore::new(), vm: Vm::new(), host }
    }

    /// Tokenize and load every non-empty line of `source`, per spec §6
    /// "Source file format". The whole file is loaded before any line
    /// runs, so a late syntax error aborts the load with nothing executed.
    /// Per spec §7 "Errors from the tokenizer abort loading without
    /// entering `run`", each failure is attributed to a line number: the
    /// line just parsed off the front of the text, or 0 if the line
    /// number itself could not be read.
    pub fn load_source(&mut self, source: &str) -> Result<(), crate::error::LineError> {
        for text in source.lines() {
            if text.trim().is_empty() {
                continue;
            }
            let (line_number, rest) = tokenizer::split_line_number(text)
                .map_err(|error| crate::error::LineError { error, line: 0 })?;
            let attribute = |error: BasicError| crate::error::LineError { error, line: line_number };
            let tokens = tokenizer::tokenize_statements(rest).map_err(attribute)?;
            self.store.add_line(line_number, &tokens).map_err(attribute)?;
        }
        debug!("loaded {} bytes of program store", self.store.len());
        Ok(())
    }

    pub fn set_aread_value(&mut self, value: f64) {
        self.vm.aread = AreadRegister::Num(value);
    }

    pub fn set_aread_string(&mut self, text: &str) {
        self.vm.aread = AreadRegister::Str(crate::store::clamp_string(text));
    }

    pub fn run(&mut self) -> Result<(), crate::error::LineError> {
        self.vm.start_at(&self.store).map_err(|error| crate::error::LineError { error, line: 0 })?;
        self.vm.run(&mut self.store, self.host.as_mut())
    }

    /// Human-readable rendering of every loaded line, in ascending order —
    /// a detokenized reconstruction, not the original source text.
    pub fn list(&self) -> String {
        let colorize = atty::is(atty::Stream::Stdout);
        let mut out = String::new();
        let mut cur = self.store.first_line();
        while let Some(h) = cur {
            let number = h.line_number.to_string();
            let number = if colorize { number.cyan().to_string() } else { number };
            out.push_str(&format!("{} {}\n", number, detokenize_line(self.store.bytes(), self.store.tokens_of(h))));
            cur = self.store.next_line(h);
        }
        out
    }

    /// Byte-level disassembly of every record: offset, declared length,
    /// line number, then one mnemonic per token.
    pub fn dump(&self) -> String {
        let colorize = atty::is(atty::Stream::Stdout);
        let mut out = String::new();
        let mut cur = self.store.first_line();
        while let Some(h) = cur {
            let mnemonics = disassemble_line(self.store.bytes(), self.store.tokens_of(h));
            let mnemonics = if colorize { mnemonics.yellow().to_string() } else { mnemonics };
            out.push_str(&format!("{:04x}  len={:<4} line={:<4} {}\n", h.offset, h.record_len, h.line_number, mnemonics));
            cur = self.store.next_line(h);
        }
        out
    }
}

fn keyword_by_token(op: u8) -> Option<&'static Keyword> {
    KEYWORDS.iter().find(|kw| kw.token == op)
}

fn operator_text(op: u8) -> Option<&'static str> {
    use token::*;
    Some(match op {
        T_EQ_ASSIGN | T_EQ => "=",
        T_PLUS => "+",
        T_MINUS => "-",
        T_MUL => "*",
        T_DIV => "/",
        T_POW => "^",
        T_LP => "(",
        T_RP => ")",
        T_COMMA => ",",
        T_SEMI => ";",
        T_COLON => ":",
        T_NE => "<>",
        T_LT => "<",
        T_LE => "<=",
        T_GT => ">",
        T_GE => ">=",
        _ => return None,
    })
}

/// Reconstruct a readable statement list from one line's token stream,
/// starting at `pos` (just past the 4-byte record header) and stopping at
/// `T_EOL`. Every token renders as one space-separated word; a variable
/// index's parentheses hug their subexpression the way source text would.
fn detokenize_line(buf: &[u8], pos: usize) -> String {
    let mut out = String::new();
    let mut p = pos;
    while let Some(&op) = buf.get(p) {
        if op == token::T_EOL {
            break;
        }
        match op {
            token::T_VIDX | token::T_SVIDX => {
                out.push_str(&format!("({}) ", detokenize_index(buf, &mut p)));
            }
            token::T_ENDX => p += 1,
            _ => {
                out.push_str(&detokenize_token(buf, &mut p));
                out.push(' ');
            }
        }
    }
    out.trim_end().to_string()
}

/// Detokenize a `T_VIDX`/`T_SVIDX` opcode and its inline subexpression up
/// to (and consuming) the matching `T_ENDX`, returning just the
/// subexpression text (the caller wraps it in parens).
fn detokenize_index(buf: &[u8], p: &mut usize) -> String {
    *p += 1; // T_VIDX / T_SVIDX
    let mut inner = Vec::new();
    loop {
        if buf[*p] == token::T_ENDX {
            *p += 1;
            break;
        }
        inner.push(detokenize_token(buf, p));
    }
    inner.join(" ")
}

/// Detokenize exactly one non-composite token at `*p`, advancing `*p` past it.
fn detokenize_token(buf: &[u8], p: &mut usize) -> String {
    let op = buf[*p];
    if let Some(kw) = keyword_by_token(op) {
        *p += 1;
        return kw.name.to_string();
    }
    if let Some(sym) = operator_text(op) {
        *p += 1;
        return sym.to_string();
    }
    match op {
        token::T_NUM => {
            let bytes: [u8; 8] = buf[*p + 1..*p + 9].try_into().unwrap();
            *p += 9;
            format!("{}", f64::from_le_bytes(bytes))
        }
        token::T_STR => {
            let len = buf[*p + 1] as usize;
            let text = String::from_utf8_lossy(&buf[*p + 2..*p + 2 + len]).into_owned();
            *p += 2 + len;
            format!("\"{}\"", text)
        }
        token::T_VAR => {
            let idx = buf[*p + 1];
            *p += 2;
            ((b'A' + idx - 1) as char).to_string()
        }
        token::T_SVAR => {
            let idx = buf[*p + 1];
            *p += 2;
            format!("{}$", (b'A' + idx - 1) as char)
        }
        _ => {
            *p += 1;
            String::new()
        }
    }
}

/// One mnemonic per token, space-separated, for `--dump`.
fn disassemble_line(buf: &[u8], pos: usize) -> String {
    let mut parts = Vec::new();
    let mut p = pos;
    while let Some(&op) = buf.get(p) {
        if op == token::T_EOL {
            parts.push("EOL".to_string());
            break;
        }
        let next = token::skip_token(buf, p).unwrap_or(p + 1);
        let mnemonic = if let Some(kw) = keyword_by_token(op) {
            kw.name.to_string()
        } else if let Some(sym) = operator_text(op) {
            sym.to_string()
        } else {
            match op {
                token::T_NUM => {
                    let bytes: [u8; 8] = buf[p + 1..p + 9].try_into().unwrap();
                    format!("NUM<{}>", f64::from_le_bytes(bytes))
                }
                token::T_STR => {
                    let len = buf[p + 1] as usize;
                    format!("STR<{}>", String::from_utf8_lossy(&buf[p + 2..p + 2 + len]))
                }
                token::T_VAR => format!("VAR<{}>", (b'A' + buf[p + 1] - 1) as char),
                token::T_SVAR => format!("SVAR<{}$>", (b'A' + buf[p + 1] - 1) as char),
                token::T_VIDX => "VIDX".to_string(),
                token::T_SVIDX => "SVIDX".to_string(),
                token::T_ENDX => "ENDX".to_string(),
                _ => format!("{:#04x}", op),
            }
        };
        parts.push(mnemonic);
        p = next;
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BufferHost;

    #[test]
    fn loads_runs_and_lists_a_small_program() {
        let mut interp = Interpreter::new(Box::new(BufferHost::default()));
        interp.load_source("10 A=1\n20 B=2\n30 PRINT A+B\n").unwrap();
        interp.run().unwrap();
        let listing = interp.list();
        assert!(listing.contains("10 A = 1"));
        assert!(listing.contains("30 PRINT A + B"));
    }

    #[test]
    fn dump_shows_mnemonics_for_each_token() {
        let mut interp = Interpreter::new(Box::new(BufferHost::default()));
        interp.load_source("10 PRINT 3\n").unwrap();
        let dump = interp.dump();
        assert!(dump.contains("PRINT"));
        assert!(dump.contains("NUM<3>"));
        assert!(dump.contains("EOL"));
    }

    #[test]
    fn aread_preload_feeds_the_register() {
        let mut interp = Interpreter::new(Box::new(BufferHost::default()));
        interp.load_source("10 AREAD A\n").unwrap();
        interp.set_aread_value(42.0);
        interp.run().unwrap();
    }

    #[test]
    fn empty_and_whitespace_lines_are_skipped() {
        let mut interp = Interpreter::new(Box::new(BufferHost::default()));
        interp.load_source("10 A=1\n\n   \n20 END\n").unwrap();
        assert!(interp.list().contains("10 A = 1"));
    }

    #[test]
    fn a_bad_line_number_attributes_the_load_error_to_its_own_line() {
        let mut interp = Interpreter::new(Box::new(BufferHost::default()));
        let err = interp.load_source("10 A=1\n2000 PRINT A\n").unwrap_err();
        assert_eq!(err.error, BasicError::BadLineNumber);
        assert_eq!(err.line, 2000);
    }
}
