//! # Virtual machine
//!
//! Program-counter-driven statement executor, grounded on the reference
//! implementation's `vm_execute_statement` switch and its per-opcode
//! `execute_*` helpers in `vm.c`. The C original tracks a single global
//! error flag and keeps running statements around it; this translation
//! propagates `Result<_, BasicError>` instead, which is also what lets
//! `exec::execute_if`'s no-`THEN` form do one evaluation pass instead of
//! the original's evaluate-twice-to-relocate-the-statement trick.

mod eval;
mod exec;
mod stacks;

use crate::host::Host;
use crate::store::ProgramStore;
use stacks::{CallStack, ExprDepth, ForStack};

pub use stacks::{CallFrame, ForFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleMode {
    Radian,
    Degree,
    Grad,
}

/// The value left behind by the host's "previous screen value", consumed
/// (and cleared) by `AREAD`. Mirrors the original's `g_aread_value` /
/// `g_aread_string` / `g_aread_is_string` trio as one enum.
#[derive(Debug, Clone, PartialEq)]
pub enum AreadRegister {
    Num(f64),
    Str(String),
}

impl Default for AreadRegister {
    fn default() -> Self {
        AreadRegister::Num(0.0)
    }
}

pub struct Vm {
    pub pc: usize,
    pub current_line: u16,
    pub running: bool,
    pub angle_mode: AngleMode,
    pub aread: AreadRegister,
    call_stack: CallStack,
    for_stack: ForStack,
    depth: ExprDepth,
}

impl Default for Vm {
    fn default() -> Self {
        Vm {
            pc: 0,
            current_line: 0,
            running: false,
            angle_mode: AngleMode::Radian,
            aread: AreadRegister::default(),
            call_stack: CallStack::default(),
            for_stack: ForStack::default(),
            depth: ExprDepth::default(),
        }
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position the VM at a line's first token and mark it running.
    pub fn start_at(&mut self, store: &ProgramStore) -> Result<(), crate::error::BasicError> {
        let first = store.first_line().ok_or(crate::error::BasicError::SyntaxError)?;
        self.pc = store.tokens_of(first);
        self.current_line = first.line_number;
        self.running = true;
        Ok(())
    }

    /// Execute statements until `END`/`STOP`, falling off the last line,
    /// or an error. `store` is mutable because assignment, `CLEAR`, and
    /// `GOTO`/`GOSUB`-via-label touch it.
    pub fn run(&mut self, store: &mut ProgramStore, host: &mut dyn Host) -> Result<(), crate::error::LineError> {
        while self.running {
            self.step(store, host).map_err(|error| crate::error::LineError { error, line: self.current_line })?;
        }
        Ok(())
    }

    fn step(&mut self, store: &mut ProgramStore, host: &mut dyn Host) -> Result<(), crate::error::BasicError> {
        exec::execute_statement(self, store, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BasicError;
    use crate::host::BufferHost;
    use crate::token;

    fn single_line_program(tokens: &[u8]) -> ProgramStore {
        let mut s = ProgramStore::new();
        s.add_line(10, tokens).unwrap();
        s
    }

    #[test]
    fn runs_print_of_a_literal_and_halts_at_program_end() {
        let mut tokens = vec![token::T_PRINT, token::T_NUM];
        tokens.extend_from_slice(&3.0f64.to_le_bytes());
        let mut store = single_line_program(&tokens);
        let mut vm = Vm::new();
        let mut host = BufferHost::default();
        vm.start_at(&store).unwrap();
        vm.run(&mut store, &mut host).unwrap();
        assert_eq!(host.output, "3\n");
    }

    #[test]
    fn division_by_zero_reports_the_current_line() {
        let mut tokens = vec![token::T_VAR, 1, token::T_EQ_ASSIGN, token::T_NUM];
        tokens.extend_from_slice(&1.0f64.to_le_bytes());
        tokens.push(token::T_DIV);
        tokens.push(token::T_NUM);
        tokens.extend_from_slice(&0.0f64.to_le_bytes());
        let mut store = single_line_program(&tokens);
        let mut vm = Vm::new();
        let mut host = BufferHost::default();
        vm.start_at(&store).unwrap();
        let err = vm.run(&mut store, &mut host).unwrap_err();
        assert_eq!(err.error, BasicError::DivisionByZero);
        assert_eq!(err.line, 10);
    }
}
