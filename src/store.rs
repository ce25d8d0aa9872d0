//! # Program store
//!
//! Owns the 2048-byte record buffer (spec §4.1) and the 512-cell variable
//! array (spec §3 "Variables"). Records are kept in strictly ascending
//! line-number order; `add_line`/`delete_line` memmove the tail of the
//! buffer to make or close a gap, exactly as the reference implementation's
//! `program_add_line`/`program_delete_line` do on a `uint8_t[]`.

use crate::error::BasicError;
use crate::token::{self, LABEL_MAX, LINE_NUM_MAX, PROG_MAX_BYTES, STR_MAX, VARS_MAX};
use log::debug;

/// A tagged variable cell: spec §3 "Each slot is a tagged cell
/// {number | string}. Writing a cell overwrites both tag and payload."
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Num(f64),
    Str(String),
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Num(0.0)
    }
}

impl Cell {
    pub fn as_num(&self) -> Result<f64, BasicError> {
        match self {
            Cell::Num(n) => Ok(*n),
            Cell::Str(_) => Err(BasicError::TypeMismatch),
        }
    }
    pub fn as_str(&self) -> Result<&str, BasicError> {
        match self {
            Cell::Str(s) => Ok(s.as_str()),
            Cell::Num(_) => Err(BasicError::TypeMismatch),
        }
    }
}

/// Uppercase and truncate to the 7-character string-cell limit, per
/// spec §3 "string (<= 7 chars, uppercase)".
pub fn clamp_string(s: &str) -> String {
    s.to_uppercase().chars().take(STR_MAX).collect()
}

/// One decoded record header: byte offset of the record, its declared
/// length, and the line number it carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHandle {
    pub offset: usize,
    pub record_len: u16,
    pub line_number: u16,
}

pub struct ProgramStore {
    buf: Vec<u8>,
    labels: Vec<(String, u16)>,
    pub vars: [Cell; VARS_MAX + 1], // 1-indexed; index 0 unused
}

impl Default for ProgramStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramStore {
    pub fn new() -> Self {
        ProgramStore {
            buf: Vec::with_capacity(PROG_MAX_BYTES),
            labels: Vec::new(),
            vars: std::array::from_fn(|_| Cell::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Read the record header at `offset`: `u16 record_len | u16 line_number`.
    fn header_at(&self, offset: usize) -> LineHandle {
        let record_len = u16::from_le_bytes([self.buf[offset], self.buf[offset + 1]]);
        let line_number = u16::from_le_bytes([self.buf[offset + 2], self.buf[offset + 3]]);
        LineHandle { offset, record_len, line_number }
    }

    /// Byte offset of the first token following a record's 4-byte header.
    pub fn tokens_of(&self, handle: LineHandle) -> usize {
        handle.offset + 4
    }

    pub fn first_line(&self) -> Option<LineHandle> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.header_at(0))
        }
    }

    pub fn next_line(&self, handle: LineHandle) -> Option<LineHandle> {
        let next_offset = handle.offset + handle.record_len as usize;
        if next_offset >= self.buf.len() {
            None
        } else {
            Some(self.header_at(next_offset))
        }
    }

    pub fn is_last_line(&self, handle: LineHandle) -> bool {
        handle.offset + handle.record_len as usize >= self.buf.len()
    }

    pub fn find_line(&self, line_number: u16) -> Option<LineHandle> {
        let mut cur = self.first_line();
        while let Some(h) = cur {
            if h.line_number == line_number {
                return Some(h);
            }
            if h.line_number > line_number {
                return None;
            }
            cur = self.next_line(h);
        }
        None
    }

    /// Insert (or, if `line_number` already exists, replace) a record.
    /// `tokens` excludes the terminating `T_EOL`, which is appended here.
    pub fn add_line(&mut self, line_number: u16, tokens: &[u8]) -> Result<(), BasicError> {
        if line_number < 1 || line_number > LINE_NUM_MAX {
            return Err(BasicError::BadLineNumber);
        }

        // record_len covers itself (u16) + line_number (u16) + tokens + T_EOL
        let record_len = 4 + tokens.len() + 1;
        let existing_len = self.find_line(line_number).map(|h| h.record_len as usize).unwrap_or(0);
        let new_total = self.buf.len() - existing_len + record_len;
        if new_total > PROG_MAX_BYTES {
            return Err(BasicError::ProgramTooLarge);
        }

        self.delete_line(line_number);

        let insert_at = {
            let mut cur = self.first_line();
            let mut at = self.buf.len();
            while let Some(h) = cur {
                if h.line_number > line_number {
                    at = h.offset;
                    break;
                }
                cur = self.next_line(h);
            }
            at
        };

        let mut record = Vec::with_capacity(record_len);
        record.extend_from_slice(&(record_len as u16).to_le_bytes());
        record.extend_from_slice(&line_number.to_le_bytes());
        record.extend_from_slice(tokens);
        record.push(token::T_EOL);

        self.buf.splice(insert_at..insert_at, record);
        debug!("inserted line {} ({} bytes) at offset {}", line_number, record_len, insert_at);

        if tokens.first() == Some(&token::T_STR) {
            if let Some(len) = tokens.get(1).copied() {
                let len = len as usize;
                if let Some(bytes) = tokens.get(2..2 + len) {
                    if let Ok(label) = std::str::from_utf8(bytes) {
                        self.set_label(&label[..label.len().min(LABEL_MAX)], line_number);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn delete_line(&mut self, line_number: u16) -> bool {
        if let Some(h) = self.find_line(line_number) {
            let end = h.offset + h.record_len as usize;
            self.buf.drain(h.offset..end);
            debug!("deleted line {}", line_number);
            true
        } else {
            false
        }
    }

    fn set_label(&mut self, label: &str, line_number: u16) {
        if let Some(entry) = self.labels.iter_mut().find(|(l, _)| l == label) {
            entry.1 = line_number;
        } else {
            self.labels.push((label.to_string(), line_number));
        }
    }

    pub fn find_label(&self, label: &str) -> Option<u16> {
        self.labels
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, n)| *n)
    }

    /// Reset all 512 variable cells to numeric 0, per spec §4.3.3 `CLEAR`.
    pub fn clear_vars(&mut self) {
        for cell in self.vars.iter_mut().skip(1) {
            *cell = Cell::Num(0.0);
        }
    }

    pub fn var(&self, index: usize) -> Result<&Cell, BasicError> {
        if index < 1 || index > VARS_MAX {
            Err(BasicError::IndexOutOfRange)
        } else {
            Ok(&self.vars[index])
        }
    }

    pub fn set_var(&mut self, index: usize, cell: Cell) -> Result<(), BasicError> {
        if index < 1 || index > VARS_MAX {
            Err(BasicError::IndexOutOfRange)
        } else {
            self.vars[index] = cell;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num_line(tok: &[u8]) -> Vec<u8> {
        tok.to_vec()
    }

    #[test]
    fn insertion_order_independent_of_add_order() {
        let mut s = ProgramStore::new();
        s.add_line(30, &num_line(&[token::T_END])).unwrap();
        s.add_line(10, &num_line(&[token::T_END])).unwrap();
        s.add_line(20, &num_line(&[token::T_END])).unwrap();

        let mut seen = Vec::new();
        let mut cur = s.first_line();
        while let Some(h) = cur {
            seen.push(h.line_number);
            cur = s.next_line(h);
        }
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[test]
    fn replacing_a_line_changes_length_by_the_size_delta() {
        let mut s = ProgramStore::new();
        let old_tokens = [token::T_END];
        let new_tokens = [token::T_NUM, 0, 0, 0, 0, 0, 0, 0, 0];
        s.add_line(10, &old_tokens).unwrap();
        let len_before = s.len();
        s.add_line(10, &new_tokens).unwrap();
        let len_after = s.len();
        let old_record_len = 4 + old_tokens.len() + 1;
        let new_record_len = 4 + new_tokens.len() + 1;
        assert_eq!(len_after as i64 - len_before as i64, (new_record_len - old_record_len) as i64);
    }

    #[test]
    fn deleting_closes_the_gap() {
        let mut s = ProgramStore::new();
        s.add_line(10, &[token::T_END]).unwrap();
        s.add_line(20, &[token::T_END]).unwrap();
        assert!(s.delete_line(10));
        assert!(s.find_line(10).is_none());
        assert!(s.find_line(20).is_some());
    }

    #[test]
    fn rejects_out_of_range_line_numbers() {
        let mut s = ProgramStore::new();
        assert_eq!(s.add_line(0, &[token::T_END]), Err(BasicError::BadLineNumber));
        assert_eq!(s.add_line(1000, &[token::T_END]), Err(BasicError::BadLineNumber));
    }

    #[test]
    fn rejects_program_larger_than_buffer() {
        let mut s = ProgramStore::new();
        let huge = vec![token::T_STR, 0]; // cheap filler token
        let mut n = 1u16;
        loop {
            if s.add_line(n, &huge).is_err() {
                break;
            }
            n += 1;
            if n > 999 {
                panic!("buffer never filled");
            }
        }
    }

    #[test]
    fn indexed_and_named_variable_share_storage() {
        let mut s = ProgramStore::new();
        s.set_var(2, Cell::Num(42.0)).unwrap(); // B == A(2)
        assert_eq!(s.var(2).unwrap().as_num().unwrap(), 42.0);
    }

    #[test]
    fn label_registered_from_leading_string_literal() {
        let mut s = ProgramStore::new();
        let mut tokens = vec![token::T_STR, 4];
        tokens.extend_from_slice(b"LOOP");
        s.add_line(10, &tokens).unwrap();
        assert_eq!(s.find_label("LOOP"), Some(10));
    }
}
