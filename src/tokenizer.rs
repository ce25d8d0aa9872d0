//! # Tokenizer
//!
//! Source text -> byte encoding, per spec §4.2. One `Tokenizer` is built per
//! source line; `tokenize_source_line` handles the "strip leading line
//! number, then tokenize the remainder" pipeline spec §4.2 describes, and
//! hands the caller `(line_number, tokens)` ready for
//! `ProgramStore::add_line`.

use crate::error::BasicError;
use crate::store::clamp_string;
use crate::token::{self, Keyword, STR_MAX, TOKBUF_LINE_MAX};
use log::trace;

type R<T> = Result<T, BasicError>;

/// Split `"10 PRINT A"` into `(10, "PRINT A")`. A missing, non-numeric, or
/// malformed leading line number is a `SyntaxError` — range validation
/// against 1..=999 is `ProgramStore::add_line`'s job (spec §4.1).
pub fn split_line_number(line: &str) -> R<(u16, &str)> {
    let line = line.trim_start();
    let digits_end = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
    if digits_end == 0 {
        return Err(BasicError::SyntaxError);
    }
    let n: u32 = line[..digits_end].parse().map_err(|_| BasicError::SyntaxError)?;
    if n == 0 || n > u16::MAX as u32 {
        return Err(BasicError::SyntaxError);
    }
    Ok((n as u16, line[digits_end..].trim_start()))
}

/// Tokenize one already-line-number-stripped statement list. Returns the
/// token bytes (without the trailing `T_EOL` — `ProgramStore::add_line`
/// appends that).
pub fn tokenize_statements(rest: &str) -> R<Vec<u8>> {
    let mut lexer = Lexer { src: rest.as_bytes(), pos: 0, out: Vec::new() };
    lexer.run()?;
    Ok(lexer.out)
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    out: Vec<u8>,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.src.get(self.pos + off).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn emit(&mut self, op: u8) -> R<()> {
        if self.out.len() + 1 > TOKBUF_LINE_MAX {
            return Err(BasicError::LineTooLong);
        }
        self.out.push(op);
        Ok(())
    }

    fn emit_u8(&mut self, op: u8, data: u8) -> R<()> {
        if self.out.len() + 2 > TOKBUF_LINE_MAX {
            return Err(BasicError::LineTooLong);
        }
        self.out.push(op);
        self.out.push(data);
        Ok(())
    }

    fn emit_num(&mut self, value: f64) -> R<()> {
        if self.out.len() + 9 > TOKBUF_LINE_MAX {
            return Err(BasicError::LineTooLong);
        }
        self.out.push(token::T_NUM);
        self.out.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn emit_str(&mut self, op: u8, text: &str) -> R<()> {
        let clamped = clamp_string(text);
        let bytes = clamped.as_bytes();
        if self.out.len() + 2 + bytes.len() > TOKBUF_LINE_MAX {
            return Err(BasicError::LineTooLong);
        }
        self.out.push(op);
        self.out.push(bytes.len() as u8);
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    fn run(&mut self) -> R<()> {
        self.skip_whitespace();

        // REM handling (spec §4.2): only recognized as the line's first token.
        if self.looks_like_rem() {
            self.pos += 3;
            self.skip_whitespace();
            self.emit(token::T_REM)?;
            let remainder = std::str::from_utf8(&self.src[self.pos..]).unwrap_or("");
            let trimmed = remainder.trim_end_matches([' ', '\t']);
            if !trimmed.is_empty() {
                self.emit_str(token::T_STR, trimmed)?;
            }
            self.pos = self.src.len();
            return Ok(());
        }

        while self.pos < self.src.len() {
            self.skip_whitespace();
            if self.pos >= self.src.len() {
                break;
            }
            self.lex_one()?;
        }
        Ok(())
    }

    fn looks_like_rem(&self) -> bool {
        let word = &self.src[self.pos..];
        word.len() >= 3
            && word[..3].eq_ignore_ascii_case(b"REM")
            && matches!(word.get(3), None | Some(b' ') | Some(b'\t'))
    }

    fn lex_one(&mut self) -> R<()> {
        match self.peek().unwrap() {
            b'"' => self.lex_string(),
            c if c.is_ascii_digit() || c == b'.' => self.lex_number(),
            c if c.is_ascii_alphabetic() => self.lex_ident(),
            _ => self.lex_operator(),
        }
    }

    fn lex_string(&mut self) -> R<()> {
        self.pos += 1; // opening quote
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != b'"') {
            self.pos += 1;
        }
        if self.peek() != Some(b'"') {
            return Err(BasicError::SyntaxError);
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).map_err(|_| BasicError::SyntaxError)?;
        self.pos += 1; // closing quote
        self.emit_str(token::T_STR, text)
    }

    /// Greedy double literal: digits, optional `.digits`, optional exponent.
    fn lex_number(&mut self) -> R<()> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save; // not actually an exponent, back off
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        let value: f64 = text.parse().map_err(|_| BasicError::SyntaxError)?;
        trace!("numeric literal {}", value);
        self.emit_num(value)
    }

    /// Greedy alpha + `.` run: a keyword/abbreviation, or a single A..Z
    /// variable name (optionally followed by `$` and/or `(expr)`).
    fn lex_ident(&mut self) -> R<()> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic() || c == b'.') {
            self.pos += 1;
        }
        let word = std::str::from_utf8(&self.src[start..self.pos]).unwrap();

        if let Some(kw) = token::find_keyword(word) {
            return self.emit_keyword(kw);
        }

        if word.len() == 1 {
            let c = word.as_bytes()[0].to_ascii_uppercase();
            if c.is_ascii_uppercase() {
                return self.lex_variable(c);
            }
        }

        Err(BasicError::SyntaxError)
    }

    fn emit_keyword(&mut self, kw: &Keyword) -> R<()> {
        trace!("keyword {} -> opcode {:#04x}", kw.name, kw.token);
        match kw.token {
            token::T_GOTO | token::T_GOSUB | token::T_THEN => {
                self.emit(kw.token)?;
                self.skip_whitespace();
                // GOTO/GOSUB/THEN targets are full expressions (numeric or
                // label) in this dialect; fall through to ordinary lexing of
                // whatever follows on the line.
                Ok(())
            }
            _ => self.emit(kw.token),
        }
    }

    fn lex_variable(&mut self, letter: u8) -> R<()> {
        let idx = letter - b'A' + 1;
        let is_string = self.peek() == Some(b'$');
        if is_string {
            self.pos += 1;
        }
        if self.peek() == Some(b'(') {
            self.pos += 1; // consume '('
            self.emit(if is_string { token::T_SVIDX } else { token::T_VIDX })?;
            self.lex_paren_expr()?;
            self.emit(token::T_ENDX)
        } else {
            self.emit_u8(if is_string { token::T_SVAR } else { token::T_VAR }, idx)
        }
    }

    /// Tokenize the contents of `A(...)` up to (and consuming) the matching `)`.
    fn lex_paren_expr(&mut self) -> R<()> {
        let mut depth = 1i32;
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(BasicError::SyntaxError),
                Some(b')') => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(());
                    }
                    self.emit(token::T_RP)?;
                }
                Some(b'(') => {
                    depth += 1;
                    self.pos += 1;
                    self.emit(token::T_LP)?;
                }
                _ => self.lex_one()?,
            }
        }
    }

    fn lex_operator(&mut self) -> R<()> {
        let c1 = self.peek().unwrap();
        let c2 = self.peek_at(1);
        let (op, width) = match (c1, c2) {
            (b'<', Some(b'=')) => (token::T_LE, 2),
            (b'>', Some(b'=')) => (token::T_GE, 2),
            (b'<', Some(b'>')) => (token::T_NE, 2),
            (b'=', _) => (token::T_EQ_ASSIGN, 1),
            (b'+', _) => (token::T_PLUS, 1),
            (b'-', _) => (token::T_MINUS, 1),
            (b'*', _) => (token::T_MUL, 1),
            (b'/', _) => (token::T_DIV, 1),
            (b'^', _) => (token::T_POW, 1),
            (b'(', _) => (token::T_LP, 1),
            (b')', _) => (token::T_RP, 1),
            (b',', _) => (token::T_COMMA, 1),
            (b';', _) => (token::T_SEMI, 1),
            (b':', _) => (token::T_COLON, 1),
            (b'<', _) => (token::T_LT, 1),
            (b'>', _) => (token::T_GT, 1),
            _ => return Err(BasicError::SyntaxError),
        };
        self.pos += width;
        self.emit(op)
    }
}

pub const STR_LITERAL_MAX: usize = STR_MAX;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::*;

    fn toks(src: &str) -> Vec<u8> {
        tokenize_statements(src).unwrap()
    }

    #[test]
    fn strips_line_number() {
        let (n, rest) = split_line_number("  10 PRINT A").unwrap();
        assert_eq!(n, 10);
        assert_eq!(rest, "PRINT A");
    }

    #[test]
    fn rejects_missing_line_number() {
        assert_eq!(split_line_number("PRINT A").unwrap_err(), BasicError::SyntaxError);
    }

    #[test]
    fn numeric_assignment_roundtrips() {
        let out = toks("A=1");
        assert_eq!(out[0], T_VAR);
        assert_eq!(out[1], 1);
        assert_eq!(out[2], T_EQ_ASSIGN);
        assert_eq!(out[3], T_NUM);
        assert_eq!(f64::from_le_bytes(out[4..12].try_into().unwrap()), 1.0);
    }

    #[test]
    fn abbreviated_keyword_recognized() {
        let out = toks("P. A");
        assert_eq!(out[0], T_PRINT);
    }

    #[test]
    fn string_literal_uppercased_and_clamped() {
        let out = toks(r#"A$="toolongstring""#);
        assert_eq!(out[0], T_SVAR);
        assert_eq!(out[2], T_EQ_ASSIGN);
        assert_eq!(out[3], T_STR);
        let len = out[4] as usize;
        assert_eq!(len, 7);
        let s = std::str::from_utf8(&out[5..5 + len]).unwrap();
        assert_eq!(s, "TOOLONG");
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        assert_eq!(tokenize_statements(r#"PRINT "oops"#).unwrap_err(), BasicError::SyntaxError);
    }

    #[test]
    fn indexed_variable_wraps_subexpression_in_endx() {
        let out = toks("A(1+2)=3");
        assert_eq!(out[0], T_VIDX);
        // T_NUM<1.0> T_PLUS T_NUM<2.0> T_ENDX
        assert_eq!(out[9], T_PLUS);
        assert_eq!(out[10], T_NUM);
        assert_eq!(out[19], T_ENDX);
        assert_eq!(out[20], T_EQ_ASSIGN);
    }

    #[test]
    fn rem_consumes_rest_of_line_as_clamped_string() {
        let out = toks("REM this is a long remark");
        assert_eq!(out[0], T_REM);
        assert_eq!(out[1], T_STR);
        let len = out[2] as usize;
        assert_eq!(len, 7);
    }

    #[test]
    fn goto_target_may_be_general_expression() {
        let out = toks("GOTO 10+10");
        assert_eq!(out[0], T_GOTO);
        assert_eq!(out[1], T_NUM);
    }

    #[test]
    fn line_too_long_when_token_budget_exceeded() {
        let long = "PRINT ".to_string() + &"1+".repeat(200) + "1";
        assert_eq!(tokenize_statements(&long).unwrap_err(), BasicError::LineTooLong);
    }
}
