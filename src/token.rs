//! # Token alphabet
//!
//! The one-byte opcode set of spec §3 "Token alphabet", plus the
//! keyword table the tokenizer and its abbreviation lookup share. Byte
//! values match the reference implementation's `opcodes.h` so a `--dump`
//! disassembly reads the same way.

#![allow(non_upper_case_globals)]

pub const T_EOL: u8 = 0x00;
pub const T_NUM: u8 = 0x01;
pub const T_STR: u8 = 0x02;
pub const T_VAR: u8 = 0x03;
pub const T_VIDX: u8 = 0x04;
pub const T_SVAR: u8 = 0x05;
pub const T_SVIDX: u8 = 0x06;
pub const T_ENDX: u8 = 0xFF;

pub const T_EQ_ASSIGN: u8 = 0x10;
pub const T_PLUS: u8 = 0x11;
pub const T_MINUS: u8 = 0x12;
pub const T_MUL: u8 = 0x13;
pub const T_DIV: u8 = 0x14;
pub const T_POW: u8 = 0x15;
pub const T_LP: u8 = 0x16;
pub const T_RP: u8 = 0x17;
pub const T_COMMA: u8 = 0x18;
pub const T_SEMI: u8 = 0x19;
pub const T_COLON: u8 = 0x1A;

pub const T_EQ: u8 = 0x1B;
pub const T_NE: u8 = 0x1C;
pub const T_LT: u8 = 0x1D;
pub const T_LE: u8 = 0x1E;
pub const T_GT: u8 = 0x1F;
pub const T_GE: u8 = 0x20;

pub const T_SIN: u8 = 0x30;
pub const T_COS: u8 = 0x31;
pub const T_TAN: u8 = 0x32;
pub const T_ASN: u8 = 0x33;
pub const T_ACS: u8 = 0x34;
pub const T_ATN: u8 = 0x35;
pub const T_LOG: u8 = 0x36;
pub const T_LN: u8 = 0x37;
pub const T_EXP: u8 = 0x38;
pub const T_SQR: u8 = 0x39;
pub const T_DMS: u8 = 0x3A;
pub const T_DEG: u8 = 0x3B;
pub const T_INT: u8 = 0x3C;
pub const T_ABS: u8 = 0x3D;
pub const T_SGN: u8 = 0x3E;

pub const T_LET: u8 = 0x40;
pub const T_PRINT: u8 = 0x41;
pub const T_INPUT: u8 = 0x42;
pub const T_IF: u8 = 0x43;
pub const T_THEN: u8 = 0x44;
pub const T_GOTO: u8 = 0x45;
pub const T_GOSUB: u8 = 0x46;
pub const T_RETURN: u8 = 0x47;
pub const T_FOR: u8 = 0x48;
pub const T_TO: u8 = 0x49;
pub const T_STEP: u8 = 0x4A;
pub const T_NEXT: u8 = 0x4B;
pub const T_END: u8 = 0x4C;
pub const T_STOP: u8 = 0x4D;
pub const T_REM: u8 = 0x4E;

pub const T_DEGREE: u8 = 0x50;
pub const T_RADIAN: u8 = 0x51;
pub const T_GRAD: u8 = 0x52;
pub const T_CLEAR: u8 = 0x53;
pub const T_BEEP: u8 = 0x54;
pub const T_PAUSE: u8 = 0x55;
pub const T_AREAD: u8 = 0x56;
pub const T_USING: u8 = 0x57;

/// Static memory limits, spec §3/§4.
pub const PROG_MAX_BYTES: usize = 2048;
pub const VARS_MAX: usize = 512;
pub const STR_MAX: usize = 7;
pub const CALL_STACK_MAX: usize = 16;
pub const FOR_STACK_MAX: usize = 16;
pub const EXPR_STACK_MAX: usize = 32;
pub const TOKBUF_LINE_MAX: usize = 256;
pub const LINE_NUM_MAX: u16 = 999;
pub const LABEL_MAX: usize = 7;

/// One entry in the keyword table: full spelling, optional abbreviation
/// ending in `.`, and the opcode it resolves to.
pub struct Keyword {
    pub name: &'static str,
    pub abbrev: Option<&'static str>,
    pub token: u8,
}

/// Full keyword table, statements/functions/modes. `DEGREE`'s abbreviation
/// `DEG.` is distinct from the bare `DEG` function name by virtue of the
/// trailing dot, so the two never collide in lookup.
pub const KEYWORDS: &[Keyword] = &[
    // Functions
    Keyword { name: "SIN", abbrev: Some("SI."), token: T_SIN },
    Keyword { name: "COS", abbrev: None, token: T_COS },
    Keyword { name: "TAN", abbrev: Some("TA."), token: T_TAN },
    Keyword { name: "ASN", abbrev: Some("AS."), token: T_ASN },
    Keyword { name: "ACS", abbrev: Some("AC."), token: T_ACS },
    Keyword { name: "ATN", abbrev: Some("AT."), token: T_ATN },
    Keyword { name: "LOG", abbrev: Some("LO."), token: T_LOG },
    Keyword { name: "LN", abbrev: None, token: T_LN },
    Keyword { name: "EXP", abbrev: Some("EX."), token: T_EXP },
    Keyword { name: "SQR", abbrev: None, token: T_SQR },
    Keyword { name: "DMS", abbrev: Some("DM."), token: T_DMS },
    Keyword { name: "DEG", abbrev: None, token: T_DEG },
    Keyword { name: "INT", abbrev: None, token: T_INT },
    Keyword { name: "ABS", abbrev: Some("AB."), token: T_ABS },
    Keyword { name: "SGN", abbrev: Some("SG."), token: T_SGN },
    // Statements
    Keyword { name: "LET", abbrev: Some("LE."), token: T_LET },
    Keyword { name: "PRINT", abbrev: Some("P."), token: T_PRINT },
    Keyword { name: "INPUT", abbrev: Some("I."), token: T_INPUT },
    Keyword { name: "IF", abbrev: None, token: T_IF },
    Keyword { name: "THEN", abbrev: Some("T."), token: T_THEN },
    Keyword { name: "GOTO", abbrev: Some("G."), token: T_GOTO },
    Keyword { name: "GOSUB", abbrev: Some("GOS."), token: T_GOSUB },
    Keyword { name: "RETURN", abbrev: Some("RE."), token: T_RETURN },
    Keyword { name: "FOR", abbrev: Some("F."), token: T_FOR },
    Keyword { name: "TO", abbrev: None, token: T_TO },
    Keyword { name: "STEP", abbrev: Some("STE."), token: T_STEP },
    Keyword { name: "NEXT", abbrev: Some("N."), token: T_NEXT },
    Keyword { name: "END", abbrev: Some("E."), token: T_END },
    Keyword { name: "STOP", abbrev: Some("S."), token: T_STOP },
    Keyword { name: "REM", abbrev: None, token: T_REM },
    // Mode / device commands
    Keyword { name: "DEGREE", abbrev: Some("DEG."), token: T_DEGREE },
    Keyword { name: "RADIAN", abbrev: Some("RA."), token: T_RADIAN },
    Keyword { name: "GRAD", abbrev: None, token: T_GRAD },
    Keyword { name: "CLEAR", abbrev: Some("CL."), token: T_CLEAR },
    Keyword { name: "BEEP", abbrev: Some("B."), token: T_BEEP },
    Keyword { name: "PAUSE", abbrev: Some("PA."), token: T_PAUSE },
    Keyword { name: "AREAD", abbrev: Some("A."), token: T_AREAD },
    Keyword { name: "USING", abbrev: Some("U."), token: T_USING },
];

/// Case-insensitive lookup of a full spelling or abbreviation.
pub fn find_keyword(word: &str) -> Option<&'static Keyword> {
    KEYWORDS.iter().find(|kw| {
        word.eq_ignore_ascii_case(kw.name) || kw.abbrev.is_some_and(|a| word.eq_ignore_ascii_case(a))
    })
}

/// True for opcodes that introduce a math function (unary, parenthesized argument).
pub fn is_function(op: u8) -> bool {
    matches!(
        op,
        T_SIN | T_COS | T_TAN | T_ASN | T_ACS | T_ATN | T_LOG | T_LN | T_EXP | T_SQR | T_DMS
            | T_DEG | T_INT | T_ABS | T_SGN
    )
}

/// True for tokens that can never continue an expression — the evaluator
/// stops at any of these, per spec §4.3.2. `T_EQ_ASSIGN` is included because
/// the tokenizer only ever emits `=` as that opcode (never `T_EQ`); the
/// condition evaluator treats it as equality when it shows up inside an
/// `IF`, matching the reference VM's `T_EQ_ASSIGN`/`T_EQ` interchangeability.
pub fn terminates_expression(op: u8) -> bool {
    matches!(
        op,
        T_EOL | T_COLON | T_RP | T_COMMA | T_SEMI | T_ENDX | T_THEN | T_TO | T_STEP
            | T_EQ | T_EQ_ASSIGN | T_NE | T_LT | T_LE | T_GT | T_GE
    ) || op >= T_LET && op <= T_USING
}

/// True for the relational opcodes a condition (`IF`) accepts, including
/// the tokenizer's sole `=` spelling, `T_EQ_ASSIGN`.
pub fn is_comparison(op: u8) -> bool {
    matches!(op, T_EQ | T_EQ_ASSIGN | T_NE | T_LT | T_LE | T_GT | T_GE)
}

/// Advance past exactly one token, consuming its inline operand, without
/// evaluating it. Used by the VM to skip a condition, a `PRINT` argument it
/// doesn't need to print, or a false `IF`'s body. For `T_VIDX`/`T_SVIDX` this
/// walks the inline subexpression recursively until the matching `T_ENDX`.
///
/// `buf` is the full program buffer; `pos` is the offset of the opcode byte.
/// Returns the offset just past the token, or `None` if `pos` is out of
/// bounds (a malformed record, which should not occur given `add_line`'s
/// invariants).
pub fn skip_token(buf: &[u8], pos: usize) -> Option<usize> {
    let op = *buf.get(pos)?;
    Some(match op {
        T_EOL => pos + 1,
        T_NUM => pos + 1 + 8,
        T_STR => {
            let len = *buf.get(pos + 1)? as usize;
            pos + 2 + len
        }
        T_VAR | T_SVAR => pos + 1 + 1,
        T_VIDX | T_SVIDX => {
            let mut p = pos + 1;
            loop {
                if *buf.get(p)? == T_ENDX {
                    break p + 1;
                }
                p = skip_token(buf, p)?;
            }
        }
        _ => pos + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_full_and_abbreviated_spellings() {
        assert_eq!(find_keyword("print").unwrap().token, T_PRINT);
        assert_eq!(find_keyword("P.").unwrap().token, T_PRINT);
        assert_eq!(find_keyword("ste.").unwrap().token, T_STEP);
    }

    #[test]
    fn degree_abbrev_does_not_collide_with_deg_function() {
        assert_eq!(find_keyword("DEG").unwrap().token, T_DEG);
        assert_eq!(find_keyword("DEG.").unwrap().token, T_DEGREE);
        assert_eq!(find_keyword("DEGREE").unwrap().token, T_DEGREE);
    }

    #[test]
    fn skip_token_walks_indexed_subexpression() {
        // A(1+2) = T_VIDX T_NUM<1.0> T_PLUS T_NUM<2.0> T_ENDX
        let mut buf = vec![T_VIDX, T_NUM];
        buf.extend_from_slice(&1.0f64.to_le_bytes());
        buf.push(T_PLUS);
        buf.push(T_NUM);
        buf.extend_from_slice(&2.0f64.to_le_bytes());
        buf.push(T_ENDX);
        buf.push(T_EOL);
        let next = skip_token(&buf, 0).unwrap();
        assert_eq!(buf[next], T_EOL);
    }

    #[test]
    fn skip_token_string_uses_inline_length() {
        let buf = [T_STR, 3, b'F', b'O', b'O', T_EOL];
        assert_eq!(skip_token(&buf, 0).unwrap(), 5);
    }
}
