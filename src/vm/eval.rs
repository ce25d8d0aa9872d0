//! # Expression evaluator
//!
//! Recursive-descent evaluator operating directly on the token byte
//! stream — no AST is ever built, per spec §4.3.2. Grounded on the
//! reference implementation's `eval_expression_auto` / `eval_term_auto` /
//! `eval_power_auto` / `eval_factor_auto` family in `vm.c`, translated
//! from its error-flag-and-continue style into `Result`-propagating
//! Rust: every production returns `Result<f64, BasicError>` and the `?`
//! operator does what `if (error_get_code() != ERR_NONE) return;` did.
//! Every production reads and advances `vm.pc` directly rather than
//! threading a separate cursor, since that cursor and the VM's angle
//! mode/recursion guard are always used together here.

use super::{AngleMode, Vm};
use crate::error::BasicError;
use crate::store::{Cell, ProgramStore};
use crate::token::*;

type R<T> = Result<T, BasicError>;

fn byte(buf: &[u8], pc: usize) -> u8 {
    buf.get(pc).copied().unwrap_or(T_EOL)
}

fn angle_to_radians(mode: AngleMode, angle: f64) -> f64 {
    match mode {
        AngleMode::Degree => angle * (std::f64::consts::PI / 180.0),
        AngleMode::Grad => angle * (std::f64::consts::PI / 200.0),
        AngleMode::Radian => angle,
    }
}

fn angle_from_radians(mode: AngleMode, radians: f64) -> f64 {
    match mode {
        AngleMode::Degree => radians * (180.0 / std::f64::consts::PI),
        AngleMode::Grad => radians * (200.0 / std::f64::consts::PI),
        AngleMode::Radian => radians,
    }
}

/// Convert `DD.MMSS` sexagesimal notation to decimal degrees (the `DEG`
/// function).
fn dms_to_decimal(arg: f64) -> f64 {
    let sign = if arg < 0.0 { -1.0 } else { 1.0 };
    let abs = arg.abs();
    let degrees = abs.floor();
    let fractional = abs - degrees;
    let minutes_part = fractional * 100.0;
    let minutes = minutes_part.floor();
    let seconds_part = (minutes_part - minutes) * 100.0;
    sign * (degrees + minutes / 60.0 + seconds_part / 3600.0)
}

/// Convert decimal degrees to `DD.MMSS` sexagesimal notation (the `DMS`
/// function).
fn decimal_to_dms(arg: f64) -> f64 {
    let sign = if arg < 0.0 { -1.0 } else { 1.0 };
    let abs = arg.abs();
    let degrees = abs.floor();
    let decimal_part = abs - degrees;
    let total_minutes = decimal_part * 60.0;
    let minutes = total_minutes.floor();
    let decimal_seconds = (total_minutes - minutes) * 60.0;
    sign * (degrees + minutes / 100.0 + decimal_seconds / 10000.0)
}

/// expression := term ((`+`|`-`) term)*
pub fn eval_expression(vm: &mut Vm, store: &ProgramStore) -> R<f64> {
    vm.depth.enter()?;
    let result = (|| {
        let mut result = eval_term(vm, store)?;
        loop {
            match byte(store.bytes(), vm.pc) {
                T_PLUS => {
                    vm.pc += 1;
                    result += eval_term(vm, store)?;
                }
                T_MINUS => {
                    vm.pc += 1;
                    result -= eval_term(vm, store)?;
                }
                _ => break,
            }
        }
        Ok(result)
    })();
    vm.depth.leave();
    result
}

/// term := power ((`*`|`/`) power)*
fn eval_term(vm: &mut Vm, store: &ProgramStore) -> R<f64> {
    let mut result = eval_power(vm, store)?;
    loop {
        match byte(store.bytes(), vm.pc) {
            T_MUL => {
                vm.pc += 1;
                result *= eval_power(vm, store)?;
            }
            T_DIV => {
                vm.pc += 1;
                let divisor = eval_power(vm, store)?;
                if divisor == 0.0 {
                    return Err(BasicError::DivisionByZero);
                }
                result /= divisor;
            }
            _ => break,
        }
    }
    Ok(result)
}

/// power := factor (`^` power)?  — right-associative.
fn eval_power(vm: &mut Vm, store: &ProgramStore) -> R<f64> {
    let base = eval_factor(vm, store)?;
    if byte(store.bytes(), vm.pc) == T_POW {
        vm.pc += 1;
        let exponent = eval_power(vm, store)?;
        let result = base.powf(exponent);
        if !result.is_finite() {
            return Err(BasicError::MathOverflow);
        }
        Ok(result)
    } else {
        Ok(base)
    }
}

fn read_num_literal(vm: &mut Vm, store: &ProgramStore) -> R<f64> {
    let bytes: [u8; 8] =
        store.bytes().get(vm.pc..vm.pc + 8).ok_or(BasicError::SyntaxError)?.try_into().unwrap();
    vm.pc += 8;
    Ok(f64::from_le_bytes(bytes))
}

fn numeric_var(store: &ProgramStore, idx: u8) -> R<f64> {
    store.var(idx as usize)?.as_num()
}

/// Functions requiring a parenthesized argument, with the angle/domain
/// rules `eval_factor_auto`'s per-opcode match applies.
fn eval_function(vm: &mut Vm, store: &ProgramStore, op: u8) -> R<f64> {
    if byte(store.bytes(), vm.pc) != T_LP {
        return Err(BasicError::SyntaxError);
    }
    vm.pc += 1;
    let arg = eval_expression(vm, store)?;
    if byte(store.bytes(), vm.pc) == T_RP {
        vm.pc += 1;
    } else {
        return Err(BasicError::SyntaxError);
    }

    Ok(match op {
        T_SIN => angle_to_radians(vm.angle_mode, arg).sin(),
        T_COS => angle_to_radians(vm.angle_mode, arg).cos(),
        T_TAN => angle_to_radians(vm.angle_mode, arg).tan(),
        T_ASN => {
            if !(-1.0..=1.0).contains(&arg) {
                return Err(BasicError::MathDomain);
            }
            angle_from_radians(vm.angle_mode, arg.asin())
        }
        T_ACS => {
            if !(-1.0..=1.0).contains(&arg) {
                return Err(BasicError::MathDomain);
            }
            angle_from_radians(vm.angle_mode, arg.acos())
        }
        T_ATN => angle_from_radians(vm.angle_mode, arg.atan()),
        T_LOG => {
            if arg <= 0.0 {
                return Err(BasicError::MathDomain);
            }
            arg.log10()
        }
        T_LN => {
            if arg <= 0.0 {
                return Err(BasicError::MathDomain);
            }
            arg.ln()
        }
        T_EXP => {
            let result = arg.exp();
            if !result.is_finite() {
                return Err(BasicError::MathOverflow);
            }
            result
        }
        T_SQR => {
            if arg < 0.0 {
                return Err(BasicError::MathDomain);
            }
            arg.sqrt()
        }
        T_ABS => arg.abs(),
        T_INT => arg.floor(),
        T_SGN => {
            if arg < 0.0 {
                -1.0
            } else if arg > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        T_DMS => decimal_to_dms(arg),
        T_DEG => dms_to_decimal(arg),
        _ => unreachable!("eval_function called with non-function opcode"),
    })
}

/// factor := number | var | var`(`expr`)` | `(`expr`)` | `-`factor | function`(`expr`)`
fn eval_factor(vm: &mut Vm, store: &ProgramStore) -> R<f64> {
    let op = byte(store.bytes(), vm.pc);
    match op {
        T_NUM => {
            vm.pc += 1;
            read_num_literal(vm, store)
        }
        T_VAR => {
            vm.pc += 1;
            let idx = byte(store.bytes(), vm.pc);
            vm.pc += 1;
            numeric_var(store, idx)
        }
        T_VIDX => {
            vm.pc += 1;
            let index_val = eval_expression(vm, store)?;
            if byte(store.bytes(), vm.pc) == T_ENDX {
                vm.pc += 1;
            }
            store.var(index_of(index_val))?.as_num()
        }
        T_LP => {
            vm.pc += 1;
            let result = eval_expression(vm, store)?;
            if byte(store.bytes(), vm.pc) == T_RP {
                vm.pc += 1;
            } else {
                return Err(BasicError::SyntaxError);
            }
            Ok(result)
        }
        T_MINUS => {
            vm.pc += 1;
            Ok(-eval_factor(vm, store)?)
        }
        _ if is_function(op) => {
            vm.pc += 1;
            eval_function(vm, store, op)
        }
        _ => Err(BasicError::SyntaxError),
    }
}

/// Evaluate an `A(expr)`/`A$(expr)` index: truncate toward zero into a
/// `usize`, letting `ProgramStore::var`'s own bounds check raise
/// `IndexOutOfRange` for anything outside `1..=VARS_MAX`. A negative or
/// absurdly large truncation saturates rather than wrapping, so it still
/// lands on the bounds check instead of aliasing some in-range slot.
pub(super) fn index_of(value: f64) -> usize {
    if !value.is_finite() {
        return usize::MAX;
    }
    let truncated = value.trunc();
    if truncated < 0.0 {
        usize::MAX
    } else if truncated > usize::MAX as f64 {
        usize::MAX
    } else {
        truncated as usize
    }
}

/// condition := string_factor (`=`|`<>`) string_factor
///             | expression comparison expression
///
/// A string-kind left operand routes both sides through
/// `eval_string_factor` and restricts the operator to `=`/`<>`, per
/// spec's "string compare {=, <>} only" — any other comparison operator
/// against a string-kind operand is a `TypeMismatch`, not a `SyntaxError`.
pub(super) fn eval_condition(vm: &mut Vm, store: &ProgramStore) -> R<bool> {
    if matches!(byte(store.bytes(), vm.pc), T_STR | T_SVAR | T_SVIDX) {
        let left = eval_string_factor(vm, store)?;
        let op = byte(store.bytes(), vm.pc);
        if !is_comparison(op) {
            return Err(BasicError::SyntaxError);
        }
        vm.pc += 1;
        if !matches!(op, T_EQ | T_EQ_ASSIGN | T_NE) {
            return Err(BasicError::TypeMismatch);
        }
        let right = eval_string_factor(vm, store)?;
        return Ok(match op {
            T_EQ | T_EQ_ASSIGN => left == right,
            T_NE => left != right,
            _ => unreachable!("guarded above"),
        });
    }

    let left = eval_expression(vm, store)?;
    let op = byte(store.bytes(), vm.pc);
    if !is_comparison(op) {
        return Err(BasicError::SyntaxError);
    }
    vm.pc += 1;
    let right = eval_expression(vm, store)?;
    Ok(match op {
        T_EQ | T_EQ_ASSIGN => left == right,
        T_NE => left != right,
        T_LT => left < right,
        T_LE => left <= right,
        T_GT => left > right,
        T_GE => left >= right,
        _ => unreachable!("is_comparison guarded this"),
    })
}

/// A string-valued factor: a literal, a string variable, or an indexed
/// string variable. The original never grew a string expression grammar
/// beyond this (assignment RHS is always one of these three forms), so
/// neither does this evaluator.
pub(super) fn eval_string_factor(vm: &mut Vm, store: &ProgramStore) -> R<String> {
    let op = byte(store.bytes(), vm.pc);
    match op {
        T_STR => {
            vm.pc += 1;
            let len = byte(store.bytes(), vm.pc) as usize;
            vm.pc += 1;
            let bytes = store.bytes().get(vm.pc..vm.pc + len).ok_or(BasicError::SyntaxError)?;
            let text = String::from_utf8_lossy(bytes).into_owned();
            vm.pc += len;
            Ok(text)
        }
        T_SVAR => {
            vm.pc += 1;
            let idx = byte(store.bytes(), vm.pc) as usize;
            vm.pc += 1;
            match store.var(idx)? {
                Cell::Str(s) => Ok(s.clone()),
                Cell::Num(_) => Err(BasicError::TypeMismatch),
            }
        }
        T_SVIDX => {
            vm.pc += 1;
            let index_val = eval_expression(vm, store)?;
            if byte(store.bytes(), vm.pc) == T_ENDX {
                vm.pc += 1;
            }
            match store.var(index_of(index_val))? {
                Cell::Str(s) => Ok(s.clone()),
                Cell::Num(_) => Err(BasicError::TypeMismatch),
            }
        }
        _ => Err(BasicError::SyntaxError),
    }
}
