//! # Statement dispatch
//!
//! One function per opcode, grounded on `vm_execute_statement`'s switch
//! and its `execute_*` helpers in `vm.c`. Each handler receives the
//! program counter already advanced past its own opcode byte (mirroring
//! `g_vm.pc++` at the top of the original's dispatcher) and is
//! responsible for leaving `vm.pc` at the start of the next statement —
//! whether that's the next token on the same line, the next line, or a
//! jump target.

use super::eval::{eval_condition, eval_expression, eval_string_factor, index_of};
use super::stacks::{CallFrame, ForFrame};
use super::{AngleMode, AreadRegister, Vm};
use crate::error::BasicError;
use crate::host::Host;
use crate::store::{Cell, ProgramStore};
use crate::token::{self, *};

type R<T> = Result<T, BasicError>;

fn byte(buf: &[u8], pc: usize) -> u8 {
    buf.get(pc).copied().unwrap_or(T_EOL)
}

/// `"%.6g"`-equivalent formatting: up to `sig_figs` significant digits,
/// trailing zeros and a bare trailing `.` dropped. Used for `PRINT`,
/// `PAUSE`, and `AREAD`'s number-to-string conversion, which all share
/// the original's `"%g"`-family formatting.
pub(super) fn format_num(value: f64, sig_figs: i32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return if value.is_nan() { "nan".into() } else if value > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let neg = value.is_sign_negative();
    let abs = value.abs();
    let exp = abs.log10().floor() as i32;
    let mut body = if exp < -4 || exp >= sig_figs {
        let mantissa = abs / 10f64.powi(exp);
        let mut m = format!("{:.*}", (sig_figs - 1).max(0) as usize, mantissa);
        trim_trailing_zeros(&mut m);
        format!("{}e{}{:02}", m, if exp >= 0 { "+" } else { "-" }, exp.abs())
    } else {
        let decimals = (sig_figs - 1 - exp).max(0) as usize;
        let mut m = format!("{:.*}", decimals, abs);
        trim_trailing_zeros(&mut m);
        m
    };
    if neg {
        body.insert(0, '-');
    }
    body
}

fn trim_trailing_zeros(s: &mut String) {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
}

pub fn execute_statement(vm: &mut Vm, store: &mut ProgramStore, host: &mut dyn Host) -> R<()> {
    let op = byte(store.bytes(), vm.pc);
    vm.pc += 1;
    match op {
        T_STR => execute_label(vm, store),
        T_VAR => execute_var_assign(vm, store),
        T_SVAR => execute_svar_assign(vm, store),
        T_VIDX => execute_vidx_assign(vm, store),
        T_SVIDX => execute_svidx_assign(vm, store),
        T_LET => execute_let(vm, store),
        T_PRINT => execute_print(vm, store, host),
        T_GOTO => execute_goto(vm, store),
        T_IF => execute_if(vm, store),
        T_GOSUB => execute_gosub(vm, store),
        T_RETURN => execute_return(vm, store),
        T_FOR => execute_for(vm, store),
        T_NEXT => execute_next(vm, store),
        T_END | T_STOP => {
            vm.running = false;
            Ok(())
        }
        T_REM => execute_rem(vm, store),
        T_COLON => Ok(()),
        T_EOL => execute_eol(vm, store),
        T_INPUT => execute_input(vm, store, host),
        T_AREAD => execute_aread(vm, store),
        T_DEGREE => {
            vm.angle_mode = AngleMode::Degree;
            Ok(())
        }
        T_RADIAN => {
            vm.angle_mode = AngleMode::Radian;
            Ok(())
        }
        T_GRAD => {
            vm.angle_mode = AngleMode::Grad;
            Ok(())
        }
        T_CLEAR => {
            store.clear_vars();
            Ok(())
        }
        T_BEEP => {
            host.beep();
            Ok(())
        }
        T_PAUSE => execute_pause(vm, store, host),
        T_USING => skip_to_eol(vm, store),
        _ => Err(BasicError::SyntaxError),
    }
}

fn expect(store: &ProgramStore, pc: &mut usize, op: u8) -> R<()> {
    if byte(store.bytes(), *pc) != op {
        return Err(BasicError::SyntaxError);
    }
    *pc += 1;
    Ok(())
}

fn read_var_idx(store: &ProgramStore, pc: &mut usize) -> u8 {
    let idx = byte(store.bytes(), *pc);
    *pc += 1;
    idx
}

fn skip_to_eol(vm: &mut Vm, store: &ProgramStore) -> R<()> {
    while byte(store.bytes(), vm.pc) != T_EOL {
        vm.pc = token::skip_token(store.bytes(), vm.pc).ok_or(BasicError::SyntaxError)?;
    }
    Ok(())
}

fn execute_label(vm: &mut Vm, store: &ProgramStore) -> R<()> {
    let len = byte(store.bytes(), vm.pc) as usize;
    vm.pc += 1 + len;
    Ok(())
}

fn execute_var_assign(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    let idx = read_var_idx(store, &mut vm.pc);
    expect(store, &mut vm.pc, T_EQ_ASSIGN)?;
    let value = eval_expression(vm, store)?;
    store.set_var(idx as usize, Cell::Num(value))
}

fn execute_svar_assign(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    let idx = read_var_idx(store, &mut vm.pc);
    expect(store, &mut vm.pc, T_EQ_ASSIGN)?;
    let value = eval_string_factor(vm, store)?;
    store.set_var(idx as usize, Cell::Str(value))
}

fn execute_vidx_assign(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    let index_val = eval_expression(vm, store)?;
    if byte(store.bytes(), vm.pc) == T_ENDX {
        vm.pc += 1;
    }
    expect(store, &mut vm.pc, T_EQ_ASSIGN)?;
    let value = eval_expression(vm, store)?;
    store.set_var(index_of(index_val), Cell::Num(value))
}

fn execute_svidx_assign(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    let index_val = eval_expression(vm, store)?;
    if byte(store.bytes(), vm.pc) == T_ENDX {
        vm.pc += 1;
    }
    expect(store, &mut vm.pc, T_EQ_ASSIGN)?;
    let value = eval_string_factor(vm, store)?;
    store.set_var(index_of(index_val), Cell::Str(value))
}

fn execute_let(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    match byte(store.bytes(), vm.pc) {
        T_VAR => {
            vm.pc += 1;
            execute_var_assign(vm, store)
        }
        T_SVAR => {
            vm.pc += 1;
            execute_svar_assign(vm, store)
        }
        T_VIDX => {
            vm.pc += 1;
            execute_vidx_assign(vm, store)
        }
        T_SVIDX => {
            vm.pc += 1;
            execute_svidx_assign(vm, store)
        }
        _ => Err(BasicError::SyntaxError),
    }
}

fn execute_print(vm: &mut Vm, store: &mut ProgramStore, host: &mut dyn Host) -> R<()> {
    while !matches!(byte(store.bytes(), vm.pc), T_COLON | T_EOL) {
        match byte(store.bytes(), vm.pc) {
            T_COMMA | T_SEMI => {
                host.print(" ");
                vm.pc += 1;
            }
            T_STR => {
                vm.pc += 1;
                let len = byte(store.bytes(), vm.pc) as usize;
                vm.pc += 1;
                let text = String::from_utf8_lossy(&store.bytes()[vm.pc..vm.pc + len]).into_owned();
                vm.pc += len;
                host.print(&text);
            }
            T_SVAR | T_SVIDX => {
                let text = eval_string_factor(vm, store)?;
                host.print(&text);
            }
            _ => {
                let value = eval_expression(vm, store)?;
                host.print(&format_num(value, 6));
            }
        }
    }
    host.print("\n");
    vm.aread = AreadRegister::default();
    Ok(())
}

fn resolve_goto_target(vm: &mut Vm, store: &ProgramStore) -> R<u16> {
    match byte(store.bytes(), vm.pc) {
        T_STR => {
            vm.pc += 1;
            let len = byte(store.bytes(), vm.pc) as usize;
            vm.pc += 1;
            let label = String::from_utf8_lossy(&store.bytes()[vm.pc..vm.pc + len]).into_owned();
            vm.pc += len;
            store.find_label(&label).ok_or(BasicError::BadLineNumber)
        }
        T_SVAR => {
            vm.pc += 1;
            let idx = read_var_idx(store, &mut vm.pc);
            let label = match store.var(idx as usize)? {
                Cell::Str(s) => s.clone(),
                Cell::Num(_) => return Err(BasicError::TypeMismatch),
            };
            store.find_label(&label).ok_or(BasicError::BadLineNumber)
        }
        _ => {
            let line_num = eval_expression(vm, store)?;
            Ok(line_num as u16)
        }
    }
}

fn execute_goto(vm: &mut Vm, store: &ProgramStore) -> R<()> {
    let target_line = resolve_goto_target(vm, store)?;
    let handle = store.find_line(target_line).ok_or(BasicError::BadLineNumber)?;
    vm.pc = store.tokens_of(handle);
    vm.current_line = target_line;
    Ok(())
}

fn execute_gosub(vm: &mut Vm, store: &ProgramStore) -> R<()> {
    let target_line = resolve_goto_target(vm, store)?;
    let handle = store.find_line(target_line).ok_or(BasicError::BadLineNumber)?;
    vm.call_stack.push(CallFrame { return_pc: vm.pc, return_line: vm.current_line })?;
    vm.pc = store.tokens_of(handle);
    vm.current_line = target_line;
    Ok(())
}

fn execute_return(vm: &mut Vm, _store: &ProgramStore) -> R<()> {
    let frame = vm.call_stack.pop()?;
    vm.pc = frame.return_pc;
    vm.current_line = frame.return_line;
    Ok(())
}

fn execute_for(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    expect(store, &mut vm.pc, T_VAR)?;
    let var_idx = read_var_idx(store, &mut vm.pc);
    expect(store, &mut vm.pc, T_EQ_ASSIGN)?;
    let start_val = eval_expression(vm, store)?;
    expect(store, &mut vm.pc, T_TO)?;
    let limit_val = eval_expression(vm, store)?;
    let step_val = if byte(store.bytes(), vm.pc) == T_STEP {
        vm.pc += 1;
        eval_expression(vm, store)?
    } else {
        1.0
    };
    if step_val == 0.0 {
        return Err(BasicError::ForStepZero);
    }
    store.set_var(var_idx as usize, Cell::Num(start_val))?;

    let (resume_pc, resume_line) = if byte(store.bytes(), vm.pc) == T_COLON {
        (vm.pc + 1, vm.current_line)
    } else {
        let mut p = vm.pc;
        while byte(store.bytes(), p) != T_EOL {
            p = token::skip_token(store.bytes(), p).ok_or(BasicError::SyntaxError)?;
        }
        let here = store.find_line(vm.current_line).ok_or(BasicError::SyntaxError)?;
        match store.next_line(here) {
            Some(next) => (store.tokens_of(next), next.line_number),
            None => (p, vm.current_line),
        }
    };

    vm.for_stack.push(ForFrame { resume_pc, resume_line, var_idx, limit: limit_val, step: step_val })
}

fn execute_next(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    let has_var = byte(store.bytes(), vm.pc) == T_VAR;
    let named_idx = if has_var {
        vm.pc += 1;
        Some(read_var_idx(store, &mut vm.pc))
    } else {
        None
    };

    let frame = match named_idx {
        Some(idx) => vm.for_stack.pop_named(idx)?,
        None => vm.for_stack.pop()?,
    };

    let current = store.var(frame.var_idx as usize)?.as_num()?;
    let updated = current + frame.step;
    store.set_var(frame.var_idx as usize, Cell::Num(updated))?;

    let continue_loop = if frame.step > 0.0 { updated <= frame.limit } else { updated >= frame.limit };
    if continue_loop {
        vm.for_stack.push(frame)?;
        vm.pc = frame.resume_pc;
        vm.current_line = frame.resume_line;
    }
    Ok(())
}

fn execute_rem(vm: &mut Vm, store: &ProgramStore) -> R<()> {
    skip_to_eol(vm, store)
}

fn execute_eol(vm: &mut Vm, store: &ProgramStore) -> R<()> {
    let here = store.find_line(vm.current_line).ok_or(BasicError::SyntaxError)?;
    match store.next_line(here) {
        Some(next) => {
            vm.pc = store.tokens_of(next);
            vm.current_line = next.line_number;
        }
        None => vm.running = false,
    }
    Ok(())
}

fn execute_if(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    let condition = eval_condition(vm, store)?;

    if byte(store.bytes(), vm.pc) == T_THEN {
        vm.pc += 1;
        if condition {
            let target_line = resolve_goto_target(vm, store)?;
            let handle = store.find_line(target_line).ok_or(BasicError::BadLineNumber)?;
            vm.pc = store.tokens_of(handle);
            vm.current_line = target_line;
        } else {
            skip_to_eol(vm, store)?;
        }
    } else if !condition {
        skip_to_eol(vm, store)?;
    }
    // condition true, no THEN: pc already sits at the inline statement.
    Ok(())
}

fn execute_input(vm: &mut Vm, store: &mut ProgramStore, host: &mut dyn Host) -> R<()> {
    let (idx, is_string) = match byte(store.bytes(), vm.pc) {
        T_VAR => {
            vm.pc += 1;
            (read_var_idx(store, &mut vm.pc) as usize, false)
        }
        T_SVAR => {
            vm.pc += 1;
            (read_var_idx(store, &mut vm.pc) as usize, true)
        }
        T_VIDX => {
            vm.pc += 1;
            let v = eval_expression(vm, store)?;
            if byte(store.bytes(), vm.pc) == T_ENDX {
                vm.pc += 1;
            }
            (index_of(v), false)
        }
        T_SVIDX => {
            vm.pc += 1;
            let v = eval_expression(vm, store)?;
            if byte(store.bytes(), vm.pc) == T_ENDX {
                vm.pc += 1;
            }
            (index_of(v), true)
        }
        _ => return Err(BasicError::SyntaxError),
    };

    host.print("? ");
    let line = host.read_line().unwrap_or_default();
    if is_string {
        store.set_var(idx, Cell::Str(crate::store::clamp_string(&line)))
    } else {
        let value = line.trim().parse::<f64>().unwrap_or(0.0);
        store.set_var(idx, Cell::Num(value))
    }
}

fn execute_aread(vm: &mut Vm, store: &mut ProgramStore) -> R<()> {
    let (idx, is_string) = match byte(store.bytes(), vm.pc) {
        T_VAR => {
            vm.pc += 1;
            (read_var_idx(store, &mut vm.pc) as usize, false)
        }
        T_SVAR => {
            vm.pc += 1;
            (read_var_idx(store, &mut vm.pc) as usize, true)
        }
        T_VIDX => {
            vm.pc += 1;
            let v = eval_expression(vm, store)?;
            if byte(store.bytes(), vm.pc) == T_ENDX {
                vm.pc += 1;
            }
            (index_of(v), false)
        }
        T_SVIDX => {
            vm.pc += 1;
            let v = eval_expression(vm, store)?;
            if byte(store.bytes(), vm.pc) == T_ENDX {
                vm.pc += 1;
            }
            (index_of(v), true)
        }
        _ => return Err(BasicError::SyntaxError),
    };

    let cell = if is_string {
        match &vm.aread {
            AreadRegister::Str(s) => Cell::Str(s.clone()),
            AreadRegister::Num(n) => Cell::Str(format_num(*n, 6)),
        }
    } else {
        match &vm.aread {
            AreadRegister::Str(s) => Cell::Num(s.trim().parse::<f64>().unwrap_or(0.0)),
            AreadRegister::Num(n) => Cell::Num(*n),
        }
    };
    store.set_var(idx, cell)?;
    vm.aread = AreadRegister::default();
    Ok(())
}

fn execute_pause(vm: &mut Vm, store: &mut ProgramStore, host: &mut dyn Host) -> R<()> {
    while !matches!(byte(store.bytes(), vm.pc), T_COLON | T_EOL) {
        match byte(store.bytes(), vm.pc) {
            T_STR => {
                vm.pc += 1;
                let len = byte(store.bytes(), vm.pc) as usize;
                vm.pc += 1;
                let text = String::from_utf8_lossy(&store.bytes()[vm.pc..vm.pc + len]).into_owned();
                vm.pc += len;
                host.print(&text);
            }
            T_COMMA => {
                host.print("\t");
                vm.pc += 1;
            }
            T_SEMI => {
                vm.pc += 1;
            }
            _ => {
                let value = eval_expression(vm, store)?;
                if value >= 0.0 {
                    host.print(&format!(" {}", format_num(value, 6)));
                } else {
                    host.print(&format_num(value, 6));
                }
            }
        }
    }
    host.print("\n");
    host.sleep_ms(100);
    vm.aread = AreadRegister::default();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BufferHost;

    #[test]
    fn format_num_drops_trailing_zeros() {
        assert_eq!(format_num(3.0, 6), "3");
        assert_eq!(format_num(-2.5, 6), "-2.5");
        assert_eq!(format_num(0.0, 6), "0");
    }

    fn program(lines: &[(u16, &[u8])]) -> ProgramStore {
        let mut s = ProgramStore::new();
        for (n, toks) in lines {
            s.add_line(*n, toks).unwrap();
        }
        s
    }

    #[test]
    fn for_next_loop_accumulates_expected_sum() {
        // 10 FOR A=1 TO 3: B=B+A: NEXT A
        let mut line10 = vec![T_FOR, T_VAR, 1, T_EQ_ASSIGN, T_NUM];
        line10.extend_from_slice(&1.0f64.to_le_bytes());
        line10.push(T_TO);
        line10.push(T_NUM);
        line10.extend_from_slice(&3.0f64.to_le_bytes());
        line10.push(T_COLON);
        line10.push(T_VAR);
        line10.push(2);
        line10.push(T_EQ_ASSIGN);
        line10.push(T_VAR);
        line10.push(2);
        line10.push(T_PLUS);
        line10.push(T_VAR);
        line10.push(1);
        line10.push(T_COLON);
        line10.push(T_NEXT);
        line10.push(T_VAR);
        line10.push(1);

        let mut store = program(&[(10, &line10)]);
        let mut vm = Vm::new();
        let mut host = BufferHost::default();
        vm.start_at(&store).unwrap();
        vm.run(&mut store, &mut host).unwrap();
        assert_eq!(store.var(2).unwrap().as_num().unwrap(), 6.0);
    }

    #[test]
    fn gosub_return_round_trips_through_a_subroutine() {
        // 10 GOSUB 30: PRINT A: END
        // 30 A=9: RETURN
        let mut ten = vec![T_GOSUB, T_NUM];
        ten.extend_from_slice(&30.0f64.to_le_bytes());
        ten.push(T_COLON);
        ten.push(T_PRINT);
        ten.push(T_VAR);
        ten.push(1);
        ten.push(T_COLON);
        ten.push(T_END);

        let mut thirty = vec![T_VAR, 1, T_EQ_ASSIGN, T_NUM];
        thirty.extend_from_slice(&9.0f64.to_le_bytes());
        thirty.push(T_COLON);
        thirty.push(T_RETURN);

        let mut store = program(&[(10, &ten), (30, &thirty)]);
        let mut vm = Vm::new();
        let mut host = BufferHost::default();
        vm.start_at(&store).unwrap();
        vm.run(&mut store, &mut host).unwrap();
        assert_eq!(host.output, "9\n");
    }

    #[test]
    fn if_without_then_controls_only_a_false_condition() {
        // 10 IF 1=2 A=5: END
        let mut ten = vec![T_IF, T_NUM];
        ten.extend_from_slice(&1.0f64.to_le_bytes());
        ten.push(T_EQ_ASSIGN);
        ten.push(T_NUM);
        ten.extend_from_slice(&2.0f64.to_le_bytes());
        ten.push(T_VAR);
        ten.push(1);
        ten.push(T_EQ_ASSIGN);
        ten.push(T_NUM);
        ten.extend_from_slice(&5.0f64.to_le_bytes());
        ten.push(T_COLON);
        ten.push(T_END);

        let mut store = program(&[(10, &ten)]);
        let mut vm = Vm::new();
        let mut host = BufferHost::default();
        vm.start_at(&store).unwrap();
        vm.run(&mut store, &mut host).unwrap();
        assert_eq!(store.var(1).unwrap().as_num().unwrap(), 0.0);
    }

    #[test]
    fn if_then_jumps_to_a_string_literal_label() {
        // 10 IF 1<2 THEN "LOOP": END
        // 20 "LOOP": PRINT 9
        let mut ten = vec![T_IF, T_NUM];
        ten.extend_from_slice(&1.0f64.to_le_bytes());
        ten.push(T_LT);
        ten.push(T_NUM);
        ten.extend_from_slice(&2.0f64.to_le_bytes());
        ten.push(T_THEN);
        ten.push(T_STR);
        ten.push(4);
        ten.extend_from_slice(b"LOOP");
        ten.push(T_COLON);
        ten.push(T_END);

        let mut twenty = vec![T_STR, 4];
        twenty.extend_from_slice(b"LOOP");
        twenty.push(T_COLON);
        twenty.push(T_PRINT);
        twenty.push(T_NUM);
        twenty.extend_from_slice(&9.0f64.to_le_bytes());

        let mut store = program(&[(10, &ten), (20, &twenty)]);
        let mut vm = Vm::new();
        let mut host = BufferHost::default();
        vm.start_at(&store).unwrap();
        vm.run(&mut store, &mut host).unwrap();
        assert_eq!(host.output, "9\n");
    }

    #[test]
    fn return_without_gosub_is_an_error() {
        let mut store = program(&[(10, &[T_RETURN])]);
        let mut vm = Vm::new();
        let mut host = BufferHost::default();
        vm.start_at(&store).unwrap();
        let err = vm.run(&mut store, &mut host).unwrap_err();
        assert_eq!(err.error, BasicError::ReturnWithoutGosub);
    }

    #[test]
    fn for_step_zero_is_rejected() {
        let mut line = vec![T_FOR, T_VAR, 1, T_EQ_ASSIGN, T_NUM];
        line.extend_from_slice(&1.0f64.to_le_bytes());
        line.push(T_TO);
        line.push(T_NUM);
        line.extend_from_slice(&3.0f64.to_le_bytes());
        line.push(T_STEP);
        line.push(T_NUM);
        line.extend_from_slice(&0.0f64.to_le_bytes());

        let mut store = program(&[(10, &line)]);
        let mut vm = Vm::new();
        let mut host = BufferHost::default();
        vm.start_at(&store).unwrap();
        let err = vm.run(&mut store, &mut host).unwrap_err();
        assert_eq!(err.error, BasicError::ForStepZero);
    }
}
