//! # Execution stacks
//!
//! The three fixed-capacity stacks of spec §5 "Concurrency & Resource
//! Model": the `GOSUB` call stack, the `FOR`/`NEXT` loop stack, and an
//! expression-recursion depth counter standing in for the reference
//! implementation's `expr_stack` (which the original evaluator pushes
//! values onto but, per its own source, never actually pops from — the
//! real recursion happens on the native C call stack, same as here).
//! All three report `StackOverflow` at capacity rather than growing.

use crate::error::BasicError;
use crate::token::{CALL_STACK_MAX, EXPR_STACK_MAX, FOR_STACK_MAX};

type R<T> = Result<T, BasicError>;

/// One `GOSUB` return point: where to resume, and on which line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallFrame {
    pub return_pc: usize,
    pub return_line: u16,
}

#[derive(Default)]
pub struct CallStack(Vec<CallFrame>);

impl CallStack {
    pub fn push(&mut self, frame: CallFrame) -> R<()> {
        if self.0.len() >= CALL_STACK_MAX {
            return Err(BasicError::StackOverflow);
        }
        self.0.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> R<CallFrame> {
        self.0.pop().ok_or(BasicError::ReturnWithoutGosub)
    }
}

/// One active `FOR` loop: where execution resumes after the loop body,
/// which variable it drives, and its limit/step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForFrame {
    pub resume_pc: usize,
    pub resume_line: u16,
    pub var_idx: u8,
    pub limit: f64,
    pub step: f64,
}

#[derive(Default)]
pub struct ForStack(Vec<ForFrame>);

impl ForStack {
    pub fn push(&mut self, frame: ForFrame) -> R<()> {
        if self.0.len() >= FOR_STACK_MAX {
            return Err(BasicError::StackOverflow);
        }
        self.0.push(frame);
        Ok(())
    }

    /// Pop the innermost frame (unqualified `NEXT`).
    pub fn pop(&mut self) -> R<ForFrame> {
        self.0.pop().ok_or(BasicError::NextWithoutFor)
    }

    /// Drop the named variable's frame and everything nested inside it
    /// (`NEXT A` closes any unmatched inner loops too), returning it.
    pub fn pop_named(&mut self, var_idx: u8) -> R<ForFrame> {
        let pos = self.0.iter().rposition(|f| f.var_idx == var_idx).ok_or(BasicError::NextWithoutFor)?;
        let frame = self.0[pos];
        self.0.truncate(pos);
        Ok(frame)
    }
}

/// Recursion-depth guard for the expression evaluator, standing in for
/// the reference implementation's unused `expr_stack` array.
#[derive(Default)]
pub struct ExprDepth(usize);

impl ExprDepth {
    pub fn enter(&mut self) -> R<()> {
        if self.0 >= EXPR_STACK_MAX {
            return Err(BasicError::StackOverflow);
        }
        self.0 += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.0 -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_stack_overflows_at_capacity() {
        let mut s = CallStack::default();
        for _ in 0..CALL_STACK_MAX {
            s.push(CallFrame { return_pc: 0, return_line: 1 }).unwrap();
        }
        assert_eq!(s.push(CallFrame { return_pc: 0, return_line: 1 }), Err(BasicError::StackOverflow));
    }

    #[test]
    fn return_without_gosub_is_distinct_from_overflow() {
        let mut s = CallStack::default();
        assert_eq!(s.pop(), Err(BasicError::ReturnWithoutGosub));
    }

    #[test]
    fn named_next_closes_nested_frames() {
        let mut s = ForStack::default();
        s.push(ForFrame { resume_pc: 1, resume_line: 10, var_idx: 1, limit: 10.0, step: 1.0 }).unwrap();
        s.push(ForFrame { resume_pc: 2, resume_line: 10, var_idx: 2, limit: 10.0, step: 1.0 }).unwrap();
        let frame = s.pop_named(1).unwrap();
        assert_eq!(frame.var_idx, 1);
        assert_eq!(s.pop(), Err(BasicError::NextWithoutFor));
    }
}
