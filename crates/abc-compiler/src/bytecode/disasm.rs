//! Walking emitted method code.
//!
//! Used by the instruction trace and by tests that check bytecode
//! sequences without caring about every operand.

use std::fmt;

use super::opcode::{OpCode, Operands};
use super::writer::{read_s24, read_u30};

/// A decoded operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Byte(u8),
    U30(u32),
    /// Relative branch offset.
    Branch(i32),
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: OpCode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Absolute target of a branch instruction.
    pub fn branch_target(&self) -> Option<usize> {
        match (self.opcode.is_branch(), self.operands.first()) {
            (true, Some(Operand::Branch(rel))) => {
                Some((self.offset as i64 + 4 + *rel as i64) as usize)
            }
            _ => None,
        }
    }

    /// Absolute targets of a lookupswitch: default first, then each case.
    pub fn switch_targets(&self) -> Vec<usize> {
        if self.opcode != OpCode::LookupSwitch {
            return Vec::new();
        }
        self.operands
            .iter()
            .filter_map(|op| match op {
                Operand::Branch(rel) => Some((self.offset as i64 + *rel as i64) as usize),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.offset, self.opcode.name())?;
        for op in &self.operands {
            match op {
                Operand::Byte(b) => write!(f, " {b}")?,
                Operand::U30(v) => write!(f, " {v}")?,
                Operand::Branch(rel) => write!(f, " {rel:+}")?,
            }
        }
        Ok(())
    }
}

/// Decode a method's code.
///
/// Unknown opcode bytes are skipped. Decoding stops at a truncated
/// instruction.
pub fn disassemble(code: &[u8]) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < code.len() {
        let offset = pos;
        let Some(opcode) = OpCode::from_u8(code[pos]) else {
            pos += 1;
            continue;
        };
        pos += 1;
        match read_operands(opcode, code, &mut pos) {
            Some(operands) => out.push(Instruction {
                offset,
                opcode,
                operands,
            }),
            None => break,
        }
    }
    out
}

fn read_operands(opcode: OpCode, code: &[u8], pos: &mut usize) -> Option<Vec<Operand>> {
    let byte = |pos: &mut usize| -> Option<Operand> {
        let b = *code.get(*pos)?;
        *pos += 1;
        Some(Operand::Byte(b))
    };
    let u30 = |pos: &mut usize| read_u30(code, pos).map(Operand::U30);
    let branch = |pos: &mut usize| read_s24(code, pos).map(Operand::Branch);

    Some(match opcode.operands() {
        Operands::None => Vec::new(),
        Operands::Byte => vec![byte(pos)?],
        Operands::U30 => vec![u30(pos)?],
        Operands::U30U30 => vec![u30(pos)?, u30(pos)?],
        Operands::Branch => vec![branch(pos)?],
        Operands::LookupSwitch => {
            let mut ops = vec![branch(pos)?];
            let count = read_u30(code, pos)?;
            ops.push(Operand::U30(count));
            for _ in 0..=count {
                ops.push(branch(pos)?);
            }
            ops
        }
        Operands::Debug => vec![byte(pos)?, u30(pos)?, byte(pos)?, u30(pos)?],
    })
}

/// Opcodes of `code` in order, skipping operands.
pub fn opcodes(code: &[u8]) -> Vec<OpCode> {
    disassemble(code).into_iter().map(|i| i.opcode).collect()
}

/// Check that `code` is exactly the given opcode sequence.
///
/// Operand values are ignored. Panics with both sequences on mismatch.
#[track_caller]
pub fn assert_opcodes(code: &[u8], expected: &[OpCode]) {
    let actual = opcodes(code);
    assert_eq!(
        actual,
        expected,
        "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
        expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
        actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
    );
}

/// Check that `code` contains the given opcodes in order, not necessarily
/// contiguous.
#[track_caller]
pub fn assert_contains_opcodes(code: &[u8], expected: &[OpCode]) {
    let actual = opcodes(code);
    let mut expected_iter = expected.iter().peekable();

    for op in &actual {
        if expected_iter.peek() == Some(&op) {
            expected_iter.next();
        }
    }

    if expected_iter.peek().is_some() {
        let remaining: Vec<_> = expected_iter.map(|op| op.name()).collect();
        panic!(
            "Missing opcodes in sequence.\nExpected to find: {:?}\nActual bytecode:  {:?}",
            remaining,
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_operands() {
        // pushbyte 5, pushshort 300, callproperty 2 1, returnvalue
        let code = [0x24, 5, 0x25, 0xAC, 0x02, 0x46, 2, 1, 0x48];
        let ins = disassemble(&code);
        assert_eq!(ins.len(), 4);
        assert_eq!(ins[0].operands, vec![Operand::Byte(5)]);
        assert_eq!(ins[1].operands, vec![Operand::U30(300)]);
        assert_eq!(ins[2].offset, 5);
        assert_eq!(ins[2].operands, vec![Operand::U30(2), Operand::U30(1)]);
        assert_eq!(ins[3].opcode, OpCode::ReturnValue);
    }

    #[test]
    fn branch_target() {
        // jump +1 over a nop
        let code = [0x10, 1, 0, 0, 0x02, 0x47];
        let ins = disassemble(&code);
        assert_eq!(ins[0].branch_target(), Some(5));
        assert_eq!(ins[0].to_string(), "0:jump +1");
    }

    #[test]
    fn lookupswitch_targets() {
        // lookupswitch default=+9 count=0 case=+9, then returnvoid at 9
        let code = [0x1B, 9, 0, 0, 0, 9, 0, 0, 0x02, 0x47];
        let ins = disassemble(&code);
        assert_eq!(ins[0].switch_targets(), vec![9, 9]);
        assert_eq!(ins.last().map(|i| i.opcode), Some(OpCode::ReturnVoid));
    }

    #[test]
    fn truncated_stops() {
        let code = [0x24];
        assert!(disassemble(&code).is_empty());
    }

    #[test]
    fn assert_opcodes_success() {
        assert_opcodes(&[0xD0, 0x30, 0x47], &[OpCode::GetLocal0, OpCode::PushScope, OpCode::ReturnVoid]);
        assert_contains_opcodes(&[0xD0, 0x30, 0x47], &[OpCode::GetLocal0, OpCode::ReturnVoid]);
    }

    #[test]
    #[should_panic(expected = "Bytecode mismatch")]
    fn assert_opcodes_failure() {
        assert_opcodes(&[0x47], &[OpCode::ReturnValue]);
    }
}
