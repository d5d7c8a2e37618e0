// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// instruction.rs
//
// This file contains the decoded instruction model for the Tomasulo
// simulator. It defines the Reg newtype for architectural registers, the
// Operation enum carrying each opcode's operand shape, and the Instruction
// struct, which pairs an operation with its per-cycle execution timestamps.

use std::fmt;
use std::str::FromStr;

/// An architectural register R0..R31. R0 always reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(u8);

impl Reg {
    pub const ZERO: Reg = Reg(0);

    /// Create a register from its number; None if out of range.
    pub fn new(number: u8) -> Option<Self> {
        if number < 32 {
            Some(Reg(number))
        } else {
            None
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl FromStr for Reg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('R')
            .or_else(|| s.strip_prefix('r'))
            .ok_or_else(|| format!("invalid register name '{}'", s))?;
        let number: u8 = digits
            .parse()
            .map_err(|_| format!("invalid register name '{}'", s))?;
        Reg::new(number).ok_or_else(|| format!("register out of range '{}'", s))
    }
}

/// A decoded operation, one variant per supported opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Add { rd: Reg, rs: Reg, rt: Reg },
    Sub { rd: Reg, rs: Reg, rt: Reg },
    Mul { rd: Reg, rs: Reg, rt: Reg },
    Div { rd: Reg, rs: Reg, rt: Reg },
    Addi { rd: Reg, rs: Reg, imm: i32 },
    Lw { rd: Reg, base: Reg, offset: i32 },
    Sw { rt: Reg, base: Reg, offset: i32 },
    Beq { rs: Reg, rt: Reg, target: String },
    Bne { rs: Reg, rt: Reg, target: String },
    J { target: String },
    Nop,
}

impl Operation {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "ADD",
            Operation::Sub { .. } => "SUB",
            Operation::Mul { .. } => "MUL",
            Operation::Div { .. } => "DIV",
            Operation::Addi { .. } => "ADDI",
            Operation::Lw { .. } => "LW",
            Operation::Sw { .. } => "SW",
            Operation::Beq { .. } => "BEQ",
            Operation::Bne { .. } => "BNE",
            Operation::J { .. } => "J",
            Operation::Nop => "NOP",
        }
    }

    /// The register this operation writes, if any. Stores and branches
    /// have no register destination.
    pub fn dest(&self) -> Option<Reg> {
        match self {
            Operation::Add { rd, .. }
            | Operation::Sub { rd, .. }
            | Operation::Mul { rd, .. }
            | Operation::Div { rd, .. }
            | Operation::Addi { rd, .. }
            | Operation::Lw { rd, .. } => Some(*rd),
            _ => None,
        }
    }

    /// First source operand (captured as Vj).
    pub fn src1(&self) -> Option<Reg> {
        match self {
            Operation::Add { rs, .. }
            | Operation::Sub { rs, .. }
            | Operation::Mul { rs, .. }
            | Operation::Div { rs, .. }
            | Operation::Addi { rs, .. }
            | Operation::Beq { rs, .. }
            | Operation::Bne { rs, .. } => Some(*rs),
            Operation::Lw { base, .. } | Operation::Sw { base, .. } => Some(*base),
            Operation::J { .. } | Operation::Nop => None,
        }
    }

    /// Second source operand (captured as Vk). For SW this is the value
    /// to be stored.
    pub fn src2(&self) -> Option<Reg> {
        match self {
            Operation::Add { rt, .. }
            | Operation::Sub { rt, .. }
            | Operation::Mul { rt, .. }
            | Operation::Div { rt, .. }
            | Operation::Beq { rt, .. }
            | Operation::Bne { rt, .. }
            | Operation::Sw { rt, .. } => Some(*rt),
            _ => None,
        }
    }

    pub fn is_conditional_branch(&self) -> bool {
        matches!(self, Operation::Beq { .. } | Operation::Bne { .. })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add { rd, rs, rt }
            | Operation::Sub { rd, rs, rt }
            | Operation::Mul { rd, rs, rt }
            | Operation::Div { rd, rs, rt } => {
                write!(f, "{} {}, {}, {}", self.mnemonic(), rd, rs, rt)
            },
            Operation::Addi { rd, rs, imm } => write!(f, "ADDI {}, {}, {}", rd, rs, imm),
            Operation::Lw { rd, base, offset } => write!(f, "LW {}, {}({})", rd, offset, base),
            Operation::Sw { rt, base, offset } => write!(f, "SW {}, {}({})", rt, offset, base),
            Operation::Beq { rs, rt, target } | Operation::Bne { rs, rt, target } => {
                write!(f, "{} {}, {}, {}", self.mnemonic(), rs, rt, target)
            },
            Operation::J { target } => write!(f, "J {}", target),
            Operation::Nop => write!(f, "NOP"),
        }
    }
}

/// Pipeline stage an instruction has most recently reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Waiting,
    Issued,
    Executing,
    WriteResult,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Waiting => "Waiting",
            Stage::Issued => "Issued",
            Stage::Executing => "Executing",
            Stage::WriteResult => "Write Result",
            Stage::Commit => "Commit",
        };
        write!(f, "{}", name)
    }
}

/// A program instruction together with its execution bookkeeping. The
/// timestamps are stamped by the engine as the instruction moves through
/// the pipeline; once set they never decrease.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Operation,
    /// Program index assigned at parse time.
    pub pc: usize,
    pub stage: Stage,
    pub issue_cycle: Option<usize>,
    pub exec_start_cycle: Option<usize>,
    pub exec_end_cycle: Option<usize>,
    pub write_cycle: Option<usize>,
    pub commit_cycle: Option<usize>,
    /// ROB slot this instruction occupies while in flight.
    pub rob_slot: Option<usize>,
    /// Name of the reservation station it was dispatched to.
    pub rs_name: Option<String>,
}

impl Instruction {
    pub fn new(op: Operation, pc: usize) -> Self {
        Self {
            op,
            pc,
            stage: Stage::Waiting,
            issue_cycle: None,
            exec_start_cycle: None,
            exec_end_cycle: None,
            write_cycle: None,
            commit_cycle: None,
            rob_slot: None,
            rs_name: None,
        }
    }

    /// Clear all execution bookkeeping, returning the instruction to its
    /// freshly parsed state.
    pub fn reset_timing(&mut self) {
        self.stage = Stage::Waiting;
        self.issue_cycle = None;
        self.exec_start_cycle = None;
        self.exec_end_cycle = None;
        self.write_cycle = None;
        self.commit_cycle = None;
        self.rob_slot = None;
        self.rs_name = None;
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.op.fmt(f)
    }
}
