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

// asm.rs
//
// This file contains the assembly text parser. It turns a program source
// into decoded Instruction records with PCs assigned in source order.
// Comments begin with '#' and run to end of line; labels end with ':'
// and may share a line with an instruction; commas and whitespace both
// separate operands. Malformed lines are rejected with the 1-based line
// number, before the engine ever runs a cycle.

use std::collections::HashMap;

use crate::engine::instruction::{Instruction, Operation, Reg};
use crate::errors::SimulatorError;

#[derive(Debug, Default)]
pub struct AsmParser {
    labels: HashMap<String, usize>,
}

impl AsmParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete program. Two passes: labels are collected first
    /// so a branch may name a label defined later in the source.
    pub fn parse_program(&mut self, source: &str) -> Result<Vec<Instruction>, SimulatorError> {
        self.labels.clear();

        // First pass: record label PCs.
        let mut pc = 0;
        for (line_no, raw) in source.lines().enumerate() {
            let line_no = line_no + 1;
            let mut text = strip_comment(raw).trim();
            if text.is_empty() {
                continue;
            }
            if let Some((label, rest)) = split_label(text) {
                let label = label.trim();
                if label.is_empty() {
                    return Err(SimulatorError::ParseError(
                        line_no,
                        "empty label name".to_string(),
                    ));
                }
                self.labels.insert(label.to_string(), pc);
                text = rest.trim();
                if text.is_empty() {
                    continue;
                }
            }
            pc += 1;
        }

        // Second pass: decode instructions.
        let mut instructions = Vec::new();
        for (line_no, raw) in source.lines().enumerate() {
            let line_no = line_no + 1;
            let mut text = strip_comment(raw).trim();
            if text.is_empty() {
                continue;
            }
            if let Some((_, rest)) = split_label(text) {
                text = rest.trim();
                if text.is_empty() {
                    continue;
                }
            }
            let pc = instructions.len();
            let op = parse_operation(text, line_no)?;
            instructions.push(Instruction::new(op, pc));
        }

        Ok(instructions)
    }

    /// PC a label resolves to, if it was defined.
    pub fn label_pc(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn split_label(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
}

/// Decode a single instruction line (label and comment already removed).
pub fn parse_operation(line: &str, line_no: usize) -> Result<Operation, SimulatorError> {
    let normalized = line.replace(',', " ");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let Some(&mnemonic) = tokens.first() else {
        return Err(SimulatorError::ParseError(
            line_no,
            "empty instruction".to_string(),
        ));
    };

    let err = |message: String| SimulatorError::ParseError(line_no, message);
    let operands = &tokens[1..];
    let expect = |count: usize| -> Result<(), SimulatorError> {
        if operands.len() == count {
            Ok(())
        } else {
            Err(err(format!(
                "{} expects {} operand(s), found {}",
                mnemonic.to_uppercase(),
                count,
                operands.len()
            )))
        }
    };

    match mnemonic.to_uppercase().as_str() {
        "ADD" | "SUB" | "MUL" | "DIV" => {
            expect(3)?;
            let rd = parse_register(operands[0], line_no)?;
            let rs = parse_register(operands[1], line_no)?;
            let rt = parse_register(operands[2], line_no)?;
            Ok(match mnemonic.to_uppercase().as_str() {
                "ADD" => Operation::Add { rd, rs, rt },
                "SUB" => Operation::Sub { rd, rs, rt },
                "MUL" => Operation::Mul { rd, rs, rt },
                _ => Operation::Div { rd, rs, rt },
            })
        },
        "ADDI" => {
            expect(3)?;
            let rd = parse_register(operands[0], line_no)?;
            let rs = parse_register(operands[1], line_no)?;
            let imm = operands[2]
                .parse::<i32>()
                .map_err(|_| err(format!("invalid immediate '{}'", operands[2])))?;
            Ok(Operation::Addi { rd, rs, imm })
        },
        "LW" => {
            expect(2)?;
            let rd = parse_register(operands[0], line_no)?;
            let (offset, base) = parse_mem_operand(operands[1], line_no)?;
            Ok(Operation::Lw { rd, base, offset })
        },
        "SW" => {
            expect(2)?;
            let rt = parse_register(operands[0], line_no)?;
            let (offset, base) = parse_mem_operand(operands[1], line_no)?;
            Ok(Operation::Sw { rt, base, offset })
        },
        "BEQ" | "BNE" => {
            expect(3)?;
            let rs = parse_register(operands[0], line_no)?;
            let rt = parse_register(operands[1], line_no)?;
            let target = operands[2].to_string();
            Ok(if mnemonic.eq_ignore_ascii_case("BEQ") {
                Operation::Beq { rs, rt, target }
            } else {
                Operation::Bne { rs, rt, target }
            })
        },
        "J" => {
            expect(1)?;
            Ok(Operation::J {
                target: operands[0].to_string(),
            })
        },
        "NOP" => {
            expect(0)?;
            Ok(Operation::Nop)
        },
        other => Err(err(format!("unknown instruction '{}'", other))),
    }
}

fn parse_register(token: &str, line_no: usize) -> Result<Reg, SimulatorError> {
    token
        .parse::<Reg>()
        .map_err(|message| SimulatorError::ParseError(line_no, message))
}

/// Parse the `offset(base)` addressing form of LW/SW.
fn parse_mem_operand(token: &str, line_no: usize) -> Result<(i32, Reg), SimulatorError> {
    let err = |message: String| SimulatorError::ParseError(line_no, message);
    let (offset_text, rest) = token
        .split_once('(')
        .ok_or_else(|| err(format!("expected offset(base), found '{}'", token)))?;
    let base_text = rest
        .strip_suffix(')')
        .ok_or_else(|| err(format!("missing ')' in '{}'", token)))?;
    let offset = offset_text
        .parse::<i32>()
        .map_err(|_| err(format!("invalid offset '{}'", offset_text)))?;
    let base = parse_register(base_text, line_no)?;
    Ok((offset, base))
}
