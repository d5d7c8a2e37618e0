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

// components.rs
//
// This file contains the hardware structures of the Tomasulo pipeline:
// reservation stations, reorder buffer entries, the register status
// (rename) table, the architectural register file, and the sparse data
// memory. The engine ties them together in simulator.rs.

use std::collections::HashMap;
use std::fmt;

use super::instruction::{Operation, Reg};

/// The functional class a reservation station serves. Branches share the
/// Add pool, as do J and NOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationClass {
    Add,
    Mult,
    Load,
    Store,
}

impl StationClass {
    /// The pool an operation dispatches to.
    pub fn of(op: &Operation) -> Self {
        match op {
            Operation::Add { .. }
            | Operation::Sub { .. }
            | Operation::Addi { .. }
            | Operation::Beq { .. }
            | Operation::Bne { .. }
            | Operation::J { .. }
            | Operation::Nop => StationClass::Add,
            Operation::Mul { .. } | Operation::Div { .. } => StationClass::Mult,
            Operation::Lw { .. } => StationClass::Load,
            Operation::Sw { .. } => StationClass::Store,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StationClass::Add => "Add",
            StationClass::Mult => "Mult",
            StationClass::Load => "Load",
            StationClass::Store => "Store",
        }
    }
}

impl fmt::Display for StationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A reservation station. Vj/Vk hold captured operand values; Qj/Qk hold
/// the ROB index of a pending producer. An operand never has both a value
/// and a producer at once.
#[derive(Debug, Clone)]
pub struct ReservationStation {
    pub name: String,
    pub class: StationClass,
    pub busy: bool,
    pub op: Option<Operation>,
    pub vj: Option<i32>,
    pub vk: Option<i32>,
    pub qj: Option<usize>,
    pub qk: Option<usize>,
    /// ROB slot this station will write.
    pub dest: Option<usize>,
    /// Effective address, computed during Execute for loads/stores.
    pub address: Option<i32>,
    /// Program index of the instruction occupying the station.
    pub instruction: Option<usize>,
    pub cycles_remaining: usize,
}

impl ReservationStation {
    pub fn new(name: String, class: StationClass) -> Self {
        Self {
            name,
            class,
            busy: false,
            op: None,
            vj: None,
            vk: None,
            qj: None,
            qk: None,
            dest: None,
            address: None,
            instruction: None,
            cycles_remaining: 0,
        }
    }

    /// Ready to execute: occupied with both operands resolved.
    pub fn is_ready(&self) -> bool {
        self.busy && self.qj.is_none() && self.qk.is_none()
    }

    pub fn clear(&mut self) {
        self.busy = false;
        self.op = None;
        self.vj = None;
        self.vk = None;
        self.qj = None;
        self.qk = None;
        self.dest = None;
        self.address = None;
        self.instruction = None;
        self.cycles_remaining = 0;
    }
}

impl fmt::Display for ReservationStation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.busy {
            return write!(f, "{}: free", self.name);
        }
        let op = self.op.as_ref().map_or("?", |op| op.mnemonic());
        write!(
            f,
            "{}: {} Vj={:?} Vk={:?} Qj={:?} Qk={:?} Dest={:?}",
            self.name, op, self.vj, self.vk, self.qj, self.qk, self.dest
        )
    }
}

/// Lifecycle state of a reorder buffer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobState {
    Issue,
    Execute,
    Write,
    Commit,
}

impl fmt::Display for RobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RobState::Issue => "Issue",
            RobState::Execute => "Execute",
            RobState::Write => "Write",
            RobState::Commit => "Commit",
        };
        write!(f, "{}", name)
    }
}

/// Where a reorder buffer entry retires to: an architectural register for
/// arithmetic and loads, a symbolic memory tag for stores, or nowhere for
/// branches, jumps, and NOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RobDest {
    #[default]
    None,
    Reg(Reg),
    Mem(i32),
}

impl fmt::Display for RobDest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobDest::None => write!(f, "-"),
            RobDest::Reg(reg) => write!(f, "{}", reg),
            RobDest::Mem(offset) => write!(f, "Mem[{}]", offset),
        }
    }
}

/// One slot of the reorder buffer ring.
#[derive(Debug, Clone)]
pub struct RobEntry {
    pub busy: bool,
    /// Program index of the occupying instruction.
    pub instruction: Option<usize>,
    pub state: RobState,
    pub dest: RobDest,
    /// The computed result; the store value for SW; the branch outcome
    /// (0/1) for conditional branches.
    pub value: Option<i32>,
    pub ready: bool,
    /// Issued past an unresolved predicted-taken branch.
    pub speculative: bool,
    pub branch_predicted: Option<bool>,
    pub branch_actual: Option<bool>,
    /// Effective store address, captured at Execute so Commit never has
    /// to consult an already-freed station.
    pub address: Option<i32>,
}

impl RobEntry {
    pub fn new() -> Self {
        Self {
            busy: false,
            instruction: None,
            state: RobState::Issue,
            dest: RobDest::None,
            value: None,
            ready: false,
            speculative: false,
            branch_predicted: None,
            branch_actual: None,
            address: None,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for RobEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register status (rename) table: register name to the ROB slot of its
/// most recent in-flight writer. A register absent from the table reads
/// its architectural value.
#[derive(Debug, Clone, Default)]
pub struct RegisterStatus {
    producers: HashMap<Reg, usize>,
}

impl RegisterStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn producer(&self, reg: Reg) -> Option<usize> {
        self.producers.get(&reg).copied()
    }

    pub fn set_producer(&mut self, reg: Reg, slot: usize) {
        self.producers.insert(reg, slot);
    }

    pub fn clear_producer(&mut self, reg: Reg) {
        self.producers.remove(&reg);
    }

    pub fn clear_all(&mut self) {
        self.producers.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Reg, usize)> + '_ {
        self.producers.iter().map(|(reg, slot)| (*reg, *slot))
    }
}

/// The 32 architectural registers. R0 is hardwired to zero: reads return
/// 0 and writes are ignored.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    data: [i32; 32],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self { data: [0; 32] }
    }

    pub fn read(&self, reg: Reg) -> i32 {
        if reg.is_zero() {
            0
        } else {
            self.data[reg.number() as usize]
        }
    }

    pub fn write(&mut self, reg: Reg, value: i32) {
        if !reg.is_zero() {
            self.data[reg.number() as usize] = value;
        }
    }

    pub fn clear(&mut self) {
        self.data = [0; 32];
    }

    pub fn values(&self) -> &[i32; 32] {
        &self.data
    }
}

/// Sparse word-addressable data memory. Unwritten addresses read as zero.
/// Stores reach memory exclusively at commit.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    data: HashMap<i32, i32>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, address: i32) -> i32 {
        self.data.get(&address).copied().unwrap_or(0)
    }

    pub fn write(&mut self, address: i32, value: i32) {
        self.data.insert(address, value);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.data.iter().map(|(addr, value)| (*addr, *value))
    }
}
