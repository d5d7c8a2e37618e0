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

// config.rs
//
// This file contains the hardware configuration for the Tomasulo engine:
// reservation station pool sizes, reorder buffer capacity, per-opcode
// execute latencies, and the runaway-cycle safety bound.

use serde::{Deserialize, Serialize};

use super::instruction::Operation;
use crate::errors::SimulatorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Add/Sub/Addi/branch reservation station pool size.
    pub add_rs: usize,
    /// Mul/Div reservation station pool size.
    pub mul_rs: usize,
    pub load_rs: usize,
    pub store_rs: usize,
    /// Reorder buffer ring capacity (one slot is kept free to
    /// distinguish full from empty).
    pub rob_size: usize,

    pub add_latency: usize,
    pub sub_latency: usize,
    pub addi_latency: usize,
    pub mul_latency: usize,
    pub div_latency: usize,
    pub lw_latency: usize,
    pub sw_latency: usize,
    pub beq_latency: usize,
    pub bne_latency: usize,
    pub j_latency: usize,

    /// Abort a run after this many cycles.
    pub max_cycles: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            add_rs: 3,
            mul_rs: 2,
            load_rs: 2,
            store_rs: 2,
            rob_size: 16,
            add_latency: 2,
            sub_latency: 2,
            addi_latency: 2,
            mul_latency: 10,
            div_latency: 20,
            lw_latency: 3,
            sw_latency: 3,
            beq_latency: 1,
            bne_latency: 1,
            j_latency: 1,
            max_cycles: 10_000,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_add_stations(mut self, count: usize) -> Self {
        self.add_rs = count;
        self
    }

    pub fn with_mul_stations(mut self, count: usize) -> Self {
        self.mul_rs = count;
        self
    }

    pub fn with_load_stations(mut self, count: usize) -> Self {
        self.load_rs = count;
        self
    }

    pub fn with_store_stations(mut self, count: usize) -> Self {
        self.store_rs = count;
        self
    }

    pub fn with_rob_size(mut self, size: usize) -> Self {
        self.rob_size = size;
        self
    }

    pub fn with_max_cycles(mut self, cycles: usize) -> Self {
        self.max_cycles = cycles;
        self
    }

    /// Reject configurations the engine cannot run: empty pools, a ring
    /// too small to hold anything, or zero-cycle latencies.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.add_rs < 1 || self.mul_rs < 1 || self.load_rs < 1 || self.store_rs < 1 {
            return Err(SimulatorError::InvalidConfig(
                "every reservation station pool needs at least one station".to_string(),
            ));
        }
        if self.rob_size < 2 {
            return Err(SimulatorError::InvalidConfig(
                "rob_size must be at least 2".to_string(),
            ));
        }
        let latencies = [
            self.add_latency,
            self.sub_latency,
            self.addi_latency,
            self.mul_latency,
            self.div_latency,
            self.lw_latency,
            self.sw_latency,
            self.beq_latency,
            self.bne_latency,
            self.j_latency,
        ];
        if latencies.contains(&0) {
            return Err(SimulatorError::InvalidConfig(
                "execute latencies must be at least 1 cycle".to_string(),
            ));
        }
        if self.max_cycles == 0 {
            return Err(SimulatorError::InvalidConfig(
                "max_cycles must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Execute latency for an operation.
    pub fn latency(&self, op: &Operation) -> usize {
        match op {
            Operation::Add { .. } => self.add_latency,
            Operation::Sub { .. } => self.sub_latency,
            Operation::Addi { .. } => self.addi_latency,
            Operation::Mul { .. } => self.mul_latency,
            Operation::Div { .. } => self.div_latency,
            Operation::Lw { .. } => self.lw_latency,
            Operation::Sw { .. } => self.sw_latency,
            Operation::Beq { .. } => self.beq_latency,
            Operation::Bne { .. } => self.bne_latency,
            Operation::J { .. } => self.j_latency,
            Operation::Nop => 1,
        }
    }
}
