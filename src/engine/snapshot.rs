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

// snapshot.rs
//
// This file contains the read-only state view handed to external
// observers (CLI tables, a GUI, tests). A Snapshot is a deep copy taken
// between ticks; it holds no references into the engine and serializes
// to JSON via serde.

use std::collections::BTreeMap;

use serde::Serialize;

use super::simulator::Simulator;

/// One reservation station as observed between ticks.
#[derive(Debug, Clone, Serialize)]
pub struct StationView {
    pub name: String,
    pub class: String,
    pub busy: bool,
    pub op: Option<String>,
    pub vj: Option<i32>,
    pub vk: Option<i32>,
    pub qj: Option<usize>,
    pub qk: Option<usize>,
    pub dest: Option<usize>,
    pub address: Option<i32>,
    pub cycles_remaining: usize,
}

/// One reorder buffer slot as observed between ticks.
#[derive(Debug, Clone, Serialize)]
pub struct RobView {
    pub index: usize,
    pub busy: bool,
    pub instruction: Option<String>,
    pub state: String,
    pub dest: String,
    pub value: Option<i32>,
    pub ready: bool,
    pub speculative: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsView {
    pub total_cycles: usize,
    pub instructions_issued: usize,
    pub instructions_completed: usize,
    pub ipc: f64,
    pub bubble_cycles: usize,
    pub stall_cycles: usize,
    pub branch_mispredictions: usize,
    pub branch_predictions: usize,
    pub branch_correct_predictions: usize,
    pub branch_accuracy: f64,
}

/// Deep copy of the observable machine state.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub cycle: usize,
    pub pc: usize,
    /// R0..R31 in order.
    pub registers: Vec<i32>,
    /// Sorted so serialized output is deterministic.
    pub memory: BTreeMap<i32, i32>,
    pub stations: Vec<StationView>,
    pub rob: Vec<RobView>,
    pub rob_head: usize,
    pub rob_tail: usize,
    /// Register name -> producing ROB slot.
    pub rename: BTreeMap<String, usize>,
    pub metrics: MetricsView,
    pub finished: bool,
}

impl Snapshot {
    pub fn of(sim: &Simulator) -> Self {
        let stations = sim
            .stations
            .iter()
            .map(|station| StationView {
                name: station.name.clone(),
                class: station.class.to_string(),
                busy: station.busy,
                op: station.op.as_ref().map(|op| op.to_string()),
                vj: station.vj,
                vk: station.vk,
                qj: station.qj,
                qk: station.qk,
                dest: station.dest,
                address: station.address,
                cycles_remaining: station.cycles_remaining,
            })
            .collect();

        let rob = sim
            .rob
            .iter()
            .enumerate()
            .map(|(index, entry)| RobView {
                index,
                busy: entry.busy,
                instruction: entry
                    .instruction
                    .map(|pc| sim.instructions[pc].op.to_string()),
                state: entry.state.to_string(),
                dest: entry.dest.to_string(),
                value: entry.value,
                ready: entry.ready,
                speculative: entry.speculative,
            })
            .collect();

        let rename = sim
            .register_status
            .iter()
            .map(|(reg, slot)| (reg.to_string(), slot))
            .collect();

        let predictor = &sim.branch_predictor;
        let metrics = MetricsView {
            total_cycles: sim.metrics.total_cycles,
            instructions_issued: sim.metrics.instructions_issued,
            instructions_completed: sim.metrics.instructions_completed,
            ipc: sim.metrics.ipc(),
            bubble_cycles: sim.metrics.bubble_cycles,
            stall_cycles: sim.metrics.stall_cycles,
            branch_mispredictions: sim.metrics.branch_mispredictions,
            branch_predictions: predictor.predictions(),
            branch_correct_predictions: predictor.correct_predictions(),
            branch_accuracy: predictor.accuracy(),
        };

        Self {
            cycle: sim.current_cycle,
            pc: sim.pc,
            registers: sim.registers.values().to_vec(),
            memory: sim.memory.iter().collect(),
            stations,
            rob,
            rob_head: sim.rob_head,
            rob_tail: sim.rob_tail,
            rename,
            metrics,
            finished: sim.finished,
        }
    }
}
