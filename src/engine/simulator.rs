// simulator.rs - the four-phase Tomasulo engine
//
// One step() advances the clock a single cycle and runs the phases in the
// order Commit -> Write-Result -> Execute -> Issue. Retiring first frees
// reservation stations and ROB slots before Issue examines them, and
// broadcasting before Execute means a value forwarded this cycle travels
// at most one CDB hop per tick.
//
// Reservation stations, ROB slots, and instructions refer to each other
// through plain indices (station index, ring index, program index), so a
// flush is a mark-and-sweep over indices rather than a pointer chase.

use log::{debug, warn};

use super::branch_predictor::BranchPredictor;
use super::components::{
    Memory, RegisterFile, RegisterStatus, ReservationStation, RobDest, RobEntry, RobState,
    StationClass,
};
use super::config::SimConfig;
use super::instruction::{Instruction, Operation, Reg, Stage};
use super::metrics::PerformanceMetrics;
use super::snapshot::Snapshot;
use crate::errors::SimulatorError;

pub struct Simulator {
    pub config: SimConfig,

    /// All reservation stations in declared pool order: Add1..AddN,
    /// Mult1..MultN, Load1..LoadN, Store1..StoreN. Every scan walks this
    /// order, which keeps runs deterministic.
    pub stations: Vec<ReservationStation>,

    /// Reorder buffer ring. Busy slots form the arc [head, tail); one
    /// slot is kept free so full and empty are distinguishable.
    pub rob: Vec<RobEntry>,
    pub rob_head: usize,
    pub rob_tail: usize,

    pub register_status: RegisterStatus,
    pub registers: RegisterFile,
    pub memory: Memory,
    pub branch_predictor: BranchPredictor,

    pub instructions: Vec<Instruction>,
    pub pc: usize,
    pub current_cycle: usize,
    pub finished: bool,

    pub metrics: PerformanceMetrics,

    /// True while a predicted-taken branch is in flight; every issue in
    /// that window is marked speculative.
    pub speculating: bool,
    /// ROB slot of the branch that opened the speculation window.
    pub speculation_rob: Option<usize>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self, SimulatorError> {
        config.validate()?;

        let mut stations = Vec::new();
        let pools = [
            (StationClass::Add, config.add_rs),
            (StationClass::Mult, config.mul_rs),
            (StationClass::Load, config.load_rs),
            (StationClass::Store, config.store_rs),
        ];
        for (class, count) in pools {
            for i in 0..count {
                stations.push(ReservationStation::new(
                    format!("{}{}", class.name(), i + 1),
                    class,
                ));
            }
        }

        let rob = vec![RobEntry::new(); config.rob_size];

        Ok(Self {
            config,
            stations,
            rob,
            rob_head: 0,
            rob_tail: 0,
            register_status: RegisterStatus::new(),
            registers: RegisterFile::new(),
            memory: Memory::new(),
            branch_predictor: BranchPredictor::new(),
            instructions: Vec::new(),
            pc: 0,
            current_cycle: 0,
            finished: false,
            metrics: PerformanceMetrics::new(),
            speculating: false,
            speculation_rob: None,
        })
    }

    /// Load a program and reset all machine state.
    pub fn load_program(&mut self, instructions: Vec<Instruction>) {
        self.instructions = instructions;
        self.reset();
    }

    /// Return the machine to the state of a freshly loaded program: all
    /// registers zero, memory empty, predictor table cleared, metrics
    /// zeroed. The program itself is kept.
    pub fn reset(&mut self) {
        for station in &mut self.stations {
            station.clear();
        }
        for entry in &mut self.rob {
            entry.clear();
        }
        self.rob_head = 0;
        self.rob_tail = 0;
        self.register_status.clear_all();
        self.registers.clear();
        self.memory.clear();
        self.branch_predictor = BranchPredictor::new();
        for inst in &mut self.instructions {
            inst.reset_timing();
        }
        self.pc = 0;
        self.current_cycle = 0;
        self.finished = false;
        self.metrics = PerformanceMetrics::new();
        self.speculating = false;
        self.speculation_rob = None;
    }

    /// Advance the clock one cycle. Returns false once the machine has
    /// terminated (program exhausted and ROB drained).
    pub fn step(&mut self) -> bool {
        if self.finished {
            return false;
        }

        self.current_cycle += 1;
        self.metrics.total_cycles += 1;

        self.commit_stage();
        self.write_result_stage();
        self.execute_stage();
        self.issue_stage();

        #[cfg(debug_assertions)]
        self.check_invariants();

        if self.is_finished() {
            self.finished = true;
            return false;
        }
        true
    }

    /// Step until the program terminates. Returns false if the safety
    /// bound elapsed first; the run is abandoned where it stands.
    pub fn run_until_complete(&mut self) -> bool {
        while !self.finished {
            self.step();
            if !self.finished && self.current_cycle >= self.config.max_cycles {
                warn!(
                    "simulation aborted after {} cycles without terminating",
                    self.current_cycle
                );
                return false;
            }
        }
        true
    }

    /// Deep copy of the observable state, valid until the next step().
    pub fn state_snapshot(&self) -> Snapshot {
        Snapshot::of(self)
    }

    fn is_finished(&self) -> bool {
        self.pc >= self.instructions.len() && self.rob.iter().all(|entry| !entry.busy)
    }

    // ---- Commit ----------------------------------------------------------

    /// Retire the head entry if it is ready; otherwise count a bubble.
    /// Exactly one instruction commits per cycle.
    fn commit_stage(&mut self) {
        let head = self.rob_head;
        if !self.rob[head].busy || self.rob[head].state != RobState::Commit {
            self.metrics.bubble_cycles += 1;
            return;
        }
        let Some(pc) = self.rob[head].instruction else {
            return;
        };

        let op = self.instructions[pc].op.clone();
        match &op {
            Operation::Add { .. }
            | Operation::Sub { .. }
            | Operation::Mul { .. }
            | Operation::Div { .. }
            | Operation::Addi { .. }
            | Operation::Lw { .. } => {
                if let RobDest::Reg(rd) = self.rob[head].dest {
                    if let Some(value) = self.rob[head].value {
                        self.registers.write(rd, value);
                    }
                    // A younger producer may already have shadowed the
                    // mapping; only clear it if it still names this slot.
                    if self.register_status.producer(rd) == Some(head) {
                        self.register_status.clear_producer(rd);
                    }
                }
            },
            Operation::Sw { .. } => {
                // The address was captured into the ROB slot at Execute;
                // the store station is long freed by now.
                if let (Some(address), Some(value)) = (self.rob[head].address, self.rob[head].value)
                {
                    self.memory.write(address, value);
                }
            },
            Operation::Beq { .. } | Operation::Bne { .. } => {
                if self.rob[head].branch_predicted != self.rob[head].branch_actual {
                    self.flush_younger(head);
                }
                if self.speculation_rob == Some(head) {
                    self.speculating = false;
                    self.speculation_rob = None;
                }
            },
            Operation::J { .. } | Operation::Nop => {},
        }

        debug!("cycle {}: commit {} from ROB{}", self.current_cycle, op, head);

        self.instructions[pc].commit_cycle = Some(self.current_cycle);
        self.instructions[pc].stage = Stage::Commit;

        self.rob[head].clear();
        self.rob_head = (head + 1) % self.rob.len();
        self.metrics.instructions_completed += 1;
    }

    /// Squash everything younger than a mispredicted branch: clear every
    /// busy ROB slot strictly after it up to the tail, drop rename
    /// mappings into those slots, free the stations feeding them, and
    /// pull the tail back to just past the branch. The PC is not
    /// redirected; branch targets stay symbolic, so the squashed
    /// instructions are simply lost.
    fn flush_younger(&mut self, branch_slot: usize) {
        let n = self.rob.len();
        let mut flushed = 0;
        let mut index = (branch_slot + 1) % n;
        while index != self.rob_tail {
            if self.rob[index].busy {
                if let RobDest::Reg(rd) = self.rob[index].dest {
                    if self.register_status.producer(rd) == Some(index) {
                        self.register_status.clear_producer(rd);
                    }
                }
                self.rob[index].clear();
                flushed += 1;
            }
            index = (index + 1) % n;
        }

        for station in &mut self.stations {
            if station.busy {
                if let Some(dest) = station.dest {
                    if !self.rob[dest].busy {
                        station.clear();
                    }
                }
            }
        }

        self.rob_tail = (branch_slot + 1) % n;
        self.speculating = false;
        self.speculation_rob = None;

        debug!(
            "cycle {}: misprediction at ROB{}, flushed {} younger entries",
            self.current_cycle, branch_slot, flushed
        );
    }

    // ---- Write-Result (CDB) ----------------------------------------------

    /// Broadcast every result that finished executing. Each completion
    /// resolves the waiting Qj/Qk of every busy station, moves the ROB
    /// slot to the Commit state, and frees the producing station. All
    /// completions in a cycle broadcast, processed in pool order.
    fn write_result_stage(&mut self) {
        for i in 0..self.stations.len() {
            if !self.stations[i].busy {
                continue;
            }
            let Some(slot) = self.stations[i].dest else {
                continue;
            };
            if !(self.rob[slot].ready && self.rob[slot].state == RobState::Write) {
                continue;
            }

            let value = self.rob[slot].value;
            for j in 0..self.stations.len() {
                if !self.stations[j].busy {
                    continue;
                }
                if self.stations[j].qj == Some(slot) {
                    self.stations[j].vj = value;
                    self.stations[j].qj = None;
                }
                if self.stations[j].qk == Some(slot) {
                    self.stations[j].vk = value;
                    self.stations[j].qk = None;
                }
            }

            self.rob[slot].state = RobState::Commit;
            if let Some(pc) = self.stations[i].instruction {
                self.instructions[pc].write_cycle = Some(self.current_cycle);
                self.instructions[pc].stage = Stage::WriteResult;
            }
            self.stations[i].clear();
        }
    }

    // ---- Execute ---------------------------------------------------------

    /// Count down every ready station; when a countdown reaches zero in
    /// the same examination, compute the result into the ROB slot. The
    /// station stays busy until Write-Result frees it.
    fn execute_stage(&mut self) {
        for i in 0..self.stations.len() {
            if !self.stations[i].is_ready() {
                continue;
            }
            // Stores reach memory only at commit, so a load must wait
            // for every older store to retire before it may read.
            if self.stations[i].class == StationClass::Load {
                if let Some(slot) = self.stations[i].dest {
                    if self.has_older_pending_store(slot) {
                        continue;
                    }
                }
            }
            if self.stations[i].cycles_remaining > 0 {
                self.stations[i].cycles_remaining -= 1;
                if let Some(slot) = self.stations[i].dest {
                    self.rob[slot].state = RobState::Execute;
                }
                if let Some(pc) = self.stations[i].instruction {
                    let cycle = self.current_cycle;
                    let inst = &mut self.instructions[pc];
                    inst.stage = Stage::Executing;
                    if inst.exec_start_cycle.is_none() {
                        inst.exec_start_cycle = Some(cycle);
                    }
                }
            }
            if self.stations[i].cycles_remaining == 0 {
                self.complete_execution(i);
                if let Some(pc) = self.stations[i].instruction {
                    self.instructions[pc].exec_end_cycle = Some(self.current_cycle);
                }
            }
        }
    }

    /// Any store still in flight in a ROB slot older than `load_slot`?
    /// Ring positions are measured from the head, so "older" is "closer
    /// to retirement".
    fn has_older_pending_store(&self, load_slot: usize) -> bool {
        let n = self.rob.len();
        let load_pos = (load_slot + n - self.rob_head) % n;
        self.rob.iter().enumerate().any(|(index, entry)| {
            if !entry.busy {
                return false;
            }
            let Some(pc) = entry.instruction else {
                return false;
            };
            matches!(self.instructions[pc].op, Operation::Sw { .. })
                && (index + n - self.rob_head) % n < load_pos
        })
    }

    /// Compute the result of the operation in station `index` into its
    /// ROB slot and mark the slot ready for broadcast.
    fn complete_execution(&mut self, index: usize) {
        let Some(slot) = self.stations[index].dest else {
            return;
        };
        let Some(op) = self.stations[index].op.clone() else {
            return;
        };
        let vj = self.stations[index].vj.unwrap_or(0);
        let vk = self.stations[index].vk.unwrap_or(0);

        match &op {
            Operation::Add { .. } => {
                self.rob[slot].value = Some(vj.wrapping_add(vk));
            },
            Operation::Sub { .. } => {
                self.rob[slot].value = Some(vj.wrapping_sub(vk));
            },
            Operation::Mul { .. } => {
                self.rob[slot].value = Some(vj.wrapping_mul(vk));
            },
            Operation::Div { .. } => {
                // Divide by zero yields 0 rather than trapping.
                let value = if vk == 0 { 0 } else { vj.wrapping_div(vk) };
                self.rob[slot].value = Some(value);
            },
            Operation::Addi { imm, .. } => {
                self.rob[slot].value = Some(vj.wrapping_add(*imm));
            },
            Operation::Lw { offset, .. } => {
                let address = vj.wrapping_add(*offset);
                self.rob[slot].value = Some(self.memory.read(address));
            },
            Operation::Sw { offset, .. } => {
                let address = vj.wrapping_add(*offset);
                self.stations[index].address = Some(address);
                // Held in the ROB slot so commit does not depend on the
                // station, which Write-Result frees first.
                self.rob[slot].address = Some(address);
                self.rob[slot].value = Some(vk);
            },
            Operation::Beq { .. } | Operation::Bne { .. } => {
                let taken = match &op {
                    Operation::Beq { .. } => vj == vk,
                    _ => vj != vk,
                };
                self.rob[slot].branch_actual = Some(taken);
                self.rob[slot].value = Some(i32::from(taken));
                if let Some(pc) = self.stations[index].instruction {
                    self.branch_predictor.update(pc, taken);
                }
                if self.rob[slot].branch_predicted != Some(taken) {
                    self.metrics.branch_mispredictions += 1;
                }
            },
            Operation::J { .. } | Operation::Nop => {},
        }

        self.rob[slot].ready = true;
        self.rob[slot].state = RobState::Write;
    }

    // ---- Issue -----------------------------------------------------------

    /// Dispatch the next program instruction into a free station of its
    /// class and the tail ROB slot. A full ROB issues nothing (the
    /// resulting dead cycle shows up as a bubble at commit); a missing
    /// station of the right class counts a stall.
    fn issue_stage(&mut self) {
        if self.rob_full() {
            return;
        }
        if self.pc >= self.instructions.len() {
            return;
        }

        let pc = self.pc;
        let op = self.instructions[pc].op.clone();
        let class = StationClass::of(&op);
        let Some(station_index) = self.find_free_station(class) else {
            self.metrics.stall_cycles += 1;
            return;
        };

        let slot = self.allocate_rob();
        {
            let entry = &mut self.rob[slot];
            entry.busy = true;
            entry.instruction = Some(pc);
            entry.state = RobState::Issue;
            entry.speculative = self.speculating;
        }

        // Operands are captured before the destination rename is
        // rewritten, so an instruction reading its own destination sees
        // the previous producer.
        let (vj, qj) = match op.src1() {
            Some(reg) => self.capture_operand(reg),
            None => (None, None),
        };
        let (vk, qk) = match op.src2() {
            Some(reg) => self.capture_operand(reg),
            None => (None, None),
        };

        let latency = self.config.latency(&op);
        {
            let station = &mut self.stations[station_index];
            station.busy = true;
            station.op = Some(op.clone());
            station.vj = vj;
            station.vk = vk;
            station.qj = qj;
            station.qk = qk;
            station.dest = Some(slot);
            station.address = None;
            station.instruction = Some(pc);
            station.cycles_remaining = latency;
        }

        match &op {
            Operation::Sw { offset, .. } => {
                self.rob[slot].dest = RobDest::Mem(*offset);
            },
            _ => {
                if let Some(rd) = op.dest() {
                    self.rob[slot].dest = RobDest::Reg(rd);
                    // R0 is never renamed; a write targeting it is
                    // dropped at commit and readers always see zero.
                    if !rd.is_zero() {
                        self.register_status.set_producer(rd, slot);
                    }
                }
            },
        }

        let station_name = self.stations[station_index].name.clone();
        debug!(
            "cycle {}: issue {} to {} (ROB{})",
            self.current_cycle, op, station_name, slot
        );
        {
            let inst = &mut self.instructions[pc];
            inst.issue_cycle = Some(self.current_cycle);
            inst.stage = Stage::Issued;
            inst.rob_slot = Some(slot);
            inst.rs_name = Some(station_name);
        }

        if op.is_conditional_branch() {
            let predicted = self.branch_predictor.predict(pc);
            self.rob[slot].branch_predicted = Some(predicted);
            if predicted {
                // Predicted taken: everything issued until this branch
                // retires is speculative. A nested predicted-taken branch
                // takes over the window (last wins).
                self.speculating = true;
                self.speculation_rob = Some(slot);
            }
        }

        self.pc += 1;
        self.metrics.instructions_issued += 1;
    }

    /// Rename lookup for one source operand: a completed producer hands
    /// its value over immediately; a pending one leaves a Q tag; no
    /// producer means the architectural value is current.
    fn capture_operand(&self, reg: Reg) -> (Option<i32>, Option<usize>) {
        if let Some(producer) = self.register_status.producer(reg) {
            if self.rob[producer].ready {
                (self.rob[producer].value, None)
            } else {
                (None, Some(producer))
            }
        } else {
            (Some(self.registers.read(reg)), None)
        }
    }

    fn find_free_station(&self, class: StationClass) -> Option<usize> {
        self.stations
            .iter()
            .position(|station| station.class == class && !station.busy)
    }

    /// Full with one slot spare: the arc [head, tail) cannot grow to the
    /// whole ring or full and empty would be indistinguishable.
    fn rob_full(&self) -> bool {
        (self.rob_tail + 1) % self.rob.len() == self.rob_head
    }

    fn allocate_rob(&mut self) -> usize {
        let slot = self.rob_tail;
        self.rob_tail = (slot + 1) % self.rob.len();
        slot
    }

    // ---- Debug invariants ------------------------------------------------

    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        let n = self.rob.len();
        let busy = self.rob.iter().filter(|entry| entry.busy).count();
        let arc = (self.rob_tail + n - self.rob_head) % n;
        debug_assert_eq!(busy, arc, "ROB occupancy must equal the head/tail arc");
        for offset in 0..n {
            let index = (self.rob_head + offset) % n;
            debug_assert_eq!(
                self.rob[index].busy,
                offset < arc,
                "busy ROB slots must form a contiguous ring arc"
            );
        }

        for (reg, slot) in self.register_status.iter() {
            debug_assert!(
                self.rob[slot].busy,
                "rename table must point at a busy ROB slot"
            );
            debug_assert_eq!(
                self.rob[slot].dest,
                RobDest::Reg(reg),
                "renamed slot must produce the renamed register"
            );
        }

        debug_assert_eq!(self.registers.values()[0], 0, "R0 must stay zero");

        for inst in &self.instructions {
            if let (Some(issue), Some(start)) = (inst.issue_cycle, inst.exec_start_cycle) {
                debug_assert!(issue < start, "execute must start after issue");
            }
            if let (Some(start), Some(end)) = (inst.exec_start_cycle, inst.exec_end_cycle) {
                debug_assert!(start <= end, "execute must end no earlier than it starts");
            }
            if let (Some(end), Some(write)) = (inst.exec_end_cycle, inst.write_cycle) {
                debug_assert!(end < write, "write must follow execute");
            }
            if let (Some(write), Some(commit)) = (inst.write_cycle, inst.commit_cycle) {
                debug_assert!(write < commit, "commit must follow write");
            }
        }
    }
}
