// metrics.rs
//
// Aggregate performance counters collected by the engine.

use std::fmt;

/// Monotonic counters accumulated over a run. A bubble is a cycle whose
/// Commit phase found no ready head; a stall is a cycle whose Issue phase
/// was blocked by reservation station exhaustion (a full ROB does not
/// count as a stall).
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub total_cycles: usize,
    pub instructions_issued: usize,
    pub instructions_completed: usize,
    pub bubble_cycles: usize,
    pub stall_cycles: usize,
    pub branch_mispredictions: usize,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions committed per cycle; 0.0 before anything retires.
    pub fn ipc(&self) -> f64 {
        if self.total_cycles == 0 {
            return 0.0;
        }
        self.instructions_completed as f64 / self.total_cycles as f64
    }
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Performance metrics:")?;
        writeln!(f, "  Total cycles:           {}", self.total_cycles)?;
        writeln!(f, "  Instructions issued:    {}", self.instructions_issued)?;
        writeln!(f, "  Instructions completed: {}", self.instructions_completed)?;
        writeln!(f, "  IPC:                    {:.2}", self.ipc())?;
        writeln!(f, "  Bubble cycles:          {}", self.bubble_cycles)?;
        writeln!(f, "  Stall cycles:           {}", self.stall_cycles)?;
        write!(f, "  Branch mispredictions:  {}", self.branch_mispredictions)
    }
}
