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

// branch_predictor.rs
//
// This file contains the two-bit saturating branch predictor. Each branch
// PC maps to a counter in 0..=3, starting at 1 (weakly not-taken); the
// branch is predicted taken when the counter is 2 or higher.

use std::collections::HashMap;

/// Counter value every unseen PC starts from.
const INITIAL_STATE: u8 = 1;

/// Per-PC two-bit saturating counter predictor.
#[derive(Debug, Clone, Default)]
pub struct BranchPredictor {
    table: HashMap<usize, u8>,
    predictions: usize,
    correct_predictions: usize,
}

impl BranchPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, pc: usize) -> u8 {
        self.table.get(&pc).copied().unwrap_or(INITIAL_STATE)
    }

    /// Predict whether the branch at `pc` will be taken, recording that a
    /// prediction was made.
    pub fn predict(&mut self, pc: usize) -> bool {
        self.predictions += 1;
        self.state(pc) >= 2
    }

    /// Feed the actual outcome back. The counter saturates at 0 and 3; a
    /// prediction is credited as correct when the pre-update state agreed
    /// with the outcome.
    pub fn update(&mut self, pc: usize, taken: bool) {
        let state = self.state(pc);
        if (state >= 2) == taken {
            self.correct_predictions += 1;
        }
        let next = if taken {
            (state + 1).min(3)
        } else {
            state.saturating_sub(1)
        };
        self.table.insert(pc, next);
    }

    /// Current counter for a PC, for observation.
    pub fn counter(&self, pc: usize) -> u8 {
        self.state(pc)
    }

    pub fn predictions(&self) -> usize {
        self.predictions
    }

    pub fn correct_predictions(&self) -> usize {
        self.correct_predictions
    }

    pub fn accuracy(&self) -> f64 {
        if self.predictions == 0 {
            return 0.0;
        }
        self.correct_predictions as f64 / self.predictions as f64
    }
}
