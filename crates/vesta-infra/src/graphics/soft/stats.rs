// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Counters collected by the software device while it executes work.

/// Cap on the validation messages kept for inspection.
const MAX_VALIDATION_MESSAGES: usize = 64;

/// One `execute_indirect` call, as the GPU saw it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndirectCall {
    /// The `max_count` the call was recorded with.
    pub max_count: u32,
    /// The value read from the count buffer.
    pub live_count: u32,
    /// Draws actually issued, `min(max_count, live_count)`.
    pub executed: u32,
    /// Model-index root constants of the issued draws, in execution order.
    pub model_indices: Vec<u32>,
}

/// A snapshot of what the software device executed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SoftStats {
    /// Command lists executed, on every queue.
    pub command_lists: usize,
    /// Direct `draw_indexed_instanced` calls.
    pub draw_indexed: usize,
    /// Every `execute_indirect` call.
    pub indirect_calls: Vec<IndirectCall>,
    /// Compute dispatches, including empty ones.
    pub dispatches: usize,
    /// Thread groups dispatched.
    pub dispatched_groups: u64,
    /// Buffer and texture copies.
    pub copies: usize,
    /// Render target clears.
    pub render_target_clears: usize,
    /// Depth clears.
    pub depth_clears: usize,
    /// Frames presented.
    pub presents: usize,
    /// Number of validation failures.
    pub validation_errors: usize,
    /// The first validation messages, for diagnostics.
    pub validation_messages: Vec<String>,
}

impl SoftStats {
    pub(crate) fn report(&mut self, message: String) {
        log::warn!("SoftDevice validation: {message}");
        self.validation_errors += 1;
        if self.validation_messages.len() < MAX_VALIDATION_MESSAGES {
            self.validation_messages.push(message);
        }
    }

    /// Draws issued by every `execute_indirect` call.
    pub fn indirect_draws(&self) -> u64 {
        self.indirect_calls.iter().map(|call| u64::from(call.executed)).sum()
    }
}
