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

use crate::renderer::api::{CommandAllocatorId, CommandListType};
use crate::renderer::error::RenderError;
use crate::renderer::traits::{CommandList, GraphicsDevice};
use std::fmt;
use std::sync::Arc;

/// The lifecycle of one command allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorSlot {
    /// Ready to be reset and recorded into.
    Free,
    /// Recording (`fence_value` is `None`), or submitted and waiting for the fence
    /// to reach `fence_value`.
    InUse {
        /// The fence value that marks the submission as complete.
        fence_value: Option<u64>,
    },
}

/// A ring of command allocators sharing one command list.
///
/// [`CommandListManager::reset`] picks the first free allocator, so the ring never needs
/// a global frame index to stay consistent after a resize or an idle wait.
pub struct CommandListManager {
    device: Arc<dyn GraphicsDevice>,
    list_type: CommandListType,
    allocators: Vec<CommandAllocatorId>,
    slots: Vec<AllocatorSlot>,
    list: Box<dyn CommandList>,
    current: Option<usize>,
}

impl CommandListManager {
    /// Creates `allocator_count` allocators and one closed command list.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        list_type: CommandListType,
        allocator_count: usize,
    ) -> Result<Self, RenderError> {
        if allocator_count == 0 {
            return Err(RenderError::InitializationFailed(format!(
                "CommandListManager({}) needs at least one allocator",
                list_type.name()
            )));
        }

        let allocators = (0..allocator_count)
            .map(|_| device.create_command_allocator(list_type))
            .collect::<Result<Vec<_>, _>>()?;
        let list = device.create_command_list(list_type)?;

        log::debug!(
            "CommandListManager({}): created {} allocators",
            list_type.name(),
            allocator_count
        );

        Ok(Self {
            device,
            list_type,
            allocators,
            slots: vec![AllocatorSlot::Free; allocator_count],
            list,
            current: None,
        })
    }

    /// The queue type the list records for.
    pub fn list_type(&self) -> CommandListType {
        self.list_type
    }

    /// Picks the first free allocator, resets it and starts recording the list.
    ///
    /// ## Returns
    /// The index of the allocator slot now recording.
    /// ## Errors
    /// * `RenderError::AllocatorPoolExhausted` - If every allocator is still in use.
    /// * `RenderError::OrderingViolation` - If the previous recording was never submitted.
    pub fn reset(&mut self) -> Result<usize, RenderError> {
        if let Some(index) = self.current {
            return Err(RenderError::OrderingViolation(format!(
                "CommandListManager({}): allocator {index} is still recording or was never submitted",
                self.list_type.name()
            )));
        }

        let Some(index) = self.slots.iter().position(|slot| *slot == AllocatorSlot::Free) else {
            log::error!(
                "CommandListManager({}): all {} allocators are in use",
                self.list_type.name(),
                self.slots.len()
            );
            return Err(RenderError::AllocatorPoolExhausted {
                list_type: self.list_type,
                capacity: self.slots.len(),
            });
        };

        let allocator = self.allocators[index];
        self.device.reset_command_allocator(allocator)?;
        self.list.reset(allocator)?;

        self.slots[index] = AllocatorSlot::InUse { fence_value: None };
        self.current = Some(index);
        Ok(index)
    }

    /// The command list, for recording.
    pub fn command_list(&mut self) -> &mut dyn CommandList {
        &mut *self.list
    }

    /// The command list, for submission.
    pub fn list(&self) -> &dyn CommandList {
        &*self.list
    }

    /// Ends recording.
    pub fn close(&mut self) -> Result<(), RenderError> {
        self.list.close()
    }

    /// Index of the slot recording or waiting for submission.
    pub fn current_slot(&self) -> Option<usize> {
        self.current
    }

    /// Records that the current recording was submitted and completes at `fence_value`.
    pub fn record_submission(&mut self, fence_value: u64) -> Result<usize, RenderError> {
        let index = self.current.take().ok_or_else(|| {
            RenderError::OrderingViolation(format!(
                "CommandListManager({}): submission without a reset",
                self.list_type.name()
            ))
        })?;
        self.slots[index] = AllocatorSlot::InUse {
            fence_value: Some(fence_value),
        };
        Ok(index)
    }

    /// Drops a recording that will never be submitted and frees its allocator.
    ///
    /// Nothing was handed to a queue, so the allocator is reusable at once.
    /// ## Returns
    /// The freed slot, or `None` if nothing was recording.
    pub fn abandon(&mut self) -> Option<usize> {
        let index = self.current.take()?;
        if self.list.is_recording() {
            if let Err(err) = self.list.close() {
                log::debug!(
                    "CommandListManager({}): abandoned list closed with {err}",
                    self.list_type.name()
                );
            }
        }
        self.slots[index] = AllocatorSlot::Free;
        log::warn!(
            "CommandListManager({}): abandoned the recording in allocator {index}",
            self.list_type.name()
        );
        Some(index)
    }

    /// Marks the allocator at `index` as free. The GPU must be done with it.
    pub fn finish_execution(&mut self, index: usize) {
        debug_assert!(
            self.current != Some(index),
            "finish_execution called on the slot being recorded"
        );
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = AllocatorSlot::Free;
        }
    }

    /// Frees every submitted slot whose fence value is at most `completed_value`.
    /// ## Returns
    /// The number of slots freed.
    pub fn release_completed(&mut self, completed_value: u64) -> usize {
        let completed: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                AllocatorSlot::InUse {
                    fence_value: Some(value),
                } if *value <= completed_value => Some(index),
                _ => None,
            })
            .collect();

        for &index in &completed {
            self.finish_execution(index);
        }
        completed.len()
    }

    /// The state of every allocator.
    pub fn slots(&self) -> &[AllocatorSlot] {
        &self.slots
    }

    /// Number of allocators not free.
    pub fn in_use_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| **slot != AllocatorSlot::Free)
            .count()
    }
}

impl fmt::Debug for CommandListManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandListManager")
            .field("list_type", &self.list_type)
            .field("slots", &self.slots)
            .field("current", &self.current)
            .finish()
    }
}
