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

//! Resource-state tracking for one command list execution.
//!
//! Between executions every GPU-only resource has a committed state stored on the
//! resource itself. During an execution the tracker keeps the list-local state:
//! - a resource in `Common` is implicitly promoted on first use (buffers to any
//!   state, textures to read states and copy states);
//! - at the end of the execution, buffers, anything touched on a copy queue and
//!   anything promoted to a read state decay back to `Common`.
//!
//! `Present` and `Common` are the same state.

use std::collections::HashMap;

use vesta_core::renderer::api::{CommandListType, ResourceBarrier, ResourceId, ResourceState};

use super::memory::SoftMemory;

fn normalize(state: ResourceState) -> ResourceState {
    match state {
        ResourceState::Present => ResourceState::Common,
        other => other,
    }
}

#[derive(Debug, Clone, Copy)]
struct Touched {
    state: ResourceState,
    promoted: bool,
}

#[derive(Debug)]
pub(crate) struct StateTracker {
    queue_type: CommandListType,
    touched: HashMap<usize, Touched>,
}

impl StateTracker {
    pub(crate) fn new(queue_type: CommandListType) -> Self {
        Self {
            queue_type,
            touched: HashMap::new(),
        }
    }

    /// Checks that `id` can be accessed as `required`, promoting it out of `Common`
    /// when the rules allow it.
    pub(crate) fn require(&mut self, memory: &SoftMemory, id: ResourceId, required: ResourceState) -> Result<(), String> {
        let resource = memory.resource(id).map_err(|err| err.to_string())?;
        if !resource.is_tracked() {
            return if resource.state.satisfies(required) {
                Ok(())
            } else {
                Err(format!(
                    "'{}' lives in a {:?} heap and cannot be used as {required:?}",
                    resource.label, resource.heap_type
                ))
            };
        }

        let entry = self.touched.get(&id.0).copied().unwrap_or(Touched {
            state: resource.state,
            promoted: false,
        });
        let current = normalize(entry.state);
        if current.satisfies(required) {
            return Ok(());
        }
        if entry.promoted && current.is_read_only() && required.is_read_only() {
            return Ok(());
        }
        if current == ResourceState::Common {
            let promotable = resource.is_buffer()
                || required.is_read_only()
                || matches!(required, ResourceState::CopyDest | ResourceState::CopySource);
            if promotable {
                self.touched.insert(
                    id.0,
                    Touched {
                        state: required,
                        promoted: required.is_read_only(),
                    },
                );
                return Ok(());
            }
        }
        Err(format!(
            "'{}' is in {:?} but {required:?} is required",
            resource.label, entry.state
        ))
    }

    /// Applies an explicit transition. A mismatching `before` state is reported, and
    /// the resource still ends up in `after`.
    pub(crate) fn transition(&mut self, memory: &SoftMemory, barrier: &ResourceBarrier) -> Result<(), String> {
        let resource = memory.resource(barrier.resource).map_err(|err| err.to_string())?;
        if !resource.is_tracked() {
            return Err(format!(
                "Barrier on '{}', which lives in a {:?} heap",
                resource.label, resource.heap_type
            ));
        }
        let current = self
            .touched
            .get(&barrier.resource.0)
            .map_or(resource.state, |entry| entry.state);
        self.touched.insert(
            barrier.resource.0,
            Touched {
                state: barrier.after,
                promoted: false,
            },
        );
        if normalize(current) != normalize(barrier.before) {
            return Err(format!(
                "Barrier on '{}' expects {:?} but the resource is in {current:?}",
                resource.label, barrier.before
            ));
        }
        if normalize(barrier.before) == normalize(barrier.after) {
            return Err(format!(
                "Barrier on '{}' from {:?} to itself",
                resource.label, barrier.before
            ));
        }
        Ok(())
    }

    /// Commits the list-local states, applying decay.
    pub(crate) fn finish(self, memory: &mut SoftMemory) {
        for (id, touched) in self.touched {
            let Ok(resource) = memory.resource_mut(ResourceId(id)) else {
                continue;
            };
            let decays = resource.is_buffer() || self.queue_type == CommandListType::Copy || touched.promoted;
            resource.state = if decays { ResourceState::Common } else { touched.state };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_core::renderer::api::{HeapType, ResourceDescriptor, TextureFormat, DEFAULT_PLACEMENT_ALIGNMENT};

    const BUFFER: ResourceId = ResourceId(1);
    const TEXTURE: ResourceId = ResourceId(2);

    fn memory() -> SoftMemory {
        let mut memory = SoftMemory::default();
        memory.create_heap(0, "gpu".into(), HeapType::GpuOnly, 2 * DEFAULT_PLACEMENT_ALIGNMENT, false);
        memory
            .place(1, 0, 0, &ResourceDescriptor::buffer("buffer", 64), ResourceState::Common)
            .unwrap();
        memory
            .place(
                2,
                0,
                DEFAULT_PLACEMENT_ALIGNMENT,
                &ResourceDescriptor::texture_2d("texture", 4, 4, TextureFormat::Rgba8Unorm),
                ResourceState::Common,
            )
            .unwrap();
        memory
    }

    #[test]
    fn buffers_promote_to_writes_and_decay() {
        let mut memory = memory();
        let mut tracker = StateTracker::new(CommandListType::Compute);

        tracker.require(&memory, BUFFER, ResourceState::CopyDest).unwrap();
        tracker
            .transition(
                &memory,
                &ResourceBarrier::transition(BUFFER, ResourceState::CopyDest, ResourceState::UnorderedAccess),
            )
            .unwrap();
        tracker.require(&memory, BUFFER, ResourceState::UnorderedAccess).unwrap();
        tracker.finish(&mut memory);

        assert_eq!(memory.resource(BUFFER).unwrap().state, ResourceState::Common);
    }

    #[test]
    fn textures_only_promote_to_reads_and_copies() {
        let mut memory = memory();
        let mut tracker = StateTracker::new(CommandListType::Direct);

        assert!(tracker.require(&memory, TEXTURE, ResourceState::RenderTarget).is_err());
        tracker.require(&memory, TEXTURE, ResourceState::CopyDest).unwrap();
        tracker.finish(&mut memory);

        assert_eq!(memory.resource(TEXTURE).unwrap().state, ResourceState::CopyDest);
    }

    #[test]
    fn copy_queue_work_always_decays() {
        let mut memory = memory();
        let mut tracker = StateTracker::new(CommandListType::Copy);
        tracker.require(&memory, TEXTURE, ResourceState::CopyDest).unwrap();
        tracker.finish(&mut memory);
        assert_eq!(memory.resource(TEXTURE).unwrap().state, ResourceState::Common);
    }

    #[test]
    fn mismatched_barrier_is_reported() {
        let memory = memory();
        let mut tracker = StateTracker::new(CommandListType::Direct);
        let barrier = ResourceBarrier::transition(TEXTURE, ResourceState::RenderTarget, ResourceState::Present);
        assert!(tracker.transition(&memory, &barrier).is_err());
    }

    #[test]
    fn present_and_common_are_interchangeable() {
        let memory = memory();
        let mut tracker = StateTracker::new(CommandListType::Direct);
        let to_target = ResourceBarrier::transition(TEXTURE, ResourceState::Present, ResourceState::RenderTarget);
        tracker.transition(&memory, &to_target).unwrap();
        tracker.require(&memory, TEXTURE, ResourceState::RenderTarget).unwrap();
    }
}
