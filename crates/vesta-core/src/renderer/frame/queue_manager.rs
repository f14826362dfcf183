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

use crate::renderer::error::RenderError;
use crate::renderer::frame::CommandListManager;
use crate::renderer::traits::{CommandQueue, Fence, GraphicsDevice};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Paces one command queue with a fence and one fence value per frame slot.
///
/// `fence_values[i]` is the value that marks the last submission made for frame slot
/// `i` as complete. Values only ever grow, so a single fence covers every slot.
pub struct CommandQueueManager {
    queue: Arc<dyn CommandQueue>,
    fence: Option<Arc<dyn Fence>>,
    fence_values: Vec<u64>,
    timeout: Option<Duration>,
}

impl CommandQueueManager {
    /// Wraps `queue` with `frame_count` fence slots.
    ///
    /// ## Arguments
    /// * `queue` - The queue being paced.
    /// * `frame_count` - Number of frame slots (the back buffer count for the graphics
    ///   queue, `1` for a queue used once per setup pass).
    /// * `timeout` - Bound for every CPU wait. `None` waits forever.
    pub fn new(queue: Arc<dyn CommandQueue>, frame_count: usize, timeout: Option<Duration>) -> Self {
        Self {
            queue,
            fence: None,
            fence_values: vec![0; frame_count.max(1)],
            timeout,
        }
    }

    fn name(&self) -> &'static str {
        self.queue.list_type().name()
    }

    /// Creates the fence at the current value of `frame_index` and advances that value.
    pub fn init_sync_objects(&mut self, device: &dyn GraphicsDevice, frame_index: usize) -> Result<(), RenderError> {
        let initial = self.fence_values[frame_index];
        self.fence = Some(device.create_fence(initial)?);
        self.fence_values[frame_index] += 1;
        log::debug!(
            "CommandQueueManager({}): fence created at {initial} for {} frame slots",
            self.name(),
            self.fence_values.len()
        );
        Ok(())
    }

    /// The paced queue.
    pub fn queue(&self) -> &Arc<dyn CommandQueue> {
        &self.queue
    }

    /// The queue's fence.
    /// ## Errors
    /// * `RenderError::NotInitialized` - Before [`CommandQueueManager::init_sync_objects`].
    pub fn fence(&self) -> Result<&Arc<dyn Fence>, RenderError> {
        self.fence
            .as_ref()
            .ok_or(RenderError::NotInitialized("command queue sync objects"))
    }

    /// The fence value the next submission for `frame_index` completes at.
    pub fn fence_value(&self, frame_index: usize) -> u64 {
        self.fence_values[frame_index]
    }

    /// Every per-frame fence value.
    pub fn fence_values(&self) -> &[u64] {
        &self.fence_values
    }

    /// Submits the closed list of `lists` and tags its allocator with the fence value of
    /// `frame_index`.
    pub fn execute_command_list(&self, lists: &mut CommandListManager, frame_index: usize) -> Result<(), RenderError> {
        if lists.list().is_recording() {
            return Err(RenderError::OrderingViolation(format!(
                "CommandQueueManager({}): command list submitted before it was closed",
                self.name()
            )));
        }
        self.queue.execute_command_lists(&[lists.list()])?;
        lists.record_submission(self.fence_values[frame_index])?;
        Ok(())
    }

    /// Frees every allocator of `lists` whose submission the fence has passed.
    pub fn release_completed_allocators(&self, lists: &mut CommandListManager) -> Result<usize, RenderError> {
        let completed = self.fence()?.completed_value();
        Ok(lists.release_completed(completed))
    }

    /// Signals the fence value of `frame_index` on the queue and returns it.
    pub fn signal(&self, frame_index: usize) -> Result<u64, RenderError> {
        let value = self.fence_values[frame_index];
        self.queue.signal(self.fence()?, value)?;
        Ok(value)
    }

    /// Makes this queue wait on the GPU until `fence` reaches `value`.
    pub fn wait_on(&self, fence: &Arc<dyn Fence>, value: u64) -> Result<(), RenderError> {
        self.queue.wait(fence, value)
    }

    /// Blocks the CPU until the fence reaches `value`.
    pub fn wait_for_value(&self, value: u64) -> Result<(), RenderError> {
        self.fence()?.wait_for_value(value, self.timeout).inspect_err(|_| {
            log::error!(
                "CommandQueueManager({}): fence did not reach {value} in time",
                self.name()
            );
        })
    }

    /// Drains the queue: signals the value of `frame_index`, blocks until it is reached,
    /// then advances that value.
    pub fn wait_for_gpu(&mut self, frame_index: usize) -> Result<(), RenderError> {
        let value = self.signal(frame_index)?;
        self.wait_for_value(value)?;
        self.fence_values[frame_index] += 1;
        Ok(())
    }

    /// Ends frame `frame_index` and makes `next_index` ready for recording.
    ///
    /// Signals the current frame's value, then only blocks if the GPU has not yet
    /// finished the last frame that used `next_index`. The CPU can therefore run up to
    /// `frame_count - 1` frames ahead of the GPU without stalling.
    pub fn move_to_next_frame(&mut self, frame_index: usize, next_index: usize) -> Result<(), RenderError> {
        let current_value = self.signal(frame_index)?;

        let next_value = self.fence_values[next_index];
        if self.fence()?.completed_value() < next_value {
            log::trace!(
                "CommandQueueManager({}): waiting for frame slot {next_index} (value {next_value})",
                self.name()
            );
            self.wait_for_value(next_value)?;
        }

        self.fence_values[next_index] = current_value + 1;
        Ok(())
    }

    /// Sets every frame slot to the value of `frame_index`, after the swap chain
    /// restarted its back buffer rotation.
    pub fn reset_fence_values_with(&mut self, frame_index: usize) {
        let value = self.fence_values[frame_index];
        self.fence_values.iter_mut().for_each(|slot| *slot = value);
    }

    /// Signals the value of `frame_index` and makes `consumer` wait for it on the GPU.
    ///
    /// Every frame slot then moves past the signalled value, so the next submission
    /// on this queue can never be mistaken for the handed-off one.
    /// ## Returns
    /// The signalled value.
    pub fn signal_and_hand_off(&mut self, frame_index: usize, consumer: &CommandQueueManager) -> Result<u64, RenderError> {
        let value = self.signal(frame_index)?;
        consumer.wait_on(self.fence()?, value)?;
        self.fence_values.iter_mut().for_each(|slot| *slot = value + 1);
        Ok(value)
    }
}

impl fmt::Debug for CommandQueueManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueueManager")
            .field("queue", &self.name())
            .field("fence_values", &self.fence_values)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::CommandListType;
    use crate::renderer::frame::mock::{MockDevice, MockQueue};

    fn graphics_manager(device: &Arc<MockDevice>, frame_count: usize) -> (Arc<MockQueue>, CommandQueueManager) {
        let queue = device.mock_queue(CommandListType::Direct);
        let mut manager = CommandQueueManager::new(queue.clone(), frame_count, Some(Duration::from_millis(50)));
        manager.init_sync_objects(device.as_ref(), 0).unwrap();
        (queue, manager)
    }

    #[test]
    fn init_advances_the_initial_slot() {
        let device = MockDevice::new_arc();
        let (_, manager) = graphics_manager(&device, 3);
        assert_eq!(manager.fence_values(), &[1, 0, 0]);
        assert_eq!(manager.fence().unwrap().completed_value(), 0);
    }

    #[test]
    fn fence_is_required_before_signalling() {
        let device = MockDevice::new_arc();
        let queue = device.mock_queue(CommandListType::Direct);
        let manager = CommandQueueManager::new(queue, 2, None);
        assert!(matches!(manager.signal(0), Err(RenderError::NotInitialized(_))));
    }

    #[test]
    fn wait_for_gpu_drains_and_advances() {
        let device = MockDevice::new_arc();
        let (_, mut manager) = graphics_manager(&device, 2);

        manager.wait_for_gpu(0).unwrap();

        assert_eq!(manager.fence().unwrap().completed_value(), 1);
        assert_eq!(manager.fence_values(), &[2, 0]);
    }

    #[test]
    fn move_to_next_frame_does_not_block_within_the_frame_budget() {
        let device = MockDevice::new_arc();
        let (queue, mut manager) = graphics_manager(&device, 3);
        queue.pause();

        // The GPU makes no progress while the CPU ends two frames.
        manager.move_to_next_frame(0, 1).unwrap();
        manager.move_to_next_frame(1, 2).unwrap();

        assert_eq!(manager.fence().unwrap().completed_value(), 0);
        assert_eq!(manager.fence_values(), &[1, 2, 3]);

        // A third frame would reuse slot 0, whose value 1 was never reached.
        let err = manager.move_to_next_frame(2, 0).unwrap_err();
        assert!(matches!(err, RenderError::DeviceLost));

        queue.resume();
        assert_eq!(manager.fence().unwrap().completed_value(), 3);
    }

    #[test]
    fn move_to_next_frame_keeps_values_monotonic() {
        let device = MockDevice::new_arc();
        let (_, mut manager) = graphics_manager(&device, 2);

        let mut frame = 0;
        let mut last = 0;
        for _ in 0..10 {
            let next = (frame + 1) % 2;
            let signalled = manager.fence_value(frame);
            assert!(signalled > last);
            last = signalled;
            manager.move_to_next_frame(frame, next).unwrap();
            frame = next;
        }
        assert_eq!(manager.fence().unwrap().completed_value(), last);
    }

    #[test]
    fn reset_fence_values_copies_the_given_slot() {
        let device = MockDevice::new_arc();
        let (_, mut manager) = graphics_manager(&device, 3);
        manager.move_to_next_frame(0, 1).unwrap();
        manager.reset_fence_values_with(1);
        assert_eq!(manager.fence_values(), &[2, 2, 2]);
    }

    #[test]
    fn allocators_return_once_their_value_completes() {
        let device = MockDevice::new_arc();
        let (queue, mut manager) = graphics_manager(&device, 2);
        let mut lists = CommandListManager::new(device.clone(), CommandListType::Direct, 2).unwrap();
        queue.pause();

        lists.reset().unwrap();
        lists.close().unwrap();
        manager.execute_command_list(&mut lists, 0).unwrap();
        manager.move_to_next_frame(0, 1).unwrap();

        assert_eq!(manager.release_completed_allocators(&mut lists).unwrap(), 0);
        assert_eq!(lists.in_use_count(), 1);

        queue.resume();
        assert_eq!(manager.release_completed_allocators(&mut lists).unwrap(), 1);
        assert_eq!(lists.in_use_count(), 0);
    }

    #[test]
    fn unclosed_list_is_rejected() {
        let device = MockDevice::new_arc();
        let (_, manager) = graphics_manager(&device, 2);
        let mut lists = CommandListManager::new(device.clone(), CommandListType::Direct, 2).unwrap();
        lists.reset().unwrap();
        assert!(matches!(
            manager.execute_command_list(&mut lists, 0),
            Err(RenderError::OrderingViolation(_))
        ));
    }

    #[test]
    fn hand_off_orders_the_consumer_and_skips_past_the_value() {
        let device = MockDevice::new_arc();
        let (graphics_queue, graphics) = graphics_manager(&device, 2);
        let compute_queue = device.mock_queue(CommandListType::Compute);
        let mut compute = CommandQueueManager::new(compute_queue, 2, None);
        compute.init_sync_objects(device.as_ref(), 0).unwrap();

        let value = compute.signal_and_hand_off(0, &graphics).unwrap();

        assert_eq!(value, 1);
        assert_eq!(compute.fence_values(), &[2, 2]);
        assert_eq!(graphics_queue.waits(), vec![1]);
    }
}
