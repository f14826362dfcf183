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

use crate::renderer::api::CommandListType;
use crate::renderer::error::RenderError;
use crate::renderer::traits::CommandList;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// A monotonically increasing counter shared between the CPU and the GPU.
pub trait Fence: Send + Sync + Debug {
    /// The largest value the fence has reached.
    fn completed_value(&self) -> u64;

    /// Sets the fence to `value` from the CPU.
    fn signal(&self, value: u64);

    /// Blocks the calling thread until the fence reaches `value`.
    /// ## Arguments
    /// * `value` - The value to wait for.
    /// * `timeout` - An upper bound for the wait. `None` waits forever.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the timeout expired first.
    fn wait_for_value(&self, value: u64, timeout: Option<Duration>) -> Result<(), RenderError>;
}

/// Executes command lists in submission order.
///
/// Every operation is ordered with the ones submitted before it on the same queue.
/// Ordering across queues is only established through fences: one queue signals,
/// another waits.
pub trait CommandQueue: Send + Sync + Debug {
    /// The kind of lists the queue accepts.
    fn list_type(&self) -> CommandListType;

    /// Submits closed command lists for execution.
    /// ## Errors
    /// * `RenderError::OrderingViolation` - If a list is still recording or has the
    ///   wrong type for this queue.
    fn execute_command_lists(&self, lists: &[&dyn CommandList]) -> Result<(), RenderError>;

    /// Sets `fence` to `value` once all previously submitted work completed.
    fn signal(&self, fence: &Arc<dyn Fence>, value: u64) -> Result<(), RenderError>;

    /// Makes the queue wait, on the GPU timeline, until `fence` reaches `value`.
    fn wait(&self, fence: &Arc<dyn Fence>, value: u64) -> Result<(), RenderError>;

    /// Returns the queue as `Any`, so backends can recover their concrete type.
    fn as_any(&self) -> &dyn Any;
}
