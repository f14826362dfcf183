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

//! Frame pacing: command allocator rings and fence bookkeeping per queue.
//!
//! A [`CommandListManager`] owns the allocators of one queue type and never resets an
//! allocator whose commands may still execute. A [`CommandQueueManager`] owns the
//! queue's fence and the per-frame fence values that decide when a frame slot is free.

mod list_manager;
#[cfg(test)]
pub(crate) mod mock;
mod queue_manager;

pub use self::list_manager::{AllocatorSlot, CommandListManager};
pub use self::queue_manager::CommandQueueManager;
