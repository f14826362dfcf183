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

//! Synchronization primitives shared by the setup pass and the frame loop.
//!
//! - [`SharedAddress`]: a value requested early and resolved once, later.
//! - [`CountingBarrier`]: blocks until a number of outstanding jobs report completion.
//! - [`WorkerPool`]: where CPU-side jobs run, and [`run_and_wait`] to join them.

mod counting_barrier;
mod shared_address;
mod worker_pool;

pub use self::counting_barrier::{BarrierTicket, CountingBarrier};
pub use self::shared_address::SharedAddress;
pub use self::worker_pool::{run_and_wait, InlineWorkerPool, Job, WorkerPool};
