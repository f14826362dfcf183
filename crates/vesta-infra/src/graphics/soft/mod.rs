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

//! A software reference GPU implementing every `vesta-core` backend contract.
//!
//! It keeps the explicit model intact: heaps, placed resources, descriptor heaps,
//! command allocators, asynchronous queues and fences. Draws are not rasterized;
//! they are validated and counted. Copies, clears and compute kernels really run,
//! so their results can be read back with [`SoftDevice::debug_read`].

mod command_list;
mod descriptors;
mod device;
mod executor;
mod fence;
mod kernels;
mod memory;
mod queue;
mod state;
mod stats;
mod swap_chain;

pub use self::command_list::SoftCommandList;
pub use self::device::SoftDevice;
pub use self::fence::SoftFence;
pub use self::kernels::{ComputeKernel, IndirectCullingKernel, KernelContext, KernelError, StructuredBuffer};
pub use self::queue::SoftQueue;
pub use self::stats::{IndirectCall, SoftStats};
pub use self::swap_chain::HeadlessSwapChain;
