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

//! # Vesta Data
//!
//! Placement of engine data into GPU memory.
//!
//! Everything in this crate follows the same two-phase pattern: during registration
//! work is only *reserved* (heap space, descriptor slots) and callers receive
//! [`SharedAddress`](vesta_core::sync::SharedAddress) handles; once every reservation is
//! known the heaps and tables are created in one go and the handles resolve.

#![warn(missing_docs)]

pub mod allocators;
pub mod buffers;
pub mod descriptors;
pub mod textures;
