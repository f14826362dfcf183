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

//! Backend-agnostic GPU value types.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`memory`]**: Heap classes, heap descriptors and placement alignment.
//! - **[`resource`]**: Resource handles, descriptors, flags and states.
//! - **[`descriptor`]**: Descriptor heaps, handles and view descriptions.
//! - **[`command`]**: Queue types, barriers and fixed-function state.
//! - **[`indirect`]**: Indirect argument layouts and command signatures.
//! - **[`pipeline`]**: Root signatures, shaders, vertex layouts and pipeline state.

pub mod command;
pub mod descriptor;
pub mod indirect;
pub mod memory;
pub mod pipeline;
pub mod resource;

pub use self::command::*;
pub use self::descriptor::*;
pub use self::indirect::*;
pub use self::memory::*;
pub use self::pipeline::*;
pub use self::resource::*;
