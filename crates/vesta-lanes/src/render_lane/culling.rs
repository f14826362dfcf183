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

//! Parameters of the GPU culling pass.

pub use vesta_core::renderer::api::{CullingData, CULLING_THREAD_BLOCK_SIZE, INDIRECT_CULLING_SHADER};

/// Number of thread groups that cover `command_count` commands, one thread each.
pub const fn culling_group_count(command_count: u32) -> u32 {
    command_count.div_ceil(CULLING_THREAD_BLOCK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_round_up() {
        assert_eq!(culling_group_count(0), 0);
        assert_eq!(culling_group_count(1), 1);
        assert_eq!(culling_group_count(CULLING_THREAD_BLOCK_SIZE), 1);
        assert_eq!(culling_group_count(CULLING_THREAD_BLOCK_SIZE + 1), 2);
    }
}
