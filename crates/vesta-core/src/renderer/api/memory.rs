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

//! Heap classes and placement arithmetic.

/// The class of memory a heap lives in. Every placed resource inherits the
/// CPU visibility of the heap it is placed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapType {
    /// CPU-writable staging memory, read by the GPU once as a copy source.
    Upload,
    /// Device-local memory the CPU cannot see.
    GpuOnly,
    /// CPU-writable memory the GPU reads directly (constants, small per-frame data).
    CpuWrite,
    /// GPU-written memory the CPU reads back.
    ReadBack,
}

impl HeapType {
    /// Every heap class, in the order pools are materialized.
    pub const ALL: [HeapType; 4] = [
        HeapType::Upload,
        HeapType::GpuOnly,
        HeapType::CpuWrite,
        HeapType::ReadBack,
    ];

    /// Returns `true` if resources in this heap can be written through a CPU mapping.
    pub const fn is_cpu_writable(self) -> bool {
        matches!(self, HeapType::Upload | HeapType::CpuWrite)
    }

    /// Returns `true` if resources in this heap can be read through a CPU mapping.
    pub const fn is_cpu_readable(self) -> bool {
        matches!(self, HeapType::ReadBack | HeapType::CpuWrite)
    }
}

/// An opaque handle to a heap created by a [`GraphicsDevice`](crate::renderer::GraphicsDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(pub usize);

/// Describes a heap to be created.
#[derive(Debug, Clone)]
pub struct HeapDescriptor<'a> {
    /// A debug label.
    pub label: Option<&'a str>,
    /// The memory class of the heap.
    pub heap_type: HeapType,
    /// Size in bytes. Already rounded up to `alignment`.
    pub size: u64,
    /// Alignment of the heap's base address.
    pub alignment: u64,
}

/// Size and alignment a resource needs when placed into a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAllocationInfo {
    /// Bytes the resource occupies in the heap.
    pub size: u64,
    /// Required alignment of the placement offset.
    pub alignment: u64,
}

/// The default placement alignment of buffers and textures (64 KiB).
pub const DEFAULT_PLACEMENT_ALIGNMENT: u64 = 64 * 1024;

/// Rounds `value` up to the next multiple of `alignment`.
///
/// An alignment of `0` or `1` leaves the value untouched.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_next_multiple() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(13, 0), 13);
        assert_eq!(align_up(13, 1), 13);
        assert_eq!(align_up(13, 12), 24);
    }

    #[test]
    fn cpu_visibility_per_class() {
        assert!(HeapType::Upload.is_cpu_writable());
        assert!(!HeapType::Upload.is_cpu_readable());
        assert!(!HeapType::GpuOnly.is_cpu_writable());
        assert!(HeapType::CpuWrite.is_cpu_writable());
        assert!(HeapType::CpuWrite.is_cpu_readable());
        assert!(HeapType::ReadBack.is_cpu_readable());
    }
}
