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

//! Bump allocation of heap space, and the heaps materialized from it.

use vesta_core::renderer::api::{align_up, HeapDescriptor, HeapId, HeapType};
use vesta_core::renderer::{GraphicsDevice, ResourceError};

/// Accumulates reservations for one heap class, then creates the heap once.
///
/// Reservations bump a cursor: the cursor is rounded up to the requested alignment,
/// returned as the offset, then advanced by the size. The heap is created with the
/// final cursor rounded up to the largest alignment seen, so every returned offset
/// lies inside it.
#[derive(Debug)]
pub struct HeapAllocator {
    heap_type: HeapType,
    cursor: u64,
    max_alignment: u64,
    reservations: usize,
    created: bool,
    heap: Option<HeapId>,
}

impl HeapAllocator {
    /// Creates an empty allocator for `heap_type`.
    pub fn new(heap_type: HeapType) -> Self {
        Self {
            heap_type,
            cursor: 0,
            max_alignment: 1,
            reservations: 0,
            created: false,
            heap: None,
        }
    }

    /// The class of the heap.
    pub fn heap_type(&self) -> HeapType {
        self.heap_type
    }

    /// Reserves `size` bytes aligned to `alignment` and returns their offset.
    /// ## Errors
    /// * `ResourceError::HeapAlreadyCreated` - If the heap was already created.
    pub fn reserve_size_and_get_offset(&mut self, size: u64, alignment: u64) -> Result<u64, ResourceError> {
        if self.created {
            debug_assert!(false, "reservation into the {:?} heap after creation", self.heap_type);
            return Err(ResourceError::HeapAlreadyCreated(self.heap_type));
        }

        let offset = align_up(self.cursor, alignment);
        self.max_alignment = self.max_alignment.max(alignment);
        self.cursor = offset + size;
        self.reservations += 1;
        Ok(offset)
    }

    /// Size the heap is (or will be) created with.
    pub fn size(&self) -> u64 {
        align_up(self.cursor, self.max_alignment)
    }

    /// Largest alignment reserved so far.
    pub fn alignment(&self) -> u64 {
        self.max_alignment
    }

    /// Returns `true` once [`HeapAllocator::create_heap`] ran.
    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Creates the backing heap. A pool without reservations is marked created without
    /// allocating anything.
    /// ## Errors
    /// * `ResourceError::HeapAlreadyCreated` - On a second call.
    pub fn create_heap(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        if self.created {
            debug_assert!(false, "the {:?} heap was created twice", self.heap_type);
            return Err(ResourceError::HeapAlreadyCreated(self.heap_type));
        }

        if self.reservations > 0 {
            let size = self.size();
            let heap = device.create_heap(&HeapDescriptor {
                label: Some(heap_label(self.heap_type)),
                heap_type: self.heap_type,
                size,
                alignment: self.max_alignment,
            })?;
            log::info!(
                "HeapAllocator({:?}): created {} bytes ({} reservations, alignment {})",
                self.heap_type,
                size,
                self.reservations,
                self.max_alignment
            );
            self.heap = Some(heap);
        } else {
            log::debug!("HeapAllocator({:?}): no reservation, nothing to create", self.heap_type);
        }

        self.created = true;
        Ok(())
    }

    /// The backing heap.
    /// ## Errors
    /// * `ResourceError::HeapNotCreated` - Before creation, or if nothing was reserved.
    pub fn heap(&self) -> Result<HeapId, ResourceError> {
        self.heap.ok_or(ResourceError::HeapNotCreated(self.heap_type))
    }

    /// Destroys the heap and returns the allocator to its empty state, ready for a new
    /// round of reservations. Resources placed in the heap must be destroyed first.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some(heap) = self.heap.take() {
            device.destroy_heap(heap);
            log::debug!("HeapAllocator({:?}): released {} bytes", self.heap_type, self.size());
        }
        *self = Self::new(self.heap_type);
    }
}

fn heap_label(heap_type: HeapType) -> &'static str {
    match heap_type {
        HeapType::Upload => "upload heap",
        HeapType::GpuOnly => "gpu-only heap",
        HeapType::CpuWrite => "cpu-write heap",
        HeapType::ReadBack => "read-back heap",
    }
}

/// One [`HeapAllocator`] per heap class, created together.
#[derive(Debug)]
pub struct HeapPools {
    pools: [HeapAllocator; 4],
}

impl Default for HeapPools {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapPools {
    /// Creates four empty pools.
    pub fn new() -> Self {
        Self {
            pools: HeapType::ALL.map(HeapAllocator::new),
        }
    }

    fn slot(heap_type: HeapType) -> usize {
        match heap_type {
            HeapType::Upload => 0,
            HeapType::GpuOnly => 1,
            HeapType::CpuWrite => 2,
            HeapType::ReadBack => 3,
        }
    }

    /// The pool of `heap_type`.
    pub fn pool(&self, heap_type: HeapType) -> &HeapAllocator {
        &self.pools[Self::slot(heap_type)]
    }

    /// The pool of `heap_type`, mutably.
    pub fn pool_mut(&mut self, heap_type: HeapType) -> &mut HeapAllocator {
        &mut self.pools[Self::slot(heap_type)]
    }

    /// Reserves space in the pool of `heap_type`.
    pub fn reserve(&mut self, heap_type: HeapType, size: u64, alignment: u64) -> Result<u64, ResourceError> {
        self.pool_mut(heap_type).reserve_size_and_get_offset(size, alignment)
    }

    /// The heap of `heap_type`.
    pub fn heap(&self, heap_type: HeapType) -> Result<HeapId, ResourceError> {
        self.pool(heap_type).heap()
    }

    /// Creates every pool's heap.
    pub fn create_heaps(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.pools.iter_mut().try_for_each(|pool| pool.create_heap(device))
    }

    /// Releases the heap of `heap_type`.
    pub fn release(&mut self, heap_type: HeapType, device: &dyn GraphicsDevice) {
        self.pool_mut(heap_type).release(device);
    }

    /// Total bytes across every pool.
    pub fn total_size(&self) -> u64 {
        self.pools.iter().map(HeapAllocator::size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_infra::graphics::soft::SoftDevice;

    #[test]
    fn offsets_are_aligned_and_disjoint() {
        let mut pool = HeapAllocator::new(HeapType::GpuOnly);
        let requests = [(100u64, 64u64), (1, 256), (4096, 4096), (3, 1), (10, 16)];

        let mut ranges = Vec::new();
        for (size, alignment) in requests {
            let offset = pool.reserve_size_and_get_offset(size, alignment).unwrap();
            assert_eq!(offset % alignment, 0);
            ranges.push((offset, offset + size));
        }

        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "{pair:?} overlap");
        }
        assert_eq!(pool.alignment(), 4096);
        assert!(ranges.iter().all(|&(_, end)| end <= pool.size()));
        assert_eq!(pool.size() % 4096, 0);
    }

    #[test]
    fn empty_pool_is_created_without_a_heap() {
        let device = SoftDevice::new();
        let mut pool = HeapAllocator::new(HeapType::ReadBack);

        pool.create_heap(device.as_ref()).unwrap();

        assert!(pool.is_created());
        assert!(matches!(pool.heap(), Err(ResourceError::HeapNotCreated(HeapType::ReadBack))));
        assert_eq!(device.heap_count(), 0);
    }

    #[test]
    fn pools_create_one_heap_per_used_class() {
        let device = SoftDevice::new();
        let mut pools = HeapPools::new();
        pools.reserve(HeapType::Upload, 512, 256).unwrap();
        pools.reserve(HeapType::GpuOnly, 100, 65536).unwrap();

        pools.create_heaps(device.as_ref()).unwrap();

        assert!(pools.heap(HeapType::Upload).is_ok());
        assert!(pools.heap(HeapType::GpuOnly).is_ok());
        assert!(pools.heap(HeapType::CpuWrite).is_err());
        assert_eq!(pools.pool(HeapType::GpuOnly).size(), 65536);
        assert_eq!(device.heap_count(), 2);

        pools.release(HeapType::Upload, device.as_ref());
        assert_eq!(device.heap_count(), 1);
        assert!(!pools.pool(HeapType::Upload).is_created());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "after creation")]
    fn reserving_after_creation_trips_the_debug_assertion() {
        let device = SoftDevice::new();
        let mut pool = HeapAllocator::new(HeapType::Upload);
        pool.reserve_size_and_get_offset(16, 16).unwrap();
        pool.create_heap(device.as_ref()).unwrap();
        let _ = pool.reserve_size_and_get_offset(16, 16);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn creating_twice_is_an_error_in_release() {
        let device = SoftDevice::new();
        let mut pool = HeapAllocator::new(HeapType::Upload);
        pool.create_heap(device.as_ref()).unwrap();
        assert!(matches!(
            pool.create_heap(device.as_ref()),
            Err(ResourceError::HeapAlreadyCreated(HeapType::Upload))
        ));
    }
}
