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

//! Descriptor heaps of the software device.
//!
//! Handles encode `(heap id + 1) << 32` in their upper half and
//! `slot * DESCRIPTOR_INCREMENT` in their lower half, so handle arithmetic done by
//! callers with [`CpuDescriptorHandle::offset`] lands on the right slot.

use std::collections::HashMap;

use vesta_core::renderer::api::{
    CpuDescriptorHandle, DescriptorHeapDescriptor, DescriptorHeapKind, GpuDescriptorHandle, ViewDescriptor,
};
use vesta_core::renderer::ResourceError;

/// Distance in bytes between two slots of any soft descriptor heap.
pub(crate) const DESCRIPTOR_INCREMENT: u32 = 32;

fn encode(heap: usize, slot: u32) -> u64 {
    ((heap as u64 + 1) << 32) + u64::from(slot) * u64::from(DESCRIPTOR_INCREMENT)
}

fn decode(handle: u64) -> Option<(usize, u32)> {
    let heap = (handle >> 32).checked_sub(1)?;
    let low = handle & 0xffff_ffff;
    if low % u64::from(DESCRIPTOR_INCREMENT) != 0 {
        return None;
    }
    Some((heap as usize, (low / u64::from(DESCRIPTOR_INCREMENT)) as u32))
}

#[derive(Debug)]
pub(crate) struct SoftDescriptorHeap {
    pub(crate) label: String,
    pub(crate) kind: DescriptorHeapKind,
    pub(crate) shader_visible: bool,
    pub(crate) slots: Vec<Option<ViewDescriptor>>,
}

#[derive(Debug, Default)]
pub(crate) struct SoftDescriptors {
    heaps: HashMap<usize, SoftDescriptorHeap>,
}

impl SoftDescriptors {
    pub(crate) fn create(&mut self, id: usize, descriptor: &DescriptorHeapDescriptor) -> Result<(), ResourceError> {
        if descriptor.count == 0 {
            return Err(ResourceError::BackendError(
                "A descriptor heap needs at least one slot".to_string(),
            ));
        }
        if descriptor.shader_visible && descriptor.kind != DescriptorHeapKind::CbvSrvUav {
            return Err(ResourceError::BackendError(format!(
                "{:?} descriptor heaps cannot be shader visible",
                descriptor.kind
            )));
        }
        self.heaps.insert(
            id,
            SoftDescriptorHeap {
                label: descriptor.label.unwrap_or("descriptor heap").to_string(),
                kind: descriptor.kind,
                shader_visible: descriptor.shader_visible,
                slots: vec![None; descriptor.count as usize],
            },
        );
        Ok(())
    }

    pub(crate) fn destroy(&mut self, id: usize) -> bool {
        self.heaps.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.heaps.len()
    }

    pub(crate) fn heap(&self, id: usize) -> Option<&SoftDescriptorHeap> {
        self.heaps.get(&id)
    }

    fn unknown(id: usize) -> ResourceError {
        ResourceError::BackendError(format!("Unknown descriptor heap {id}"))
    }

    pub(crate) fn cpu_start(&self, id: usize) -> Result<CpuDescriptorHandle, ResourceError> {
        self.heaps.get(&id).ok_or_else(|| Self::unknown(id))?;
        Ok(CpuDescriptorHandle(encode(id, 0)))
    }

    pub(crate) fn gpu_start(&self, id: usize) -> Result<GpuDescriptorHandle, ResourceError> {
        let heap = self.heaps.get(&id).ok_or_else(|| Self::unknown(id))?;
        if !heap.shader_visible {
            return Err(ResourceError::BackendError(format!(
                "Descriptor heap '{}' is not shader visible",
                heap.label
            )));
        }
        Ok(GpuDescriptorHandle(encode(id, 0)))
    }

    fn slot_mut(&mut self, handle: u64) -> Result<(&mut SoftDescriptorHeap, usize), ResourceError> {
        let (id, slot) = decode(handle)
            .ok_or_else(|| ResourceError::BackendError(format!("Malformed descriptor handle {handle:#x}")))?;
        let heap = self.heaps.get_mut(&id).ok_or_else(|| Self::unknown(id))?;
        if slot as usize >= heap.slots.len() {
            return Err(ResourceError::OutOfBounds {
                offset: u64::from(slot),
                size: 1,
                capacity: heap.slots.len() as u64,
            });
        }
        Ok((heap, slot as usize))
    }

    pub(crate) fn write(&mut self, view: &ViewDescriptor, destination: CpuDescriptorHandle) -> Result<(), ResourceError> {
        let (heap, slot) = self.slot_mut(destination.0)?;
        if heap.kind != view.heap_kind() {
            return Err(ResourceError::BackendError(format!(
                "{:?} view written into {:?} heap '{}'",
                view.heap_kind(),
                heap.kind,
                heap.label
            )));
        }
        heap.slots[slot] = Some(*view);
        Ok(())
    }

    pub(crate) fn copy(
        &mut self,
        count: u32,
        destination: CpuDescriptorHandle,
        source: CpuDescriptorHandle,
        kind: DescriptorHeapKind,
    ) -> Result<(), ResourceError> {
        let mut views = Vec::with_capacity(count as usize);
        for i in 0..u64::from(count) {
            let (heap, slot) = self.slot_mut(source.offset(i, DESCRIPTOR_INCREMENT).0)?;
            if heap.kind != kind {
                return Err(ResourceError::BackendError(format!(
                    "Copying {kind:?} descriptors out of {:?} heap '{}'",
                    heap.kind, heap.label
                )));
            }
            views.push(heap.slots[slot]);
        }
        for (i, view) in views.into_iter().enumerate() {
            let (heap, slot) = self.slot_mut(destination.offset(i as u64, DESCRIPTOR_INCREMENT).0)?;
            if heap.kind != kind {
                return Err(ResourceError::BackendError(format!(
                    "Copying {kind:?} descriptors into {:?} heap '{}'",
                    heap.kind, heap.label
                )));
            }
            heap.slots[slot] = view;
        }
        Ok(())
    }

    pub(crate) fn view_at_cpu(&self, handle: CpuDescriptorHandle) -> Option<ViewDescriptor> {
        let (id, slot) = decode(handle.0)?;
        *self.heaps.get(&id)?.slots.get(slot as usize)?
    }

    /// Reads a view through a GPU handle; only shader-visible heaps answer.
    pub(crate) fn view_at_gpu(&self, handle: GpuDescriptorHandle) -> Option<ViewDescriptor> {
        let (id, slot) = decode(handle.0)?;
        let heap = self.heaps.get(&id).filter(|heap| heap.shader_visible)?;
        *heap.slots.get(slot as usize)?
    }

    /// The heap a GPU handle points into.
    pub(crate) fn heap_of(handle: GpuDescriptorHandle) -> Option<usize> {
        decode(handle.0).map(|(id, _)| id)
    }
}
