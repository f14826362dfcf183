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

//! Drives the culling kernel through the public device API, the way the render lane does.

use std::sync::Arc;

use vesta_core::math::{AxisBounds, Float3};
use vesta_core::renderer::api::*;
use vesta_core::renderer::{CommandList, GraphicsDevice};
use vesta_infra::graphics::soft::SoftDevice;

struct Scene {
    device: Arc<SoftDevice>,
    upload: ResourceId,
    commands: ResourceId,
    positions: ResourceId,
    output: ResourceId,
    culling: ResourceId,
    counter_offset: u64,
    table: DescriptorHeapId,
}

fn place(device: &SoftDevice, heap_type: HeapType, descriptors: &[ResourceDescriptor]) -> Vec<ResourceId> {
    let infos: Vec<_> = descriptors.iter().map(|d| device.resource_allocation_info(d)).collect();
    let size = infos.iter().map(|info| info.size).sum();
    let heap = device
        .create_heap(&HeapDescriptor {
            label: Some("test heap"),
            heap_type,
            size,
            alignment: DEFAULT_PLACEMENT_ALIGNMENT,
        })
        .unwrap();
    let mut offset = 0;
    descriptors
        .iter()
        .zip(infos)
        .map(|(descriptor, info)| {
            let resource = device
                .create_placed_resource(heap, offset, descriptor, ResourceState::Common)
                .unwrap();
            offset += info.size;
            resource
        })
        .collect()
}

fn scene(positions: &[Float3]) -> Scene {
    let device = SoftDevice::new();
    let count = positions.len() as u64;
    let commands_size = count * u64::from(IndirectCommand::STRIDE);
    let positions_size = count * 12;
    let counter_offset = align_up(commands_size, 4096);

    let upload = place(
        &device,
        HeapType::Upload,
        &[ResourceDescriptor::buffer("staging", (commands_size + positions_size).max(4))],
    )[0];
    let gpu = place(
        &device,
        HeapType::GpuOnly,
        &[
            ResourceDescriptor::buffer("commands", commands_size.max(4)),
            ResourceDescriptor::buffer("positions", positions_size.max(4)),
            ResourceDescriptor::buffer("output", counter_offset + 4).with_flags(ResourceFlags::ALLOW_UNORDERED_ACCESS),
        ],
    );
    let culling = place(&device, HeapType::CpuWrite, &[ResourceDescriptor::buffer("culling", 256)])[0];

    let commands: Vec<IndirectCommand> = (0..count as u32).map(|i| IndirectCommand::new(i, 3, 3 * i, 0)).collect();
    device.write_mapped(upload, 0, bytemuck::cast_slice(&commands)).unwrap();
    device.write_mapped(upload, commands_size, bytemuck::cast_slice(positions)).unwrap();
    let data = CullingData::new(count as u32, &AxisBounds::default());
    device.write_mapped(culling, 0, bytemuck::bytes_of(&data)).unwrap();

    let table = device
        .create_descriptor_heap(&DescriptorHeapDescriptor {
            label: Some("table"),
            kind: DescriptorHeapKind::CbvSrvUav,
            count: 3,
            shader_visible: true,
        })
        .unwrap();
    let start = device.cpu_descriptor_start(table).unwrap();
    let increment = device.descriptor_increment_size(DescriptorHeapKind::CbvSrvUav);
    let views = [
        ViewDescriptor::BufferSrv {
            resource: gpu[0],
            first_element: 0,
            element_count: count as u32,
            stride: IndirectCommand::STRIDE,
        },
        ViewDescriptor::BufferSrv {
            resource: gpu[1],
            first_element: 0,
            element_count: count as u32,
            stride: 12,
        },
        ViewDescriptor::BufferUav {
            resource: gpu[2],
            first_element: 0,
            element_count: count as u32,
            stride: IndirectCommand::STRIDE,
            counter_offset: Some(counter_offset),
        },
    ];
    for (i, view) in views.iter().enumerate() {
        device.create_view(view, start.offset(i as u64, increment)).unwrap();
    }

    Scene {
        device,
        upload,
        commands: gpu[0],
        positions: gpu[1],
        output: gpu[2],
        culling,
        counter_offset,
        table,
    }
}

fn run_culling(scene: &Scene, count: u32) {
    let device = &scene.device;
    let root = device
        .create_root_signature(&RootSignatureDescriptor {
            label: Some("culling"),
            parameters: vec![
                RootParameter::DescriptorTable {
                    ranges: vec![DescriptorRange {
                        range_type: DescriptorRangeType::Srv,
                        count: 2,
                        base_register: 0,
                    }],
                    visibility: ShaderVisibility::All,
                },
                RootParameter::DescriptorTable {
                    ranges: vec![DescriptorRange {
                        range_type: DescriptorRangeType::Uav,
                        count: 1,
                        base_register: 0,
                    }],
                    visibility: ShaderVisibility::All,
                },
                RootParameter::ConstantBufferView {
                    register: 0,
                    visibility: ShaderVisibility::All,
                },
            ],
            allow_input_assembler: false,
        })
        .unwrap();
    let shader = device.load_shader(std::path::Path::new("missing"), INDIRECT_CULLING_SHADER).unwrap();
    let pipeline = device
        .create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("culling"),
            root_signature: root,
            shader: &shader,
        })
        .unwrap();

    let queue = device.create_command_queue(CommandListType::Compute).unwrap();
    let allocator = device.create_command_allocator(CommandListType::Compute).unwrap();
    let mut list = device.create_command_list(CommandListType::Compute).unwrap();
    let commands_size = u64::from(count) * u64::from(IndirectCommand::STRIDE);
    let gpu_base = device.gpu_descriptor_start(scene.table).unwrap();
    let increment = device.descriptor_increment_size(DescriptorHeapKind::CbvSrvUav);

    list.reset(allocator).unwrap();
    list.copy_buffer_region(scene.commands, 0, scene.upload, 0, commands_size);
    list.copy_buffer_region(scene.positions, 0, scene.upload, commands_size, u64::from(count) * 12);
    list.resource_barrier(&[
        ResourceBarrier::transition(scene.commands, ResourceState::CopyDest, ResourceState::NonPixelShaderResource),
        ResourceBarrier::transition(scene.positions, ResourceState::CopyDest, ResourceState::NonPixelShaderResource),
    ]);
    list.set_compute_root_signature(root);
    list.set_descriptor_heaps(&[scene.table]);
    list.set_pipeline_state(pipeline);
    list.set_compute_root_descriptor_table(0, gpu_base);
    list.set_compute_root_descriptor_table(1, gpu_base.offset(2, increment));
    list.set_compute_root_constant_buffer_view(2, device.gpu_virtual_address(scene.culling).unwrap());
    list.dispatch(count.div_ceil(CULLING_THREAD_BLOCK_SIZE), 1, 1);
    list.close().unwrap();
    queue.execute_command_lists(&[list.as_ref()]).unwrap();
    device.wait_idle().unwrap();
}

fn read_output(scene: &Scene) -> (u32, Vec<IndirectCommand>) {
    let counter_bytes = scene.device.debug_read(scene.output, scene.counter_offset, 4).unwrap();
    let counter: u32 = bytemuck::pod_read_unaligned(&counter_bytes);
    let bytes = scene
        .device
        .debug_read(scene.output, 0, counter as usize * IndirectCommand::STRIDE as usize)
        .unwrap();
    (counter, bytemuck::pod_collect_to_vec(&bytes))
}

#[test]
fn commands_outside_the_bounds_are_dropped() {
    let positions = [[0.0, 0.0, 5.0], [3.0, 0.0, 5.0], [0.5, -0.5, 99.0]];
    let scene = scene(&positions);

    run_culling(&scene, 3);

    let (counter, survivors) = read_output(&scene);
    assert_eq!(counter, 2);
    assert_eq!(survivors[0].model_index, 0);
    assert_eq!(survivors[1].model_index, 2);
    assert_eq!(survivors[1].draw.start_index_location, 6);
    let stats = scene.device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    assert_eq!(stats.dispatched_groups, 1);
}

#[test]
fn every_visible_command_survives_past_one_thread_group() {
    let positions: Vec<Float3> = (0..300).map(|i| [0.0, 0.0, (i % 100) as f32]).collect();
    let scene = scene(&positions);

    run_culling(&scene, 300);

    let (counter, survivors) = read_output(&scene);
    assert_eq!(counter, 300);
    assert_eq!(survivors.last().map(|c| c.model_index), Some(299));
    assert_eq!(scene.device.stats().dispatched_groups, 3);
}

#[test]
fn buffers_decay_to_common_after_execution() {
    let scene = scene(&[[0.0, 0.0, 1.0]]);
    run_culling(&scene, 1);
    assert_eq!(scene.device.resource_state(scene.output), Some(ResourceState::Common));
    assert_eq!(scene.device.resource_state(scene.commands), Some(ResourceState::Common));
}
