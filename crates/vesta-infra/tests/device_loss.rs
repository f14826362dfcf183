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

//! A queue worker that dies mid-execution loses the device instead of hanging waiters.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vesta_core::renderer::api::*;
use vesta_core::renderer::{CommandList, GraphicsDevice, RenderError};
use vesta_infra::graphics::soft::{ComputeKernel, KernelContext, KernelError, SoftDevice};

#[derive(Debug)]
struct FaultyKernel;

impl ComputeKernel for FaultyKernel {
    fn name(&self) -> &str {
        "faulty"
    }

    fn thread_group_size(&self) -> [u32; 3] {
        [1, 1, 1]
    }

    fn dispatch(&self, _context: &mut KernelContext<'_>, _groups: [u32; 3]) -> Result<(), KernelError> {
        panic!("kernel fault");
    }
}

fn faulty_dispatch(device: &SoftDevice) -> Box<dyn CommandList> {
    device.register_kernel(Arc::new(FaultyKernel));
    let root = device
        .create_root_signature(&RootSignatureDescriptor {
            label: Some("faulty"),
            parameters: vec![RootParameter::Constants {
                register: 0,
                num_32bit_values: 1,
                visibility: ShaderVisibility::All,
            }],
            allow_input_assembler: false,
        })
        .unwrap();
    let shader = device.load_shader(Path::new("missing"), "faulty").unwrap();
    let pipeline = device
        .create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("faulty"),
            root_signature: root,
            shader: &shader,
        })
        .unwrap();

    let allocator = device.create_command_allocator(CommandListType::Compute).unwrap();
    let mut list = device.create_command_list(CommandListType::Compute).unwrap();
    list.reset(allocator).unwrap();
    list.set_compute_root_signature(root);
    list.set_pipeline_state(pipeline);
    list.dispatch(1, 1, 1);
    list.close().unwrap();
    list
}

#[test]
fn fence_waits_fail_once_a_queue_worker_dies() {
    let device = SoftDevice::new();
    let queue = device.create_command_queue(CommandListType::Compute).unwrap();
    let fence = device.create_fence(0).unwrap();
    let list = faulty_dispatch(&device);

    device.pause(CommandListType::Compute);
    queue.execute_command_lists(&[list.as_ref()]).unwrap();
    queue.signal(&fence, 1).unwrap();
    device.resume(CommandListType::Compute);

    assert!(matches!(fence.wait_for_value(1, None), Err(RenderError::DeviceLost)));
    assert!(matches!(device.wait_idle(), Err(RenderError::DeviceLost)));
    assert!(device.is_lost());
    assert_eq!(fence.completed_value(), 0);
}

#[test]
fn other_queues_stop_after_the_device_is_lost() {
    let device = SoftDevice::new();
    let compute = device.create_command_queue(CommandListType::Compute).unwrap();
    let direct = device.create_command_queue(CommandListType::Direct).unwrap();
    let compute_fence = device.create_fence(0).unwrap();
    let direct_fence = device.create_fence(0).unwrap();

    direct.wait(&compute_fence, 1).unwrap();
    direct.signal(&direct_fence, 1).unwrap();
    let list = faulty_dispatch(&device);
    device.pause(CommandListType::Compute);
    compute.execute_command_lists(&[list.as_ref()]).unwrap();
    compute.signal(&compute_fence, 1).unwrap();
    device.resume(CommandListType::Compute);

    assert!(matches!(
        direct_fence.wait_for_value(1, Some(Duration::from_secs(5))),
        Err(RenderError::DeviceLost)
    ));
    assert!(device.wait_idle().is_err());
    assert!(matches!(compute.signal(&compute_fence, 2), Err(RenderError::DeviceLost)));
    assert!(matches!(device.create_fence(0), Err(RenderError::DeviceLost)));
}
