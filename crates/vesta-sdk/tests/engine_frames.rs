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

//! End-to-end frames of the engine on the software device.

use std::sync::Arc;

use vesta_core::renderer::api::CommandListType;
use vesta_core::renderer::RenderError;
use vesta_core::sync::InlineWorkerPool;
use vesta_core::{EngineConfig, RenderEngineKind};
use vesta_infra::graphics::soft::SoftDevice;
use vesta_lanes::render_lane::MeshModel;
use vesta_sdk::GraphicsEngine;

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

fn config(render_engine: RenderEngineKind, buffer_count: u32) -> EngineConfig {
    EngineConfig {
        app_name: "engine test".to_string(),
        width: 64,
        height: 48,
        buffer_count,
        render_engine,
        fence_timeout_ms: Some(2_000),
        ..EngineConfig::default()
    }
}

fn engine(config: EngineConfig) -> (Arc<SoftDevice>, GraphicsEngine) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = SoftDevice::new();
    let engine = GraphicsEngine::new(device.clone(), Arc::new(InlineWorkerPool), config).unwrap();
    (device, engine)
}

fn submit_triangles(engine: &mut GraphicsEngine, positions: &[[f32; 3]]) {
    for &position in positions {
        engine
            .submit_model(Arc::new(MeshModel::triangle(RED).with_position(position)))
            .unwrap();
    }
}

fn counter(device: &SoftDevice, engine: &GraphicsEngine, frame: usize) -> u32 {
    let buffer = engine.indirect_argument_buffer(frame).unwrap();
    let bytes = device
        .debug_read(buffer, engine.indirect_counter_offset().unwrap(), 4)
        .unwrap();
    u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[test]
fn three_models_render_with_one_indirect_draw() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0], [0.5, 0.5, 2.0], [-0.5, 0.0, 3.0]]);
    engine.process_data().unwrap();

    engine.render().unwrap();
    engine.wait_for_async_tasks().unwrap();

    let stats = device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    assert_eq!(stats.indirect_calls.len(), 1);
    assert_eq!(stats.indirect_calls[0].max_count, 3);
    assert!(stats.indirect_calls[0].live_count <= 3);
    assert_eq!(stats.indirect_calls[0].executed, 3);
    assert_eq!(stats.dispatches, 1);
    assert_eq!(stats.draw_indexed, 0);
    assert_eq!(stats.presents, 1);
    assert_eq!(stats.render_target_clears, 1);
    assert_eq!(stats.depth_clears, 1);
    assert_eq!(counter(&device, &engine, 0), 3);
}

#[test]
fn models_outside_the_bounds_are_culled() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0], [0.0, 5.0, 1.0], [0.0, 0.0, 250.0], [1.0, 1.0, 1.0]]);
    engine.process_data().unwrap();

    engine.render().unwrap();
    engine.wait_for_async_tasks().unwrap();

    let stats = device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    assert_eq!(stats.indirect_calls[0].max_count, 4);
    assert_eq!(stats.indirect_calls[0].model_indices, vec![0, 3]);
}

#[test]
fn append_counters_restart_every_frame() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0], [0.0, 0.0, 250.0], [1.0, 1.0, 1.0], [0.0, 9.0, 1.0]]);
    engine.process_data().unwrap();

    for _ in 0..6 {
        engine.render().unwrap();
    }
    engine.wait_for_async_tasks().unwrap();

    let stats = device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    let live: Vec<u32> = stats.indirect_calls.iter().map(|call| call.live_count).collect();
    assert_eq!(live, vec![2; 6]);
    assert!(stats.indirect_calls.iter().all(|call| call.model_indices == [0, 2]));
    assert_eq!(counter(&device, &engine, 0), 2);
    assert_eq!(counter(&device, &engine, 1), 2);
}

#[test]
fn empty_scene_renders() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));
    engine.process_data().unwrap();

    engine.render().unwrap();
    engine.render().unwrap();
    engine.wait_for_async_tasks().unwrap();

    let stats = device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    assert_eq!(stats.indirect_calls.len(), 2);
    assert!(stats.indirect_calls.iter().all(|call| call.max_count == 0 && call.executed == 0));
    assert_eq!(stats.presents, 2);
}

#[test]
fn textures_are_bound_in_indirect_mode() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));
    let texture = engine.register_resource(&[255; 2 * 2 * 4], 2, 2, 4).unwrap();
    assert_eq!(texture, 0);
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0]]);
    engine.process_data().unwrap();

    engine.render().unwrap();
    engine.wait_for_async_tasks().unwrap();

    let stats = device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    assert_eq!(stats.indirect_draws(), 1);
}

#[test]
fn individual_mode_draws_every_model() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndividualDraw, 2));
    let texture = engine.register_resource(&[128; 4 * 4 * 4], 4, 4, 4).unwrap();
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0], [9.0, 9.0, 9.0]]);
    engine
        .submit_model(Arc::new(MeshModel::quad(texture as u32)))
        .unwrap();
    engine.process_data().unwrap();

    engine.render().unwrap();
    engine.wait_for_async_tasks().unwrap();

    let stats = device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    assert_eq!(stats.draw_indexed, 3);
    assert!(stats.indirect_calls.is_empty());
    assert_eq!(stats.dispatches, 0);
    assert!(engine.indirect_argument_buffer(0).is_none());
}

#[test]
fn indirect_mode_rejects_a_second_vertex_layout() {
    let (_, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0]]);

    let err = engine.submit_model(Arc::new(MeshModel::quad(0))).unwrap_err();

    assert!(matches!(err, RenderError::IncompatibleModel(_)));
    assert_eq!(engine.model_count(), 1);
}

#[test]
fn unregistered_texture_fails_processing() {
    let (_, mut engine) = engine(config(RenderEngineKind::IndividualDraw, 2));
    engine.submit_model(Arc::new(MeshModel::quad(2))).unwrap();

    assert!(matches!(engine.process_data(), Err(RenderError::IncompatibleModel(_))));
    assert!(!engine.is_processed());
}

#[test]
fn processing_that_failed_after_placement_is_not_retried() {
    let mut config = config(RenderEngineKind::IndirectDraw, 2);
    config.fence_timeout_ms = Some(50);
    let (device, mut engine) = engine(config);
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0]]);
    device.pause(CommandListType::Copy);

    assert!(matches!(engine.process_data(), Err(RenderError::DeviceLost)));
    device.resume(CommandListType::Copy);

    assert!(matches!(engine.process_data(), Err(RenderError::OrderingViolation(_))));
    assert!(!engine.is_processed());
    assert!(matches!(engine.render(), Err(RenderError::NotInitialized(_))));
}

#[test]
fn phases_are_enforced() {
    let (_, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));

    assert!(matches!(engine.render(), Err(RenderError::NotInitialized(_))));

    engine.process_data().unwrap();
    assert!(matches!(
        engine.submit_model(Arc::new(MeshModel::triangle(RED))),
        Err(RenderError::OrderingViolation(_))
    ));
    assert!(matches!(
        engine.register_resource(&[0; 4], 1, 1, 4),
        Err(RenderError::OrderingViolation(_))
    ));
    assert!(matches!(engine.process_data(), Err(RenderError::OrderingViolation(_))));
}

#[test]
fn allocators_are_reused_across_many_frames() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0], [0.2, 0.2, 1.0]]);
    engine.process_data().unwrap();

    let mut frames = Vec::new();
    for _ in 0..20 {
        frames.push(engine.frame_index());
        engine.render().unwrap();
    }
    engine.wait_for_async_tasks().unwrap();

    let stats = device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    assert_eq!(stats.presents, 20);
    assert_eq!(stats.indirect_draws(), 40);
    assert_eq!(&frames[..4], &[0, 1, 0, 1]);
    assert_eq!(engine.allocators_in_use(), 0);
}

#[test]
fn gpu_lag_within_the_frame_budget_does_not_block() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 3));
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0]]);
    engine.process_data().unwrap();
    device.pause(CommandListType::Direct);

    // The graphics queue makes no progress while two frames are recorded.
    engine.render().unwrap();
    engine.render().unwrap();

    assert_eq!(device.stats().presents, 0);
    device.resume(CommandListType::Direct);
    engine.wait_for_async_tasks().unwrap();
    assert_eq!(device.stats().presents, 2);
}

#[test]
fn stalled_gpu_surfaces_device_lost() {
    let mut config = config(RenderEngineKind::IndirectDraw, 2);
    config.fence_timeout_ms = Some(50);
    let (device, mut engine) = engine(config);
    engine.process_data().unwrap();
    device.pause(CommandListType::Direct);

    engine.render().unwrap();
    let err = engine.render().unwrap_err();

    assert!(matches!(err, RenderError::DeviceLost));
    device.resume(CommandListType::Direct);
}

#[test]
fn resize_drains_the_frame_and_rebuilds_the_targets() {
    let (device, mut engine) = engine(config(RenderEngineKind::IndirectDraw, 2));
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0]]);
    engine.process_data().unwrap();
    for _ in 0..3 {
        engine.render().unwrap();
    }

    engine.resize(128, 96).unwrap();

    assert_eq!(engine.allocators_in_use(), 0);
    assert_eq!(engine.frame_index(), 0);
    assert_eq!(engine.depth_buffer().size(), (128, 96));
    assert_eq!(engine.viewport().scissor_rect().right, 128);
    assert_eq!(engine.viewport().scissor_rect().bottom, 96);

    for _ in 0..2 {
        engine.render().unwrap();
    }
    engine.wait_for_async_tasks().unwrap();
    let stats = device.stats();
    assert_eq!(stats.validation_errors, 0, "{:?}", stats.validation_messages);
    assert_eq!(stats.presents, 5);
}

#[test]
fn resize_to_the_same_or_an_empty_size_changes_nothing() {
    let (_, mut engine) = engine(config(RenderEngineKind::IndividualDraw, 2));
    engine.process_data().unwrap();
    engine.render().unwrap();
    let texture = engine.depth_buffer().texture();

    engine.resize(64, 48).unwrap();
    engine.resize(0, 48).unwrap();

    assert_eq!(engine.depth_buffer().texture(), texture);
    assert_eq!(engine.frame_index(), 1);
}

#[test]
fn invalid_config_is_rejected() {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = SoftDevice::new();
    let result = GraphicsEngine::new(device, Arc::new(InlineWorkerPool), config(RenderEngineKind::IndirectDraw, 5));
    assert!(matches!(result, Err(RenderError::InitializationFailed(_))));
}

#[test]
fn headless_engine_runs_on_worker_threads() {
    let mut config = config(RenderEngineKind::IndirectDraw, 3);
    config.worker_threads = 2;
    let mut engine = GraphicsEngine::headless(config).unwrap();
    let texture = engine.register_resource(&[7; 8 * 8 * 4], 8, 8, 4).unwrap();
    submit_triangles(&mut engine, &[[0.0, 0.0, 1.0], [0.0, 0.0, 2.0]]);
    engine.set_background_colour([0.0, 0.0, 0.0, 1.0]);

    engine.process_data().unwrap();
    engine.render().unwrap();
    engine.wait_for_async_tasks().unwrap();

    assert_eq!(texture, 0);
    assert_eq!(engine.frame_index(), 1);
    assert_eq!(engine.config().background_colour, [0.0, 0.0, 0.0, 1.0]);
}
