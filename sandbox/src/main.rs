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


// Vesta sandbox
// Renders a grid of models on the software device and reports what the GPU executed.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use vesta_core::renderer::GraphicsDevice;
use vesta_infra::{RayonWorkerPool, SoftDevice};
use vesta_sdk::prelude::*;

const FRAME_COUNT: usize = 240;
const GRID_SIZE: usize = 8;
const CHECKER_SIZE: u32 = 16;

/// A black and white checkerboard, 4 bytes per pixel.
fn checkerboard() -> Vec<u8> {
    (0..CHECKER_SIZE * CHECKER_SIZE)
        .flat_map(|pixel| {
            let (x, y) = (pixel % CHECKER_SIZE, pixel / CHECKER_SIZE);
            let value = if (x / 4 + y / 4) % 2 == 0 { 255 } else { 0 };
            [value, value, value, 255]
        })
        .collect()
}

/// Spreads models over a grid twice as wide as the culling bounds, so about a quarter
/// of them survive culling.
fn grid_models(config: &EngineConfig) -> Vec<Arc<dyn Model>> {
    let bounds = config.culling_bounds;
    let width = (bounds.x.max - bounds.x.min) * 2.0;
    let height = (bounds.y.max - bounds.y.min) * 2.0;
    let step = |extent: f32, index: usize| extent * (index as f32 / (GRID_SIZE - 1) as f32 - 0.5);

    (0..GRID_SIZE * GRID_SIZE)
        .map(|index| {
            let (column, row) = (index % GRID_SIZE, index / GRID_SIZE);
            let colour = [column as f32 / GRID_SIZE as f32, row as f32 / GRID_SIZE as f32, 0.5, 1.0];
            let position = [step(width, column), step(height, row), 1.0 + index as f32];
            Arc::new(MeshModel::triangle(colour).with_position(position)) as Arc<dyn Model>
        })
        .collect()
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match env::args().nth(1) {
        Some(path) => EngineConfig::from_ron_file(&path).with_context(|| format!("loading '{path}'"))?,
        None => EngineConfig::default(),
    };
    log::info!("Sandbox: {:?} with {} back buffers", config.render_engine, config.buffer_count);

    let device = SoftDevice::new();
    let workers = Arc::new(RayonWorkerPool::new(config.worker_threads)?);
    let (width, height) = (config.width, config.height);
    let mut engine = GraphicsEngine::new(Arc::clone(&device) as Arc<dyn GraphicsDevice>, workers, config)?;

    let texture = engine.register_resource(&checkerboard(), CHECKER_SIZE, CHECKER_SIZE, 4)?;
    for model in grid_models(engine.config()) {
        engine.submit_model(model)?;
    }
    if engine.config().render_engine == RenderEngineKind::IndividualDraw {
        engine.submit_model(Arc::new(MeshModel::quad(texture as u32)))?;
    }
    engine.process_data()?;

    for frame in 0..FRAME_COUNT {
        if frame == FRAME_COUNT / 2 {
            engine.resize(width / 2, height / 2)?;
        }
        engine.render()?;
    }
    engine.wait_for_async_tasks()?;

    let stats = device.stats();
    log::info!(
        "Sandbox: {} frames presented, {} direct draws, {} indirect draws over {} calls, {} dispatches",
        stats.presents,
        stats.draw_indexed,
        stats.indirect_draws(),
        stats.indirect_calls.len(),
        stats.dispatches
    );
    if stats.validation_errors > 0 {
        anyhow::bail!(
            "{} validation errors, first: {:?}",
            stats.validation_errors,
            stats.validation_messages.first()
        );
    }
    Ok(())
}
