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

use vesta_core::renderer::RenderError;
use vesta_core::sync::{Job, WorkerPool};

/// A [`WorkerPool`] backed by a dedicated `rayon` thread pool.
#[derive(Debug)]
pub struct RayonWorkerPool {
    pool: rayon::ThreadPool,
}

impl RayonWorkerPool {
    /// Builds a pool of `threads` workers; `0` lets rayon pick one per logical core.
    pub fn new(threads: usize) -> Result<Self, RenderError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("vesta-worker-{index}"))
            .build()
            .map_err(|err| RenderError::InitializationFailed(format!("Failed to build worker pool: {err}")))?;
        log::info!("RayonWorkerPool: {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }
}

impl WorkerPool for RayonWorkerPool {
    fn spawn(&self, job: Job) {
        self.pool.spawn(job);
    }

    fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}
