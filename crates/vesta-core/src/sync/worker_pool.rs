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

use super::counting_barrier::CountingBarrier;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

/// A unit of CPU work handed to a [`WorkerPool`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs, possibly on other threads.
pub trait WorkerPool: Send + Sync + Debug {
    /// Schedules `job`. It may run before this call returns.
    fn spawn(&self, job: Job);

    /// Number of threads jobs are spread over.
    fn thread_count(&self) -> usize;
}

/// A pool running every job on the calling thread, in submission order.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineWorkerPool;

impl WorkerPool for InlineWorkerPool {
    fn spawn(&self, job: Job) {
        job();
    }

    fn thread_count(&self) -> usize {
        1
    }
}

/// Runs every job on `pool` and blocks until all of them finished.
///
/// Returns the first error reported, if any. Every job runs even if another failed.
pub fn run_and_wait<E>(pool: &dyn WorkerPool, jobs: Vec<Box<dyn FnOnce() -> Result<(), E> + Send>>) -> Result<(), E>
where
    E: Send + 'static,
{
    let barrier = Arc::new(CountingBarrier::new());
    let errors: Arc<Mutex<Vec<E>>> = Arc::new(Mutex::new(Vec::new()));

    for job in jobs {
        let ticket = barrier.ticket();
        let errors = Arc::clone(&errors);
        pool.spawn(Box::new(move || {
            let _ticket = ticket;
            if let Err(err) = job() {
                errors.lock().unwrap_or_else(PoisonError::into_inner).push(err);
            }
        }));
    }

    barrier.wait();

    let mut errors = errors.lock().unwrap_or_else(PoisonError::into_inner);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.swap_remove(0))
    }
}
