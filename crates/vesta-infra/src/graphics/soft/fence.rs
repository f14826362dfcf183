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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use vesta_core::renderer::{Fence, RenderError};

/// A monotonic GPU/CPU synchronization point backed by a mutex and a condition variable.
///
/// Once the owning device is lost, waits for values that were not reached fail with
/// [`RenderError::DeviceLost`].
#[derive(Debug)]
pub struct SoftFence {
    value: Mutex<u64>,
    signaled: Condvar,
    lost: AtomicBool,
}

impl SoftFence {
    /// Creates a fence whose completed value is `initial_value`.
    pub fn new(initial_value: u64) -> Self {
        Self {
            value: Mutex::new(initial_value),
            signaled: Condvar::new(),
            lost: AtomicBool::new(false),
        }
    }

    /// Fails every pending and future wait on a value not reached yet.
    pub(crate) fn mark_lost(&self) {
        let _value = self.lock();
        self.lost.store(true, Ordering::SeqCst);
        self.signaled.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Fence for SoftFence {
    fn completed_value(&self) -> u64 {
        *self.lock()
    }

    fn signal(&self, value: u64) {
        *self.lock() = value;
        self.signaled.notify_all();
    }

    fn wait_for_value(&self, value: u64, timeout: Option<Duration>) -> Result<(), RenderError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut current = self.lock();
        while *current < value {
            if self.lost.load(Ordering::SeqCst) {
                log::error!("SoftFence: device lost while waiting for {value} (completed {})", *current);
                return Err(RenderError::DeviceLost);
            }
            current = match deadline {
                None => self.signaled.wait(current).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        log::error!("SoftFence: timed out waiting for {value} (completed {})", *current);
                        return Err(RenderError::DeviceLost);
                    }
                    self.signaled
                        .wait_timeout(current, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        Ok(())
    }
}
