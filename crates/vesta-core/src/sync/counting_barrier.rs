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

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Counts outstanding jobs and lets a thread sleep until all of them are done.
#[derive(Debug, Default)]
pub struct CountingBarrier {
    pending: Mutex<usize>,
    all_done: Condvar,
}

impl CountingBarrier {
    /// Creates a barrier with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `count` more outstanding jobs.
    pub fn add(&self, count: usize) {
        *self.lock() += count;
    }

    /// Marks one job as done, waking waiters when none is left.
    pub fn done(&self) {
        let mut pending = self.lock();
        debug_assert!(*pending > 0, "CountingBarrier::done called more often than add");
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.all_done.notify_all();
        }
    }

    /// Registers one job and returns a ticket that marks it done when dropped.
    pub fn ticket(self: &Arc<Self>) -> BarrierTicket {
        self.add(1);
        BarrierTicket {
            barrier: Arc::clone(self),
        }
    }

    /// Number of jobs not yet done.
    pub fn pending(&self) -> usize {
        *self.lock()
    }

    /// Blocks until every registered job is done.
    pub fn wait(&self) {
        let mut pending = self.lock();
        while *pending != 0 {
            pending = self
                .all_done
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until every registered job is done or `timeout` elapsed.
    /// Returns `true` if the jobs finished in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.lock();
        while *pending != 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            pending = self
                .all_done
                .wait_timeout(pending, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Marks one job of a [`CountingBarrier`] as done when dropped, even if the job panicked.
#[derive(Debug)]
pub struct BarrierTicket {
    barrier: Arc<CountingBarrier>,
}

impl Drop for BarrierTicket {
    fn drop(&mut self) {
        self.barrier.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn wait_returns_immediately_when_nothing_is_pending() {
        let barrier = CountingBarrier::new();
        barrier.wait();
        assert!(barrier.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn wait_blocks_until_every_ticket_dropped() {
        let barrier = Arc::new(CountingBarrier::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ticket = barrier.ticket();
                let finished = Arc::clone(&finished);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    finished.fetch_add(1, Ordering::SeqCst);
                    drop(ticket);
                })
            })
            .collect();

        barrier.wait();
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        assert_eq!(barrier.pending(), 0);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn wait_timeout_expires_with_outstanding_jobs() {
        let barrier = CountingBarrier::new();
        barrier.add(1);
        assert!(!barrier.wait_timeout(Duration::from_millis(10)));
        barrier.done();
        assert!(barrier.wait_timeout(Duration::from_millis(10)));
    }
}
