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

//! Asynchronous queues: one worker thread per queue, fed through a channel.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use vesta_core::renderer::api::{CommandListType, ResourceId, ResourceState};
use vesta_core::renderer::{CommandList, CommandQueue, Fence, RenderError};

use super::command_list::{RecordedList, SoftCommandList};
use super::device::SoftShared;
use super::executor::Executor;

/// Work submitted to a queue, processed strictly in submission order.
enum QueueOp {
    Execute(Vec<RecordedList>),
    Signal { fence: Arc<dyn Fence>, value: u64 },
    Wait { fence: Arc<dyn Fence>, value: u64 },
    Present { back_buffer: ResourceId },
}

#[derive(Debug, Default)]
struct Progress {
    submitted: u64,
    completed: u64,
}

/// Pause switch and progress counters shared between a queue and its worker.
#[derive(Debug)]
pub(crate) struct QueueControl {
    pub(crate) list_type: CommandListType,
    paused: Mutex<bool>,
    resumed: Condvar,
    progress: Mutex<Progress>,
    idle: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl QueueControl {
    fn new(list_type: CommandListType) -> Self {
        Self {
            list_type,
            paused: Mutex::new(false),
            resumed: Condvar::new(),
            progress: Mutex::new(Progress::default()),
            idle: Condvar::new(),
        }
    }

    /// Stops the worker before its next operation, simulating a GPU that lags behind.
    pub(crate) fn pause(&self) {
        *lock(&self.paused) = true;
    }

    pub(crate) fn resume(&self) {
        *lock(&self.paused) = false;
        self.resumed.notify_all();
    }

    fn wait_while_paused(&self) {
        let mut paused = lock(&self.paused);
        while *paused {
            paused = self.resumed.wait(paused).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn submitted(&self) {
        lock(&self.progress).submitted += 1;
    }

    fn completed(&self) {
        lock(&self.progress).completed += 1;
        self.idle.notify_all();
    }

    /// Blocks until every submitted operation ran.
    pub(crate) fn wait_idle(&self) {
        let mut progress = lock(&self.progress);
        while progress.completed < progress.submitted {
            progress = self.idle.wait(progress).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// A queue of the software device. Submissions return immediately; a worker thread
/// executes them in order.
#[derive(Debug)]
pub struct SoftQueue {
    shared: Arc<SoftShared>,
    list_type: CommandListType,
    control: Arc<QueueControl>,
    sender: flume::Sender<QueueOp>,
}

impl std::fmt::Debug for QueueOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueOp::Execute(lists) => write!(f, "Execute({} lists)", lists.len()),
            QueueOp::Signal { value, .. } => write!(f, "Signal({value})"),
            QueueOp::Wait { value, .. } => write!(f, "Wait({value})"),
            QueueOp::Present { back_buffer } => write!(f, "Present({back_buffer:?})"),
        }
    }
}

impl SoftQueue {
    pub(crate) fn spawn(shared: Arc<SoftShared>, list_type: CommandListType) -> Result<Arc<Self>, RenderError> {
        let (sender, receiver) = flume::unbounded();
        let control = Arc::new(QueueControl::new(list_type));
        let worker_control = Arc::clone(&control);
        let worker_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(format!("soft-{}-queue", list_type.name()))
            .spawn(move || run_worker(worker_shared, worker_control, receiver))
            .map_err(|err| RenderError::InitializationFailed(format!("Failed to spawn queue worker: {err}")))?;
        log::debug!("SoftQueue({}): worker started", list_type.name());
        Ok(Arc::new(Self {
            shared,
            list_type,
            control,
            sender,
        }))
    }

    pub(crate) fn control(&self) -> &Arc<QueueControl> {
        &self.control
    }

    fn submit(&self, op: QueueOp) -> Result<(), RenderError> {
        if self.shared.is_lost() {
            log::error!("SoftQueue({}): submission after device loss", self.list_type.name());
            return Err(RenderError::DeviceLost);
        }
        self.control.submitted();
        self.sender.send(op).map_err(|_| {
            log::error!("SoftQueue({}): worker is gone", self.list_type.name());
            RenderError::DeviceLost
        })
    }

    /// Queues the presentation of `back_buffer`, which must be in the present state
    /// by the time the queue reaches it.
    pub(crate) fn present(&self, back_buffer: ResourceId) -> Result<(), RenderError> {
        self.submit(QueueOp::Present { back_buffer })
    }

    /// Stops executing until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Restarts a paused queue.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Blocks until everything submitted so far ran.
    pub fn wait_idle(&self) -> Result<(), RenderError> {
        self.control.wait_idle();
        if self.shared.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        Ok(())
    }
}

fn run_worker(shared: Arc<SoftShared>, control: Arc<QueueControl>, receiver: flume::Receiver<QueueOp>) {
    let name = control.list_type.name();
    while let Ok(op) = receiver.recv() {
        control.wait_while_paused();
        if shared.is_lost() {
            log::trace!("SoftQueue({name}): dropping {op:?}, device lost");
            if let QueueOp::Execute(lists) = op {
                for list in lists {
                    shared.end_execution(list.allocator);
                }
            }
            control.completed();
            continue;
        }
        log::trace!("SoftQueue({name}): {op:?}");
        match op {
            QueueOp::Execute(lists) => {
                for list in lists {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        let mut gpu = shared.gpu();
                        Executor::new(&mut gpu, control.list_type).run(&list);
                    }));
                    shared.end_execution(list.allocator);
                    if let Err(payload) = outcome {
                        shared.mark_lost(&format!("{name} queue panicked: {}", panic_message(payload.as_ref())));
                        break;
                    }
                }
            }
            QueueOp::Signal { fence, value } => fence.signal(value),
            QueueOp::Wait { fence, value } => {
                if let Err(err) = fence.wait_for_value(value, None) {
                    log::error!("SoftQueue({name}): wait for {value} failed: {err}");
                }
            }
            QueueOp::Present { back_buffer } => {
                let mut gpu = shared.gpu();
                let state = gpu.memory.resource(back_buffer).map(|resource| resource.state);
                match state {
                    Ok(ResourceState::Present | ResourceState::Common) => gpu.stats.presents += 1,
                    Ok(state) => gpu
                        .stats
                        .report(format!("Present of {back_buffer:?} while it is in {state:?}")),
                    Err(err) => gpu.stats.report(format!("Present failed: {err}")),
                }
            }
        }
        control.completed();
    }
    log::debug!("SoftQueue({name}): worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl CommandQueue for SoftQueue {
    fn list_type(&self) -> CommandListType {
        self.list_type
    }

    fn execute_command_lists(&self, lists: &[&dyn CommandList]) -> Result<(), RenderError> {
        let mut recorded = Vec::with_capacity(lists.len());
        for list in lists {
            let soft = list
                .as_any()
                .downcast_ref::<SoftCommandList>()
                .ok_or_else(|| RenderError::Internal("Command list from another backend".to_string()))?;
            if soft.list_type() != self.list_type {
                return Err(RenderError::OrderingViolation(format!(
                    "A {} list was submitted to the {} queue",
                    soft.list_type().name(),
                    self.list_type.name()
                )));
            }
            recorded.push(soft.detach()?);
        }
        for list in &recorded {
            self.shared.begin_execution(list.allocator);
        }
        self.submit(QueueOp::Execute(recorded))
    }

    fn signal(&self, fence: &Arc<dyn Fence>, value: u64) -> Result<(), RenderError> {
        self.submit(QueueOp::Signal {
            fence: Arc::clone(fence),
            value,
        })
    }

    fn wait(&self, fence: &Arc<dyn Fence>, value: u64) -> Result<(), RenderError> {
        self.submit(QueueOp::Wait {
            fence: Arc::clone(fence),
            value,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
