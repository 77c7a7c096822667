use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::future::FutureObj;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::task::{ArcWake, Spawn, SpawnError};
use parking_lot::Mutex;

use crate::Spawner;

#[derive(Default)]
struct Queue {
    /// Spawned tasks that have not completed.
    pending: AtomicUsize,
    incoming: Mutex<Vec<FutureObj<'static, ()>>>,
    running: Mutex<FuturesUnordered<FutureObj<'static, ()>>>,
}

struct Woken(AtomicBool);

impl ArcWake for Woken {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

/// A spawner drained by the host's own loop.
///
/// UI frameworks usually own their thread and have a tick or idle hook; call
/// [`TaskQueue::run_until_stalled`] from there. Tasks run on the calling thread, and their
/// completion events fire from inside that call.
#[derive(Clone, Default)]
pub struct TaskQueue {
    queue: Arc<Queue>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// This queue as a [`Spawner`] for vectors and lists.
    pub fn spawner(&self) -> Spawner {
        Arc::new(self.clone())
    }

    /// Number of tasks that have not completed yet. Safe to call from inside a task.
    pub fn len(&self) -> usize {
        self.queue.pending.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Polls queued tasks until none of them can make progress.
    ///
    /// Tasks spawned while running are picked up in the same call. Must not be called from
    /// inside a queued task. Returns the number of tasks that completed.
    pub fn run_until_stalled(&self) -> usize {
        let woken = Arc::new(Woken(AtomicBool::new(false)));
        let waker = futures::task::waker(Arc::clone(&woken));
        let mut cx = Context::from_waker(&waker);

        let mut running = self.queue.running.lock();
        let mut completed = 0;
        loop {
            running.extend(self.queue.incoming.lock().drain(..));
            woken.0.store(false, Ordering::SeqCst);
            match running.poll_next_unpin(&mut cx) {
                Poll::Ready(Some(())) => {
                    self.queue.pending.fetch_sub(1, Ordering::SeqCst);
                    completed += 1;
                }
                Poll::Ready(None) | Poll::Pending => {
                    let spawned = !self.queue.incoming.lock().is_empty();
                    if !spawned && !woken.0.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }
        }
        dtrace!(completed, pending = running.len(), "TaskQueue::run_until_stalled");
        completed
    }
}

impl Spawn for TaskQueue {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.queue.pending.fetch_add(1, Ordering::SeqCst);
        self.queue.incoming.lock().push(future);
        Ok(())
    }
}

impl core::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}
