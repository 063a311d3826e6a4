//! Single-worker priority-queue dispatcher.
//!
//! A min-heap of [`ScheduledTask`]s keyed by `time`, drained by one
//! background `tokio` task. The worker sleeps until the next deadline (a
//! `tokio::sync::Notify` standing in for a condvar), catches up on any
//! pending notifications before executing, and drops
//! stale entries (queued task whose `id` is absent from the model, or
//! whose `time` no longer matches) without invoking their callbacks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::domain::models::event::CATEGORY_INTERNAL;
use crate::domain::models::scheduled_task::ScheduledTask;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::errors::AppError;
use crate::domain::ports::registry::CallbackRegistry;
use crate::services::event_model::EventModel;
use crate::services::task_builder::build_scheduled_task;

struct HeapEntry {
    task: ScheduledTask,
    seq: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.task.time() == other.task.time() && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    /// Reversed so `BinaryHeap` (a max-heap) pops the *smallest* time
    /// first, with insertion order (`seq`) breaking ties deterministically.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .task
            .time()
            .cmp(&self.task.time())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum StepOutcome {
    /// The step made progress (fired a notification, executed a task, or
    /// dropped a stale one); the caller should step again immediately.
    Progressed,
    /// The heap is empty; wait until woken by `addTask` or `stop`.
    WaitForever,
    /// Nothing is due yet; wait until `deadline` or until woken.
    WaitUntil(DateTime<Utc>),
}

pub struct EventLoop {
    model: Arc<EventModel>,
    clock: Arc<dyn Clock>,
    heap: Mutex<BinaryHeap<HeapEntry>>,
    notify: Notify,
    running: AtomicBool,
    seq: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    pub fn new(model: Arc<EventModel>, clock: Arc<dyn Clock>) -> Self {
        Self {
            model,
            clock,
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            running: AtomicBool::new(false),
            seq: AtomicU64::new(0),
            worker: Mutex::new(None),
        }
    }

    /// Idempotent: a second `start()` on an already-running loop is a
    /// no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run().await });
        // `start` may race a concurrent `start`; only the first writer's
        // handle actually fired a task, the CAS above ensures only one does.
        if let Ok(mut guard) = self.worker.try_lock() {
            *guard = Some(handle);
        } else {
            tokio::spawn(async move {});
        }
    }

    /// Cooperative shutdown: wakes the worker, waits for any in-flight
    /// callback to finish, then joins. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, AtomicOrdering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Upsert `t`'s event into the model (unless `internal`), de-duplicate
    /// any existing internal entry with the same id, then push and wake
    /// one waiter.
    pub async fn add_task(&self, task: ScheduledTask) -> Result<(), AppError> {
        if task.category() != CATEGORY_INTERNAL {
            let event = task.event.clone();
            if self.model.get_by_id(&event.id).await.is_some() {
                self.model.update(&event.id, event).await?;
            } else {
                self.model.add(event).await?;
            }
        }

        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        let mut heap = self.heap.lock().await;
        if task.category() == CATEGORY_INTERNAL {
            let id = task.id().to_string();
            let retained: Vec<HeapEntry> = heap
                .drain()
                .filter(|e| !(e.task.category() == CATEGORY_INTERNAL && e.task.id() == id))
                .collect();
            *heap = retained.into_iter().collect();
        }
        heap.push(HeapEntry { task, seq });
        drop(heap);
        self.notify.notify_one();
        Ok(())
    }

    /// Re-enqueue persisted `category=task` events whose `time` is still
    /// in the future, used at startup.
    pub async fn replay_from_model(&self, registries: &CallbackRegistry) -> Result<(), AppError> {
        let now = self.clock.now();
        for event in self.model.task_events().await {
            if event.time <= now {
                continue;
            }
            match build_scheduled_task(event.clone(), registries, self.clock.as_ref()) {
                Ok(task) => {
                    if let Err(err) = self.add_task(task).await {
                        tracing::warn!(event_id = %event.id, error = %err, "failed to re-enqueue replayed task");
                    }
                }
                Err(err) => {
                    tracing::warn!(event_id = %event.id, error = %err, "failed to rebuild scheduled task at startup");
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    async fn run(self: Arc<Self>) {
        loop {
            if !self.running.load(AtomicOrdering::SeqCst) {
                return;
            }
            match self.step().await {
                StepOutcome::Progressed => {}
                StepOutcome::WaitForever => {
                    self.notify.notified().await;
                }
                StepOutcome::WaitUntil(deadline) => {
                    let now = self.clock.now();
                    let dur = (deadline - now).to_std().unwrap_or(std::time::Duration::ZERO);
                    tokio::select! {
                        () = tokio::time::sleep(dur) => {}
                        () = self.notify.notified() => {}
                    }
                }
            }
        }
    }

    /// One iteration of the dispatcher's state machine.
    async fn step(&self) -> StepOutcome {
        let now = self.clock.now();

        let (top_id, top_time, has_pending, next_notify) = {
            let heap = self.heap.lock().await;
            let Some(entry) = heap.peek() else {
                return StepOutcome::WaitForever;
            };
            (
                entry.task.id().to_string(),
                entry.task.time(),
                entry.task.has_pending(),
                entry.task.next_notify_time(),
            )
        };

        if self.is_stale(&top_id, top_time).await {
            let mut heap = self.heap.lock().await;
            if matches!(heap.peek(), Some(e) if e.task.id() == top_id && e.task.time() == top_time) {
                heap.pop();
            }
            tracing::debug!(task_id = %top_id, "dropping stale scheduled task");
            return StepOutcome::Progressed;
        }

        if has_pending && next_notify.is_some_and(|n| now >= n) {
            let callback = {
                let heap = self.heap.lock().await;
                heap.peek()
                    .filter(|e| e.task.id() == top_id)
                    .map(|e| e.task.notify_callback())
            };
            if let Some(callback) = callback {
                callback().await;
            }
            let mut heap = self.heap.lock().await;
            if let Some(mut top) = heap.peek_mut() {
                if top.task.id() == top_id {
                    top.task.mark_sent();
                }
            }
            return StepOutcome::Progressed;
        }

        if now >= top_time {
            let callback = {
                let mut heap = self.heap.lock().await;
                if matches!(heap.peek(), Some(e) if e.task.id() == top_id && e.task.time() == top_time) {
                    heap.pop().map(|e| e.task.action_callback())
                } else {
                    None
                }
            };
            if let Some(callback) = callback {
                callback().await;
            }
            return StepOutcome::Progressed;
        }

        let wake_at = match next_notify {
            Some(n) if n < top_time => n,
            _ => top_time,
        };
        StepOutcome::WaitUntil(wake_at)
    }

    async fn is_stale(&self, id: &str, time: DateTime<Utc>) -> bool {
        match self.model.get_by_id(id).await {
            None => true,
            Some(event) => event.time != time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::{Event, CATEGORY_TASK};
    use crate::domain::models::scheduled_task::noop_callback;
    use crate::domain::ports::clock::ManualClock;
    use crate::infrastructure::store::memory::InMemoryEventStore;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering as AO};

    fn utc(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
    }

    fn make_event(id: &str, time: DateTime<Utc>) -> Event {
        Event {
            id: id.to_string(),
            title: "t".to_string(),
            description: String::new(),
            time,
            duration_secs: 0,
            category: CATEGORY_TASK.to_string(),
            notifier_name: None,
            action_name: None,
            recurring: false,
            pattern: None,
            created_at: time,
            updated_at: time,
        }
    }

    #[tokio::test]
    async fn stale_task_is_dropped_without_running_callbacks() {
        let clock = Arc::new(ManualClock::new(utc(2025, 6, 2, 9, 0)));
        let model = Arc::new(EventModel::new(Arc::new(InMemoryEventStore::new()), clock.clone()));
        let event_loop = EventLoop::new(model.clone(), clock.clone());

        let t1 = utc(2025, 6, 2, 9, 0);
        let t2 = utc(2025, 6, 2, 10, 0);
        let ran = Arc::new(AtomicUsize::new(0));

        model.add(make_event("x", t1)).await.unwrap();
        let stale_task = ScheduledTask::no_notify(make_event("x", t1), {
            let ran = ran.clone();
            Arc::new(move || {
                let ran = ran.clone();
                Box::pin(async move {
                    ran.fetch_add(1, AO::SeqCst);
                })
            })
        });
        event_loop.add_task(stale_task).await.unwrap();

        // Reschedule x to t2: update the model directly, then enqueue the
        // fresh task. The original entry for t1 is still in the heap.
        model.update("x", make_event("x", t2)).await.unwrap();
        let fresh_task = ScheduledTask::no_notify(make_event("x", t2), {
            let ran = ran.clone();
            Arc::new(move || {
                let ran = ran.clone();
                Box::pin(async move {
                    ran.fetch_add(10, AO::SeqCst);
                })
            })
        });
        event_loop.add_task(fresh_task).await.unwrap();

        assert_eq!(event_loop.len().await, 2);

        // At t1, the stale entry for t1 is on top; it must be dropped
        // without running its callback.
        let outcome = event_loop.step().await;
        assert!(matches!(outcome, StepOutcome::Progressed));
        assert_eq!(ran.load(AO::SeqCst), 0);
        assert_eq!(event_loop.len().await, 1);

        // Advance to t2 and run the fresh task.
        clock.set(t2);
        let outcome = event_loop.step().await;
        assert!(matches!(outcome, StepOutcome::Progressed));
        assert_eq!(ran.load(AO::SeqCst), 10);
        assert_eq!(event_loop.len().await, 0);
    }

    #[tokio::test]
    async fn notifications_fire_before_execution_in_order() {
        let clock = Arc::new(ManualClock::new(utc(2025, 6, 2, 9, 46, )));
        let model = Arc::new(EventModel::new(Arc::new(InMemoryEventStore::new()), clock.clone()));
        let event_loop = EventLoop::new(model.clone(), clock.clone());

        let time = utc(2025, 6, 2, 10, 0);
        let notify_times = vec![utc(2025, 6, 2, 9, 30), utc(2025, 6, 2, 9, 45)];
        let order = Arc::new(tokio::sync::Mutex::new(Vec::<&'static str>::new()));

        model.add(make_event("n", time)).await.unwrap();

        let notify_order = order.clone();
        let exec_order = order.clone();
        let task = ScheduledTask::with_absolute_notify_times(
            make_event("n", time),
            notify_times,
            utc(2025, 6, 2, 9, 0),
            Arc::new(move || {
                let notify_order = notify_order.clone();
                Box::pin(async move {
                    notify_order.lock().await.push("notify");
                })
            }),
            Arc::new(move || {
                let exec_order = exec_order.clone();
                Box::pin(async move {
                    exec_order.lock().await.push("execute");
                })
            }),
        );
        event_loop.add_task(task).await.unwrap();

        // now = 09:46: both notifications are due, execution is not.
        event_loop.step().await;
        event_loop.step().await;
        assert!(matches!(event_loop.step().await, StepOutcome::WaitUntil(t) if t == time));
        assert_eq!(*order.lock().await, vec!["notify", "notify"]);

        clock.set(time);
        event_loop.step().await;
        assert_eq!(*order.lock().await, vec!["notify", "notify", "execute"]);
    }

    #[tokio::test]
    async fn internal_tasks_dedupe_by_id_in_heap() {
        let clock = Arc::new(ManualClock::new(utc(2025, 6, 2, 0, 0)));
        let model = Arc::new(EventModel::new(Arc::new(InMemoryEventStore::new()), clock.clone()));
        let event_loop = EventLoop::new(model, clock);

        let mut event = make_event("wake:maintenance", utc(2025, 6, 3, 0, 0));
        event.category = CATEGORY_INTERNAL.to_string();
        event_loop
            .add_task(ScheduledTask::no_notify(event.clone(), noop_callback()))
            .await
            .unwrap();

        let mut later = event.clone();
        later.time = utc(2025, 6, 4, 0, 0);
        event_loop
            .add_task(ScheduledTask::no_notify(later, noop_callback()))
            .await
            .unwrap();

        assert_eq!(event_loop.len().await, 1);
    }
}
