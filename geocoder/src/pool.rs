//! Worker pool for bulk geocoding.
//!
//! Each worker is a named thread that builds its own `Geocoder`, so
//! dictionaries are loaded once per worker and never shared mutably. The
//! coordinator talks to workers by message passing; task payloads travel
//! through the `SharedRing` when they fit a slot and inline otherwise.
//!
//! Every submitted task id yields exactly one result: a worker failure, a
//! dead worker or a cancellation all turn into an error result for the
//! affected ids.
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::GeocoderConfig;
use crate::engine::Geocoder;
use crate::error::{GeocodeError, Result};
use crate::provider::LookupProvider;
use crate::query::SearchTarget;
use crate::result::GeocodeResult;
use crate::ring::SharedRing;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
const CANCEL_POLL: Duration = Duration::from_millis(20);

pub type TaskId = u64;
pub type WorkerId = u32;

/// Caller-side cancellation flag shared with a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Encoded task payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub address: String,
    pub target: SearchTarget,
    pub fuzzy_char: Option<char>,
}

#[derive(Debug)]
enum Payload {
    Slot(usize),
    Inline(Vec<u8>),
}

#[derive(Debug)]
enum Command {
    Ping { seq: u64 },
    Task { task_id: TaskId, payload: Payload },
    Shutdown,
}

#[derive(Debug)]
enum Event {
    Ready {
        worker: WorkerId,
    },
    StartFailed {
        worker: WorkerId,
        error: String,
    },
    Pong {
        worker: WorkerId,
        seq: u64,
    },
    Done {
        worker: WorkerId,
        task_id: TaskId,
        result: Result<GeocodeResult>,
    },
}

struct WorkerHandle {
    id: WorkerId,
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
    inflight: usize,
}

struct InFlight {
    worker: WorkerId,
    slot: Option<usize>,
}

/// Fixed-size pool of geocoding workers.
pub struct WorkerPool {
    config: GeocoderConfig,
    provider: Arc<dyn LookupProvider>,
    ring: Arc<SharedRing>,
    workers: Vec<WorkerHandle>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    inflight: AHashMap<TaskId, InFlight>,
    completed: VecDeque<(TaskId, Result<GeocodeResult>)>,
    next_worker_id: WorkerId,
    next_batch_id: TaskId,
    ping_seq: u64,
    max_inflight: usize,
}

impl WorkerPool {
    /// Start `config.base.workers` workers and wait until each has built its
    /// dictionaries.
    pub fn new(config: GeocoderConfig, provider: Arc<dyn LookupProvider>) -> Result<Self> {
        let base = config.base();
        let ring = Arc::new(SharedRing::new(base.slot_count(), base.slot_capacity));
        let max_inflight = base.max_inflight();
        let worker_count = base.workers.max(1);
        let (events_tx, events_rx) = mpsc::channel();

        let mut pool = Self {
            config,
            provider,
            ring,
            workers: Vec::with_capacity(worker_count),
            events_tx,
            events_rx,
            inflight: AHashMap::new(),
            completed: VecDeque::new(),
            next_worker_id: 0,
            next_batch_id: 0,
            ping_seq: 0,
            max_inflight,
        };
        for _ in 0..worker_count {
            pool.spawn_worker()?;
        }
        pool.await_startup(worker_count)?;
        tracing::info!(
            workers = pool.workers.len(),
            slots = pool.ring.slots(),
            max_inflight,
            "worker pool started"
        );
        Ok(pool)
    }

    /// Ids of the live workers.
    pub fn workers(&self) -> Vec<WorkerId> {
        self.workers.iter().map(|w| w.id).collect()
    }

    /// Tasks submitted and not yet returned by `recv`.
    pub fn pending(&self) -> usize {
        self.inflight.len() + self.completed.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub fn ring(&self) -> &SharedRing {
        &self.ring
    }

    /// Submit `address` with the configured target and wildcard.
    pub fn submit(&mut self, task_id: TaskId, address: &str) -> Result<()> {
        let request = TaskRequest {
            address: address.to_string(),
            target: self.config.search_target,
            fuzzy_char: self.config.fuzzy_char,
        };
        self.submit_request(task_id, request)
    }

    /// Queue one task, blocking while the in-flight bound is reached.
    pub fn submit_request(&mut self, task_id: TaskId, request: TaskRequest) -> Result<()> {
        if self.inflight.contains_key(&task_id) {
            return Err(GeocodeError::Config(format!("task id {} is in flight", task_id)));
        }
        while self.inflight.len() >= self.max_inflight {
            self.wait_event(self.ping_timeout())?;
        }
        let bytes = bincode::serialize(&request)?;

        let Some(idx) = self.pick_worker() else {
            return Err(GeocodeError::WorkerUnavailable("no live worker".into()));
        };
        let worker = self.workers[idx].id;
        let slot = self.ring.put(worker, task_id, &bytes);
        let payload = match slot {
            Some(slot) => Payload::Slot(slot),
            None => Payload::Inline(bytes),
        };

        if self.workers[idx]
            .commands
            .send(Command::Task { task_id, payload })
            .is_err()
        {
            if let Some(slot) = slot {
                self.ring.release(slot, worker, task_id);
            }
            self.declare_dead(worker, "command channel closed");
            self.completed.push_back((
                task_id,
                Err(GeocodeError::WorkerUnavailable(format!("worker {} is gone", worker))),
            ));
            return Ok(());
        }
        self.workers[idx].inflight += 1;
        self.inflight.insert(task_id, InFlight { worker, slot });
        Ok(())
    }

    /// Next finished task in completion order; `None` once nothing is
    /// pending.
    pub fn recv(&mut self) -> Option<(TaskId, Result<GeocodeResult>)> {
        loop {
            if let Some(done) = self.completed.pop_front() {
                return Some(done);
            }
            if self.inflight.is_empty() {
                return None;
            }
            if let Err(e) = self.wait_event(self.ping_timeout()) {
                tracing::error!(error = %e, "worker pool lost all workers");
                self.fail_all(|| GeocodeError::WorkerUnavailable("no live worker".into()));
            }
        }
    }

    /// Like `recv`, giving up after `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<(TaskId, Result<GeocodeResult>)> {
        if let Some(done) = self.completed.pop_front() {
            return Some(done);
        }
        if !self.inflight.is_empty() {
            match self.events_rx.recv_timeout(timeout) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.fail_all(|| GeocodeError::WorkerUnavailable("event channel closed".into()))
                }
            }
        }
        self.completed.pop_front()
    }

    /// Geocode `inputs` and return one result per input, in input order.
    ///
    /// Once `cancel` fires, unfinished batch tasks resolve to
    /// `GeocodeError::Cancelled` and their payload slots are released.
    /// Results of tasks queued earlier through `submit` are left for `recv`.
    pub fn run_batch<I, S>(&mut self, inputs: I, cancel: &CancelToken) -> Vec<Result<GeocodeResult>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut batch: AHashMap<TaskId, usize> = AHashMap::new();
        let mut results: Vec<Option<Result<GeocodeResult>>> = Vec::new();
        let mut foreign: Vec<(TaskId, Result<GeocodeResult>)> = Vec::new();

        for (i, input) in inputs.into_iter().enumerate() {
            results.push(None);
            if cancel.is_cancelled() {
                results[i] = Some(Err(GeocodeError::Cancelled));
                continue;
            }
            let task_id = self.next_free_task_id();
            batch.insert(task_id, i);
            if let Err(e) = self.submit(task_id, input.as_ref()) {
                batch.remove(&task_id);
                results[i] = Some(Err(e));
            }
            while let Some(done) = self.completed.pop_front() {
                collect_result(done, &mut batch, &mut results, &mut foreign);
            }
        }

        while !batch.is_empty() {
            if cancel.is_cancelled() {
                let ids: Vec<TaskId> = batch.keys().copied().collect();
                self.abandon(&ids);
            }
            match self.recv_timeout(CANCEL_POLL) {
                Some(done) => collect_result(done, &mut batch, &mut results, &mut foreign),
                None if self.inflight.is_empty() && self.completed.is_empty() => break,
                None => {}
            }
        }

        // Hand results of other tasks back in their completion order.
        for done in foreign.into_iter().rev() {
            self.completed.push_front(done);
        }
        results
            .into_iter()
            .map(|r| r.unwrap_or(Err(GeocodeError::Cancelled)))
            .collect()
    }

    /// Ping every worker. Workers without a pong within `timeout` are
    /// declared dead and replaced. Returns the ids of the dead workers.
    pub fn health_check(&mut self, timeout: Duration) -> Vec<WorkerId> {
        self.ping_seq += 1;
        let seq = self.ping_seq;
        let mut waiting: Vec<WorkerId> = Vec::new();
        let mut dead: Vec<WorkerId> = Vec::new();
        for w in &self.workers {
            if w.commands.send(Command::Ping { seq }).is_ok() {
                waiting.push(w.id);
            } else {
                dead.push(w.id);
            }
        }

        let deadline = Instant::now() + timeout;
        while !waiting.is_empty() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self.events_rx.recv_timeout(left) {
                Ok(Event::Pong { worker, seq: s }) if s == seq => {
                    waiting.retain(|&id| id != worker);
                }
                Ok(event) => self.handle_event(event),
                Err(_) => break,
            }
        }

        dead.extend(waiting);
        for &id in &dead {
            self.declare_dead(id, "no pong within timeout");
        }
        dead
    }

    /// Stop all workers and join their threads.
    pub fn shutdown(&mut self) {
        for w in &self.workers {
            let _ = w.commands.send(Command::Shutdown);
        }
        for w in &mut self.workers {
            if let Some(thread) = w.thread.take() {
                if thread.join().is_err() {
                    tracing::warn!(worker = w.id, "worker thread panicked");
                }
            }
        }
        if !self.workers.is_empty() {
            tracing::info!(workers = self.workers.len(), "worker pool stopped");
        }
        self.workers.clear();
        self.fail_all(|| GeocodeError::WorkerUnavailable("pool shut down".into()));
    }

    fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.config.base.ping_timeout_ms.max(1))
    }

    fn pick_worker(&self) -> Option<usize> {
        self.workers
            .iter()
            .enumerate()
            .min_by_key(|(_, w)| w.inflight)
            .map(|(idx, _)| idx)
    }

    fn spawn_worker(&mut self) -> Result<()> {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        let (commands, inbox) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();
        let ring = Arc::clone(&self.ring);
        let events = self.events_tx.clone();

        let thread = std::thread::Builder::new()
            .name(format!("jpaddr-worker-{}", id))
            .spawn(move || worker_main(id, provider, config, ring, inbox, events))?;
        self.workers.push(WorkerHandle {
            id,
            commands,
            thread: Some(thread),
            inflight: 0,
        });
        Ok(())
    }

    fn await_startup(&mut self, expected: usize) -> Result<()> {
        let mut ready = 0;
        let mut failures = Vec::new();
        let deadline = Instant::now() + STARTUP_TIMEOUT;
        while ready + failures.len() < expected {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.events_rx.recv_timeout(left) {
                Ok(Event::Ready { .. }) => ready += 1,
                Ok(Event::StartFailed { worker, error }) => {
                    self.remove_worker(worker);
                    failures.push(error);
                }
                Ok(other) => self.handle_event(other),
                Err(_) => {
                    self.shutdown();
                    return Err(GeocodeError::Timeout("worker startup".into()));
                }
            }
        }
        if ready == 0 {
            self.shutdown();
            let reason = failures
                .into_iter()
                .next()
                .unwrap_or_else(|| "no worker started".to_string());
            return Err(GeocodeError::WorkerUnavailable(reason));
        }
        Ok(())
    }

    fn wait_event(&mut self, timeout: Duration) -> Result<()> {
        if self.workers.is_empty() {
            return Err(GeocodeError::WorkerUnavailable("no live worker".into()));
        }
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => self.handle_event(event),
            Err(RecvTimeoutError::Timeout) => {
                let dead = self.health_check(self.ping_timeout());
                if !dead.is_empty() {
                    tracing::warn!(workers = ?dead, "replaced unresponsive workers");
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(GeocodeError::WorkerUnavailable("event channel closed".into()));
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Ready { worker } => tracing::debug!(worker, "worker ready"),
            Event::StartFailed { worker, error } => {
                tracing::error!(worker, error = %error, "replacement worker failed to start");
                self.remove_worker(worker);
                self.fail_worker_tasks(worker, &error);
            }
            Event::Pong { .. } => {}
            Event::Done {
                worker,
                task_id,
                result,
            } => {
                // Results of abandoned tasks or dead workers are dropped.
                let owned = self
                    .inflight
                    .get(&task_id)
                    .is_some_and(|f| f.worker == worker);
                if !owned {
                    tracing::debug!(worker, task_id, "dropping stale result");
                    return;
                }
                if let Some(f) = self.inflight.remove(&task_id) {
                    self.finish(task_id, f);
                }
                self.completed.push_back((task_id, result));
            }
        }
    }

    // Bookkeeping for a task leaving the in-flight set.
    fn finish(&mut self, task_id: TaskId, f: InFlight) {
        if let Some(slot) = f.slot {
            self.ring.release(slot, f.worker, task_id);
        }
        if let Some(w) = self.workers.iter_mut().find(|w| w.id == f.worker) {
            w.inflight = w.inflight.saturating_sub(1);
        }
    }

    fn fail_worker_tasks(&mut self, worker: WorkerId, reason: &str) {
        let ids: Vec<TaskId> = self
            .inflight
            .iter()
            .filter(|(_, f)| f.worker == worker)
            .map(|(&id, _)| id)
            .collect();
        for id in ids {
            if let Some(f) = self.inflight.remove(&id) {
                self.finish(id, f);
            }
            self.completed.push_back((
                id,
                Err(GeocodeError::WorkerUnavailable(format!(
                    "worker {}: {}",
                    worker, reason
                ))),
            ));
        }
    }

    fn fail_all<F>(&mut self, err: F)
    where
        F: Fn() -> GeocodeError,
    {
        let ids: Vec<TaskId> = self.inflight.keys().copied().collect();
        for id in ids {
            if let Some(f) = self.inflight.remove(&id) {
                self.finish(id, f);
            }
            self.completed.push_back((id, Err(err())));
        }
    }

    // Fail the listed tasks that are still in flight with `Cancelled`.
    fn abandon(&mut self, ids: &[TaskId]) {
        let mut abandoned = 0usize;
        for &id in ids {
            if let Some(f) = self.inflight.remove(&id) {
                self.finish(id, f);
                self.completed.push_back((id, Err(GeocodeError::Cancelled)));
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            tracing::info!(tasks = abandoned, "abandoned in-flight tasks");
        }
    }

    fn next_free_task_id(&mut self) -> TaskId {
        loop {
            let id = self.next_batch_id;
            self.next_batch_id = self.next_batch_id.wrapping_add(1);
            let taken = self.inflight.contains_key(&id)
                || self.completed.iter().any(|(done, _)| *done == id);
            if !taken {
                return id;
            }
        }
    }

    fn remove_worker(&mut self, worker: WorkerId) -> Option<WorkerHandle> {
        let idx = self.workers.iter().position(|w| w.id == worker)?;
        Some(self.workers.swap_remove(idx))
    }

    fn declare_dead(&mut self, worker: WorkerId, reason: &str) {
        // The thread may be stuck; it is detached, not joined.
        if self.remove_worker(worker).is_none() {
            return;
        }
        tracing::warn!(worker, reason, "worker declared dead");
        self.fail_worker_tasks(worker, reason);
        self.ring.reclaim(worker);
        if let Err(e) = self.spawn_worker() {
            tracing::error!(error = %e, "failed to spawn replacement worker");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Route one finished task to its batch position, or set it aside when it
// belongs to a task submitted outside the batch.
fn collect_result(
    done: (TaskId, Result<GeocodeResult>),
    batch: &mut AHashMap<TaskId, usize>,
    results: &mut [Option<Result<GeocodeResult>>],
    foreign: &mut Vec<(TaskId, Result<GeocodeResult>)>,
) {
    match batch.remove(&done.0) {
        Some(idx) => results[idx] = Some(done.1),
        None => foreign.push(done),
    }
}

fn worker_main(
    id: WorkerId,
    provider: Arc<dyn LookupProvider>,
    config: GeocoderConfig,
    ring: Arc<SharedRing>,
    inbox: Receiver<Command>,
    events: Sender<Event>,
) {
    let mut geocoder = match Geocoder::new(provider, &config) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(worker = id, error = %e, "worker failed to build dictionaries");
            let _ = events.send(Event::StartFailed {
                worker: id,
                error: e.to_string(),
            });
            return;
        }
    };
    if events.send(Event::Ready { worker: id }).is_err() {
        return;
    }

    for command in inbox {
        let event = match command {
            Command::Ping { seq } => Event::Pong { worker: id, seq },
            Command::Task { task_id, payload } => {
                let result = run_task(&mut geocoder, &ring, id, task_id, payload);
                if let Err(e) = &result {
                    tracing::error!(worker = id, task_id, error = %e, "task failed");
                }
                Event::Done {
                    worker: id,
                    task_id,
                    result,
                }
            }
            Command::Shutdown => break,
        };
        if events.send(event).is_err() {
            break;
        }
    }
    tracing::debug!(worker = id, "worker exiting");
}

fn run_task(
    geocoder: &mut Geocoder,
    ring: &SharedRing,
    worker: WorkerId,
    task_id: TaskId,
    payload: Payload,
) -> Result<GeocodeResult> {
    let bytes = match payload {
        Payload::Slot(slot) => ring
            .take(slot, worker, task_id)
            .ok_or(GeocodeError::LeaseLost(slot))?,
        Payload::Inline(bytes) => bytes,
    };
    let request: TaskRequest = bincode::deserialize(&bytes)?;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        geocoder.geocode(&request.address, request.target, request.fuzzy_char)
    }));
    match outcome {
        Ok(result) => result,
        Err(panic) => Err(GeocodeError::WorkerPanicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
