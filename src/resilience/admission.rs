//! Admission Control
//!
//! Token bucket in front of the generation service: a per-minute refill rate,
//! a hard per-day ceiling, and a FIFO queue of callers waiting for a token.
//!
//! ## Usage
//!
//! ```no_run
//! use course_generation_gate::config::AdmissionConfig;
//! use course_generation_gate::resilience::AdmissionController;
//! # #[tokio::main]
//! # async fn main() -> Result<(), course_generation_gate::GenerationError> {
//! let limiter = AdmissionController::new(&AdmissionConfig::default());
//! limiter.start()?;
//!
//! limiter.acquire().await?; // may wait for a refill tick
//! // call the generation service
//!
//! limiter.stop();
//! # Ok(()) }
//! ```
//!
//! ## Guarantees
//! - `0 <= available <= capacity` at all times
//! - Waiters are granted strictly in enqueue order
//! - A caller over the daily ceiling is rejected immediately, never queued
//!
//! Stopping the refill timer leaves queued callers pending; pass a deadline
//! to [`AdmissionController::acquire_with_deadline`] to bound the wait.

use crate::config::AdmissionConfig;
use crate::{metrics, GenerationError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Source of wall-clock time for the daily quota.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// [`Clock`] that only moves when told to. Used to drive day rollovers
/// deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    /// Jump to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Read-only snapshot of the limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    /// Tokens that can be taken right now.
    pub available_tokens: u32,
    /// Bucket size.
    pub max_tokens: u32,
    /// Callers waiting for a token.
    pub queue_length: usize,
    /// Requests admitted since the last UTC midnight.
    pub requests_today: u32,
    /// Daily ceiling.
    pub daily_limit: u32,
}

type Grant = oneshot::Sender<Result<(), GenerationError>>;

struct Waiter {
    id: u64,
    enqueued_at: Instant,
    grant: Grant,
}

struct Bucket {
    capacity: u32,
    available: u32,
    daily_count: u32,
    daily_limit: u32,
    day: NaiveDate,
    queue: VecDeque<Waiter>,
    next_waiter_id: u64,
}

impl Bucket {
    fn roll_day(&mut self, today: NaiveDate) {
        if today != self.day {
            info!(
                previous_day = %self.day,
                day = %today,
                requests = self.daily_count,
                "admission: daily quota reset"
            );
            self.day = today;
            self.daily_count = 0;
        }
    }

    fn quota_exhausted(&self) -> bool {
        self.daily_count >= self.daily_limit
    }

    fn take_token(&mut self) {
        self.available -= 1;
        self.daily_count += 1;
    }

    fn enqueue(&mut self, grant: Grant) -> u64 {
        let id = self.next_waiter_id;
        self.next_waiter_id += 1;
        self.queue.push_back(Waiter {
            id,
            enqueued_at: Instant::now(),
            grant,
        });
        metrics::set_admission_queue_depth(self.queue.len());
        id
    }

    fn remove_waiter(&mut self, id: u64) -> bool {
        let before = self.queue.len();
        self.queue.retain(|w| w.id != id);
        metrics::set_admission_queue_depth(self.queue.len());
        self.queue.len() != before
    }

    /// One refill tick: add a token, then hand tokens to waiters in order.
    fn refill(&mut self, now: DateTime<Utc>) {
        self.roll_day(now.date_naive());
        if self.available < self.capacity {
            self.available += 1;
        }

        while self.available > 0 {
            let Some(waiter) = self.queue.pop_front() else {
                break;
            };

            if self.quota_exhausted() {
                metrics::inc_admission("quota_exceeded");
                let _ = waiter
                    .grant
                    .send(Err(quota_error(now, self.daily_limit)));
                continue;
            }

            let waited_ms = waiter.enqueued_at.elapsed().as_millis() as u64;
            if waiter.grant.send(Ok(())).is_ok() {
                self.take_token();
                metrics::inc_admission("granted");
                debug!(
                    waiter = waiter.id,
                    waited_ms,
                    available = self.available,
                    "admission: queued caller granted"
                );
            } else {
                debug!(waiter = waiter.id, "admission: queued caller went away");
            }
        }

        metrics::set_admission_queue_depth(self.queue.len());
    }

    fn status(&self, today: NaiveDate) -> AdmissionStatus {
        AdmissionStatus {
            available_tokens: self.available,
            max_tokens: self.capacity,
            queue_length: self.queue.len(),
            requests_today: if today == self.day { self.daily_count } else { 0 },
            daily_limit: self.daily_limit,
        }
    }
}

/// Whole hours (rounded up, at least one) until the next UTC midnight.
fn hours_until_reset(now: DateTime<Utc>) -> u32 {
    let Some(tomorrow) = now.date_naive().succ_opt() else {
        return 24;
    };
    let reset = tomorrow.and_time(NaiveTime::MIN).and_utc();
    let secs = (reset - now).num_seconds().max(1);
    ((secs + 3599) / 3600) as u32
}

fn quota_error(now: DateTime<Utc>, daily_limit: u32) -> GenerationError {
    GenerationError::QuotaExceeded {
        daily_limit,
        hours_until_reset: hours_until_reset(now),
    }
}

/// Removes a queued caller whose `acquire` future is dropped before it is
/// answered, e.g. by an outer `timeout` or `select!`.
struct QueuedWaiter {
    bucket: Arc<Mutex<Bucket>>,
    id: u64,
    armed: bool,
}

impl QueuedWaiter {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for QueuedWaiter {
    fn drop(&mut self) {
        if self.armed && self.bucket.lock().remove_waiter(self.id) {
            debug!(waiter = self.id, "admission: queued caller cancelled");
        }
    }
}

/// Token bucket with a waiting queue and a daily ceiling.
///
/// One instance per upstream credential; the generation gate owns it and
/// drives its lifecycle through [`start`](Self::start) / [`stop`](Self::stop).
pub struct AdmissionController {
    bucket: Arc<Mutex<Bucket>>,
    clock: Arc<dyn Clock>,
    refill_interval: Duration,
    refill_task: Mutex<Option<JoinHandle<()>>>,
}

impl AdmissionController {
    /// Limiter with a full bucket, using the system clock.
    pub fn new(config: &AdmissionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Limiter with a full bucket, using `clock` for day boundaries.
    pub fn with_clock(config: &AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.effective_capacity();
        let day = clock.now().date_naive();
        Self {
            bucket: Arc::new(Mutex::new(Bucket {
                capacity,
                available: capacity,
                daily_count: 0,
                daily_limit: config.daily_limit,
                day,
                queue: VecDeque::new(),
                next_waiter_id: 0,
            })),
            clock,
            refill_interval: config.refill_interval(),
            refill_task: Mutex::new(None),
        }
    }

    /// Period between refill ticks.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Spawn the periodic refill task. Calling it while already running is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Config`] when called outside a Tokio runtime.
    pub fn start(&self) -> Result<(), GenerationError> {
        let mut task = self.refill_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            GenerationError::Config(format!("admission refill needs a tokio runtime: {e}"))
        })?;

        let bucket = Arc::clone(&self.bucket);
        let clock = Arc::clone(&self.clock);
        let period = self.refill_interval;
        *task = Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                bucket.lock().refill(clock.now());
            }
        }));

        info!(
            refill_interval_ms = period.as_millis() as u64,
            "admission: refill timer started"
        );
        Ok(())
    }

    /// Stop the refill timer. Queued callers are left waiting.
    pub fn stop(&self) {
        if let Some(task) = self.refill_task.lock().take() {
            task.abort();
            info!(
                queued = self.bucket.lock().queue.len(),
                "admission: refill timer stopped"
            );
        }
    }

    /// Whether the refill timer is running.
    pub fn is_running(&self) -> bool {
        self.refill_task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Run one refill tick by hand. The timer calls this on every period.
    pub fn refill(&self) {
        self.bucket.lock().refill(self.clock.now());
    }

    /// Wait for a token.
    ///
    /// # Errors
    ///
    /// [`GenerationError::QuotaExceeded`] once the daily ceiling is reached,
    /// either immediately or when a queued caller reaches the head of the
    /// queue after the ceiling was hit.
    pub async fn acquire(&self) -> Result<(), GenerationError> {
        self.acquire_inner(None).await
    }

    /// Wait for a token for at most `deadline`.
    ///
    /// # Errors
    ///
    /// As [`acquire`](Self::acquire), plus [`GenerationError::AdmissionTimeout`]
    /// when the deadline passes first. A timed-out caller is removed from the
    /// queue without disturbing the order of the others.
    pub async fn acquire_with_deadline(&self, deadline: Duration) -> Result<(), GenerationError> {
        self.acquire_inner(Some(deadline)).await
    }

    async fn acquire_inner(&self, deadline: Option<Duration>) -> Result<(), GenerationError> {
        let (id, mut rx) = {
            let now = self.clock.now();
            let mut bucket = self.bucket.lock();
            bucket.roll_day(now.date_naive());

            if bucket.quota_exhausted() {
                let err = quota_error(now, bucket.daily_limit);
                warn!(
                    requests_today = bucket.daily_count,
                    daily_limit = bucket.daily_limit,
                    "admission: daily quota exhausted"
                );
                metrics::inc_admission("quota_exceeded");
                return Err(err);
            }

            if bucket.available > 0 {
                bucket.take_token();
                metrics::inc_admission("granted");
                debug!(
                    available = bucket.available,
                    requests_today = bucket.daily_count,
                    "admission: token granted"
                );
                return Ok(());
            }

            let (tx, rx) = oneshot::channel();
            let id = bucket.enqueue(tx);
            metrics::inc_admission("queued");
            debug!(
                waiter = id,
                queue_length = bucket.queue.len(),
                "admission: no token available, caller queued"
            );
            (id, rx)
        };

        let mut queued = QueuedWaiter {
            bucket: Arc::clone(&self.bucket),
            id,
            armed: true,
        };

        let Some(deadline) = deadline else {
            let answer = rx.await;
            queued.disarm();
            return answer.unwrap_or_else(|_| Err(closed_error()));
        };

        match tokio::time::timeout(deadline, &mut rx).await {
            Ok(granted) => {
                queued.disarm();
                granted.unwrap_or_else(|_| Err(closed_error()))
            }
            Err(_) => {
                queued.disarm();
                if self.bucket.lock().remove_waiter(id) {
                    warn!(
                        waiter = id,
                        deadline_ms = deadline.as_millis() as u64,
                        "admission: deadline expired while queued"
                    );
                    metrics::inc_admission("timeout");
                    Err(GenerationError::AdmissionTimeout { waited: deadline })
                } else {
                    // Answered between the timeout firing and taking the lock.
                    rx.await.unwrap_or_else(|_| Err(closed_error()))
                }
            }
        }
    }

    /// Snapshot of the bucket. Never mutates state.
    pub fn status(&self) -> AdmissionStatus {
        let today = self.clock.now().date_naive();
        self.bucket.lock().status(today)
    }

    /// `0` if a token is free, otherwise `queue_length * refill_interval`.
    /// An estimate only.
    pub fn estimated_wait(&self) -> Duration {
        let bucket = self.bucket.lock();
        if bucket.available > 0 {
            Duration::ZERO
        } else {
            self.refill_interval * bucket.queue.len() as u32
        }
    }
}

impl Drop for AdmissionController {
    fn drop(&mut self) {
        if let Some(task) = self.refill_task.get_mut().take() {
            task.abort();
        }
    }
}

fn closed_error() -> GenerationError {
    GenerationError::Service {
        code: "admission_closed".into(),
        status: None,
        message: "admission controller dropped while caller was queued".into(),
        retryable: false,
    }
}
