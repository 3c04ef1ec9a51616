//! Bounded-concurrency pipeline shared by the pollers.
//!
//! Candidates are read from a channel. Each one waits for a semaphore
//! permit before its task is spawned and releases it when the task ends.
//! Once the channel closes the pipeline takes every permit back, which
//! only succeeds after all spawned tasks have finished.
//!
//! `work` runs in a task of its own, so a candidate whose handler panics
//! is still counted as failed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::{watch, Mutex, Semaphore};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::membership::ReconcileError;
use crate::ports::{Candidates, PollerLog};

/// When a poller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Once, immediately.
    Now,
    /// Every day at the given UTC time.
    Daily { hour: u32, minute: u32 },
}

impl Schedule {
    /// Time to wait from `now` until the next run.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Schedule::Now => Duration::ZERO,
            Schedule::Daily { hour, minute } => {
                let at = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
                let today = now.date_naive().and_time(at).and_utc();
                let next = if today > now {
                    today
                } else {
                    today.checked_add_days(Days::new(1)).unwrap_or(today)
                };
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }

    /// Runs `job` on this schedule until `shutdown` flips to true. A
    /// `Now` schedule runs the job once and returns.
    pub async fn drive<F, Fut>(&self, mut shutdown: watch::Receiver<bool>, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        if *self == Schedule::Now {
            job().await;
            return;
        }

        loop {
            let delay = self.delay_from(Utc::now());
            tracing::debug!(delay_secs = delay.as_secs(), "Next poller run scheduled");

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    job().await;
                }
            }
        }
    }
}

pub struct Scheduler {
    max_concurrency: usize,
    permits: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            max_concurrency,
            permits: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Processes every candidate and returns the finished log. A candidate
    /// counts as failed when it could not be read or `work` returns an error.
    pub async fn run<T, F, Fut>(
        &self,
        mut candidates: Candidates<T>,
        log: PollerLog,
        work: F,
    ) -> Result<PollerLog, DomainError>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), ReconcileError>> + Send + 'static,
    {
        let kind = log.kind.as_str();
        let log = Arc::new(Mutex::new(log));

        while let Some(item) = candidates.recv().await {
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;
            log.lock().await.total += 1;

            let candidate = match item {
                Ok(candidate) => candidate,
                Err(e) => {
                    tracing::warn!(poller = kind, error = %e, "Failed to read poller candidate");
                    log.lock().await.failed += 1;
                    continue;
                }
            };

            let task = work(candidate);
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let outcome = tokio::spawn(task).await;
                let mut log = log.lock().await;
                match outcome {
                    Ok(Ok(())) => log.succeeded += 1,
                    Ok(Err(e)) => {
                        log.failed += 1;
                        match e.denial() {
                            Some(denial) => {
                                tracing::debug!(poller = kind, code = denial.code(), "Poller candidate denied")
                            }
                            None => tracing::warn!(poller = kind, error = %e, "Poller candidate failed"),
                        }
                    }
                    Err(e) => {
                        log.failed += 1;
                        tracing::error!(poller = kind, error = %e, "Poller candidate task aborted");
                    }
                }
                drop(permit);
            });
        }

        let permits = u32::try_from(self.max_concurrency).unwrap_or(u32::MAX);
        let _barrier = self
            .permits
            .acquire_many(permits)
            .await
            .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;

        let mut finished = log.lock().await.clone();
        finished.end_utc = Some(Utc::now());
        Ok(finished)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(cpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PollerKind;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn candidates(items: Vec<Result<u32, DomainError>>) -> Candidates<u32> {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            tx.try_send(item).unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn counts_successes_and_failures() {
        let scheduler = Scheduler::new(3);
        let items = (0..10).map(Ok).collect();

        let log = scheduler
            .run(candidates(items), PollerLog::start("test", PollerKind::Order), |n| async move {
                if n % 5 == 0 {
                    Err(ReconcileError::external("boom"))
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!((log.total, log.succeeded, log.failed), (10, 8, 2));
        assert!(log.end_utc.is_some());
    }

    #[tokio::test]
    async fn unreadable_candidate_is_a_failure() {
        let scheduler = Scheduler::new(2);
        let items = vec![
            Ok(1),
            Err(DomainError::new(ErrorCode::DatabaseError, "bad row")),
        ];

        let log = scheduler
            .run(candidates(items), PollerLog::start("test", PollerKind::Iap), |_| async { Ok(()) })
            .await
            .unwrap();

        assert_eq!((log.total, log.succeeded, log.failed), (2, 1, 1));
    }

    #[tokio::test]
    async fn panicking_candidate_is_a_failure() {
        let scheduler = Scheduler::new(2);
        let items = (0..4).map(Ok).collect();

        let log = scheduler
            .run(candidates(items), PollerLog::start("test", PollerKind::Order), |n| async move {
                if n == 2 {
                    panic!("handler bug");
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!((log.total, log.succeeded, log.failed), (4, 3, 1));
    }

    #[tokio::test]
    async fn never_exceeds_max_concurrency() {
        let scheduler = Scheduler::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items = (0..8).map(Ok).collect();

        let log = scheduler
            .run(candidates(items), PollerLog::start("test", PollerKind::Order), |_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(log.succeeded, 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn daily_schedule_waits_for_next_slot() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

        let later_today = Schedule::Daily { hour: 12, minute: 30 };
        assert_eq!(later_today.delay_from(now), Duration::from_secs(2 * 3600 + 30 * 60));

        let passed = Schedule::Daily { hour: 9, minute: 0 };
        assert_eq!(passed.delay_from(now), Duration::from_secs(23 * 3600));

        assert_eq!(Schedule::Now.delay_from(now), Duration::ZERO);
    }

    #[test]
    fn zero_concurrency_is_raised_to_one() {
        assert_eq!(Scheduler::new(0).max_concurrency(), 1);
    }
}
