//! Shared batch machinery for the fetch, rewrite and publish orchestrators.
//!
//! A batch walks its items through one async operation each, collecting a
//! report per item. Failures are recorded and never stop later items. The
//! window of in-flight items defaults to one, so the next item starts only
//! after the previous one has been persisted; a wider window still yields
//! reports in input order.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use super::events::{EventBus, PipelineEvent};
use super::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Fetch,
    Rewrite,
    Publish,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchKind::Fetch => "fetch",
            BatchKind::Rewrite => "rewrite",
            BatchKind::Publish => "publish",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "message", rename_all = "lowercase")]
pub enum ItemOutcome {
    Success(String),
    Failure(String),
}

/// What happened to one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub id: String,
    pub title: String,
    pub outcome: ItemOutcome,
}

impl ItemReport {
    pub fn success(
        id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            outcome: ItemOutcome::Success(message.into()),
        }
    }

    pub fn failure(
        id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            outcome: ItemOutcome::Failure(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Success(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub kind: BatchKind,
    pub tally: Tally,
    /// One report per item, in input order.
    pub reports: Vec<ItemReport>,
}

impl BatchSummary {
    fn from_reports(kind: BatchKind, reports: Vec<ItemReport>) -> Self {
        let succeeded = reports.iter().filter(|r| r.is_success()).count();
        Self {
            kind,
            tally: Tally {
                succeeded,
                failed: reports.len() - succeeded,
            },
            reports,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchState {
    #[default]
    Idle,
    Running { completed: usize, total: usize },
}

/// Per-orchestrator batch state and in-flight flag.
///
/// Clones share state. At most one batch per tracker runs at a time.
#[derive(Debug, Clone, Default)]
pub struct BatchTracker {
    state: Arc<Mutex<BatchState>>,
}

impl BatchTracker {
    pub fn state(&self) -> BatchState {
        *self.lock()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), BatchState::Running { .. })
    }

    /// Claim the tracker for a batch of `total` items.
    ///
    /// Returns `None` if a batch is already running. The state returns to
    /// `Idle` when the guard drops, including during unwinding.
    pub fn try_start(&self, total: usize) -> Option<BatchGuard> {
        let mut state = self.lock();
        if matches!(*state, BatchState::Running { .. }) {
            return None;
        }
        *state = BatchState::Running {
            completed: 0,
            total,
        };
        Some(BatchGuard {
            tracker: self.clone(),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BatchState> {
        // State is plain data; a poisoned lock still holds a valid value.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct BatchGuard {
    tracker: BatchTracker,
}

impl BatchGuard {
    fn advance(&self, completed: usize) {
        let mut state = self.tracker.lock();
        if let BatchState::Running { total, .. } = *state {
            *state = BatchState::Running { completed, total };
        }
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        *self.tracker.lock() = BatchState::Idle;
    }
}

/// Percentage of `completed` out of `total`, rounded down. An empty batch is done.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (completed.min(total) * 100 / total) as u8
}

/// Run `op` over `items` as one tracked batch.
///
/// # Errors
///
/// `PipelineError::BatchInProgress` if the tracker is already running a batch.
/// Per-item failures are reported in the summary, never returned.
pub(crate) async fn run_batch<T, F, Fut>(
    kind: BatchKind,
    tracker: &BatchTracker,
    events: &EventBus,
    max_concurrent: usize,
    items: Vec<T>,
    op: F,
) -> Result<BatchSummary, PipelineError>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ItemReport>,
{
    let total = items.len();
    let guard = tracker
        .try_start(total)
        .ok_or(PipelineError::BatchInProgress(kind))?;

    tracing::info!(kind = %kind, total, max_concurrent, "Batch started");
    events.emit(PipelineEvent::BatchStarted { kind, total });

    let mut reports = Vec::with_capacity(total);
    let mut results = stream::iter(items).map(op).buffered(max_concurrent.max(1));

    while let Some(report) = results.next().await {
        match &report.outcome {
            ItemOutcome::Success(_) => {
                tracing::debug!(kind = %kind, id = %report.id, "Item succeeded")
            }
            ItemOutcome::Failure(message) => {
                tracing::warn!(kind = %kind, id = %report.id, error = %message, "Item failed")
            }
        }
        reports.push(report.clone());

        let completed = reports.len();
        guard.advance(completed);
        events.emit(PipelineEvent::ItemFinished {
            kind,
            completed,
            total,
            progress: progress_percent(completed, total),
            report,
        });
    }

    drop(guard);

    let summary = BatchSummary::from_reports(kind, reports);
    tracing::info!(
        kind = %kind,
        succeeded = summary.tally.succeeded,
        failed = summary.tally.failed,
        "Batch finished"
    );
    events.emit(PipelineEvent::BatchFinished {
        summary: summary.clone(),
    });
    events.emit(PipelineEvent::LibraryChanged);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 4), 0);
        assert_eq!(progress_percent(1, 4), 25);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(0, 0), 100);
    }

    #[test]
    fn test_tracker_rejects_second_start() {
        let tracker = BatchTracker::default();
        let guard = tracker.try_start(2).unwrap();
        assert!(tracker.try_start(1).is_none());
        assert_eq!(
            tracker.state(),
            BatchState::Running {
                completed: 0,
                total: 2
            }
        );

        guard.advance(1);
        assert_eq!(
            tracker.state(),
            BatchState::Running {
                completed: 1,
                total: 2
            }
        );

        drop(guard);
        assert_eq!(tracker.state(), BatchState::Idle);
        assert!(tracker.try_start(1).is_some());
    }

    #[test]
    fn test_tracker_resets_on_panic() {
        let tracker = BatchTracker::default();
        let cloned = tracker.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.try_start(1).unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!tracker.is_running());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_batch() {
        let tracker = BatchTracker::default();
        let events = EventBus::default();

        let items = vec![1, 2, 3, 4];
        let summary = run_batch(BatchKind::Rewrite, &tracker, &events, 1, items, |n| async move {
            if n == 2 {
                ItemReport::failure(n.to_string(), "", "boom")
            } else {
                ItemReport::success(n.to_string(), "", "ok")
            }
        })
        .await
        .unwrap();

        assert_eq!(
            summary.tally,
            Tally {
                succeeded: 3,
                failed: 1
            }
        );
        let ids: Vec<_> = summary.reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(tracker.state(), BatchState::Idle);
    }

    #[tokio::test]
    async fn test_sequential_by_default() {
        let tracker = BatchTracker::default();
        let events = EventBus::default();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_batch(BatchKind::Publish, &tracker, &events, 1, (0..5).collect(), |n: i32| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                ItemReport::success(n.to_string(), "", "ok")
            }
        })
        .await
        .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wider_window_keeps_input_order() {
        let tracker = BatchTracker::default();
        let events = EventBus::default();

        let delays = vec![30u64, 10, 20];
        let summary = run_batch(BatchKind::Fetch, &tracker, &events, 3, delays, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ItemReport::success(ms.to_string(), "", "ok")
        })
        .await
        .unwrap();

        let ids: Vec<_> = summary.reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["30", "10", "20"]);
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let tracker = BatchTracker::default();
        let events = EventBus::default();
        let mut rx = events.subscribe();

        run_batch(BatchKind::Rewrite, &tracker, &events, 1, vec!["a", "b"], |s| async move {
            ItemReport::success(s, s, "ok")
        })
        .await
        .unwrap();

        assert!(matches!(rx.recv().await.unwrap(), PipelineEvent::BatchStarted { total: 2, .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            PipelineEvent::ItemFinished { completed: 1, progress: 50, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            PipelineEvent::ItemFinished { completed: 2, progress: 100, .. }
        ));
        assert!(matches!(rx.recv().await.unwrap(), PipelineEvent::BatchFinished { .. }));
        assert!(matches!(rx.recv().await.unwrap(), PipelineEvent::LibraryChanged));
    }

    #[tokio::test]
    async fn test_busy_tracker_rejects_batch() {
        let tracker = BatchTracker::default();
        let events = EventBus::default();
        let _guard = tracker.try_start(1).unwrap();

        let result = run_batch(BatchKind::Publish, &tracker, &events, 1, vec![1], |n: i32| {
            async move { ItemReport::success(n.to_string(), "", "ok") }
        })
        .await;

        assert!(matches!(
            result,
            Err(PipelineError::BatchInProgress(BatchKind::Publish))
        ));
    }
}
