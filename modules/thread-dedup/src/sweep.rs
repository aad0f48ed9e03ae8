use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::api::{ThreadApi, TopicRef};
use crate::error::SweepError;
use crate::executor::run_bounded;
use crate::paginator::comments_from;
use crate::planner::{self, DeletionPlan, PlanPreview};
use crate::retry::{call_with_retry, RetryPolicy};

/// Progress is reported every this many completed deletions.
pub const PROGRESS_EVERY: usize = 20;

/// Ids shown from each end of the plan in a dry run.
pub const DEFAULT_PREVIEW_LEN: usize = 20;

/// Per-run settings, already validated and clamped by the caller.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Scan from the first entry instead of the tail window.
    pub full_scan: bool,
    /// Size of the tail window when `full_scan` is off.
    pub tail_size: u64,
    pub ignore_attachments: bool,
    pub dry_run: bool,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub preview_len: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            full_scan: false,
            tail_size: 500,
            ignore_attachments: false,
            dry_run: false,
            concurrency: 3,
            retry: RetryPolicy::default(),
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub start_offset: u64,
    pub scanned: usize,
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Ids whose deletion failed, in completion order.
    pub failed_ids: Vec<i64>,
    pub dry_run: bool,
    /// Set when shutdown stopped the run before every planned id was tried.
    pub cancelled: bool,
    pub preview: Option<PlanPreview>,
}

impl RunSummary {
    /// Every planned deletion went through (trivially true for dry runs).
    pub fn is_complete(&self) -> bool {
        self.dry_run || (self.succeeded == self.planned && !self.cancelled)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            return write!(
                f,
                "scanned={} planned={} (dry run, nothing deleted)",
                self.scanned, self.planned
            );
        }
        write!(
            f,
            "scanned={} planned={} deleted={} failed={}",
            self.scanned, self.planned, self.succeeded, self.failed
        )?;
        if self.cancelled {
            write!(f, " skipped={} (cancelled)", self.planned - self.succeeded - self.failed)?;
        }
        Ok(())
    }
}

/// Where the scan starts: `total - (tail + 1)`, clamped at zero.
///
/// The size query and the listing are separate calls, so entries posted in
/// between shift the window by that many entries. That race is accepted.
pub fn tail_offset(total: u64, tail_size: u64) -> u64 {
    total.saturating_sub(tail_size.saturating_add(1))
}

/// Counters for a batch of deletions, reported every [`PROGRESS_EVERY`]
/// completions and once more at the end.
#[derive(Debug)]
pub struct Progress {
    total: usize,
    processed: usize,
    succeeded: usize,
    started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub elapsed_ms: u64,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            succeeded: 0,
            started: Instant::now(),
        }
    }

    /// Count one completed deletion. Returns a snapshot when this completion
    /// lands on a reporting boundary or finishes the batch.
    pub fn record(&mut self, ok: bool) -> Option<ProgressSnapshot> {
        self.processed += 1;
        if ok {
            self.succeeded += 1;
        }
        self.reported().then(|| self.snapshot())
    }

    /// Whether the last report already covered everything processed so far.
    pub fn reported(&self) -> bool {
        self.processed % PROGRESS_EVERY == 0 || self.processed == self.total
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed,
            total: self.total,
            succeeded: self.succeeded,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

fn log_progress(snapshot: ProgressSnapshot) {
    info!(
        processed = snapshot.processed,
        total = snapshot.total,
        succeeded = snapshot.succeeded,
        elapsed_ms = snapshot.elapsed_ms,
        "Deletion progress"
    );
}

/// Plans and applies duplicate removal for one topic.
pub struct Sweeper {
    reader: Arc<dyn ThreadApi>,
    moderator: Arc<dyn ThreadApi>,
    topic: TopicRef,
    options: RunOptions,
    cancel: Arc<AtomicBool>,
}

impl Sweeper {
    /// `reader` lists the topic, `moderator` deletes from it.
    pub fn new(
        reader: Arc<dyn ThreadApi>,
        moderator: Arc<dyn ThreadApi>,
        topic: TopicRef,
        options: RunOptions,
    ) -> Self {
        Self {
            reader,
            moderator,
            topic,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self) -> Result<RunSummary, SweepError> {
        let topic = self.topic;
        let start_offset = self.start_offset().await?;
        info!(
            %topic,
            start_offset,
            full_scan = self.options.full_scan,
            ignore_attachments = self.options.ignore_attachments,
            "Scanning for adjacent duplicates"
        );

        let entries = comments_from(
            self.reader.clone(),
            topic,
            start_offset,
            self.options.retry,
        );
        let plan = planner::plan(entries, self.options.ignore_attachments)
            .await
            .map_err(SweepError::PageFetch)?;
        info!(%topic, scanned = plan.scanned(), planned = plan.len(), "Deletion plan built");

        let mut summary = RunSummary {
            start_offset,
            scanned: plan.scanned(),
            planned: plan.len(),
            dry_run: self.options.dry_run,
            ..RunSummary::default()
        };

        if self.options.dry_run {
            let preview = plan.preview(self.options.preview_len);
            info!(
                planned = plan.len(),
                head = ?preview.head,
                tail = ?preview.tail,
                "Dry run, no comments deleted"
            );
            summary.preview = Some(preview);
            return Ok(summary);
        }

        if plan.is_empty() {
            info!(%topic, "No duplicates found");
            return Ok(summary);
        }

        let (succeeded, failed_ids) = self.apply(plan).await;
        summary.succeeded = succeeded;
        summary.failed = failed_ids.len();
        summary.failed_ids = failed_ids;
        summary.cancelled = summary.succeeded + summary.failed < summary.planned;
        Ok(summary)
    }

    async fn start_offset(&self) -> Result<u64, SweepError> {
        if self.options.full_scan {
            return Ok(0);
        }
        let total = call_with_retry("board.getComments count", &self.options.retry, || {
            self.reader.comment_count(self.topic)
        })
        .await
        .map_err(SweepError::SizeQuery)?;
        Ok(tail_offset(total, self.options.tail_size))
    }

    /// Delete every planned id; returns the success count and the failed ids.
    async fn apply(&self, plan: DeletionPlan) -> (usize, Vec<i64>) {
        let total = plan.len();
        let topic = self.topic;
        let policy = self.options.retry;
        let mut progress = Progress::new(total);
        let mut failed_ids = Vec::new();

        run_bounded(
            plan.into_ids(),
            self.options.concurrency,
            self.cancel.clone(),
            |id| {
                let moderator = self.moderator.clone();
                async move {
                    let label = format!("board.deleteComment id={id}");
                    call_with_retry(&label, &policy, || moderator.delete_comment(topic, id)).await
                }
            },
            |outcome| {
                if let Err(err) = &outcome.result {
                    warn!(
                        id = outcome.item,
                        kind = %err.kind(),
                        attempts = err.attempts(),
                        error = err.message(),
                        "Failed to delete comment"
                    );
                    failed_ids.push(outcome.item);
                }
                if let Some(snapshot) = progress.record(outcome.result.is_ok()) {
                    log_progress(snapshot);
                }
            },
        )
        .await;

        let snapshot = progress.snapshot();
        if self.cancel.load(Ordering::SeqCst) && snapshot.processed < total {
            if !progress.reported() {
                log_progress(snapshot);
            }
            warn!(
                processed = snapshot.processed,
                total,
                "Shutdown requested, remaining deletions skipped"
            );
        }

        (snapshot.succeeded, failed_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_offset_leaves_one_extra_entry_as_baseline() {
        assert_eq!(tail_offset(1000, 10), 989);
        assert_eq!(tail_offset(11, 10), 0);
        assert_eq!(tail_offset(5, 500), 0);
        assert_eq!(tail_offset(0, 1), 0);
        assert_eq!(tail_offset(10, u64::MAX), 0);
    }

    fn reports(total: usize, completions: usize) -> Vec<usize> {
        let mut progress = Progress::new(total);
        (0..completions)
            .filter_map(|_| progress.record(true))
            .map(|snapshot| snapshot.processed)
            .collect()
    }

    #[test]
    fn progress_reports_every_twenty_and_at_the_end() {
        assert_eq!(reports(45, 45), vec![20, 40, 45]);
        assert_eq!(reports(40, 40), vec![20, 40]);
        assert_eq!(reports(3, 3), vec![3]);
    }

    #[test]
    fn interrupted_progress_still_has_a_final_count() {
        let mut progress = Progress::new(45);
        for i in 0..7 {
            let _ = progress.record(i % 2 == 0);
        }
        assert!(!progress.reported());

        let last = progress.snapshot();
        assert_eq!(last.processed, 7);
        assert_eq!(last.succeeded, 4);
        assert_eq!(last.total, 45);
    }

    #[test]
    fn summary_display() {
        let summary = RunSummary {
            scanned: 120,
            planned: 10,
            succeeded: 6,
            failed: 1,
            cancelled: true,
            ..RunSummary::default()
        };
        assert_eq!(
            summary.to_string(),
            "scanned=120 planned=10 deleted=6 failed=1 skipped=3 (cancelled)"
        );
        assert!(!summary.is_complete());

        let dry = RunSummary {
            scanned: 5,
            planned: 2,
            dry_run: true,
            ..RunSummary::default()
        };
        assert_eq!(dry.to_string(), "scanned=5 planned=2 (dry run, nothing deleted)");
        assert!(dry.is_complete());
    }
}
