use futures::{Stream, StreamExt};
use tracing::debug;
use vk_client::BoardComment;

use crate::error::CallError;
use crate::normalize::Signature;

/// Ids selected for deletion, in scan order. Built completely before any
/// deletion starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    ids: Vec<i64>,
    scanned: usize,
}

/// Bounded view of a plan for dry runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanPreview {
    pub head: Vec<i64>,
    /// Empty when the whole plan fits in `head`.
    pub tail: Vec<i64>,
}

impl DeletionPlan {
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn into_ids(self) -> Vec<i64> {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of entries the planning pass looked at.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// First `n` and last `n` ids.
    pub fn preview(&self, n: usize) -> PlanPreview {
        if self.ids.len() <= n.saturating_mul(2) {
            return PlanPreview {
                head: self.ids.clone(),
                tail: Vec::new(),
            };
        }
        PlanPreview {
            head: self.ids[..n].to_vec(),
            tail: self.ids[self.ids.len() - n..].to_vec(),
        }
    }
}

/// Single-pass adjacency matcher.
///
/// Each entry is compared against the last kept entry only. A match is
/// planned for deletion and the baseline stays put, so a run of k equal
/// entries yields k - 1 deletions. A mismatch becomes the new baseline.
#[derive(Debug, Default)]
pub struct Planner {
    ignore_attachments: bool,
    kept: Option<(i64, Signature)>,
    plan: DeletionPlan,
}

impl Planner {
    pub fn new(ignore_attachments: bool) -> Self {
        Self {
            ignore_attachments,
            ..Self::default()
        }
    }

    /// Feed the next entry; returns its id when it duplicates the baseline.
    pub fn observe(&mut self, comment: &BoardComment) -> Option<i64> {
        self.plan.scanned += 1;
        let signature = Signature::of(comment, self.ignore_attachments);

        match &self.kept {
            Some((kept_id, kept)) if *kept == signature => {
                debug!(id = comment.id, duplicate_of = *kept_id, "Adjacent duplicate");
                self.plan.ids.push(comment.id);
                Some(comment.id)
            }
            _ => {
                self.kept = Some((comment.id, signature));
                None
            }
        }
    }

    pub fn finish(self) -> DeletionPlan {
        self.plan
    }
}

/// Drain `entries` into a deletion plan. Any fetch error aborts planning,
/// since a plan built over a gap cannot be trusted.
pub async fn plan<S>(entries: S, ignore_attachments: bool) -> Result<DeletionPlan, CallError>
where
    S: Stream<Item = Result<BoardComment, CallError>>,
{
    let mut entries = std::pin::pin!(entries);
    let mut planner = Planner::new(ignore_attachments);
    while let Some(entry) = entries.next().await {
        planner.observe(&entry?);
    }
    Ok(planner.finish())
}
