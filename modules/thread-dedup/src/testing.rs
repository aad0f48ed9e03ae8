// Test double for the ThreadApi seam.
//
// MockThread keeps a topic in memory and records every call so tests can
// assert on paging, retries and deletion concurrency without a network.
// Failures are scripted per page offset / comment id with a builder:
// `.fail_page_times()`, `.fail_count_times()`, `.fail_delete()`,
// `.fail_delete_times()`. `.with_page()` replaces what one offset returns,
// e.g. to model entries shifting between page requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use vk_client::{Attachment, BoardComment, Result, VkError};

use crate::api::{ThreadApi, TopicRef};

type ErrorFactory = Box<dyn Fn() -> VkError + Send + Sync>;

/// Scripted failure: `remaining == None` fails forever.
struct Failure {
    remaining: Option<u32>,
    make: ErrorFactory,
}

impl Failure {
    fn fire(&mut self) -> Option<VkError> {
        match &mut self.remaining {
            None => Some((self.make)()),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some((self.make)())
            }
        }
    }
}

#[derive(Default)]
pub struct MockThread {
    comments: Mutex<Vec<BoardComment>>,
    pages: HashMap<u64, Vec<BoardComment>>,
    page_failures: Mutex<HashMap<u64, Failure>>,
    count_failure: Mutex<Option<Failure>>,
    delete_failures: Mutex<HashMap<i64, Failure>>,
    delete_delay: Duration,

    count_requests: AtomicUsize,
    page_requests: Mutex<Vec<u64>>,
    delete_calls: Mutex<Vec<i64>>,
    deleted: Mutex<Vec<i64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comments(comments: impl IntoIterator<Item = BoardComment>) -> Self {
        Self {
            comments: Mutex::new(comments.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Serve `page` for requests at `offset` instead of slicing the topic.
    pub fn with_page(mut self, offset: u64, page: impl IntoIterator<Item = BoardComment>) -> Self {
        self.pages.insert(offset, page.into_iter().collect());
        self
    }

    /// Fail the page at `offset` the next `times` requests.
    pub fn fail_page_times(
        self,
        offset: u64,
        times: u32,
        make: impl Fn() -> VkError + Send + Sync + 'static,
    ) -> Self {
        self.page_failures.lock().unwrap().insert(
            offset,
            Failure {
                remaining: Some(times),
                make: Box::new(make),
            },
        );
        self
    }

    pub fn fail_count_times(self, times: u32, make: impl Fn() -> VkError + Send + Sync + 'static) -> Self {
        *self.count_failure.lock().unwrap() = Some(Failure {
            remaining: Some(times),
            make: Box::new(make),
        });
        self
    }

    /// Every deletion of `id` fails.
    pub fn fail_delete(self, id: i64, make: impl Fn() -> VkError + Send + Sync + 'static) -> Self {
        self.delete_failures.lock().unwrap().insert(
            id,
            Failure {
                remaining: None,
                make: Box::new(make),
            },
        );
        self
    }

    pub fn fail_delete_times(
        self,
        id: i64,
        times: u32,
        make: impl Fn() -> VkError + Send + Sync + 'static,
    ) -> Self {
        self.delete_failures.lock().unwrap().insert(
            id,
            Failure {
                remaining: Some(times),
                make: Box::new(make),
            },
        );
        self
    }

    /// Hold each deletion open for `delay` so overlap becomes observable.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    pub fn count_requests(&self) -> usize {
        self.count_requests.load(Ordering::SeqCst)
    }

    /// Offsets of every page request, in request order.
    pub fn page_requests(&self) -> Vec<u64> {
        self.page_requests.lock().unwrap().clone()
    }

    /// Ids passed to every delete call, including failed ones.
    pub fn delete_calls(&self) -> Vec<i64> {
        self.delete_calls.lock().unwrap().clone()
    }

    pub fn delete_attempts(&self, id: i64) -> usize {
        self.delete_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|&&c| c == id)
            .count()
    }

    /// Ids actually removed, in completion order.
    pub fn deleted(&self) -> Vec<i64> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn max_in_flight_deletes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn remaining_ids(&self) -> Vec<i64> {
        self.comments.lock().unwrap().iter().map(|c| c.id).collect()
    }
}

#[async_trait]
impl ThreadApi for MockThread {
    async fn comment_count(&self, _topic: TopicRef) -> Result<u64> {
        self.count_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.count_failure.lock().unwrap().as_mut().and_then(Failure::fire) {
            return Err(err);
        }
        Ok(self.comments.lock().unwrap().len() as u64)
    }

    async fn comments(&self, _topic: TopicRef, offset: u64, count: u32) -> Result<Vec<BoardComment>> {
        self.page_requests.lock().unwrap().push(offset);
        if let Some(err) = self
            .page_failures
            .lock()
            .unwrap()
            .get_mut(&offset)
            .and_then(Failure::fire)
        {
            return Err(err);
        }
        if let Some(page) = self.pages.get(&offset) {
            return Ok(page.iter().take(count as usize).cloned().collect());
        }
        let comments = self.comments.lock().unwrap();
        Ok(comments
            .iter()
            .skip(offset as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }

    async fn delete_comment(&self, _topic: TopicRef, comment_id: i64) -> Result<()> {
        self.delete_calls.lock().unwrap().push(comment_id);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delete_delay.is_zero() {
            tokio::time::sleep(self.delete_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self
            .delete_failures
            .lock()
            .unwrap()
            .get_mut(&comment_id)
            .and_then(Failure::fire)
        {
            return Err(err);
        }

        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|c| c.id != comment_id);
        if comments.len() == before {
            return Err(VkError::Api {
                code: 100,
                message: format!("comment {comment_id} not found"),
            });
        }
        self.deleted.lock().unwrap().push(comment_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Comment helpers
// ---------------------------------------------------------------------------

/// Comments with sequential ids starting at 1, from `(author, text)` pairs.
pub fn thread(entries: &[(i64, &str)]) -> Vec<BoardComment> {
    entries
        .iter()
        .enumerate()
        .map(|(i, (author, text))| BoardComment::new(i as i64 + 1, *author, *text))
        .collect()
}

pub fn photo(owner_id: i64, id: i64) -> Attachment {
    Attachment::new("photo").with_owner_id(owner_id).with_id(id)
}

pub fn rate_limited() -> VkError {
    VkError::Api {
        code: 6,
        message: "Too many requests per second".into(),
    }
}

pub fn access_denied() -> VkError {
    VkError::Api {
        code: 15,
        message: "Access denied: no access to this topic".into(),
    }
}
