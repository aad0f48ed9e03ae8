// Remote seam for the sweep.
//
// ThreadApi is the only way the core reaches the service: the paginator and
// the sweeper hold `Arc<dyn ThreadApi>`, the binary plugs in two VkClients
// (read token, moderation token), tests plug in MockThread.

use std::fmt;

use async_trait::async_trait;
use vk_client::{BoardComment, Result, VkClient};

/// A board topic: the thread being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicRef {
    pub group_id: u64,
    pub topic_id: u64,
}

impl TopicRef {
    pub fn new(group_id: u64, topic_id: u64) -> Self {
        Self { group_id, topic_id }
    }
}

impl fmt::Display for TopicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic-{}_{}", self.group_id, self.topic_id)
    }
}

#[async_trait]
pub trait ThreadApi: Send + Sync {
    /// Total number of entries in the thread.
    async fn comment_count(&self, topic: TopicRef) -> Result<u64>;

    /// Up to `count` entries starting at `offset`, oldest first.
    async fn comments(&self, topic: TopicRef, offset: u64, count: u32) -> Result<Vec<BoardComment>>;

    /// Irreversibly remove one entry.
    async fn delete_comment(&self, topic: TopicRef, comment_id: i64) -> Result<()>;
}

#[async_trait]
impl ThreadApi for VkClient {
    async fn comment_count(&self, topic: TopicRef) -> Result<u64> {
        self.board_comment_count(topic.group_id, topic.topic_id).await
    }

    async fn comments(&self, topic: TopicRef, offset: u64, count: u32) -> Result<Vec<BoardComment>> {
        self.board_comments(topic.group_id, topic.topic_id, offset, count, true)
            .await
    }

    async fn delete_comment(&self, topic: TopicRef, comment_id: i64) -> Result<()> {
        self.board_delete_comment(topic.group_id, topic.topic_id, comment_id)
            .await
    }
}
