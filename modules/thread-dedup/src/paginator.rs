use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use tracing::debug;
use vk_client::BoardComment;

use crate::api::{ThreadApi, TopicRef};
use crate::error::CallError;
use crate::retry::{call_with_retry, RetryPolicy};

/// Entries requested per page.
pub const PAGE_SIZE: u32 = 100;

/// Lazily walk a topic oldest-first starting at `start`.
///
/// Pages are fetched one at a time through the retry wrapper and only when
/// the consumer asks for more. A page shorter than [`PAGE_SIZE`] (including
/// an empty one) marks the end of the topic. Entries are yielded exactly as
/// fetched; overlap between pages is not filtered here. The first failed page
/// is yielded as an error and ends the stream.
pub fn comments_from(
    api: Arc<dyn ThreadApi>,
    topic: TopicRef,
    start: u64,
    policy: RetryPolicy,
) -> impl Stream<Item = Result<BoardComment, CallError>> {
    try_stream! {
        let mut offset = start;
        loop {
            let label = format!("board.getComments offset={offset}");
            let page = call_with_retry(&label, &policy, || api.comments(topic, offset, PAGE_SIZE))
                .await?;

            let fetched = page.len();
            debug!(%topic, offset, fetched, "Page fetched");
            for comment in page {
                yield comment;
            }

            if fetched < PAGE_SIZE as usize {
                break;
            }
            offset += fetched as u64;
        }
    }
}
