pub mod error;
pub mod types;

pub use error::{ErrorKind, Result, VkError};
pub use types::{ApiEnvelope, ApiErrorBody, Attachment, BoardComment, ItemsPage};

use std::time::Duration;

use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://api.vk.com/method";

/// API version pinned for the board.* methods used here.
pub const DEFAULT_API_VERSION: &str = "5.199";

/// Largest `count` accepted by `board.getComments`.
pub const MAX_COMMENTS_PER_PAGE: u32 = 100;

pub struct VkClient {
    client: reqwest::Client,
    token: String,
    api_version: String,
    base_url: String,
}

impl VkClient {
    pub fn new(token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token,
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = version.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Invoke an API method and unwrap the `{"response": ..}` envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .query(&[("v", self.api_version.as_str())])
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VkError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: ApiEnvelope<T> = resp.json().await?;
        match (envelope.response, envelope.error) {
            (_, Some(err)) => Err(VkError::Api {
                code: err.error_code,
                message: err.error_msg,
            }),
            (Some(response), None) => Ok(response),
            (None, None) => Err(VkError::Parse(format!(
                "{method}: envelope has neither response nor error"
            ))),
        }
    }

    /// Total number of comments in a board topic.
    pub async fn board_comment_count(&self, group_id: u64, topic_id: u64) -> Result<u64> {
        let page: ItemsPage<BoardComment> = self
            .call(
                "board.getComments",
                &[
                    ("group_id", group_id.to_string()),
                    ("topic_id", topic_id.to_string()),
                    ("count", "1".to_string()),
                ],
            )
            .await?;
        tracing::debug!(group_id, topic_id, count = page.count, "Fetched topic size");
        Ok(page.count)
    }

    /// Fetch one page of topic comments starting at `offset`.
    pub async fn board_comments(
        &self,
        group_id: u64,
        topic_id: u64,
        offset: u64,
        count: u32,
        ascending: bool,
    ) -> Result<Vec<BoardComment>> {
        let sort = if ascending { "asc" } else { "desc" };
        let page: ItemsPage<BoardComment> = self
            .call(
                "board.getComments",
                &[
                    ("group_id", group_id.to_string()),
                    ("topic_id", topic_id.to_string()),
                    ("offset", offset.to_string()),
                    ("count", count.min(MAX_COMMENTS_PER_PAGE).to_string()),
                    ("sort", sort.to_string()),
                ],
            )
            .await?;
        tracing::debug!(
            group_id,
            topic_id,
            offset,
            fetched = page.items.len(),
            "Fetched topic comments page"
        );
        Ok(page.items)
    }

    /// Delete one comment. Requires a token with moderation rights on the group.
    pub async fn board_delete_comment(
        &self,
        group_id: u64,
        topic_id: u64,
        comment_id: i64,
    ) -> Result<()> {
        let ok: i64 = self
            .call(
                "board.deleteComment",
                &[
                    ("group_id", group_id.to_string()),
                    ("topic_id", topic_id.to_string()),
                    ("comment_id", comment_id.to_string()),
                ],
            )
            .await?;
        if ok != 1 {
            return Err(VkError::Parse(format!(
                "board.deleteComment returned {ok} for comment {comment_id}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "SECRET_TOKEN_abc123";

    #[tokio::test]
    async fn network_errors_do_not_carry_the_token() {
        let client = VkClient::new(TOKEN.to_string())
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        let err = client.board_comment_count(1, 2).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(!err.to_string().contains(TOKEN), "token leaked: {err}");
        assert!(!format!("{err:?}").contains(TOKEN));
    }

    #[tokio::test]
    async fn malformed_base_url_fails_closed() {
        let client = VkClient::new(TOKEN.to_string())
            .unwrap()
            .with_base_url("not a url");

        let err = client.board_comment_count(1, 2).await.unwrap_err();

        assert!(matches!(err, VkError::Request(_)));
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(!err.to_string().contains(TOKEN));
    }
}
