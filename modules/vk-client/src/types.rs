use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One comment in a board topic, as returned by `board.getComments`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoardComment {
    pub id: i64,
    pub from_id: i64,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl BoardComment {
    pub fn new(id: i64, from_id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            from_id,
            date: None,
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Flattened view of a VK attachment.
///
/// VK nests the payload under a key named after the type
/// (`{"type": "photo", "photo": {"owner_id": 1, "id": 2}}`). Only the fields
/// needed to tell two attachments apart are lifted out; they stay raw JSON
/// because their shape differs between attachment types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    pub kind: Option<String>,
    pub owner_id: Option<Value>,
    pub id: Option<Value>,
    pub sticker_id: Option<Value>,
    pub url: Option<Value>,
}

impl Attachment {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            ..Self::default()
        }
    }

    pub fn with_owner_id(mut self, owner_id: impl Into<Value>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_sticker_id(mut self, sticker_id: impl Into<Value>) -> Self {
        self.sticker_id = Some(sticker_id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<Value>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn from_raw(raw: &Value) -> Self {
        let kind = raw.get("type").and_then(Value::as_str).map(str::to_string);
        let payload = kind.as_deref().and_then(|k| raw.get(k));
        let field = |name: &str| payload.and_then(|p| p.get(name)).cloned();

        Self {
            owner_id: field("owner_id"),
            id: field("id"),
            sticker_id: field("sticker_id"),
            url: field("url").or_else(|| field("link")),
            kind,
        }
    }
}

impl<'de> Deserialize<'de> for Attachment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Attachment::from_raw(&raw))
    }
}

/// `{"count": N, "items": [...]}` list payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemsPage<T> {
    pub count: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Wrapper for VK API responses: exactly one of `response` or `error` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub response: Option<T>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error_code: i64,
    #[serde(default)]
    pub error_msg: String,
}
