use std::env;

use tracing::info;
use vk_client::{VkClient, DEFAULT_API_VERSION};

use crate::error::ConfigError;

/// Credentials and endpoint settings loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Token allowed to list topic comments.
    pub read_token: String,
    /// Token with moderation rights on the group, used only for deletions.
    pub moderation_token: String,
    pub api_version: String,
    pub api_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            read_token: required_env("VK_READ_TOKEN")?,
            moderation_token: required_env("VK_MODERATION_TOKEN")?,
            api_version: env::var("VK_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            api_url: env::var("VK_API_URL").ok().filter(|v| !v.is_empty()),
        })
    }

    /// Log what was loaded without leaking token values.
    pub fn log_redacted(&self) {
        info!(
            read_token = %redact(&self.read_token),
            moderation_token = %redact(&self.moderation_token),
            api_version = self.api_version.as_str(),
            api_url = self.api_url.as_deref().unwrap_or("default"),
            "Config loaded"
        );
    }

    pub fn read_client(&self) -> Result<VkClient, ConfigError> {
        self.client(&self.read_token)
    }

    pub fn moderation_client(&self) -> Result<VkClient, ConfigError> {
        self.client(&self.moderation_token)
    }

    fn client(&self, token: &str) -> Result<VkClient, ConfigError> {
        let mut client = VkClient::new(token.to_string())?.with_api_version(&self.api_version);
        if let Some(ref url) = self.api_url {
            client = client.with_base_url(url);
        }
        Ok(client)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("read_token", &redact(&self.read_token))
            .field("moderation_token", &redact(&self.moderation_token))
            .field("api_version", &self.api_version)
            .field("api_url", &self.api_url)
            .finish()
    }
}

fn required_env(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn redact(token: &str) -> String {
    let chars = token.chars().count();
    if chars <= 8 {
        return format!("<{chars} chars>");
    }
    let tail: String = token.chars().skip(chars - 4).collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_short_tokens_entirely() {
        assert_eq!(redact(""), "<0 chars>");
        assert_eq!(redact("abcd"), "<4 chars>");
    }

    #[test]
    fn redact_keeps_only_last_four() {
        assert_eq!(redact("vk1.a.secretsecretXYZW"), "****XYZW");
    }

    #[test]
    fn debug_output_never_contains_tokens() {
        let config = Config {
            read_token: "read-token-value-1234".into(),
            moderation_token: "moderation-token-5678".into(),
            api_version: DEFAULT_API_VERSION.into(),
            api_url: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("read-token-value"));
        assert!(!debug.contains("moderation-token"));
        assert!(debug.contains("****1234"));
    }
}
