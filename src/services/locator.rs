use crate::error::LocatorError;
use async_trait::async_trait;
use serde::Deserialize;

/// Resolves an opaque file reference to a fetchable URL
#[async_trait]
pub trait ContentLocator: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<String, LocatorError>;
}

/// Locator backed by the Telegram Bot API `getFile` method
pub struct TelegramLocator {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct GetFileResponse {
    ok: bool,
    description: Option<String>,
    result: Option<TelegramFile>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: Option<String>,
}

impl TelegramLocator {
    pub fn new(client: reqwest::Client, api_url: String, bot_token: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token,
        }
    }

    fn download_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.api_url,
            self.bot_token,
            file_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ContentLocator for TelegramLocator {
    async fn resolve(&self, reference: &str) -> Result<String, LocatorError> {
        let endpoint = format!("{}/bot{}/getFile", self.api_url, self.bot_token);

        let response = self
            .client
            .get(&endpoint)
            .query(&[("file_id", reference)])
            .send()
            .await?;

        let status = response.status();
        let body: GetFileResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(LocatorError::Api(format!("getFile returned HTTP {}", status)));
            }
        };

        if !body.ok {
            let description = body
                .description
                .unwrap_or_else(|| "Unknown error".to_string());
            // Bot API answers unknown or expired ids with 400 Bad Request
            return Err(if status.as_u16() == 400 || status.as_u16() == 404 {
                LocatorError::NotFound(description)
            } else {
                LocatorError::Api(description)
            });
        }

        let file_path = body
            .result
            .and_then(|f| f.file_path)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LocatorError::Api("getFile response has no file_path".to_string()))?;

        tracing::debug!("Resolved file reference {}", reference);
        Ok(self.download_url(&file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_layout() {
        let locator = TelegramLocator::new(
            reqwest::Client::new(),
            "https://api.telegram.org/".to_string(),
            "123:abc".to_string(),
        );
        assert_eq!(
            locator.download_url("photos/file_1.jpg"),
            "https://api.telegram.org/file/bot123:abc/photos/file_1.jpg"
        );
    }

    #[test]
    fn test_get_file_response_parsing() {
        let ok: GetFileResponse = serde_json::from_str(
            r#"{"ok":true,"result":{"file_id":"x","file_unique_id":"y","file_size":10,"file_path":"photos/a.jpg"}}"#,
        )
        .unwrap();
        assert!(ok.ok);
        assert_eq!(ok.result.unwrap().file_path.as_deref(), Some("photos/a.jpg"));

        let err: GetFileResponse = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: invalid file_id"}"#,
        )
        .unwrap();
        assert!(!err.ok);
        assert_eq!(err.description.as_deref(), Some("Bad Request: invalid file_id"));
    }
}
