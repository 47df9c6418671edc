//! Minimal Telegram Bot API client — just the two send primitives the
//! dispatch engine needs.
//!
//! Telegram can answer HTTP 200 with `{"ok": false, ...}` in the body, so
//! transport success alone never counts as delivery: the explicit `ok`
//! indicator is checked on every response.

use std::time::Duration;

use serde::Deserialize;

use relay_common::error::AppError;

/// Thin reqwest wrapper over the Bot API. One instance per worker; the
/// bot token is supplied per call because each team brings its own bot.
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: Option<bool>,
    description: Option<String>,
    result: Option<ApiResult>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    message_id: Option<i64>,
}

impl TelegramClient {
    /// `base` is normally `https://api.telegram.org`; tests point it at a
    /// local stub. `timeout_secs` bounds each outbound call.
    pub fn new(base: impl Into<String>, timeout_secs: u64) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base: base.into(),
        })
    }

    /// Send a text message. Returns the provider-assigned message id.
    pub async fn send_message(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<Option<i64>, AppError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        self.call(bot_token, "sendMessage", &body).await
    }

    /// Send a photo by URL with an optional caption.
    pub async fn send_photo(
        &self,
        bot_token: &str,
        chat_id: &str,
        photo_url: &str,
        caption: Option<&str>,
    ) -> Result<Option<i64>, AppError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "photo": photo_url,
            "parse_mode": "HTML",
        });
        if let Some(caption) = caption {
            body["caption"] = serde_json::Value::String(caption.to_string());
        }
        self.call(bot_token, "sendPhoto", &body).await
    }

    async fn call(
        &self,
        bot_token: &str,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<Option<i64>, AppError> {
        let url = format!("{}/bot{}/{}", self.base, bot_token, method);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Telegram(format!("transport error: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Telegram(format!("failed to read response body: {}", e)))?;

        interpret_response(status, &body).map_err(AppError::Telegram)
    }
}

/// Decide whether a Bot API response is a successful delivery.
///
/// Success requires a parseable JSON body whose `ok` field is not `false`;
/// the HTTP status alone is not trusted. On success the provider message id
/// is extracted when present. On failure the provider's error body is
/// returned verbatim for the task's `error_message`.
fn interpret_response(http_status: u16, body: &str) -> Result<Option<i64>, String> {
    let parsed: ApiResponse = serde_json::from_str(body)
        .map_err(|_| format!("HTTP {}: unparseable provider response: {}", http_status, body))?;

    if parsed.ok == Some(false) {
        let detail = parsed
            .description
            .unwrap_or_else(|| body.trim().to_string());
        return Err(format!("provider rejected send (HTTP {}): {}", http_status, detail));
    }

    Ok(parsed.result.and_then(|r| r.message_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_extracts_message_id() {
        let body = r#"{"ok": true, "result": {"message_id": 42, "chat": {"id": 1}}}"#;
        assert_eq!(interpret_response(200, body).unwrap(), Some(42));
    }

    #[test]
    fn test_http_200_with_ok_false_is_failure() {
        let body = r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#;
        let err = interpret_response(200, body).unwrap_err();
        assert!(err.contains("chat not found"));
    }

    #[test]
    fn test_missing_ok_field_is_not_a_failure() {
        // Only an explicit `ok: false` marks failure.
        let body = r#"{"result": {"message_id": 7}}"#;
        assert_eq!(interpret_response(200, body).unwrap(), Some(7));
    }

    #[test]
    fn test_unparseable_body_is_failure() {
        let err = interpret_response(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(err.contains("502"));
    }

    #[test]
    fn test_success_without_message_id() {
        let body = r#"{"ok": true, "result": {}}"#;
        assert_eq!(interpret_response(200, body).unwrap(), None);
    }
}
