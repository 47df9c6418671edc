//! Send executor — turns one claimed task into one outbound Telegram call
//! and records the attempt in the outcome log.
//!
//! Identity resolution (which chat, which bot) happens here: a client with
//! no linked chat or a team with no bot token fails fast without a network
//! call. Such failures are permanent, but they are counted and retried like
//! any other failure — the queue does not special-case them.

use std::time::Instant;

use sqlx::PgPool;
use uuid::Uuid;

use relay_common::error::AppError;
use relay_common::types::{LogKind, OutcomeStatus, Task, TaskPayload, TaskSource};
use relay_queue::outcome::{NewSendLog, OutcomeLog};

use crate::telegram::TelegramClient;

/// Result of one execution attempt, as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub success: bool,
    /// Failure detail for the task's `error_message`; `None` on success.
    pub error: Option<String>,
}

/// Credentials for an outbound call: bot token + chat id.
struct SendAuth {
    bot_token: String,
    chat_id: String,
}

/// Everything resolved from a task before the outbound call. `auth` is
/// `Err(reason)` for permanent payload faults (missing identity, missing
/// credential, dangling resend reference).
struct Resolved {
    kind: LogKind,
    team_id: Option<Uuid>,
    client_id: Option<Uuid>,
    chat_id: Option<String>,
    text: String,
    photo: Option<(String, Option<String>)>,
    source: TaskSource,
    auth: Result<SendAuth, String>,
}

pub struct SendExecutor {
    pool: PgPool,
    telegram: TelegramClient,
}

impl SendExecutor {
    pub fn new(pool: PgPool, telegram: TelegramClient) -> Self {
        Self { pool, telegram }
    }

    /// Execute one attempt for a claimed task.
    ///
    /// Returns `Ok(outcome)` for both delivered and failed sends — the
    /// dispatcher turns the outcome into a status transition. `Err` is
    /// reserved for storage faults, which are not task-specific.
    ///
    /// One outcome log row is appended per attempt, unconditionally; a
    /// failed log insert is traced and swallowed so it can never block the
    /// task's own transition.
    pub async fn execute(&self, task: &Task) -> Result<AttemptOutcome, AppError> {
        let started = Instant::now();
        let attempt = task.attempts + 1;

        let resolved = self.resolve(task).await?;

        let send_result: Result<Option<i64>, String> = match &resolved.auth {
            Err(reason) => Err(reason.clone()),
            Ok(auth) => {
                let call = match &resolved.photo {
                    Some((url, caption)) => {
                        self.telegram
                            .send_photo(&auth.bot_token, &auth.chat_id, url, caption.as_deref())
                            .await
                    }
                    None => {
                        self.telegram
                            .send_message(&auth.bot_token, &auth.chat_id, &resolved.text)
                            .await
                    }
                };
                call.map_err(|e| e.to_string())
            }
        };

        let duration_ms = started.elapsed().as_millis() as i64;
        let (status, provider_message_id, error) = match &send_result {
            Ok(message_id) => (OutcomeStatus::Success, *message_id, None),
            Err(detail) => (OutcomeStatus::Failed, None, Some(detail.clone())),
        };

        let entry = NewSendLog {
            task_id: Some(task.id),
            kind: resolved.kind,
            team_id: resolved.team_id,
            client_id: resolved.client_id,
            chat_id: resolved.chat_id,
            message_text: resolved.text,
            photo_url: resolved.photo.as_ref().map(|(url, _)| url.clone()),
            status,
            provider_message_id,
            error_detail: error.clone(),
            attempt,
            source: resolved.source,
            duration_ms,
        };
        if let Err(e) = OutcomeLog::record(&self.pool, &entry).await {
            tracing::error!(task_id = %task.id, error = %e, "Failed to append outcome log entry");
        }

        match &send_result {
            Ok(message_id) => tracing::info!(
                task_id = %task.id,
                attempt,
                provider_message_id = message_id.unwrap_or_default(),
                duration_ms,
                "Send delivered"
            ),
            Err(detail) => tracing::warn!(
                task_id = %task.id,
                attempt,
                duration_ms,
                error = %detail,
                "Send attempt failed"
            ),
        }

        Ok(AttemptOutcome {
            success: send_result.is_ok(),
            error,
        })
    }

    /// Resolve payload, recipient identity, and sending credential.
    async fn resolve(&self, task: &Task) -> Result<Resolved, AppError> {
        let payload = match task.payload() {
            Ok(payload) => payload,
            Err(e) => {
                // Malformed jsonb should be impossible through the producer
                // contract, but a bad row must not wedge the worker.
                return Ok(Resolved {
                    kind: LogKind::Send,
                    team_id: None,
                    client_id: None,
                    chat_id: None,
                    text: String::new(),
                    photo: None,
                    source: TaskSource::Manual,
                    auth: Err(format!("invalid task payload: {}", e)),
                });
            }
        };

        match payload {
            TaskPayload::SendMessage {
                team_id,
                client_id,
                message,
                source,
            } => {
                let (chat_id, auth) = self.resolve_identity(team_id, client_id).await?;
                Ok(Resolved {
                    kind: LogKind::Send,
                    team_id: Some(team_id),
                    client_id: Some(client_id),
                    chat_id,
                    text: message,
                    photo: None,
                    source,
                    auth,
                })
            }
            TaskPayload::SendPhoto {
                team_id,
                client_id,
                photo_url,
                caption,
                source,
            } => {
                let (chat_id, auth) = self.resolve_identity(team_id, client_id).await?;
                let text = caption.clone().unwrap_or_else(|| photo_url.clone());
                Ok(Resolved {
                    kind: LogKind::Send,
                    team_id: Some(team_id),
                    client_id: Some(client_id),
                    chat_id,
                    text,
                    photo: Some((photo_url, caption)),
                    source,
                    auth,
                })
            }
            TaskPayload::ResendMessage { source_log_id } => {
                self.resolve_resend(source_log_id).await
            }
        }
    }

    /// Look up a client's chat id and their team's bot token in one query.
    async fn resolve_identity(
        &self,
        team_id: Uuid,
        client_id: Uuid,
    ) -> Result<(Option<String>, Result<SendAuth, String>), AppError> {
        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT c.telegram_chat_id, t.telegram_bot_token
            FROM clients c
            JOIN teams t ON t.id = c.team_id
            WHERE c.id = $1 AND t.id = $2
            "#,
        )
        .bind(client_id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;

        let result = match row {
            None => (
                None,
                Err(format!("client {} not found for team {}", client_id, team_id)),
            ),
            Some((None, _)) => (
                None,
                Err(format!("client {} has no Telegram chat linked", client_id)),
            ),
            Some((chat, None)) => (
                chat,
                Err(format!("team {} has no Telegram bot configured", team_id)),
            ),
            Some((Some(chat_id), Some(bot_token))) => (
                Some(chat_id.clone()),
                Ok(SendAuth { bot_token, chat_id }),
            ),
        };

        Ok(result)
    }

    /// Resolve a resend task from its referenced outcome log row: same
    /// rendered text, same recipient, same team's bot. A photo send is
    /// resent as a photo; the logged text becomes its caption again.
    async fn resolve_resend(&self, source_log_id: Uuid) -> Result<Resolved, AppError> {
        let log = match OutcomeLog::get(&self.pool, source_log_id).await {
            Ok(log) => log,
            Err(AppError::NotFound(_)) => {
                return Ok(Resolved {
                    kind: LogKind::Resend,
                    team_id: None,
                    client_id: None,
                    chat_id: None,
                    text: String::new(),
                    photo: None,
                    source: TaskSource::Manual,
                    auth: Err(format!("source send log {} not found", source_log_id)),
                });
            }
            Err(e) => return Err(e),
        };

        let bot_token = match log.team_id {
            Some(team_id) => {
                let row: Option<(Option<String>,)> =
                    sqlx::query_as("SELECT telegram_bot_token FROM teams WHERE id = $1")
                        .bind(team_id)
                        .fetch_optional(&self.pool)
                        .await?;
                row.and_then(|(token,)| token)
            }
            None => None,
        };

        let auth = match (&log.chat_id, bot_token) {
            (Some(chat_id), Some(bot_token)) => Ok(SendAuth {
                bot_token,
                chat_id: chat_id.clone(),
            }),
            (None, _) => Err(format!(
                "source send log {} has no chat id to resend to",
                source_log_id
            )),
            (_, None) => Err(format!(
                "no bot token available to resend log {}",
                source_log_id
            )),
        };

        // A captionless photo send logs the URL itself as message_text;
        // don't echo it back as a caption.
        let photo = log.photo_url.clone().map(|url| {
            let caption = (log.message_text != url).then(|| log.message_text.clone());
            (url, caption)
        });

        Ok(Resolved {
            kind: LogKind::Resend,
            team_id: log.team_id,
            client_id: log.client_id,
            chat_id: log.chat_id.clone(),
            text: log.message_text.clone(),
            photo,
            source: log.source,
            auth,
        })
    }
}
