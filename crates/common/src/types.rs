use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical kind of outbound work carried by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SendMessage,
    ResendMessage,
    SendPhoto,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::SendMessage => write!(f, "send_message"),
            TaskType::ResendMessage => write!(f, "resend_message"),
            TaskType::SendPhoto => write!(f, "send_photo"),
        }
    }
}

/// Task lifecycle state.
///
/// `Completed` and `Failed` are terminal: once a task reaches either, no
/// store operation moves it back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Which producer created a task; recorded in the outcome log for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    Booking,
    Reminder,
    Broadcast,
    #[default]
    Manual,
}

impl std::fmt::Display for TaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskSource::Booking => write!(f, "booking"),
            TaskSource::Reminder => write!(f, "reminder"),
            TaskSource::Broadcast => write!(f, "broadcast"),
            TaskSource::Manual => write!(f, "manual"),
        }
    }
}

/// Result of a single send attempt, as recorded in the outcome log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Whether an outcome log row records a fresh send or a resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Send,
    Resend,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::Send => write!(f, "send"),
            LogKind::Resend => write!(f, "resend"),
        }
    }
}

/// A unit of outbound work tracked through the queue.
///
/// `payload` is stored as jsonb; parse it with [`Task::payload`] to get the
/// typed variant matching `task_type`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub execute_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Parse the jsonb payload into its typed variant.
    pub fn payload(&self) -> Result<TaskPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Typed representation of a task's `payload` jsonb, keyed by the same tag
/// as the `task_type` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    SendMessage {
        team_id: Uuid,
        client_id: Uuid,
        message: String,
        #[serde(default)]
        source: TaskSource,
    },
    ResendMessage {
        source_log_id: Uuid,
    },
    SendPhoto {
        team_id: Uuid,
        client_id: Uuid,
        photo_url: String,
        #[serde(default)]
        caption: Option<String>,
        #[serde(default)]
        source: TaskSource,
    },
}

impl TaskPayload {
    /// The `task_type` column value matching this payload variant.
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskPayload::SendMessage { .. } => TaskType::SendMessage,
            TaskPayload::ResendMessage { .. } => TaskType::ResendMessage,
            TaskPayload::SendPhoto { .. } => TaskType::SendPhoto,
        }
    }
}

/// One row of the append-only outcome log: the result of a single send
/// attempt, independent of the task's current state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SendLog {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    pub kind: LogKind,
    pub team_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub chat_id: Option<String>,
    pub message_text: String,
    /// Set for photo sends; a resend of such a row goes out as a photo again.
    pub photo_url: Option<String>,
    pub status: OutcomeStatus,
    pub provider_message_id: Option<i64>,
    pub error_detail: Option<String>,
    pub attempt: i32,
    pub source: TaskSource,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// The global dispatch settings row, mutated only through the admin API and
/// read by the worker on each loop iteration (behind a short TTL cache).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DispatchSettings {
    /// Global bot ceiling: maximum sends per minute across all chats.
    pub telegram_per_minute: i32,
    /// Per-chat ceiling. Stored and surfaced for a future sliding-window
    /// limiter; the current limiter applies only the uniform global pause.
    pub telegram_per_chat_per_minute: i32,
    /// Minimum pause between sends, in milliseconds.
    pub min_delay_ms: i64,
    /// Default retry ceiling for newly enqueued tasks.
    pub max_retry_attempts: i32,
    /// Base delay before the first retry, in milliseconds.
    pub retry_base_delay_ms: i64,
    /// Double the retry delay on each subsequent attempt.
    pub exponential_backoff: bool,
    /// Circuit breaker: consecutive failures before pausing sends.
    /// Stored for operators; no breaker logic runs yet.
    pub circuit_failure_threshold: i32,
    /// Circuit breaker: cool-down window in seconds. Stored only.
    pub circuit_recovery_secs: i64,
    /// Master switch: when false the worker idles without claiming.
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            telegram_per_minute: 25,
            telegram_per_chat_per_minute: 3,
            min_delay_ms: 2400,
            max_retry_attempts: 3,
            retry_base_delay_ms: 5000,
            exponential_backoff: true,
            circuit_failure_threshold: 10,
            circuit_recovery_secs: 300,
            enabled: true,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_tag_matches_task_type() {
        let payload = TaskPayload::SendMessage {
            team_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            message: "Your appointment is confirmed".to_string(),
            source: TaskSource::Booking,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "send_message");
        assert_eq!(payload.task_type(), TaskType::SendMessage);

        let back: TaskPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_payload_source_defaults_to_manual() {
        let value = serde_json::json!({
            "type": "send_photo",
            "team_id": Uuid::new_v4(),
            "client_id": Uuid::new_v4(),
            "photo_url": "https://example.com/price-list.png"
        });
        let payload: TaskPayload = serde_json::from_value(value).unwrap();
        match payload {
            TaskPayload::SendPhoto {
                source, caption, ..
            } => {
                assert_eq!(source, TaskSource::Manual);
                assert!(caption.is_none());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_resend_payload_shape() {
        let log_id = Uuid::new_v4();
        let payload = TaskPayload::ResendMessage {
            source_log_id: log_id,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "resend_message");
        assert_eq!(value["source_log_id"], log_id.to_string());
    }
}
