use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Single upserted row per (tournament, user). The map is overwritten
/// wholesale on every auto-save; it is never versioned and never an
/// append log.
#[derive(Debug, Clone, FromRow)]
pub struct StagedAnswers {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub answers: JsonValue,
    pub updated_at: DateTime<Utc>,
}
