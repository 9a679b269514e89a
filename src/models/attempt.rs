use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One attempt per (tournament, user), enforced by a unique constraint.
/// `submitted_at` doubles as the state flag: NULL means in progress,
/// set means terminal. The grading engine's conditional update is the
/// only writer of the terminal fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TournamentAttempt {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub total_score: i32,
    pub duration_seconds: Option<i32>,
}

impl TournamentAttempt {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}
