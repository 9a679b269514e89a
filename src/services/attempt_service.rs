use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result, TimeWindowViolation};
use crate::models::attempt::TournamentAttempt;
use crate::models::staged_answers::StagedAnswers;
use crate::models::tournament::{Tournament, TournamentPhase};
use crate::services::registration_service::RegistrationService;
use crate::utils::time;

/// Longest answer text that will be staged; anything beyond is cut.
pub const MAX_ANSWER_CHARS: usize = 1000;

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
}

impl AttemptService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_attempt(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TournamentAttempt>> {
        let attempt = sqlx::query_as::<_, TournamentAttempt>(
            r#"
            SELECT * FROM tournament_attempts
            WHERE tournament_id = $1 AND user_id = $2
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    /// Creates the single attempt row for this (tournament, user), or
    /// returns the existing one unchanged. Safe under page refresh and
    /// concurrent double-starts: the unique constraint plus
    /// ON CONFLICT DO NOTHING means at most one row ever exists, and every
    /// caller reads back the same `started_at`.
    pub async fn start(&self, tournament: &Tournament, user_id: Uuid) -> Result<TournamentAttempt> {
        let registrations = RegistrationService::new(self.pool.clone());
        if !registrations.is_registered(tournament.id, user_id).await? {
            return Err(Error::NotRegistered);
        }

        let existing = self.find_attempt(tournament.id, user_id).await?;
        if existing.as_ref().is_some_and(|a| a.is_submitted()) {
            return Err(Error::AlreadySubmitted);
        }

        if tournament.phase_at(time::now(), false) != TournamentPhase::Active {
            return Err(Error::InvalidTimeWindow(TimeWindowViolation::NotActive));
        }

        if let Some(attempt) = existing {
            return Ok(attempt);
        }

        sqlx::query(
            r#"
            INSERT INTO tournament_attempts (id, tournament_id, user_id, started_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tournament_id, user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tournament.id)
        .bind(user_id)
        .bind(time::now())
        .execute(&self.pool)
        .await?;

        let attempt = self
            .find_attempt(tournament.id, user_id)
            .await?
            .ok_or_else(|| Error::Internal("attempt row missing after insert".to_string()))?;

        tracing::info!(
            tournament_id = %tournament.id,
            user_id = %user_id,
            attempt_id = %attempt.id,
            "attempt started"
        );
        Ok(attempt)
    }

    /// Compare-and-swap finalization: writes the terminal fields only if
    /// `submitted_at` is still NULL at the moment of the update. Returns
    /// whether this caller won. This is the sole mechanism that makes
    /// concurrent double-submits safe; no lock is ever taken.
    pub async fn finalize_if_unsubmitted(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        submitted_at: DateTime<Utc>,
        total_score: i32,
        duration_seconds: i32,
    ) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE tournament_attempts
            SET submitted_at = $1, total_score = $2, duration_seconds = $3
            WHERE tournament_id = $4 AND user_id = $5 AND submitted_at IS NULL
            "#,
        )
        .bind(submitted_at)
        .bind(total_score)
        .bind(duration_seconds)
        .bind(tournament_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    /// Rebuilds client state after a disconnect: the in-progress attempt
    /// plus whatever was last auto-saved.
    pub async fn resume(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> Result<(TournamentAttempt, HashMap<Uuid, String>)> {
        let attempt = self
            .find_attempt(tournament_id, user_id)
            .await?
            .filter(|a| !a.is_submitted())
            .ok_or(Error::NoActiveAttempt)?;

        let staged = self.staged_answers(tournament_id, user_id).await?;
        Ok((attempt, staged))
    }

    /// Whole-map upsert of in-progress answers. Last write wins; losing a
    /// write here is harmless because final submit grades the caller's own
    /// payload, not this row.
    pub async fn save_answers(
        &self,
        tournament: &Tournament,
        user_id: Uuid,
        answers: HashMap<Uuid, String>,
    ) -> Result<(usize, DateTime<Utc>)> {
        let attempt = self
            .find_attempt(tournament.id, user_id)
            .await?
            .ok_or(Error::NoActiveAttempt)?;
        if attempt.is_submitted() {
            return Err(Error::AlreadySubmitted);
        }
        if tournament.phase_at(time::now(), false) != TournamentPhase::Active {
            return Err(Error::InvalidTimeWindow(TimeWindowViolation::NotActive));
        }

        let sanitized = sanitize_answers(answers);
        let count = sanitized.len();
        let updated_at = self
            .write_staged(tournament.id, user_id, &sanitized)
            .await?;
        Ok((count, updated_at))
    }

    pub async fn staged_answers(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> Result<HashMap<Uuid, String>> {
        let row = sqlx::query_as::<_, StagedAnswers>(
            r#"
            SELECT * FROM tournament_answers
            WHERE tournament_id = $1 AND user_id = $2
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(staged) => Ok(serde_json::from_value(staged.answers)?),
            None => Ok(HashMap::new()),
        }
    }

    /// Overwrites the staging row with the final submitted payload so the
    /// results page can show the user their own answers. Callers treat a
    /// failure here as non-fatal; the graded attempt row is authoritative.
    pub async fn snapshot_final_answers(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        answers: &HashMap<Uuid, String>,
    ) -> Result<()> {
        self.write_staged(tournament_id, user_id, answers).await?;
        Ok(())
    }

    async fn write_staged(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
        answers: &HashMap<Uuid, String>,
    ) -> Result<DateTime<Utc>> {
        let updated_at = time::now();
        sqlx::query(
            r#"
            INSERT INTO tournament_answers (tournament_id, user_id, answers, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tournament_id, user_id)
            DO UPDATE SET answers = EXCLUDED.answers, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(serde_json::to_value(answers)?)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(updated_at)
    }
}

/// Trims, caps and drops empties. Placeholder-only entries never reach the
/// staging row.
pub fn sanitize_answers(answers: HashMap<Uuid, String>) -> HashMap<Uuid, String> {
    answers
        .into_iter()
        .filter_map(|(id, text)| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            let capped: String = trimmed.chars().take(MAX_ANSWER_CHARS).collect();
            Some((id, capped))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_whitespace() {
        let id = Uuid::new_v4();
        let input = HashMap::from([(id, "  Paris  ".to_string())]);
        let out = sanitize_answers(input);
        assert_eq!(out.get(&id).map(String::as_str), Some("Paris"));
    }

    #[test]
    fn sanitize_drops_empty_and_whitespace_only() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let input = HashMap::from([
            (a, String::new()),
            (b, "   \t\n".to_string()),
            (c, "kept".to_string()),
        ]);
        let out = sanitize_answers(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(&c).map(String::as_str), Some("kept"));
    }

    #[test]
    fn sanitize_caps_length_on_char_boundary() {
        let id = Uuid::new_v4();
        let long = "é".repeat(MAX_ANSWER_CHARS + 50);
        let out = sanitize_answers(HashMap::from([(id, long)]));
        assert_eq!(out.get(&id).unwrap().chars().count(), MAX_ANSWER_CHARS);
    }
}
