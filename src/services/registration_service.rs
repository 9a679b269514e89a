use crate::error::{Error, Result, TimeWindowViolation};
use crate::models::registration::Registration;
use crate::models::tournament::{Tournament, TournamentPhase};
use crate::utils::time;
use sqlx::PgPool;
use uuid::Uuid;

/// Append-only ledger of (tournament, user) registrations. No update or
/// delete path exists; a row, once written, is permanent.
#[derive(Clone)]
pub struct RegistrationService {
    pool: PgPool,
}

impl RegistrationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, tournament: &Tournament, user_id: Uuid) -> Result<Registration> {
        let phase = tournament.phase_at(time::now(), false);
        if phase != TournamentPhase::RegistrationOpen {
            let reason = match phase {
                TournamentPhase::NotStarted => TimeWindowViolation::RegistrationNotOpen,
                _ => TimeWindowViolation::RegistrationClosed,
            };
            return Err(Error::InvalidTimeWindow(reason));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO tournament_registrations (tournament_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (tournament_id, user_id) DO NOTHING
            "#,
        )
        .bind(tournament.id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(Error::AlreadyRegistered);
        }

        let registration = sqlx::query_as::<_, Registration>(
            r#"
            SELECT * FROM tournament_registrations
            WHERE tournament_id = $1 AND user_id = $2
            "#,
        )
        .bind(tournament.id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            tournament_id = %tournament.id,
            user_id = %user_id,
            "user registered for tournament"
        );
        Ok(registration)
    }

    pub async fn is_registered(&self, tournament_id: Uuid, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM tournament_registrations
                WHERE tournament_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
