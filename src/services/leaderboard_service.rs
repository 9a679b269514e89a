use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::tournament_dto::LeaderboardEntry;
use crate::error::{Error, Result};
use crate::models::attempt::TournamentAttempt;

/// Derived rankings over submitted attempts. Nothing is stored: the order
/// is (score desc, duration asc, user_id asc), which is a strict total
/// order, so ranks are dense and unambiguous.
#[derive(Clone)]
pub struct LeaderboardService {
    pool: PgPool,
}

impl LeaderboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn top_n(&self, tournament_id: Uuid, n: i64) -> Result<Vec<LeaderboardEntry>> {
        let rows = sqlx::query_as::<_, TournamentAttempt>(
            r#"
            SELECT * FROM tournament_attempts
            WHERE tournament_id = $1 AND submitted_at IS NOT NULL
            ORDER BY total_score DESC, duration_seconds ASC, user_id ASC
            LIMIT $2
            "#,
        )
        .bind(tournament_id)
        .bind(n)
        .fetch_all(&self.pool)
        .await?;

        Ok(rank_entries(&rows))
    }

    /// Rank for one user even when they sit outside the displayed band:
    /// the number of attempts that strictly outrank them, plus one. The
    /// WHERE clause is the SQL counterpart of `outranks`; the two must
    /// agree or a user's rank can disagree with their leaderboard slot.
    pub async fn user_rank(&self, attempt: &TournamentAttempt) -> Result<i64> {
        let duration = attempt.duration_seconds.ok_or_else(|| {
            Error::Internal("submitted attempt is missing its duration".to_string())
        })?;

        let outranking: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tournament_attempts
            WHERE tournament_id = $1 AND submitted_at IS NOT NULL
              AND (total_score > $2
                OR (total_score = $2 AND duration_seconds < $3)
                OR (total_score = $2 AND duration_seconds = $3 AND user_id < $4))
            "#,
        )
        .bind(attempt.tournament_id)
        .bind(attempt.total_score)
        .bind(duration)
        .bind(attempt.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(outranking + 1)
    }
}

/// Assigns 1-based ranks to attempts already sorted by the leaderboard
/// order.
pub fn rank_entries(rows: &[TournamentAttempt]) -> Vec<LeaderboardEntry> {
    debug_assert!(
        rows.windows(2).all(|pair| outranks(&pair[0], &pair[1])),
        "rows must arrive in leaderboard order"
    );
    rows.iter()
        .enumerate()
        .map(|(i, attempt)| LeaderboardEntry {
            rank: i as i64 + 1,
            user_id: attempt.user_id,
            total_score: attempt.total_score,
            duration_seconds: attempt.duration_seconds.unwrap_or(0),
        })
        .collect()
}

/// True when `a` finishes ahead of `b` under the leaderboard order.
pub fn outranks(a: &TournamentAttempt, b: &TournamentAttempt) -> bool {
    let da = a.duration_seconds.unwrap_or(i32::MAX);
    let db = b.duration_seconds.unwrap_or(i32::MAX);
    (a.total_score, std::cmp::Reverse(da), std::cmp::Reverse(a.user_id))
        > (b.total_score, std::cmp::Reverse(db), std::cmp::Reverse(b.user_id))
}
