use crate::dto::admin_dto::{CreateQuestionRequest, CreateTournamentRequest};
use crate::error::{Error, Result};
use crate::models::question::{QuestionType, TournamentQuestion};
use crate::models::tournament::Tournament;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct TournamentService {
    pool: PgPool,
}

impl TournamentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_tournament(&self, tournament_id: Uuid) -> Result<Tournament> {
        let tournament = sqlx::query_as::<_, Tournament>(
            r#"SELECT * FROM tournaments WHERE id = $1"#,
        )
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Tournament not found".to_string()))?;
        Ok(tournament)
    }

    pub async fn list_tournaments(&self) -> Result<Vec<Tournament>> {
        let rows = sqlx::query_as::<_, Tournament>(
            r#"SELECT * FROM tournaments ORDER BY starts_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Questions in display order, answer key included. Callers that build
    /// player responses must project to `PublicQuestion`.
    pub async fn list_questions(&self, tournament_id: Uuid) -> Result<Vec<TournamentQuestion>> {
        let rows = sqlx::query_as::<_, TournamentQuestion>(
            r#"
            SELECT * FROM tournament_questions
            WHERE tournament_id = $1
            ORDER BY order_index ASC, id ASC
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_tournament(&self, req: CreateTournamentRequest) -> Result<Tournament> {
        if !(req.registration_opens_at < req.registration_closes_at
            && req.registration_closes_at <= req.starts_at
            && req.starts_at < req.ends_at)
        {
            return Err(Error::BadRequest(
                "Tournament windows must satisfy registration_opens_at < registration_closes_at <= starts_at < ends_at".to_string(),
            ));
        }

        let tournament = sqlx::query_as::<_, Tournament>(
            r#"
            INSERT INTO tournaments (
                id, title, prize_amount,
                registration_opens_at, registration_closes_at, starts_at, ends_at,
                results_released
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.title.trim())
        .bind(req.prize_amount)
        .bind(req.registration_opens_at)
        .bind(req.registration_closes_at)
        .bind(req.starts_at)
        .bind(req.ends_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(tournament_id = %tournament.id, title = %tournament.title, "tournament created");
        Ok(tournament)
    }

    pub async fn add_question(
        &self,
        tournament_id: Uuid,
        req: CreateQuestionRequest,
    ) -> Result<TournamentQuestion> {
        let question_type = QuestionType::parse(&req.question_type).ok_or_else(|| {
            Error::BadRequest(format!(
                "Unknown question type '{}', expected multiple_choice or text_input",
                req.question_type
            ))
        })?;

        if question_type == QuestionType::MultipleChoice
            && req.options.as_ref().map_or(true, |o| o.len() < 2)
        {
            return Err(Error::BadRequest(
                "Multiple-choice questions need at least two options".to_string(),
            ));
        }

        // Confirm the tournament exists before attaching the question.
        self.get_tournament(tournament_id).await?;

        let order_index = match req.order_index {
            Some(idx) => idx,
            None => {
                let next: Option<i32> = sqlx::query_scalar(
                    r#"SELECT MAX(order_index) + 1 FROM tournament_questions WHERE tournament_id = $1"#,
                )
                .bind(tournament_id)
                .fetch_one(&self.pool)
                .await?;
                next.unwrap_or(0)
            }
        };

        let options_json = match &req.options {
            Some(opts) => Some(serde_json::to_value(opts)?),
            None => None,
        };

        let question = sqlx::query_as::<_, TournamentQuestion>(
            r#"
            INSERT INTO tournament_questions (
                id, tournament_id, question_text, question_type,
                options, correct_answer, points, order_index
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tournament_id)
        .bind(req.question_text.trim())
        .bind(question_type.as_str())
        .bind(options_json)
        .bind(req.correct_answer.trim())
        .bind(req.points.unwrap_or(10))
        .bind(order_index)
        .fetch_one(&self.pool)
        .await?;

        Ok(question)
    }

    /// Admin gate for the results endpoint, independent of tournament time.
    pub async fn release_results(&self, tournament_id: Uuid) -> Result<Tournament> {
        let tournament = sqlx::query_as::<_, Tournament>(
            r#"
            UPDATE tournaments SET results_released = TRUE
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Tournament not found".to_string()))?;

        tracing::info!(tournament_id = %tournament.id, "tournament results released");
        Ok(tournament)
    }
}
