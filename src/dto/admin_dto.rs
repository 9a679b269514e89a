use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTournamentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub prize_amount: Option<i64>,
    pub registration_opens_at: DateTime<Utc>,
    pub registration_closes_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTournamentResponse {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    pub question_type: String,
    pub options: Option<Vec<String>>,
    #[validate(length(min = 1, max = 1000))]
    pub correct_answer: String,
    pub points: Option<i32>,
    pub order_index: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateQuestionResponse {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseResultsResponse {
    pub tournament_id: Uuid,
    pub results_released: bool,
}
