use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::tournament::TournamentPhase;

#[derive(Debug, Clone, Serialize)]
pub struct TournamentStateResponse {
    pub state: TournamentPhase,
    pub is_registered: bool,
    pub has_submitted: bool,
    pub server_time: DateTime<Utc>,
    pub registration_opens_at: DateTime<Utc>,
    pub registration_closes_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TournamentSummary {
    pub id: Uuid,
    pub title: String,
    pub prize_amount: Option<i64>,
    pub state: TournamentPhase,
    pub is_registered: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub tournament_id: Uuid,
    pub registered_at: DateTime<Utc>,
}

/// Question as shown to a player: no `correct_answer`.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub options: Option<JsonValue>,
    pub points: i32,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionsResponse {
    pub tournament_id: Uuid,
    pub questions: Vec<PublicQuestion>,
    /// Staged answers from a previous session, for rebuilding client state.
    pub staged_answers: HashMap<Uuid, String>,
    pub attempt: Option<AttemptSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: Uuid,
    pub tournament_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveAnswersRequest {
    pub answers: serde_json::Map<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveAnswersResponse {
    pub saved: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub answers: serde_json::Map<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub score: i32,
    pub duration_seconds: i32,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: Uuid,
    pub total_score: i32,
    pub duration_seconds: i32,
}

/// Results before the admin releases them: the caller's own answers and
/// duration, nothing else. No score, no rank, no peers, no answer key.
#[derive(Debug, Clone, Serialize)]
pub struct PendingResultsResponse {
    pub results_released: bool,
    pub duration_seconds: i32,
    pub answers: HashMap<Uuid, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerBreakdown {
    pub question_id: Uuid,
    pub question_text: String,
    pub your_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub points_earned: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleasedResultsResponse {
    pub results_released: bool,
    pub score: i32,
    pub duration_seconds: i32,
    pub rank: i64,
    pub breakdown: Vec<AnswerBreakdown>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Converts the untyped request map into `questionId -> String` before it
/// reaches the grading engine. A non-string value or a key that is not a
/// question id fails the whole payload; absent questions are fine and
/// simply grade as blank.
pub fn validate_answer_map(
    raw: &serde_json::Map<String, JsonValue>,
) -> Result<HashMap<Uuid, String>> {
    let mut answers = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let question_id = Uuid::parse_str(key).map_err(|_| {
            Error::MalformedAnswerPayload(format!("'{}' is not a valid question id", key))
        })?;
        let text = value.as_str().ok_or_else(|| {
            Error::MalformedAnswerPayload(format!(
                "answer for question {} must be a string",
                question_id
            ))
        })?;
        answers.insert(question_id, text.to_string());
    }
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map_of(pairs: &[(&str, JsonValue)]) -> serde_json::Map<String, JsonValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn accepts_string_answers() {
        let id = Uuid::new_v4();
        let raw = map_of(&[(&id.to_string(), json!("Paris"))]);
        let parsed = validate_answer_map(&raw).unwrap();
        assert_eq!(parsed.get(&id).map(String::as_str), Some("Paris"));
    }

    #[test]
    fn rejects_non_string_values() {
        let id = Uuid::new_v4();
        for bad in [json!(42), json!(true), json!(["a"]), json!({"v": "x"}), json!(null)] {
            let raw = map_of(&[(&id.to_string(), bad)]);
            let err = validate_answer_map(&raw).unwrap_err();
            assert_eq!(err.code(), "malformed_answer_payload");
        }
    }

    #[test]
    fn rejects_non_uuid_keys() {
        let raw = map_of(&[("question-1", json!("x"))]);
        let err = validate_answer_map(&raw).unwrap_err();
        assert_eq!(err.code(), "malformed_answer_payload");
    }

    #[test]
    fn empty_map_is_valid() {
        let raw = serde_json::Map::new();
        assert!(validate_answer_map(&raw).unwrap().is_empty());
    }

    #[test]
    fn pending_results_expose_no_key_and_no_peers() {
        let response = PendingResultsResponse {
            results_released: false,
            duration_seconds: 610,
            answers: HashMap::from([(Uuid::new_v4(), "Paris".to_string())]),
        };
        let body = serde_json::to_value(&response).unwrap();
        let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(!keys.contains(&"correct_answer"));
        assert!(!keys.contains(&"leaderboard"));
        assert!(!keys.contains(&"score"));
        assert!(!keys.contains(&"rank"));
        assert!(body.to_string().find("correct_answer").is_none());
    }
}
