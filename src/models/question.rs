use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TextInput,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TextInput => "text_input",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple_choice" => Some(QuestionType::MultipleChoice),
            "text_input" => Some(QuestionType::TextInput),
            _ => None,
        }
    }
}

/// Full question row including the answer key. Never serialized to a
/// player-facing response; handlers go through `PublicQuestion` instead.
#[derive(Debug, Clone, FromRow)]
pub struct TournamentQuestion {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub options: Option<JsonValue>,
    pub correct_answer: String,
    pub points: i32,
    pub order_index: i32,
}
