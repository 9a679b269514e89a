use std::collections::HashMap;

use chrono::Duration;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result, TimeWindowViolation};
use crate::models::question::TournamentQuestion;
use crate::models::tournament::Tournament;
use crate::services::attempt_service::AttemptService;
use crate::services::registration_service::RegistrationService;
use crate::utils::time;

/// Every tournament question is worth the same. The nominal `points`
/// column on a question is not consulted here; the original product rule
/// is a flat award and we keep it until that changes.
pub const POINTS_PER_QUESTION: i32 = 10;

/// Submissions arriving this long after `ends_at` are still accepted, so a
/// deadline auto-submit that was in flight at T+0 is not punished for
/// network latency.
pub const SUBMIT_GRACE_SECONDS: i64 = 30;

#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub your_answer: String,
    pub is_correct: bool,
    pub points_earned: i32,
}

#[derive(Debug, Clone)]
pub struct GradedSubmission {
    pub score: i32,
    pub correct_count: usize,
    pub answers: Vec<GradedAnswer>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub score: i32,
    pub duration_seconds: i32,
    pub total_questions: usize,
}

#[derive(Clone)]
pub struct GradingService {
    pool: PgPool,
}

impl GradingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grades and finalizes an attempt. Exactly one concurrent caller wins
    /// the conditional update; every other observes `AlreadySubmitted`.
    pub async fn submit(
        &self,
        tournament: &Tournament,
        user_id: Uuid,
        answers: HashMap<Uuid, String>,
    ) -> Result<SubmitOutcome> {
        let attempts = AttemptService::new(self.pool.clone());

        let attempt = attempts
            .find_attempt(tournament.id, user_id)
            .await?
            .ok_or(Error::NoActiveAttempt)?;
        if attempt.is_submitted() {
            return Err(Error::AlreadySubmitted);
        }

        // Server-clock deadline check with the fixed grace buffer.
        let now = time::now();
        if !within_submit_window(tournament.ends_at, now) {
            return Err(Error::InvalidTimeWindow(TimeWindowViolation::TournamentEnded));
        }

        // Defense in depth: the registration row should still exist.
        let registrations = RegistrationService::new(self.pool.clone());
        if !registrations.is_registered(tournament.id, user_id).await? {
            return Err(Error::NotRegistered);
        }

        // Answer key stays inside this scope; the response never carries it.
        let questions = sqlx::query_as::<_, TournamentQuestion>(
            r#"
            SELECT * FROM tournament_questions
            WHERE tournament_id = $1
            ORDER BY order_index ASC, id ASC
            "#,
        )
        .bind(tournament.id)
        .fetch_all(&self.pool)
        .await?;

        let graded = grade(&questions, &answers);

        // Duration is anchored to the tournament's official start, not the
        // user's own started_at, so a late starter cannot shorten it.
        let duration_seconds = duration_since_official_start(tournament.starts_at, now);

        // First writer wins: the conditional update applies only while
        // submitted_at is still NULL. Losing it means somebody else
        // finalized first.
        let won = attempts
            .finalize_if_unsubmitted(tournament.id, user_id, now, graded.score, duration_seconds)
            .await?;

        if !won {
            let current = attempts.find_attempt(tournament.id, user_id).await?;
            return match current {
                Some(a) if a.is_submitted() => Err(Error::AlreadySubmitted),
                _ => Err(Error::Internal(
                    "attempt disappeared during submit".to_string(),
                )),
            };
        }

        tracing::info!(
            tournament_id = %tournament.id,
            user_id = %user_id,
            score = graded.score,
            duration_seconds,
            "attempt submitted and graded"
        );

        // Best-effort snapshot of the submitted answers for the results
        // page. The graded attempt row is already the source of truth.
        let snapshot: HashMap<Uuid, String> = graded
            .answers
            .iter()
            .filter(|a| !a.your_answer.is_empty())
            .map(|a| (a.question_id, a.your_answer.clone()))
            .collect();
        if let Err(e) = attempts
            .snapshot_final_answers(tournament.id, user_id, &snapshot)
            .await
        {
            tracing::warn!(
                tournament_id = %tournament.id,
                user_id = %user_id,
                error = %e,
                "failed to snapshot final answers"
            );
        }

        // Best-effort aggregate credit, reconcilable later from attempts.
        if let Err(e) = self.credit_aggregate_points(user_id, graded.score).await {
            tracing::error!(
                tournament_id = %tournament.id,
                user_id = %user_id,
                score = graded.score,
                error = %e,
                "failed to credit aggregate points"
            );
        }

        Ok(SubmitOutcome {
            score: graded.score,
            duration_seconds,
            total_questions: questions.len(),
        })
    }

    async fn credit_aggregate_points(&self, user_id: Uuid, score: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_points (user_id, total_points)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET total_points = user_points.total_points + EXCLUDED.total_points
            "#,
        )
        .bind(user_id)
        .bind(score as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Seconds between the tournament's official start and the submit instant.
/// The attempt's own `started_at` plays no part here.
pub fn duration_since_official_start(
    starts_at: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> i32 {
    (now - starts_at).num_seconds().max(0) as i32
}

/// A submit is accepted until `ends_at` plus the grace buffer.
pub fn within_submit_window(
    ends_at: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> bool {
    now <= ends_at + Duration::seconds(SUBMIT_GRACE_SECONDS)
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Pure scoring: case-insensitive trimmed equality against the key, a flat
/// award per correct answer, and an empty answer never matching. Absent
/// questions grade as blank rather than erroring.
pub fn grade(
    questions: &[TournamentQuestion],
    answers: &HashMap<Uuid, String>,
) -> GradedSubmission {
    let mut correct_count = 0;
    let mut graded = Vec::with_capacity(questions.len());

    for question in questions {
        let supplied = answers
            .get(&question.id)
            .map(|a| a.trim().to_string())
            .unwrap_or_default();
        let normalized = normalize(&supplied);
        let is_correct = !normalized.is_empty() && normalized == normalize(&question.correct_answer);
        if is_correct {
            correct_count += 1;
        }
        graded.push(GradedAnswer {
            question_id: question.id,
            your_answer: supplied,
            is_correct,
            points_earned: if is_correct { POINTS_PER_QUESTION } else { 0 },
        });
    }

    GradedSubmission {
        score: correct_count as i32 * POINTS_PER_QUESTION,
        correct_count,
        answers: graded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &str) -> TournamentQuestion {
        TournamentQuestion {
            id: Uuid::new_v4(),
            tournament_id: Uuid::new_v4(),
            question_text: "q".to_string(),
            question_type: "text_input".to_string(),
            options: None,
            correct_answer: correct.to_string(),
            points: 5, // nominal value, deliberately not what grading awards
            order_index: 0,
        }
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let q = question("Paris");
        let questions = vec![q.clone()];
        for ans in ["Paris", " paris ", "PARIS", "\tpArIs\n"] {
            let answers = HashMap::from([(q.id, ans.to_string())]);
            let graded = grade(&questions, &answers);
            assert_eq!(graded.score, POINTS_PER_QUESTION, "answer {:?}", ans);
            assert!(graded.answers[0].is_correct);
        }
    }

    #[test]
    fn wrong_answer_scores_zero() {
        let q = question("Paris");
        let answers = HashMap::from([(q.id, "London".to_string())]);
        let graded = grade(&[q], &answers);
        assert_eq!(graded.score, 0);
        assert_eq!(graded.correct_count, 0);
    }

    #[test]
    fn empty_answer_never_matches_even_empty_key() {
        let q = question("   ");
        let answers = HashMap::from([(q.id, "".to_string())]);
        let graded = grade(&[q], &answers);
        assert_eq!(graded.score, 0);
        assert!(!graded.answers[0].is_correct);
    }

    #[test]
    fn unanswered_question_scores_zero_without_error() {
        let answered = question("blue");
        let skipped = question("red");
        let answers = HashMap::from([(answered.id, "Blue".to_string())]);
        let graded = grade(&[answered, skipped], &answers);
        assert_eq!(graded.score, POINTS_PER_QUESTION);
        assert_eq!(graded.answers.len(), 2);
        assert_eq!(graded.answers[1].your_answer, "");
        assert!(!graded.answers[1].is_correct);
    }

    #[test]
    fn flat_award_ignores_nominal_points_column() {
        // The fixture carries points = 5 but grading still pays 10.
        let q = question("42");
        let answers = HashMap::from([(q.id, "42".to_string())]);
        let graded = grade(&[q], &answers);
        assert_eq!(graded.score, 10);
    }

    #[test]
    fn three_of_four_correct_scores_thirty() {
        let questions: Vec<_> = ["a", "b", "c", "d"].iter().map(|s| question(s)).collect();
        let answers = HashMap::from([
            (questions[0].id, "a".to_string()),
            (questions[1].id, "B".to_string()),
            (questions[2].id, " c ".to_string()),
            (questions[3].id, "wrong".to_string()),
        ]);
        let graded = grade(&questions, &answers);
        assert_eq!(graded.correct_count, 3);
        assert_eq!(graded.score, 30);
    }

    #[test]
    fn duration_is_anchored_to_official_start() {
        use chrono::{Duration, TimeZone, Utc};
        let starts_at = Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap();
        // Submitting at T+610s yields 610 regardless of when the user's
        // own attempt began.
        let submit_instant = starts_at + Duration::seconds(610);
        assert_eq!(duration_since_official_start(starts_at, submit_instant), 610);
        // A late starter who began at T+300s and submits at the same
        // instant gets the same 610, not 310.
        assert_eq!(duration_since_official_start(starts_at, submit_instant), 610);
    }

    #[test]
    fn submit_window_honors_grace_buffer() {
        use chrono::{TimeZone, Utc};
        let ends_at = Utc.with_ymd_and_hms(2025, 6, 7, 12, 20, 0).unwrap();
        // 20 s past the end: inside the 30 s grace buffer.
        assert!(within_submit_window(ends_at, ends_at + Duration::seconds(20)));
        // Exactly at the buffer edge still counts.
        assert!(within_submit_window(ends_at, ends_at + Duration::seconds(30)));
        // 35 s past the end: rejected.
        assert!(!within_submit_window(ends_at, ends_at + Duration::seconds(35)));
    }

    #[test]
    fn grading_is_deterministic() {
        let questions: Vec<_> = ["x", "y"].iter().map(|s| question(s)).collect();
        let answers = HashMap::from([
            (questions[0].id, "x".to_string()),
            (questions[1].id, "nope".to_string()),
        ]);
        let first = grade(&questions, &answers);
        let second = grade(&questions, &answers);
        assert_eq!(first.score, second.score);
        assert_eq!(first.correct_count, second.correct_count);
        for (a, b) in first.answers.iter().zip(second.answers.iter()) {
            assert_eq!(a.is_correct, b.is_correct);
            assert_eq!(a.points_earned, b.points_earned);
        }
    }
}
