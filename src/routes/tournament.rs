use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::dto::tournament_dto::{
    validate_answer_map, AnswerBreakdown, AttemptSummary, PendingResultsResponse, PublicQuestion,
    QuestionsResponse, RegisterResponse, ReleasedResultsResponse, SaveAnswersRequest,
    SaveAnswersResponse, StartAttemptResponse, SubmitRequest, SubmitResponse, TournamentSummary,
    TournamentStateResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::question::TournamentQuestion;
use crate::models::tournament::TournamentPhase;
use crate::services::grading_service;
use crate::utils::time;
use crate::AppState;

fn to_public(question: &TournamentQuestion) -> PublicQuestion {
    PublicQuestion {
        id: question.id,
        question_text: question.question_text.clone(),
        question_type: question.question_type.clone(),
        options: question.options.clone(),
        points: question.points,
        order_index: question.order_index,
    }
}

#[axum::debug_handler]
pub async fn list_tournaments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let tournaments = state.tournament_service.list_tournaments().await?;
    let now = time::now();

    let mut summaries = Vec::with_capacity(tournaments.len());
    for tournament in tournaments {
        let is_registered = state
            .registration_service
            .is_registered(tournament.id, user_id)
            .await?;
        let has_submitted = state
            .attempt_service
            .find_attempt(tournament.id, user_id)
            .await?
            .is_some_and(|a| a.is_submitted());
        summaries.push(TournamentSummary {
            id: tournament.id,
            title: tournament.title.clone(),
            prize_amount: tournament.prize_amount,
            state: tournament.phase_at(now, has_submitted),
            is_registered,
            starts_at: tournament.starts_at,
            ends_at: tournament.ends_at,
        });
    }

    Ok(Json(summaries).into_response())
}

#[axum::debug_handler]
pub async fn get_state(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let tournament = state.tournament_service.get_tournament(tournament_id).await?;
    let is_registered = state
        .registration_service
        .is_registered(tournament_id, user_id)
        .await?;
    let has_submitted = state
        .attempt_service
        .find_attempt(tournament_id, user_id)
        .await?
        .is_some_and(|a| a.is_submitted());

    let now = time::now();
    let response = TournamentStateResponse {
        state: tournament.phase_at(now, has_submitted),
        is_registered,
        has_submitted,
        server_time: now,
        registration_opens_at: tournament.registration_opens_at,
        registration_closes_at: tournament.registration_closes_at,
        starts_at: tournament.starts_at,
        ends_at: tournament.ends_at,
    };
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let tournament = state.tournament_service.get_tournament(tournament_id).await?;
    let registration = state
        .registration_service
        .register(&tournament, user_id)
        .await?;
    Ok(Json(RegisterResponse {
        tournament_id: registration.tournament_id,
        registered_at: registration.registered_at,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn get_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let tournament = state.tournament_service.get_tournament(tournament_id).await?;

    if !state
        .registration_service
        .is_registered(tournament_id, user_id)
        .await?
    {
        return Err(Error::NotRegistered);
    }

    let existing = state
        .attempt_service
        .find_attempt(tournament_id, user_id)
        .await?;
    if existing.as_ref().is_some_and(|a| a.is_submitted()) {
        return Err(Error::AlreadySubmitted);
    }

    if tournament.phase_at(time::now(), false) != TournamentPhase::Active {
        return Err(Error::InvalidTimeWindow(
            crate::error::TimeWindowViolation::NotActive,
        ));
    }

    let (attempt, staged_answers) = match existing {
        Some(_) => {
            let (attempt, staged) = state
                .attempt_service
                .resume(tournament_id, user_id)
                .await?;
            (
                Some(AttemptSummary {
                    id: attempt.id,
                    started_at: attempt.started_at,
                    submitted_at: attempt.submitted_at,
                }),
                staged,
            )
        }
        None => (None, Default::default()),
    };

    let questions = state
        .tournament_service
        .list_questions(tournament_id)
        .await?
        .iter()
        .map(to_public)
        .collect();

    Ok(Json(QuestionsResponse {
        tournament_id,
        questions,
        staged_answers,
        attempt,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let tournament = state.tournament_service.get_tournament(tournament_id).await?;
    let attempt = state.attempt_service.start(&tournament, user_id).await?;

    Ok(Json(StartAttemptResponse {
        attempt_id: attempt.id,
        tournament_id,
        started_at: attempt.started_at,
        ends_at: tournament.ends_at,
        server_time: time::now(),
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn save_answers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<Uuid>,
    Json(req): Json<SaveAnswersRequest>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    // Typed validation happens before any row is touched.
    let answers = validate_answer_map(&req.answers)?;

    let tournament = state.tournament_service.get_tournament(tournament_id).await?;
    let (saved, updated_at) = state
        .attempt_service
        .save_answers(&tournament, user_id, answers)
        .await?;

    Ok(Json(SaveAnswersResponse { saved, updated_at }).into_response())
}

#[axum::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let answers = validate_answer_map(&req.answers)?;

    let tournament = state.tournament_service.get_tournament(tournament_id).await?;
    let outcome = state
        .grading_service
        .submit(&tournament, user_id, answers)
        .await?;

    Ok(Json(SubmitResponse {
        score: outcome.score,
        duration_seconds: outcome.duration_seconds,
        total_questions: outcome.total_questions,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn get_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let tournament = state.tournament_service.get_tournament(tournament_id).await?;

    let attempt = state
        .attempt_service
        .find_attempt(tournament_id, user_id)
        .await?
        .filter(|a| a.is_submitted())
        .ok_or(Error::NoActiveAttempt)?;

    let own_answers = state
        .attempt_service
        .staged_answers(tournament_id, user_id)
        .await?;

    // Until the admin releases results, a caller sees only their own
    // answers and duration. No score, no rank, no answer key, no peers.
    if !tournament.results_released {
        return Ok(Json(PendingResultsResponse {
            results_released: false,
            duration_seconds: attempt.duration_seconds.unwrap_or(0),
            answers: own_answers,
        })
        .into_response());
    }

    let questions = state
        .tournament_service
        .list_questions(tournament_id)
        .await?;
    let graded = grading_service::grade(&questions, &own_answers);

    let breakdown = questions
        .iter()
        .zip(graded.answers.iter())
        .map(|(question, answer)| AnswerBreakdown {
            question_id: question.id,
            question_text: question.question_text.clone(),
            your_answer: answer.your_answer.clone(),
            correct_answer: question.correct_answer.clone(),
            is_correct: answer.is_correct,
            points_earned: answer.points_earned,
        })
        .collect();

    let rank = state.leaderboard_service.user_rank(&attempt).await?;
    let top_n = crate::config::get_config().leaderboard_top_n;
    let leaderboard = state
        .leaderboard_service
        .top_n(tournament_id, top_n)
        .await?;

    Ok(Json(ReleasedResultsResponse {
        results_released: true,
        score: attempt.total_score,
        duration_seconds: attempt.duration_seconds.unwrap_or(0),
        rank,
        breakdown,
        leaderboard,
    })
    .into_response())
}
