use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::admin_dto::{
    CreateQuestionRequest, CreateQuestionResponse, CreateTournamentRequest,
    CreateTournamentResponse, ReleaseResultsResponse,
};
use crate::error::Result;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_tournament(
    State(state): State<AppState>,
    Json(req): Json<CreateTournamentRequest>,
) -> Result<Response> {
    req.validate()?;
    let tournament = state.tournament_service.create_tournament(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateTournamentResponse {
            id: tournament.id,
            title: tournament.title,
        }),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Path(tournament_id): Path<Uuid>,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<Response> {
    req.validate()?;
    let question = state
        .tournament_service
        .add_question(tournament_id, req)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateQuestionResponse {
            id: question.id,
            tournament_id: question.tournament_id,
            order_index: question.order_index,
        }),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn release_results(
    State(state): State<AppState>,
    Path(tournament_id): Path<Uuid>,
) -> Result<Response> {
    let tournament = state
        .tournament_service
        .release_results(tournament_id)
        .await?;
    Ok(Json(ReleaseResultsResponse {
        tournament_id: tournament.id,
        results_released: tournament.results_released,
    })
    .into_response())
}
