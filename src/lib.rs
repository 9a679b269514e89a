pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    attempt_service::AttemptService, grading_service::GradingService,
    leaderboard_service::LeaderboardService, registration_service::RegistrationService,
    tournament_service::TournamentService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tournament_service: TournamentService,
    pub registration_service: RegistrationService,
    pub attempt_service: AttemptService,
    pub grading_service: GradingService,
    pub leaderboard_service: LeaderboardService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let tournament_service = TournamentService::new(pool.clone());
        let registration_service = RegistrationService::new(pool.clone());
        let attempt_service = AttemptService::new(pool.clone());
        let grading_service = GradingService::new(pool.clone());
        let leaderboard_service = LeaderboardService::new(pool.clone());

        Self {
            pool,
            tournament_service,
            registration_service,
            attempt_service,
            grading_service,
            leaderboard_service,
        }
    }
}
