pub mod attempt_service;
pub mod grading_service;
pub mod leaderboard_service;
pub mod registration_service;
pub mod tournament_service;
