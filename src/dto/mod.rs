pub mod admin_dto;
pub mod tournament_dto;
