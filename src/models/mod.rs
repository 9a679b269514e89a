pub mod attempt;
pub mod question;
pub mod registration;
pub mod staged_answers;
pub mod tournament;
