use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tournament {
    pub id: Uuid,
    pub title: String,
    pub prize_amount: Option<i64>,
    pub registration_opens_at: DateTime<Utc>,
    pub registration_closes_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub results_released: bool,
    pub created_at: DateTime<Utc>,
}

/// Mutually exclusive tournament states as judged by the server clock.
///
/// The client may evaluate the same windows for countdown UI, but its
/// judgment is advisory: every state-changing handler re-runs this with
/// `utils::time::now()` before touching a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentPhase {
    NotStarted,
    RegistrationOpen,
    RegistrationClosed,
    Active,
    Ended,
    AlreadySubmitted,
}

impl Tournament {
    /// Maps an instant to the tournament phase. `has_submitted` overrides
    /// every time check: a finished user is past all windows.
    pub fn phase_at(&self, now: DateTime<Utc>, has_submitted: bool) -> TournamentPhase {
        if has_submitted {
            return TournamentPhase::AlreadySubmitted;
        }
        if now < self.starts_at {
            if now < self.registration_opens_at {
                return TournamentPhase::NotStarted;
            }
            if now < self.registration_closes_at {
                return TournamentPhase::RegistrationOpen;
            }
            return TournamentPhase::RegistrationClosed;
        }
        if now < self.ends_at {
            return TournamentPhase::Active;
        }
        TournamentPhase::Ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixture() -> Tournament {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap();
        Tournament {
            id: Uuid::new_v4(),
            title: "Weekend Cup".to_string(),
            prize_amount: Some(500),
            registration_opens_at: t0 - Duration::hours(24),
            registration_closes_at: t0 - Duration::hours(1),
            starts_at: t0,
            ends_at: t0 + Duration::minutes(20),
            results_released: false,
            created_at: t0 - Duration::days(7),
        }
    }

    #[test]
    fn submitted_overrides_all_time_checks() {
        let t = fixture();
        // Even before registration opens, a submitted user sees AlreadySubmitted.
        let before_everything = t.registration_opens_at - Duration::hours(1);
        assert_eq!(
            t.phase_at(before_everything, true),
            TournamentPhase::AlreadySubmitted
        );
        assert_eq!(
            t.phase_at(t.ends_at + Duration::hours(1), true),
            TournamentPhase::AlreadySubmitted
        );
    }

    #[test]
    fn phase_before_registration_opens() {
        let t = fixture();
        let now = t.registration_opens_at - Duration::seconds(1);
        assert_eq!(t.phase_at(now, false), TournamentPhase::NotStarted);
    }

    #[test]
    fn registration_window_is_half_open() {
        let t = fixture();
        assert_eq!(
            t.phase_at(t.registration_opens_at, false),
            TournamentPhase::RegistrationOpen
        );
        assert_eq!(
            t.phase_at(t.registration_closes_at - Duration::seconds(1), false),
            TournamentPhase::RegistrationOpen
        );
        // Exactly at close the window is shut.
        assert_eq!(
            t.phase_at(t.registration_closes_at, false),
            TournamentPhase::RegistrationClosed
        );
    }

    #[test]
    fn active_window_is_half_open() {
        let t = fixture();
        assert_eq!(
            t.phase_at(t.starts_at - Duration::seconds(1), false),
            TournamentPhase::RegistrationClosed
        );
        assert_eq!(t.phase_at(t.starts_at, false), TournamentPhase::Active);
        assert_eq!(
            t.phase_at(t.ends_at - Duration::seconds(1), false),
            TournamentPhase::Active
        );
        assert_eq!(t.phase_at(t.ends_at, false), TournamentPhase::Ended);
    }

    #[test]
    fn long_past_end_is_ended() {
        let t = fixture();
        assert_eq!(
            t.phase_at(t.ends_at + Duration::days(30), false),
            TournamentPhase::Ended
        );
    }
}
