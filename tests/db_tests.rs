//! Database-backed lifecycle tests. These need a live Postgres and are
//! gated on TEST_DATABASE_URL: when it is unset each test returns early,
//! so the default suite stays runnable without infrastructure.

use std::collections::HashMap;
use std::env;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use trivia_backend::error::Error;
use trivia_backend::models::tournament::Tournament;
use trivia_backend::services::attempt_service::AttemptService;
use trivia_backend::services::grading_service::{GradingService, POINTS_PER_QUESTION};

async fn setup_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let url = env::var("TEST_DATABASE_URL").ok()?;
    env::set_var("DATABASE_URL", &url);
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("RATE_LIMIT_MAX_REQUESTS", "100");
    env::set_var("RATE_LIMIT_WINDOW_SECS", "60");
    env::set_var("LEADERBOARD_TOP_N", "10");
    // Several tests share the process; only the first init wins.
    let _ = trivia_backend::config::init_config();

    let pool = trivia_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Some(pool)
}

/// Tournament whose registration window has closed and whose play window
/// straddles now, so attempts can start and submit immediately.
async fn seed_active_tournament(pool: &PgPool) -> Tournament {
    let now = Utc::now();
    sqlx::query_as::<_, Tournament>(
        r#"
        INSERT INTO tournaments
            (id, title, prize_amount, registration_opens_at, registration_closes_at,
             starts_at, ends_at, results_released)
        VALUES ($1, $2, NULL, $3, $4, $5, $6, FALSE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("lifecycle fixture")
    .bind(now - Duration::hours(2))
    .bind(now - Duration::hours(1))
    .bind(now - Duration::minutes(30))
    .bind(now + Duration::minutes(30))
    .fetch_one(pool)
    .await
    .expect("seed tournament")
}

async fn seed_registration(pool: &PgPool, tournament_id: Uuid, user_id: Uuid) {
    sqlx::query(
        r#"
        INSERT INTO tournament_registrations (tournament_id, user_id)
        VALUES ($1, $2)
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .execute(pool)
    .await
    .expect("seed registration");
}

async fn seed_question(pool: &PgPool, tournament_id: Uuid, correct: &str, order: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO tournament_questions
            (id, tournament_id, question_text, question_type, correct_answer, order_index)
        VALUES ($1, $2, $3, 'text_input', $4, $5)
        "#,
    )
    .bind(id)
    .bind(tournament_id)
    .bind(format!("question {}", order))
    .bind(correct)
    .bind(order)
    .execute(pool)
    .await
    .expect("seed question");
    id
}

#[tokio::test]
async fn start_is_idempotent_per_user() {
    let Some(pool) = setup_pool().await else {
        return;
    };
    let tournament = seed_active_tournament(&pool).await;
    let user_id = Uuid::new_v4();
    seed_registration(&pool, tournament.id, user_id).await;

    let attempts = AttemptService::new(pool.clone());

    // A page refresh replays start; the original row must come back
    // unchanged.
    let first = attempts.start(&tournament, user_id).await.expect("first start");
    let replay = attempts.start(&tournament, user_id).await.expect("replayed start");
    assert_eq!(replay.id, first.id);
    assert_eq!(replay.started_at, first.started_at);

    // Double-click: two starts in flight at once still converge on the
    // one row.
    let (a, b) = tokio::join!(
        attempts.start(&tournament, user_id),
        attempts.start(&tournament, user_id),
    );
    let a = a.expect("racing start a");
    let b = b.expect("racing start b");
    assert_eq!(a.id, first.id);
    assert_eq!(b.id, first.id);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tournament_attempts WHERE tournament_id = $1 AND user_id = $2",
    )
    .bind(tournament.id)
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .expect("count attempts");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn finalize_admits_exactly_one_writer() {
    let Some(pool) = setup_pool().await else {
        return;
    };
    let tournament = seed_active_tournament(&pool).await;
    let user_id = Uuid::new_v4();
    seed_registration(&pool, tournament.id, user_id).await;

    let attempts = AttemptService::new(pool.clone());
    attempts.start(&tournament, user_id).await.expect("start");

    let now = Utc::now();
    let won = attempts
        .finalize_if_unsubmitted(tournament.id, user_id, now, 20, 600)
        .await
        .expect("first finalize");
    assert!(won);

    // The second writer finds submitted_at already set and loses.
    let won_again = attempts
        .finalize_if_unsubmitted(tournament.id, user_id, Utc::now(), 99, 1)
        .await
        .expect("second finalize");
    assert!(!won_again);

    let row = attempts
        .find_attempt(tournament.id, user_id)
        .await
        .expect("re-read")
        .expect("attempt exists");
    assert_eq!(row.total_score, 20);
    assert_eq!(row.duration_seconds, Some(600));
    // timestamptz holds microseconds; compare within that precision.
    let stored = row.submitted_at.expect("submitted_at set");
    assert!((stored - now).num_milliseconds().abs() < 1);
}

#[tokio::test]
async fn concurrent_submits_persist_one_score() {
    let Some(pool) = setup_pool().await else {
        return;
    };
    let tournament = seed_active_tournament(&pool).await;
    let user_id = Uuid::new_v4();
    seed_registration(&pool, tournament.id, user_id).await;

    let q1 = seed_question(&pool, tournament.id, "paris", 0).await;
    let q2 = seed_question(&pool, tournament.id, "blue", 1).await;

    let attempts = AttemptService::new(pool.clone());
    attempts.start(&tournament, user_id).await.expect("start");

    // Two divergent payloads race: all-correct against all-wrong. The
    // persisted score must belong to whichever caller won, never a blend.
    let all_correct = HashMap::from([
        (q1, "Paris".to_string()),
        (q2, "blue".to_string()),
    ]);
    let all_wrong = HashMap::from([
        (q1, "london".to_string()),
        (q2, "red".to_string()),
    ]);

    let grading = GradingService::new(pool.clone());
    let (left, right) = tokio::join!(
        grading.submit(&tournament, user_id, all_correct),
        grading.submit(&tournament, user_id, all_wrong),
    );

    let (outcome, loser) = match (left, right) {
        (Ok(o), Err(e)) => (o, e),
        (Err(e), Ok(o)) => (o, e),
        (Ok(_), Ok(_)) => panic!("both submits were accepted"),
        (Err(a), Err(b)) => panic!("both submits failed: {} / {}", a, b),
    };
    assert!(matches!(loser, Error::AlreadySubmitted));
    assert!(outcome.score == 0 || outcome.score == 2 * POINTS_PER_QUESTION);

    let row = attempts
        .find_attempt(tournament.id, user_id)
        .await
        .expect("re-read")
        .expect("attempt exists");
    assert!(row.submitted_at.is_some());
    assert_eq!(row.total_score, outcome.score);
    assert_eq!(row.duration_seconds, Some(outcome.duration_seconds));

    // The winner's score stuck; a later replay of either payload is
    // rejected without touching the row.
    let replay = grading
        .submit(&tournament, user_id, HashMap::new())
        .await
        .expect_err("replayed submit");
    assert!(matches!(replay, Error::AlreadySubmitted));
    let after = attempts
        .find_attempt(tournament.id, user_id)
        .await
        .expect("re-read")
        .expect("attempt exists");
    assert_eq!(after.total_score, row.total_score);
    assert_eq!(after.submitted_at, row.submitted_at);
}
