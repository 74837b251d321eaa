use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;

use meet_model::{Gender, NewLifter};

/// Create a fresh MeetRepository backed by an in-memory SQLite database,
/// migrated and seeded with the default classes.
pub async fn test_repository() -> super::MeetRepository {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    crate::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    crate::db::seed_defaults(&pool)
        .await
        .expect("Failed to seed defaults");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .expect("Failed to enable foreign keys");

    super::MeetRepository::new(pool)
}

pub fn new_lifter(name: &str, id_number: &str, gender: Gender, weight: f64) -> NewLifter {
    NewLifter {
        name: name.to_string(),
        gender,
        lifter_id_number: id_number.to_string(),
        actual_weight: weight,
        birth_date: NaiveDate::from_ymd_opt(1995, 6, 1).expect("valid date"),
        opener_squat: Some(150.0),
        opener_bench: Some(100.0),
        opener_deadlift: None,
    }
}
