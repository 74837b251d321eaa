use anyhow::{Context, Result};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use meet_model::classes::{default_age_classes, default_weight_classes};

use crate::config::MeetConfig;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(config: &MeetConfig) -> Result<Self> {
        info!("Connecting to database: {}", config.db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .connect(&config.db_url())
            .await
            .with_context(|| format!("Failed to connect to database: {}", config.db_url()))?;

        info!("Running database migrations...");
        self::run_migrations(&pool).await?;
        self::seed_defaults(&pool).await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;

        info!("Database initialized");

        Ok(Self { pool })
    }

    pub async fn get_stats(&self) -> Result<DbStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM lifters) as lifter_count,
                (SELECT COUNT(*) FROM lifts) as lift_count,
                (SELECT COUNT(*) FROM lifts WHERE status = 'completed') as completed_count,
                (SELECT COUNT(*) FROM weight_classes) as weight_class_count,
                (SELECT COUNT(*) FROM age_classes) as age_class_count
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DbStats {
            lifters: row.try_get::<i64, _>("lifter_count").unwrap_or(0) as u64,
            lifts: row.try_get::<i64, _>("lift_count").unwrap_or(0) as u64,
            completed_lifts: row.try_get::<i64, _>("completed_count").unwrap_or(0) as u64,
            weight_classes: row.try_get::<i64, _>("weight_class_count").unwrap_or(0) as u64,
            age_classes: row.try_get::<i64, _>("age_class_count").unwrap_or(0) as u64,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub lifters: u64,
    pub lifts: u64,
    pub completed_lifts: u64,
    pub weight_classes: u64,
    pub age_classes: u64,
}

/// Current schema version - increment when adding migrations
const SCHEMA_VERSION: i64 = 2;

pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL DEFAULT (unixepoch()),
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    if current_version > SCHEMA_VERSION {
        anyhow::bail!(
            "Database schema version {} is newer than supported version {}. Please upgrade meetd.",
            current_version,
            SCHEMA_VERSION
        );
    }

    if current_version == SCHEMA_VERSION {
        info!(
            "Database schema is up to date (version {})",
            current_version
        );
        return Ok(());
    }

    info!(
        "Migrating database from version {} to {}",
        current_version, SCHEMA_VERSION
    );

    // Initial schema
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weight_classes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            min_weight REAL NOT NULL,
            max_weight REAL,
            gender TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS age_classes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            min_age INTEGER NOT NULL,
            max_age INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lifters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            gender TEXT NOT NULL,
            lifter_id_number TEXT NOT NULL UNIQUE,
            actual_weight REAL NOT NULL,
            birth_date TEXT NOT NULL,
            age INTEGER NOT NULL,
            opener_squat REAL,
            opener_bench REAL,
            opener_deadlift REAL,
            primary_weight_class_id INTEGER REFERENCES weight_classes(id) ON DELETE SET NULL,
            primary_age_class_id INTEGER REFERENCES age_classes(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lifter_additional_weight_classes (
            lifter_id INTEGER NOT NULL REFERENCES lifters(id) ON DELETE CASCADE,
            weight_class_id INTEGER NOT NULL REFERENCES weight_classes(id) ON DELETE CASCADE,
            PRIMARY KEY (lifter_id, weight_class_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lifter_additional_age_classes (
            lifter_id INTEGER NOT NULL REFERENCES lifters(id) ON DELETE CASCADE,
            age_class_id INTEGER NOT NULL REFERENCES age_classes(id) ON DELETE CASCADE,
            PRIMARY KEY (lifter_id, age_class_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lifts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lifter_id INTEGER NOT NULL REFERENCES lifters(id) ON DELETE CASCADE,
            lift_type TEXT NOT NULL,
            attempt_number INTEGER NOT NULL,
            weight_lifted REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            judge1_score INTEGER,
            judge2_score INTEGER,
            judge3_score INTEGER,
            overall_result INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_lifts_queue ON lifts(lift_type, attempt_number, status)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lifts_lifter ON lifts(lifter_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meet_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            current_lift_type TEXT NOT NULL DEFAULT 'squat',
            current_attempt_number INTEGER NOT NULL DEFAULT 1,
            current_active_lift_id INTEGER REFERENCES lifts(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // v2: display mode for the public surface
    if current_version < 2 {
        let has_display_mode: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('meet_state') WHERE name = 'display_mode'",
        )
        .fetch_one(pool)
        .await?;
        if !has_display_mode {
            sqlx::query(
                "ALTER TABLE meet_state ADD COLUMN display_mode TEXT NOT NULL DEFAULT 'attempt'",
            )
            .execute(pool)
            .await?;
        }
    }

    // Record the schema version
    if current_version < SCHEMA_VERSION {
        sqlx::query("INSERT OR REPLACE INTO schema_version (version, description) VALUES (?, ?)")
            .bind(SCHEMA_VERSION)
            .bind("Meet state display mode")
            .execute(pool)
            .await?;
        info!("Schema upgraded to version {}", SCHEMA_VERSION);
    }

    info!("Database migrations completed");
    Ok(())
}

/// Load the meet cursor and the standard classes into an empty database.
/// Tables that already hold rows are left untouched.
pub(crate) async fn seed_defaults(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO meet_state (id, current_lift_type, current_attempt_number) VALUES (1, 'squat', 1)",
    )
    .execute(pool)
    .await?;

    let weight_classes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weight_classes")
        .fetch_one(pool)
        .await?;
    if weight_classes == 0 {
        let defaults = default_weight_classes();
        for class in &defaults {
            sqlx::query(
                "INSERT INTO weight_classes (name, min_weight, max_weight, gender) VALUES (?, ?, ?, ?)",
            )
            .bind(&class.name)
            .bind(class.min_weight)
            .bind(class.max_weight)
            .bind(class.gender.as_str())
            .execute(pool)
            .await?;
        }
        info!("Seeded {} weight classes", defaults.len());
    }

    let age_classes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM age_classes")
        .fetch_one(pool)
        .await?;
    if age_classes == 0 {
        let defaults = default_age_classes();
        for class in &defaults {
            sqlx::query("INSERT INTO age_classes (name, min_age, max_age) VALUES (?, ?, ?)")
                .bind(&class.name)
                .bind(class.min_age as i64)
                .bind(class.max_age.map(|a| a as i64))
                .execute(pool)
                .await?;
        }
        info!("Seeded {} age classes", defaults.len());
    }

    Ok(())
}
