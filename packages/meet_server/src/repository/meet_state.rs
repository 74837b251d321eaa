use anyhow::{Context, Result};
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;

use meet_model::{Lift, MeetState};

use super::MeetRepository;
use super::lifts::write_lift;

impl MeetRepository {
    pub async fn get_meet_state(&self) -> Result<Option<MeetState>> {
        let row = sqlx::query(
            r#"
            SELECT current_lift_type, current_attempt_number, current_active_lift_id, display_mode
            FROM meet_state
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };
        Ok(Some(MeetState {
            current_lift_type: r.get::<String, _>("current_lift_type").parse()?,
            current_attempt_number: r.get::<i64, _>("current_attempt_number") as u8,
            current_active_lift_id: r.get("current_active_lift_id"),
            display_mode: r.get::<String, _>("display_mode").parse()?,
        }))
    }

    /// Write the meet state together with the lifts that changed alongside
    /// it. Either all of it lands or none of it does.
    pub async fn save_platform(&self, lifts: &[&Lift], state: &MeetState) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for lift in lifts {
            write_lift(&mut tx, lift).await?;
        }
        write_meet_state(&mut tx, state).await?;
        tx.commit().await.context("Failed to commit platform change")?;
        Ok(())
    }
}

async fn write_meet_state(conn: &mut SqliteConnection, state: &MeetState) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO meet_state (id, current_lift_type, current_attempt_number, current_active_lift_id, display_mode)
        VALUES (1, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            current_lift_type = excluded.current_lift_type,
            current_attempt_number = excluded.current_attempt_number,
            current_active_lift_id = excluded.current_active_lift_id,
            display_mode = excluded.display_mode
        "#,
    )
    .bind(state.current_lift_type.as_str())
    .bind(state.current_attempt_number as i64)
    .bind(state.current_active_lift_id)
    .bind(state.display_mode.as_str())
    .execute(&mut *conn)
    .await
    .context("Failed to save meet state")?;
    Ok(())
}
