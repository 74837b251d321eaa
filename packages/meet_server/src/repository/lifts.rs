use anyhow::{Context, Result};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};

use meet_model::{Decisions, Lift, LiftType};

use super::MeetRepository;

const LIFT_SELECT: &str = r#"
    SELECT t.id, t.lifter_id, l.name AS lifter_name, l.lifter_id_number, l.gender,
           wc.name AS weight_class_name,
           t.lift_type, t.attempt_number, t.weight_lifted, t.status,
           t.judge1_score, t.judge2_score, t.judge3_score, t.overall_result
    FROM lifts t
    JOIN lifters l ON l.id = t.lifter_id
    LEFT JOIN weight_classes wc ON wc.id = l.primary_weight_class_id
"#;

fn lift_from_row(r: &SqliteRow) -> Result<Lift> {
    Ok(Lift {
        id: r.get("id"),
        lifter_id: r.get("lifter_id"),
        lifter_name: r.get("lifter_name"),
        lifter_id_number: r.get("lifter_id_number"),
        gender: r.get("gender"),
        weight_class_name: r.get("weight_class_name"),
        lift_type: r.get::<String, _>("lift_type").parse()?,
        attempt_number: r.get::<i64, _>("attempt_number") as u8,
        weight_lifted: r.get("weight_lifted"),
        status: r.get::<String, _>("status").parse()?,
        decisions: Decisions {
            judge1_score: r.get("judge1_score"),
            judge2_score: r.get("judge2_score"),
            judge3_score: r.get("judge3_score"),
        },
        overall_result: r.get("overall_result"),
    })
}

impl MeetRepository {
    pub async fn list_lifts(&self) -> Result<Vec<Lift>> {
        let rows = sqlx::query(&format!("{LIFT_SELECT} ORDER BY t.id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(lift_from_row).collect()
    }

    /// Every lift of one round, whatever its status.
    pub async fn list_round(&self, lift_type: LiftType, attempt_number: u8) -> Result<Vec<Lift>> {
        let rows = sqlx::query(&format!(
            "{LIFT_SELECT} WHERE t.lift_type = ? AND t.attempt_number = ? ORDER BY t.weight_lifted, t.lifter_id"
        ))
        .bind(lift_type.as_str())
        .bind(attempt_number as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(lift_from_row).collect()
    }

    pub async fn get_lift(&self, id: i64) -> Result<Option<Lift>> {
        let row = sqlx::query(&format!("{LIFT_SELECT} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lift_from_row).transpose()
    }

    /// Persist the mutable part of a lift: status, decisions and result.
    pub async fn save_lift(&self, lift: &Lift) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_lift(&mut conn, lift).await
    }
}

pub(super) async fn write_lift(conn: &mut SqliteConnection, lift: &Lift) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE lifts
        SET status = ?, judge1_score = ?, judge2_score = ?, judge3_score = ?, overall_result = ?
        WHERE id = ?
        "#,
    )
    .bind(lift.status.as_str())
    .bind(lift.decisions.judge1_score)
    .bind(lift.decisions.judge2_score)
    .bind(lift.decisions.judge3_score)
    .bind(lift.overall_result)
    .bind(lift.id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to save lift {}", lift.id))?;
    Ok(())
}
