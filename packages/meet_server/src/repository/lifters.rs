use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};

use meet_model::classes::{primary_age_class, primary_weight_class};
use meet_model::{Gender, Lifter, NewLift, NewLifter};

use super::MeetRepository;
use super::classes::{fetch_age_classes, fetch_weight_classes};

const LIFTER_SELECT: &str = r#"
    SELECT l.id, l.name, l.gender, l.lifter_id_number, l.actual_weight, l.birth_date, l.age,
           l.opener_squat, l.opener_bench, l.opener_deadlift,
           l.primary_weight_class_id, wc.name AS primary_weight_class_name,
           l.primary_age_class_id, ac.name AS primary_age_class_name
    FROM lifters l
    LEFT JOIN weight_classes wc ON wc.id = l.primary_weight_class_id
    LEFT JOIN age_classes ac ON ac.id = l.primary_age_class_id
"#;

/// lifter id → (class id, class name), ordered by class id.
type ExtraClasses = HashMap<i64, Vec<(i64, String)>>;

fn lifter_from_row(r: &SqliteRow) -> Result<Lifter> {
    Ok(Lifter {
        id: r.get("id"),
        name: r.get("name"),
        gender: r.get::<String, _>("gender").parse()?,
        lifter_id_number: r.get("lifter_id_number"),
        actual_weight: r.get("actual_weight"),
        birth_date: r.get("birth_date"),
        age: r.get::<i64, _>("age") as u32,
        opener_squat: r.get("opener_squat"),
        opener_bench: r.get("opener_bench"),
        opener_deadlift: r.get("opener_deadlift"),
        primary_weight_class_id: r.get("primary_weight_class_id"),
        primary_weight_class_name: r.get("primary_weight_class_name"),
        primary_age_class_id: r.get("primary_age_class_id"),
        primary_age_class_name: r.get("primary_age_class_name"),
        additional_weight_class_ids: Vec::new(),
        additional_weight_class_names: Vec::new(),
        additional_age_class_ids: Vec::new(),
        additional_age_class_names: Vec::new(),
    })
}

fn attach_extras(lifter: &mut Lifter, weight: &ExtraClasses, age: &ExtraClasses) {
    if let Some(classes) = weight.get(&lifter.id) {
        lifter.additional_weight_class_ids = classes.iter().map(|(id, _)| *id).collect();
        lifter.additional_weight_class_names = classes.iter().map(|(_, n)| n.clone()).collect();
    }
    if let Some(classes) = age.get(&lifter.id) {
        lifter.additional_age_class_ids = classes.iter().map(|(id, _)| *id).collect();
        lifter.additional_age_class_names = classes.iter().map(|(_, n)| n.clone()).collect();
    }
}

impl MeetRepository {
    pub async fn list_lifters(&self) -> Result<Vec<Lifter>> {
        let rows = sqlx::query(&format!("{LIFTER_SELECT} ORDER BY l.id"))
            .fetch_all(&self.pool)
            .await?;
        let (weight, age) = self.additional_classes(None).await?;

        rows.iter()
            .map(|r| {
                let mut lifter = lifter_from_row(r)?;
                attach_extras(&mut lifter, &weight, &age);
                Ok(lifter)
            })
            .collect()
    }

    pub async fn get_lifter(&self, id: i64) -> Result<Option<Lifter>> {
        let row = sqlx::query(&format!("{LIFTER_SELECT} WHERE l.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let (weight, age) = self.additional_classes(Some(id)).await?;
        let mut lifter = lifter_from_row(&row)?;
        attach_extras(&mut lifter, &weight, &age);
        Ok(Some(lifter))
    }

    async fn additional_classes(&self, lifter_id: Option<i64>) -> Result<(ExtraClasses, ExtraClasses)> {
        let weight_rows = sqlx::query(
            r#"
            SELECT x.lifter_id, wc.id AS class_id, wc.name AS class_name
            FROM lifter_additional_weight_classes x
            JOIN weight_classes wc ON wc.id = x.weight_class_id
            WHERE (? IS NULL OR x.lifter_id = ?)
            ORDER BY x.lifter_id, wc.id
            "#,
        )
        .bind(lifter_id)
        .bind(lifter_id)
        .fetch_all(&self.pool)
        .await?;

        let age_rows = sqlx::query(
            r#"
            SELECT x.lifter_id, ac.id AS class_id, ac.name AS class_name
            FROM lifter_additional_age_classes x
            JOIN age_classes ac ON ac.id = x.age_class_id
            WHERE (? IS NULL OR x.lifter_id = ?)
            ORDER BY x.lifter_id, ac.id
            "#,
        )
        .bind(lifter_id)
        .bind(lifter_id)
        .fetch_all(&self.pool)
        .await?;

        let group = |rows: Vec<SqliteRow>| {
            let mut map = ExtraClasses::new();
            for r in rows {
                map.entry(r.get("lifter_id"))
                    .or_default()
                    .push((r.get("class_id"), r.get("class_name")));
            }
            map
        };
        Ok((group(weight_rows), group(age_rows)))
    }

    pub async fn lifter_id_number_exists(&self, id_number: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lifters WHERE lifter_id_number = ?")
            .bind(id_number)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Insert a lifter and their planned attempts in one transaction.
    pub async fn create_lifter(
        &self,
        lifter: &NewLifter,
        age: u32,
        primary_weight_class_id: Option<i64>,
        primary_age_class_id: Option<i64>,
        lifts: &[NewLift],
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO lifters (name, gender, lifter_id_number, actual_weight, birth_date, age,
                                 opener_squat, opener_bench, opener_deadlift,
                                 primary_weight_class_id, primary_age_class_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&lifter.name)
        .bind(lifter.gender.as_str())
        .bind(&lifter.lifter_id_number)
        .bind(lifter.actual_weight)
        .bind(lifter.birth_date)
        .bind(age as i64)
        .bind(lifter.opener_squat)
        .bind(lifter.opener_bench)
        .bind(lifter.opener_deadlift)
        .bind(primary_weight_class_id)
        .bind(primary_age_class_id)
        .execute(&mut *tx)
        .await
        .context("Failed to create lifter")?;
        let lifter_id = result.last_insert_rowid();

        for lift in lifts {
            sqlx::query(
                "INSERT INTO lifts (lifter_id, lift_type, attempt_number, weight_lifted, status) VALUES (?, ?, ?, ?, 'pending')",
            )
            .bind(lifter_id)
            .bind(lift.lift_type.as_str())
            .bind(lift.attempt_number as i64)
            .bind(lift.weight_lifted)
            .execute(&mut *tx)
            .await
            .context("Failed to create lift")?;
        }

        tx.commit().await?;
        Ok(lifter_id)
    }

    /// Returns false when the class was already on the lifter.
    pub async fn add_additional_weight_class(&self, lifter_id: i64, class_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO lifter_additional_weight_classes (lifter_id, weight_class_id) VALUES (?, ?)",
        )
        .bind(lifter_id)
        .bind(class_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns false when the class was not on the lifter.
    pub async fn remove_additional_weight_class(&self, lifter_id: i64, class_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM lifter_additional_weight_classes WHERE lifter_id = ? AND weight_class_id = ?",
        )
        .bind(lifter_id)
        .bind(class_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_additional_age_class(&self, lifter_id: i64, class_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO lifter_additional_age_classes (lifter_id, age_class_id) VALUES (?, ?)",
        )
        .bind(lifter_id)
        .bind(class_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_additional_age_class(&self, lifter_id: i64, class_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM lifter_additional_age_classes WHERE lifter_id = ? AND age_class_id = ?",
        )
        .bind(lifter_id)
        .bind(class_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Recompute every lifter's primary classes against the classes now stored.
/// Returns how many lifters moved.
pub(super) async fn reassign_primary_classes(conn: &mut SqliteConnection) -> Result<usize> {
    let weight_classes = fetch_weight_classes(&mut *conn).await?;
    let age_classes = fetch_age_classes(&mut *conn).await?;
    let rows = sqlx::query(
        "SELECT id, gender, actual_weight, age, primary_weight_class_id, primary_age_class_id FROM lifters ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut changed = 0;
    for r in rows {
        let gender: Gender = r.get::<String, _>("gender").parse()?;
        let weight =
            primary_weight_class(&weight_classes, r.get("actual_weight"), gender).map(|c| c.id);
        let age = primary_age_class(&age_classes, r.get::<i64, _>("age") as u32).map(|c| c.id);
        if weight == r.get::<Option<i64>, _>("primary_weight_class_id")
            && age == r.get::<Option<i64>, _>("primary_age_class_id")
        {
            continue;
        }
        sqlx::query(
            "UPDATE lifters SET primary_weight_class_id = ?, primary_age_class_id = ? WHERE id = ?",
        )
        .bind(weight)
        .bind(age)
        .bind(r.get::<i64, _>("id"))
        .execute(&mut *conn)
        .await
        .context("Failed to reassign primary classes")?;
        changed += 1;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use crate::repository::test_helpers::{self, new_lifter};
    use meet_model::lift::generate_attempts;
    use meet_model::{Gender, LiftType, NewWeightClass, WeightClassGender};

    #[tokio::test]
    async fn create_and_get_lifter() {
        let repo = test_helpers::test_repository().await;
        let new = new_lifter("Ana Ionescu", "RO-001", Gender::Female, 62.5);
        let lifts = generate_attempts(|t| new.opener(t));
        let id = repo.create_lifter(&new, 30, Some(12), Some(3), &lifts).await.unwrap();

        let lifter = repo.get_lifter(id).await.unwrap().unwrap();
        assert_eq!(lifter.name, "Ana Ionescu");
        assert_eq!(lifter.gender, Gender::Female);
        assert_eq!(lifter.birth_date, new.birth_date);
        assert_eq!(lifter.age, 30);
        assert_eq!(lifter.primary_weight_class_id, Some(12));
        assert_eq!(lifter.primary_weight_class_name.as_deref(), Some("Women's 63kg"));
        assert_eq!(lifter.primary_age_class_name.as_deref(), Some("Open"));
        assert!(lifter.additional_weight_class_ids.is_empty());

        let all = repo.list_lifts().await.unwrap();
        assert_eq!(all.len(), 6);
        assert!(all.iter().all(|l| l.lifter_id == id));
        assert!(all.iter().all(|l| l.lift_type != LiftType::Deadlift));
    }

    #[tokio::test]
    async fn duplicate_id_number_detected() {
        let repo = test_helpers::test_repository().await;
        let new = new_lifter("Ana", "RO-001", Gender::Female, 62.5);
        repo.create_lifter(&new, 30, None, None, &[]).await.unwrap();
        assert!(repo.lifter_id_number_exists("RO-001").await.unwrap());
        assert!(!repo.lifter_id_number_exists("RO-002").await.unwrap());
        assert!(repo.create_lifter(&new, 30, None, None, &[]).await.is_err());
    }

    #[tokio::test]
    async fn additional_classes_round_trip() {
        let repo = test_helpers::test_repository().await;
        let a = repo
            .create_lifter(&new_lifter("A", "X-1", Gender::Male, 90.0), 45, Some(5), Some(4), &[])
            .await
            .unwrap();
        let b = repo
            .create_lifter(&new_lifter("B", "X-2", Gender::Male, 70.0), 25, Some(3), Some(3), &[])
            .await
            .unwrap();

        assert!(repo.add_additional_weight_class(a, 6).await.unwrap());
        assert!(!repo.add_additional_weight_class(a, 6).await.unwrap());
        assert!(repo.add_additional_age_class(a, 3).await.unwrap());

        let lifters = repo.list_lifters().await.unwrap();
        let la = lifters.iter().find(|l| l.id == a).unwrap();
        assert_eq!(la.additional_weight_class_ids, vec![6]);
        assert_eq!(la.additional_weight_class_names, vec!["Men's 105kg".to_string()]);
        assert_eq!(la.additional_age_class_names, vec!["Open".to_string()]);
        let lb = lifters.iter().find(|l| l.id == b).unwrap();
        assert!(lb.additional_weight_class_ids.is_empty());

        assert!(repo.remove_additional_weight_class(a, 6).await.unwrap());
        assert!(!repo.remove_additional_weight_class(a, 6).await.unwrap());
        assert!(!repo.remove_additional_age_class(b, 3).await.unwrap());
    }

    #[tokio::test]
    async fn class_changes_reassign_primary_classes() {
        let repo = test_helpers::test_repository().await;
        let id = repo
            .create_lifter(&new_lifter("A", "X-1", Gender::Male, 90.0), 45, Some(5), Some(4), &[])
            .await
            .unwrap();
        repo.delete_weight_class(5).await.unwrap();
        let lifter = repo.get_lifter(id).await.unwrap().unwrap();
        assert_eq!(lifter.primary_weight_class_id, None);
        assert_eq!(lifter.primary_age_class_id, Some(4));

        let class = repo
            .create_weight_class(&NewWeightClass {
                name: "Men's 95kg".into(),
                min_weight: 85.0,
                max_weight: Some(95.0),
                gender: WeightClassGender::Male,
            })
            .await
            .unwrap();
        let lifter = repo.get_lifter(id).await.unwrap().unwrap();
        assert_eq!(lifter.primary_weight_class_id, Some(class.id));
        assert_eq!(lifter.primary_weight_class_name.as_deref(), Some("Men's 95kg"));
    }

    #[tokio::test]
    async fn failed_reassignment_keeps_the_class_out() {
        let repo = test_helpers::test_repository().await;
        repo.create_lifter(&new_lifter("A", "X-1", Gender::Male, 90.0), 45, Some(5), Some(4), &[])
            .await
            .unwrap();
        sqlx::query(
            "CREATE TRIGGER frozen BEFORE UPDATE ON lifters BEGIN SELECT RAISE(ABORT, 'frozen'); END",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let new = NewWeightClass {
            name: "Men's 95kg".into(),
            min_weight: 0.0,
            max_weight: Some(95.0),
            gender: WeightClassGender::Male,
        };
        assert!(repo.create_weight_class(&new).await.is_err());
        assert!(!repo.weight_class_name_exists("Men's 95kg").await.unwrap());
        let lifter = repo.get_lifter(1).await.unwrap().unwrap();
        assert_eq!(lifter.primary_weight_class_id, Some(5));
    }
}
