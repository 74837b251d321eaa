use anyhow::{Context, Result};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Executor, Row};
use tracing::debug;

use meet_model::{AgeClass, NewAgeClass, NewWeightClass, WeightClass};

use super::MeetRepository;
use super::lifters::reassign_primary_classes;

fn weight_class_from_row(r: &SqliteRow) -> Result<WeightClass> {
    Ok(WeightClass {
        id: r.get("id"),
        name: r.get("name"),
        min_weight: r.get("min_weight"),
        max_weight: r.get("max_weight"),
        gender: r.get::<String, _>("gender").parse()?,
    })
}

fn age_class_from_row(r: &SqliteRow) -> AgeClass {
    AgeClass {
        id: r.get("id"),
        name: r.get("name"),
        min_age: r.get::<i64, _>("min_age") as u32,
        max_age: r.get::<Option<i64>, _>("max_age").map(|a| a as u32),
    }
}

pub(super) async fn fetch_weight_classes<'e, E>(executor: E) -> Result<Vec<WeightClass>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, name, min_weight, max_weight, gender FROM weight_classes ORDER BY gender, min_weight, id",
    )
    .fetch_all(executor)
    .await?;
    rows.iter().map(weight_class_from_row).collect()
}

pub(super) async fn fetch_age_classes<'e, E>(executor: E) -> Result<Vec<AgeClass>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT id, name, min_age, max_age FROM age_classes ORDER BY min_age, id")
        .fetch_all(executor)
        .await?;
    Ok(rows.iter().map(age_class_from_row).collect())
}

// Class changes commit together with the primary-class reassignment they cause.
impl MeetRepository {
    // ── weight classes ──────────────────────────────────────────────────

    pub async fn list_weight_classes(&self) -> Result<Vec<WeightClass>> {
        fetch_weight_classes(&self.pool).await
    }

    pub async fn get_weight_class(&self, id: i64) -> Result<Option<WeightClass>> {
        let row = sqlx::query(
            "SELECT id, name, min_weight, max_weight, gender FROM weight_classes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(weight_class_from_row).transpose()
    }

    pub async fn weight_class_name_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weight_classes WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn create_weight_class(&self, class: &NewWeightClass) -> Result<WeightClass> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO weight_classes (name, min_weight, max_weight, gender) VALUES (?, ?, ?, ?)",
        )
        .bind(&class.name)
        .bind(class.min_weight)
        .bind(class.max_weight)
        .bind(class.gender.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to create weight class")?;
        let changed = reassign_primary_classes(&mut tx).await?;
        tx.commit().await?;
        debug!(changed, "primary classes reassigned");

        Ok(WeightClass {
            id: result.last_insert_rowid(),
            name: class.name.clone(),
            min_weight: class.min_weight,
            max_weight: class.max_weight,
            gender: class.gender,
        })
    }

    /// Returns false when no class had this id.
    pub async fn delete_weight_class(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM weight_classes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete weight class")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        let changed = reassign_primary_classes(&mut tx).await?;
        tx.commit().await?;
        debug!(changed, "primary classes reassigned");
        Ok(true)
    }

    // ── age classes ─────────────────────────────────────────────────────

    pub async fn list_age_classes(&self) -> Result<Vec<AgeClass>> {
        fetch_age_classes(&self.pool).await
    }

    pub async fn get_age_class(&self, id: i64) -> Result<Option<AgeClass>> {
        let row = sqlx::query("SELECT id, name, min_age, max_age FROM age_classes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(age_class_from_row))
    }

    pub async fn age_class_name_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM age_classes WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn create_age_class(&self, class: &NewAgeClass) -> Result<AgeClass> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT INTO age_classes (name, min_age, max_age) VALUES (?, ?, ?)")
            .bind(&class.name)
            .bind(class.min_age as i64)
            .bind(class.max_age.map(|a| a as i64))
            .execute(&mut *tx)
            .await
            .context("Failed to create age class")?;
        let changed = reassign_primary_classes(&mut tx).await?;
        tx.commit().await?;
        debug!(changed, "primary classes reassigned");

        Ok(AgeClass {
            id: result.last_insert_rowid(),
            name: class.name.clone(),
            min_age: class.min_age,
            max_age: class.max_age,
        })
    }

    pub async fn delete_age_class(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM age_classes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete age class")?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        let changed = reassign_primary_classes(&mut tx).await?;
        tx.commit().await?;
        debug!(changed, "primary classes reassigned");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_helpers;
    use meet_model::{NewAgeClass, NewWeightClass, WeightClassGender};

    #[tokio::test]
    async fn seeded_classes_are_listed() {
        let repo = test_helpers::test_repository().await;
        let weight = repo.list_weight_classes().await.unwrap();
        assert_eq!(weight.len(), 16);
        assert!(weight.iter().any(|c| c.name == "Men's 120+kg" && c.max_weight.is_none()));

        let age = repo.list_age_classes().await.unwrap();
        assert_eq!(age.len(), 7);
        assert_eq!(age[0].name, "Sub-Junior");
        assert_eq!(age[6].max_age, None);
    }

    #[tokio::test]
    async fn create_get_delete_weight_class() {
        let repo = test_helpers::test_repository().await;
        let created = repo
            .create_weight_class(&NewWeightClass {
                name: "Open Heavy".into(),
                min_weight: 100.0,
                max_weight: None,
                gender: WeightClassGender::Both,
            })
            .await
            .unwrap();

        let fetched = repo.get_weight_class(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(repo.weight_class_name_exists("Open Heavy").await.unwrap());

        assert!(repo.delete_weight_class(created.id).await.unwrap());
        assert!(!repo.delete_weight_class(created.id).await.unwrap());
        assert!(repo.get_weight_class(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_get_delete_age_class() {
        let repo = test_helpers::test_repository().await;
        let created = repo
            .create_age_class(&NewAgeClass {
                name: "Youth".into(),
                min_age: 10,
                max_age: Some(13),
            })
            .await
            .unwrap();

        assert_eq!(repo.get_age_class(created.id).await.unwrap(), Some(created.clone()));
        assert!(repo.age_class_name_exists("Youth").await.unwrap());
        assert!(!repo.age_class_name_exists("Elders").await.unwrap());

        assert!(repo.delete_age_class(created.id).await.unwrap());
        assert!(repo.get_age_class(created.id).await.unwrap().is_none());
    }
}
