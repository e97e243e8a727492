//! SQLite Model Usage Repository
//!
//! 单行表 `model_usage (id = 1)`；状态的比较并交换由一条条件 UPDATE 完成。

use async_trait::async_trait;
use sqlx::FromRow;

use super::database::db_error;
use super::DbPool;
use crate::application::ports::{ModelUsageRepositoryPort, RepositoryError};
use crate::domain::GenerationStatus;

/// SQLite Model Usage Repository
pub struct SqliteModelUsageRepository {
    pool: DbPool,
}

impl SqliteModelUsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ModelUsageRow {
    llm_model: String,
    image_model: String,
    tts_model: Option<String>,
    status: String,
}

impl From<ModelUsageRow> for GenerationStatus {
    fn from(row: ModelUsageRow) -> Self {
        GenerationStatus {
            llm_model: row.llm_model,
            image_model: row.image_model,
            tts_model: row.tts_model,
            status: row.status,
        }
    }
}

#[async_trait]
impl ModelUsageRepositoryPort for SqliteModelUsageRepository {
    async fn get(&self) -> Result<GenerationStatus, RepositoryError> {
        sqlx::query("INSERT OR IGNORE INTO model_usage (id) VALUES (1)")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        let row: ModelUsageRow = sqlx::query_as(
            "SELECT llm_model, image_model, tts_model, status FROM model_usage WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn save_models(
        &self,
        llm_model: &str,
        image_model: &str,
        tts_model: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO model_usage (id, llm_model, image_model, tts_model)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                llm_model = excluded.llm_model,
                image_model = excluded.image_model,
                tts_model = excluded.tts_model
            "#,
        )
        .bind(llm_model)
        .bind(image_model)
        .bind(tts_model)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        expected: &str,
        new_status: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE model_usage SET status = ? WHERE id = 1 AND status = ?")
            .bind(new_status)
            .bind(expected)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_status(&self, status: &str) -> Result<String, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT status FROM model_usage WHERE id = 1")
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO model_usage (id, status) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET status = excluded.status
            "#,
        )
        .bind(status)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        Ok(previous.unwrap_or_else(|| crate::domain::IDLE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IDLE;
    use crate::infrastructure::persistence::sqlite::database::test_pool;

    #[tokio::test]
    async fn test_defaults_to_idle() {
        let repo = SqliteModelUsageRepository::new(test_pool().await);
        let status = repo.get().await.unwrap();
        assert_eq!(status, GenerationStatus::default());
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let repo = SqliteModelUsageRepository::new(test_pool().await);

        assert!(repo.compare_and_set_status(IDLE, "Generating Profile").await.unwrap());
        assert!(!repo.compare_and_set_status(IDLE, "Generating Scenario").await.unwrap());
        assert_eq!(repo.get().await.unwrap().status, "Generating Profile");

        let previous = repo.set_status(IDLE).await.unwrap();
        assert_eq!(previous, "Generating Profile");
        assert!(repo.get().await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn test_save_models_keeps_status() {
        let repo = SqliteModelUsageRepository::new(test_pool().await);
        repo.set_status("Error: boom").await.unwrap();

        repo.save_models("llama3", "flux", Some("orpheus")).await.unwrap();
        let status = repo.get().await.unwrap();
        assert_eq!(status.llm_model, "llama3");
        assert_eq!(status.image_model, "flux");
        assert_eq!(status.tts_model.as_deref(), Some("orpheus"));
        assert_eq!(status.status, "Error: boom");

        repo.save_models("llama3", "flux", None).await.unwrap();
        assert_eq!(repo.get().await.unwrap().tts_model, None);
    }
}
