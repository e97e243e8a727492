//! SQLite Scenario Repository

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::database::{db_error, from_json, parse_time, parse_uuid, to_json};
use super::DbPool;
use crate::application::ports::{RepositoryError, ScenarioRecord, ScenarioRepositoryPort};

/// SQLite Scenario Repository
pub struct SqliteScenarioRepository {
    pool: DbPool,
}

impl SqliteScenarioRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, profile_id, title, summary, scene_summaries, invitation, \
scene_descriptions, images, created_at, updated_at";

#[derive(FromRow)]
struct ScenarioRow {
    id: String,
    profile_id: String,
    title: String,
    summary: String,
    scene_summaries: String,
    invitation: String,
    scene_descriptions: String,
    images: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ScenarioRow> for ScenarioRecord {
    type Error = RepositoryError;

    fn try_from(row: ScenarioRow) -> Result<Self, Self::Error> {
        Ok(ScenarioRecord {
            id: parse_uuid(&row.id)?,
            profile_id: parse_uuid(&row.profile_id)?,
            title: row.title,
            summary: row.summary,
            scene_summaries: from_json(&row.scene_summaries)?,
            invitation: row.invitation,
            scene_descriptions: from_json(&row.scene_descriptions)?,
            images: from_json(&row.images)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl ScenarioRepositoryPort for SqliteScenarioRepository {
    async fn save(&self, scenario: &ScenarioRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO scenarios (id, profile_id, title, summary, scene_summaries, invitation,
                scene_descriptions, images, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                scene_summaries = excluded.scene_summaries,
                invitation = excluded.invitation,
                scene_descriptions = excluded.scene_descriptions,
                images = excluded.images,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(scenario.id.to_string())
        .bind(scenario.profile_id.to_string())
        .bind(&scenario.title)
        .bind(&scenario.summary)
        .bind(to_json(&scenario.scene_summaries)?)
        .bind(&scenario.invitation)
        .bind(to_json(&scenario.scene_descriptions)?)
        .bind(to_json(&scenario.images)?)
        .bind(scenario.created_at.to_rfc3339())
        .bind(scenario.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScenarioRecord>, RepositoryError> {
        let row: Option<ScenarioRow> =
            sqlx::query_as(&format!("SELECT {} FROM scenarios WHERE id = ?", COLUMNS))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        row.map(ScenarioRecord::try_from).transpose()
    }

    async fn find_by_profile(&self, profile_id: Uuid) -> Result<Vec<ScenarioRecord>, RepositoryError> {
        let rows: Vec<ScenarioRow> = sqlx::query_as(&format!(
            "SELECT {} FROM scenarios WHERE profile_id = ? ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(profile_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(ScenarioRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ProfileRecord, ProfileRepositoryPort};
    use crate::infrastructure::persistence::sqlite::database::test_pool;
    use crate::infrastructure::persistence::sqlite::SqliteProfileRepository;

    #[tokio::test]
    async fn test_save_update_and_list() {
        let pool = test_pool().await;
        let profiles = SqliteProfileRepository::new(pool.clone());
        let repo = SqliteScenarioRepository::new(pool);

        let profile = ProfileRecord::new(
            "Mira".into(),
            "b".into(),
            "p".into(),
            "i".into(),
            "pc".into(),
        );
        profiles.save(&profile).await.unwrap();

        let mut scenario = ScenarioRecord::new(
            profile.id,
            "Harbor Lights".to_string(),
            "A night at the harbor".to_string(),
            vec!["Arrival".to_string(), "The storm".to_string()],
            "Meet me at the pier".to_string(),
        );
        repo.save(&scenario).await.unwrap();

        scenario.scene_descriptions = vec!["wet planks".to_string()];
        scenario.images.push("data/images/9-a.png".to_string());
        repo.save(&scenario).await.unwrap();

        let loaded = repo.find_by_id(scenario.id).await.unwrap().unwrap();
        assert_eq!(loaded.scene_summaries, ["Arrival", "The storm"]);
        assert_eq!(loaded.scene_descriptions, ["wet planks"]);
        assert_eq!(loaded.images, ["data/images/9-a.png"]);

        let listed = repo.find_by_profile(profile.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(repo.find_by_profile(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
