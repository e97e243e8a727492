//! SQLite Profile Repository

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::database::{db_error, from_json, parse_time, parse_uuid, to_json};
use super::DbPool;
use crate::application::ports::{ProfileRecord, ProfileRepositoryPort, RepositoryError};

/// SQLite Profile Repository
pub struct SqliteProfileRepository {
    pool: DbPool,
}

impl SqliteProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, name, background, personality, interests, physical_characteristics, \
image_description, image_seed, image_paths, created_at, updated_at";

#[derive(FromRow)]
struct ProfileRow {
    id: String,
    name: String,
    background: String,
    personality: String,
    interests: String,
    physical_characteristics: String,
    image_description: String,
    image_seed: Option<i64>,
    image_paths: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProfileRow> for ProfileRecord {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(ProfileRecord {
            id: parse_uuid(&row.id)?,
            name: row.name,
            background: row.background,
            personality: row.personality,
            interests: row.interests,
            physical_characteristics: row.physical_characteristics,
            image_description: row.image_description,
            image_seed: row.image_seed,
            image_paths: from_json(&row.image_paths)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl ProfileRepositoryPort for SqliteProfileRepository {
    async fn save(&self, profile: &ProfileRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, name, background, personality, interests,
                physical_characteristics, image_description, image_seed, image_paths,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                background = excluded.background,
                personality = excluded.personality,
                interests = excluded.interests,
                physical_characteristics = excluded.physical_characteristics,
                image_description = excluded.image_description,
                image_seed = excluded.image_seed,
                image_paths = excluded.image_paths,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(profile.id.to_string())
        .bind(&profile.name)
        .bind(&profile.background)
        .bind(&profile.personality)
        .bind(&profile.interests)
        .bind(&profile.physical_characteristics)
        .bind(&profile.image_description)
        .bind(profile.image_seed)
        .bind(to_json(&profile.image_paths)?)
        .bind(profile.created_at.to_rfc3339())
        .bind(profile.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepositoryError> {
        let row: Option<ProfileRow> =
            sqlx::query_as(&format!("SELECT {} FROM profiles WHERE id = ?", COLUMNS))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        row.map(ProfileRecord::try_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<ProfileRecord>, RepositoryError> {
        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {} FROM profiles ORDER BY created_at DESC",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(ProfileRecord::try_from).collect()
    }
}
