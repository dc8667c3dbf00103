use super::mappers::mirror_record_from_row;
use super::rows::MirrorRecordRow;
use crate::application::ports::MirrorStore;
use crate::domain::entities::MirrorRecord;
use crate::domain::value_objects::{EntityType, LocalId, ServerId};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::offline::mappers::datetime_to_timestamp;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::SqliteConnection;
use std::collections::HashSet;

const SELECT_COLUMNS: &str = r#"
    SELECT entity_type, record_key, local_id, server_id, parent_id, pending_entity_id,
           data, updated_at
    FROM mirror_records
"#;

pub struct SqliteMirrorStore {
    pool: ConnectionPool,
}

impl SqliteMirrorStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    async fn find_with(
        conn: &mut SqliteConnection,
        entity_type: &EntityType,
        id: &str,
    ) -> Result<Option<MirrorRecordRow>, AppError> {
        let row = sqlx::query_as::<_, MirrorRecordRow>(&format!(
            "{SELECT_COLUMNS} WHERE entity_type = ?1 AND (record_key = ?2 OR local_id = ?2 OR server_id = ?2) ORDER BY record_key = ?2 DESC LIMIT 1"
        ))
        .bind(entity_type.as_str())
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Writes `record`, merging into an existing row that shares either identity.
    async fn upsert_with(
        conn: &mut SqliteConnection,
        record: MirrorRecord,
    ) -> Result<(), AppError> {
        let mut existing = None;
        for id in [
            record.local_id.as_ref().map(LocalId::as_str),
            record.server_id.as_ref().map(ServerId::as_str),
        ]
        .into_iter()
        .flatten()
        {
            existing = Self::find_with(&mut *conn, &record.entity_type, id).await?;
            if existing.is_some() {
                break;
            }
        }

        let key = match (&existing, record.key()) {
            (Some(row), _) => row.record_key.clone(),
            (None, Some(key)) => key.to_string(),
            (None, None) => {
                return Err(AppError::InvalidInput(
                    "Mirror record needs a local or server id".to_string(),
                ));
            }
        };

        sqlx::query(
            r#"
            INSERT INTO mirror_records
                (entity_type, record_key, local_id, server_id, parent_id, pending_entity_id,
                 data, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(entity_type, record_key) DO UPDATE SET
                local_id = COALESCE(excluded.local_id, mirror_records.local_id),
                server_id = COALESCE(excluded.server_id, mirror_records.server_id),
                parent_id = COALESCE(excluded.parent_id, mirror_records.parent_id),
                pending_entity_id = excluded.pending_entity_id,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.entity_type.as_str())
        .bind(&key)
        .bind(record.local_id.as_ref().map(LocalId::as_str))
        .bind(record.server_id.as_ref().map(ServerId::as_str))
        .bind(record.parent_id.as_deref())
        .bind(record.pending_entity_id.as_ref().map(|id| id.as_str()))
        .bind(serde_json::to_string(&record.data)?)
        .bind(datetime_to_timestamp(record.updated_at))
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MirrorStore for SqliteMirrorStore {
    async fn upsert(&self, record: MirrorRecord) -> Result<(), AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        Self::upsert_with(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(
        &self,
        entity_type: &EntityType,
        id: &str,
    ) -> Result<Option<MirrorRecord>, AppError> {
        let mut conn = self.pool.get_pool().acquire().await?;
        Self::find_with(&mut conn, entity_type, id)
            .await?
            .map(mirror_record_from_row)
            .transpose()
    }

    async fn list(
        &self,
        entity_type: &EntityType,
        parent_id: Option<&str>,
    ) -> Result<Vec<MirrorRecord>, AppError> {
        let rows = sqlx::query_as::<_, MirrorRecordRow>(&format!(
            "{SELECT_COLUMNS} WHERE entity_type = ?1 AND (?2 IS NULL OR parent_id = ?2) ORDER BY rowid ASC"
        ))
        .bind(entity_type.as_str())
        .bind(parent_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        rows.into_iter().map(mirror_record_from_row).collect()
    }

    async fn confirm(
        &self,
        entity_type: &EntityType,
        local_id: &LocalId,
        server_id: &ServerId,
        data: Option<Value>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let Some(row) = Self::find_with(&mut tx, entity_type, local_id.as_str()).await? else {
            return Err(AppError::NotFound(format!(
                "Mirror record {entity_type}/{local_id} not found"
            )));
        };

        let mut merged: Value = serde_json::from_str(&row.data)?;
        if let (Value::Object(current), Some(Value::Object(server))) = (&mut merged, data) {
            for (key, value) in server {
                current.entry(key).or_insert(value);
            }
        }

        sqlx::query(
            r#"
            UPDATE mirror_records
            SET server_id = ?1, pending_entity_id = NULL, data = ?2, updated_at = ?3
            WHERE entity_type = ?4 AND record_key = ?5
            "#,
        )
        .bind(server_id.as_str())
        .bind(serde_json::to_string(&merged)?)
        .bind(datetime_to_timestamp(Utc::now()))
        .bind(entity_type.as_str())
        .bind(&row.record_key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn patch(
        &self,
        entity_type: &EntityType,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<Option<MirrorRecord>, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let Some(mut row) = Self::find_with(&mut tx, entity_type, id).await? else {
            return Ok(None);
        };
        let mut data: Value = serde_json::from_str(&row.data)?;
        if let Value::Object(current) = &mut data {
            current.extend(fields);
        }
        row.data = serde_json::to_string(&data)?;
        row.updated_at = datetime_to_timestamp(Utc::now());

        sqlx::query(
            r#"
            UPDATE mirror_records
            SET data = ?1, updated_at = ?2
            WHERE entity_type = ?3 AND record_key = ?4
            "#,
        )
        .bind(&row.data)
        .bind(row.updated_at)
        .bind(entity_type.as_str())
        .bind(&row.record_key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        mirror_record_from_row(row).map(Some)
    }

    async fn remove(&self, entity_type: &EntityType, id: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            DELETE FROM mirror_records
            WHERE entity_type = ?1 AND (record_key = ?2 OR local_id = ?2 OR server_id = ?2)
            "#,
        )
        .bind(entity_type.as_str())
        .bind(id)
        .execute(self.pool.get_pool())
        .await?;
        Ok(())
    }

    async fn replace_scope(
        &self,
        entity_type: &EntityType,
        parent_id: Option<&str>,
        records: Vec<MirrorRecord>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let fresh: HashSet<String> = records
            .iter()
            .filter_map(|record| record.server_id.as_ref().map(|id| id.to_string()))
            .collect();
        for record in records {
            Self::upsert_with(&mut tx, record).await?;
        }

        let stale: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT record_key, server_id FROM mirror_records
            WHERE entity_type = ?1 AND (?2 IS NULL OR parent_id = ?2)
              AND pending_entity_id IS NULL
            "#,
        )
        .bind(entity_type.as_str())
        .bind(parent_id)
        .fetch_all(&mut *tx)
        .await?;

        for (record_key, server_id) in stale {
            if server_id.is_some_and(|id| fresh.contains(&id)) {
                continue;
            }
            sqlx::query("DELETE FROM mirror_records WHERE entity_type = ?1 AND record_key = ?2")
                .bind(entity_type.as_str())
                .bind(&record_key)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
