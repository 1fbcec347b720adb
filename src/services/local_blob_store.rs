//! src/services/local_blob_store.rs
//!
//! LocalBlobStore: a development stand-in for the cloud blob service.
//! Container, blob and metadata records live in SQLite; payloads live on
//! local disk sharded beneath `base_path/{container}/{shard}/{shard}/{md5}`.

use crate::{
    models::blob::{BlobItem, BlobMetadata},
    services::blob_store::{BlobStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const MAX_BLOB_NAME_LEN: usize = 1024;
const CONTAINER_NAME_MIN_LEN: usize = 3;
const CONTAINER_NAME_MAX_LEN: usize = 63;

#[derive(Clone)]
pub struct LocalBlobStore {
    /// Shared SQLite connection pool holding container, blob and metadata rows.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where blob payloads are stored.
    pub base_path: PathBuf,
}

#[derive(FromRow)]
struct BlobRow {
    id: Uuid,
    name: String,
    content_type: Option<String>,
    size_bytes: i64,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct MetadataRow {
    blob_id: Uuid,
    key: String,
    value: String,
}

impl LocalBlobStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Apply the embedded schema. Every statement is idempotent, so this runs
    /// on every start-up as well as from `--migrate`.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        debug!("running {} schema statements", statements.len());
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Enforce the cloud service's container naming rules so that anything
    /// that works here also works against the real service:
    /// - 3–63 characters
    /// - lowercase letters, digits and hyphens only
    /// - starts and ends with a letter or digit
    /// - no consecutive hyphens
    fn ensure_container_name_safe(name: &str) -> StoreResult<()> {
        let invalid = |reason: &str| StoreError::InvalidContainerName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.len() < CONTAINER_NAME_MIN_LEN || name.len() > CONTAINER_NAME_MAX_LEN {
            return Err(invalid("must be between 3 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, and hyphens",
            ));
        }
        if name.starts_with('-') || name.ends_with('-') {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }
        if name.contains("--") {
            return Err(invalid("cannot contain consecutive hyphens"));
        }
        Ok(())
    }

    /// Reject names the cloud service would refuse or rewrite.
    fn ensure_blob_name_safe(name: &str) -> StoreResult<()> {
        let invalid = || StoreError::InvalidBlobName(name.to_string());
        if name.is_empty() || name.len() > MAX_BLOB_NAME_LEN {
            return Err(invalid());
        }
        if name.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(invalid());
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(invalid());
        }
        Ok(())
    }

    /// Payload location for a blob. Names are hashed so that virtual paths
    /// never become real directories.
    fn payload_path(&self, container: &str, name: &str) -> PathBuf {
        let digest = format!("{:x}", md5::compute(format!("{}/{}", container, name)));
        let mut path = self.base_path.clone();
        path.push(container);
        path.push(&digest[0..2]);
        path.push(&digest[2..4]);
        path.push(&digest);
        path
    }

    async fn fetch_container_id(&self, container: &str) -> StoreResult<Uuid> {
        Self::ensure_container_name_safe(container)?;
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM containers WHERE name = ?")
            .bind(container)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => StoreError::ContainerNotFound(container.to_string()),
                other => StoreError::Sqlx(other),
            })
    }

    /// Containers spring into existence on first write.
    async fn ensure_container(&self, container: &str) -> StoreResult<Uuid> {
        Self::ensure_container_name_safe(container)?;
        sqlx::query(
            "INSERT INTO containers (id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(container)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        self.fetch_container_id(container).await
    }

    /// Write `body` to a temp file, fsync, then rename over `file_path`.
    async fn write_payload(&self, file_path: &Path, body: &[u8]) -> StoreResult<()> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "payload path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(body).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<_, io::Error>(())
        }
        .await;
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(file_path).await?;
                fs::rename(&tmp_path, file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list_blobs(&self, container: &str) -> StoreResult<Vec<BlobItem>> {
        let container_id = self.fetch_container_id(container).await?;

        let rows: Vec<BlobRow> = sqlx::query_as(
            "SELECT id, name, content_type, size_bytes, created_at
             FROM blobs WHERE container_id = ? ORDER BY name ASC",
        )
        .bind(container_id)
        .fetch_all(&*self.db)
        .await?;

        let meta_rows: Vec<MetadataRow> = sqlx::query_as(
            "SELECT m.blob_id, m.key, m.value
             FROM blob_metadata m JOIN blobs b ON b.id = m.blob_id
             WHERE b.container_id = ?",
        )
        .bind(container_id)
        .fetch_all(&*self.db)
        .await?;

        let mut metadata: HashMap<Uuid, BlobMetadata> = HashMap::new();
        for row in meta_rows {
            metadata
                .entry(row.blob_id)
                .or_default()
                .insert(row.key, row.value);
        }

        Ok(rows
            .into_iter()
            .map(|row| BlobItem {
                metadata: metadata.remove(&row.id).unwrap_or_default(),
                name: row.name,
                content_length: row.size_bytes.max(0) as u64,
                content_type: row.content_type,
                created_on: Some(row.created_at),
            })
            .collect())
    }

    async fn put_blob(
        &self,
        container: &str,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
        metadata: &BlobMetadata,
    ) -> StoreResult<()> {
        Self::ensure_blob_name_safe(name)?;
        let container_id = self.ensure_container(container).await?;

        let file_path = self.payload_path(container, name);
        self.write_payload(&file_path, &body).await?;

        let etag = format!("{:x}", md5::compute(&body));
        let now = Utc::now();

        let result = async {
            let mut tx = self.db.begin().await?;
            let blob_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO blobs (
                    id, container_id, name, content_type, size_bytes,
                    etag, created_at, last_modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(container_id, name) DO UPDATE SET
                    content_type = excluded.content_type,
                    size_bytes = excluded.size_bytes,
                    etag = excluded.etag,
                    last_modified = excluded.last_modified
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(container_id)
            .bind(name)
            .bind(content_type)
            .bind(body.len() as i64)
            .bind(&etag)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM blob_metadata WHERE blob_id = ?")
                .bind(blob_id)
                .execute(&mut *tx)
                .await?;
            for (key, value) in metadata {
                sqlx::query("INSERT INTO blob_metadata (blob_id, key, value) VALUES (?, ?, ?)")
                    .bind(blob_id)
                    .bind(key)
                    .bind(value)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await
        }
        .await;

        match result {
            Ok(()) => {
                debug!("stored {}/{} at {}", container, name, file_path.display());
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StoreError::Sqlx(err))
            }
        }
    }

    /// Runs `SELECT 1` and a write/read/delete round-trip under `base_path`.
    async fn probe(&self) -> StoreResult<()> {
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&*self.db).await?;
        if one != 1 {
            return Err(StoreError::MalformedResponse(format!(
                "unexpected result from SELECT 1: {}",
                one
            )));
        }

        fs::create_dir_all(&self.base_path).await?;
        let tmp_path = self.base_path.join(format!(".probe-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"probe").await?;
        let read = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read? != b"probe" {
            return Err(StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "probe file content mismatch",
            )));
        }
        Ok(())
    }
}
