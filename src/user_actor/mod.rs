//! Per-user actor: owns one SQLite database and serializes every mutation
//! against it (spec.md §4.6). `Registry` is the process-wide singleton
//! lookup, grounded in the same `Arc<Mutex<HashMap<_, _>>>` shape the
//! teacher used to track per-crawl sessions.

mod migrations;
pub mod queries;

use crate::artifact_store::ArtifactStore;
use crate::clock::Clock;
use crate::ids;
use crate::model::{ArtifactKind, FileRecord};
use queries::{Order, SortBy};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum UserActorError {
    #[error("permanent URLs disabled: user store unavailable")]
    StoreUnavailable,
    #[error("artifact upload failed: {0}")]
    ArtifactUpload(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub struct RecordOutcome {
    pub file_id: String,
    pub public_url: String,
    pub object_key: String,
    pub filename: String,
}

pub struct DeleteOutcome {
    pub found: bool,
    pub deleted_from_db: bool,
    pub deleted_from_storage: bool,
    pub record: Option<FileRecord>,
}

/// One user's durable state. `pool = None` means the on-disk database could
/// not be opened; the actor degrades to empty reads and failing writes
/// rather than taking the gateway down.
pub struct UserActor {
    user_id: String,
    pool: Option<SqlitePool>,
    artifacts: ArtifactStore,
    clock: Arc<dyn Clock>,
}

impl UserActor {
    async fn open(user_id: String, db_path: &Path, artifacts: ArtifactStore, clock: Arc<dyn Clock>) -> Self {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = match SqlitePoolOptions::new().max_connections(1).connect(&url).await {
            Ok(pool) => match migrations::run(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    tracing::error!(user_id, error = %e, "permanent_files migration failed");
                    None
                }
            },
            Err(e) => {
                tracing::error!(user_id, error = %e, "failed to open user database");
                None
            }
        };

        Self {
            user_id,
            pool,
            artifacts,
            clock,
        }
    }

    pub async fn record(
        &self,
        kind: ArtifactKind,
        source_url: &str,
        bytes: Vec<u8>,
        metadata_json: String,
        format: Option<&str>,
    ) -> Result<RecordOutcome, UserActorError> {
        let pool = self.pool.as_ref().ok_or(UserActorError::StoreUnavailable)?;

        let created_at = self.clock.now_utc();
        let created_at_ms = self.clock.now_ms();
        let ext = format.unwrap_or(kind.default_extension());
        let file_id = ids::file_id(&self.user_id, kind.as_str(), source_url, created_at_ms);
        let filename = ids::filename(source_url, created_at_ms, ext);
        let object_key = ids::object_key(kind.as_str(), &self.user_id, created_at, &filename);
        let public_url = self.artifacts.public_url(&object_key);

        let content_type = match kind {
            ArtifactKind::Pdf => "application/pdf".to_string(),
            ArtifactKind::Screenshot => format!("image/{}", format.unwrap_or("png")),
        };

        self.artifacts
            .put(&object_key, bytes, &content_type)
            .await
            .map_err(|e| UserActorError::ArtifactUpload(e.to_string()))?;

        let record = FileRecord {
            id: file_id.clone(),
            kind: kind.as_str().to_string(),
            source_url: source_url.to_string(),
            filename: filename.clone(),
            object_key: object_key.clone(),
            public_url: public_url.clone(),
            metadata_json,
            created_at,
        };

        queries::insert(pool, &record).await?;

        Ok(RecordOutcome {
            file_id,
            public_url,
            object_key,
            filename,
        })
    }

    pub async fn get(&self, file_id: &str) -> Result<Option<FileRecord>, UserActorError> {
        let Some(pool) = self.pool.as_ref() else {
            return Ok(None);
        };
        Ok(queries::get(pool, file_id).await?)
    }

    pub async fn list(
        &self,
        kind: Option<&str>,
        limit: u32,
        offset: u32,
        sort_by: Option<&str>,
        order: Option<&str>,
    ) -> Result<Vec<FileRecord>, UserActorError> {
        let Some(pool) = self.pool.as_ref() else {
            return Ok(Vec::new());
        };
        Ok(queries::list(pool, kind, limit, offset, SortBy::parse(sort_by), Order::parse(order)).await?)
    }

    pub async fn count(&self, kind: Option<&str>) -> Result<i64, UserActorError> {
        let Some(pool) = self.pool.as_ref() else {
            return Ok(0);
        };
        Ok(queries::count(pool, kind).await?)
    }

    pub async fn delete(&self, file_id: &str, also_from_storage: bool) -> Result<DeleteOutcome, UserActorError> {
        let Some(pool) = self.pool.as_ref() else {
            return Ok(DeleteOutcome {
                found: false,
                deleted_from_db: false,
                deleted_from_storage: false,
                record: None,
            });
        };

        let record = queries::get(pool, file_id).await?;
        let Some(record) = record else {
            return Ok(DeleteOutcome {
                found: false,
                deleted_from_db: false,
                deleted_from_storage: false,
                record: None,
            });
        };

        let deleted_from_db = queries::delete(pool, file_id).await?;

        let deleted_from_storage = if also_from_storage && deleted_from_db {
            match self.artifacts.delete(&record.object_key).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(file_id, error = %e, "best-effort storage delete failed after DB delete");
                    false
                }
            }
        } else {
            false
        };

        Ok(DeleteOutcome {
            found: true,
            deleted_from_db,
            deleted_from_storage,
            record: Some(record),
        })
    }
}

/// Process-wide per-user actor directory. Lazily opens a database on first
/// touch; subsequent lookups for the same user reuse the same actor.
#[derive(Clone)]
pub struct Registry {
    actors: Arc<Mutex<HashMap<String, Arc<UserActor>>>>,
    db_dir: std::path::PathBuf,
    artifacts: ArtifactStore,
    clock: Arc<dyn Clock>,
}

impl Registry {
    pub fn new(db_dir: std::path::PathBuf, artifacts: ArtifactStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            actors: Arc::new(Mutex::new(HashMap::new())),
            db_dir,
            artifacts,
            clock,
        }
    }

    pub async fn get_or_open(&self, user_id: &str) -> Arc<UserActor> {
        let mut actors = self.actors.lock().await;
        if let Some(actor) = actors.get(user_id) {
            return actor.clone();
        }

        let db_path = self.db_dir.join(format!("{}.sqlite3", ids::user_hash(user_id)));
        let actor = Arc::new(
            UserActor::open(user_id.to_string(), &db_path, self.artifacts.clone(), self.clock.clone()).await,
        );
        actors.insert(user_id.to_string(), actor.clone());
        actor
    }
}
