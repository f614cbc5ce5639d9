//! The embedded transactional store (spec.md §4.1).
//!
//! Grounded on the teacher's `infrastructure::database::Database` wrapper: a pooled
//! sea-orm/sqlx sqlite connection opened with the same WAL-mode PRAGMAs, plus
//! migrations run through `sea_orm_migration`.

pub mod blob;
pub mod entities;
pub mod error;
pub mod fts;
pub mod migration;

pub use blob::BlobStore;
pub use error::{StoreError, StoreResult};

use entities::person;
use migration::Migrator;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// The embedded store: one sqlite file per user plus a sharded blob directory.
pub struct Store {
    conn: DatabaseConnection,
    blobs: BlobStore,
}

impl Store {
    /// Opens (creating if absent) the database at `db_path`, applying the WAL-mode
    /// PRAGMAs spec.md §6 requires on open.
    pub async fn create(db_path: &Path, blob_dir: PathBuf) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::create_dir_all(&blob_dir).await?;

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let mut opt = ConnectOptions::new(db_url);
        opt.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt).await.map_err(StoreError::classify)?;
        apply_pragmas(&conn).await?;

        Migrator::up(&conn, None).await.map_err(StoreError::classify)?;

        info!("opened store at {:?}", db_path);
        Ok(Self {
            blobs: BlobStore::new(blob_dir),
            conn,
        })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Opens a transaction. Callers that touch more than one row (the crawler's
    /// dual-write of person+identity+events+claims+FTS) must use this rather than the
    /// bare connection, then `commit()`/`rollback()` explicitly.
    pub async fn begin(&self) -> StoreResult<sea_orm::DatabaseTransaction> {
        use sea_orm::TransactionTrait;
        Ok(self.conn.begin().await.map_err(StoreError::classify)?)
    }

    /// Convenience used by tests and the codec-less paths (e.g. GEDCOM import, out of
    /// scope here) to create a bare person row plus its FTS entry.
    pub async fn create_person(&self, person_id: &str, display_name: &str) -> StoreResult<()> {
        let now = chrono::Utc::now();
        let model = person::ActiveModel {
            person_id: Set(person_id.to_string()),
            display_name: Set(display_name.to_string()),
            birth_name: Set(None),
            gender: Set(person::Gender::Unknown),
            living: Set(false),
            biography: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(&self.conn).await?;
        fts::upsert(
            &self.conn,
            fts::FtsEntry {
                person_id,
                display_name,
                birth_name: "",
                aliases: "",
                bio: "",
                occupations: "",
            },
        )
        .await?;
        Ok(())
    }

    /// Backup/snapshot: SQLite's `VACUUM INTO` copies a consistent snapshot to `dest`
    /// without blocking concurrent readers.
    pub async fn backup_to(&self, dest: &Path) -> StoreResult<()> {
        self.conn
            .execute(Statement::from_sql_and_values(
                self.conn.get_database_backend(),
                "VACUUM INTO ?",
                [dest.to_string_lossy().to_string().into()],
            ))
            .await
            .map_err(StoreError::classify)?;
        Ok(())
    }
}

async fn apply_pragmas(conn: &DatabaseConnection) -> StoreResult<()> {
    use sea_orm::ConnectionTrait;
    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA synchronous=NORMAL",
        "PRAGMA foreign_keys=ON",
        "PRAGMA cache_size=-65536",
        "PRAGMA temp_store=MEMORY",
    ] {
        conn.execute(Statement::from_string(conn.get_database_backend(), pragma))
            .await
            .map_err(StoreError::classify)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

    #[tokio::test]
    async fn create_opens_and_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("t.db"), dir.path().join("blobs")).await.unwrap();
        store.create_person("p1", "Ada Lovelace").await.unwrap();

        let found = person::Entity::find()
            .filter(person::Column::PersonId.eq("p1"))
            .one(store.conn())
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
