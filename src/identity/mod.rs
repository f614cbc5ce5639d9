//! Identity Map (spec.md §4.2): stable internal ID <-> {provider, external_id}.
//!
//! A thin wrapper over the store, grounded on the teacher's pattern of small
//! per-concern managers that hold nothing but a `DatabaseConnection` reference.

use crate::shared::ulid;
use crate::store::entities::{external_identity, person};
use crate::store::error::{StoreError, StoreResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};
use tracing::debug;

/// Options accepted by `get_or_create` beyond the minimal (source, external_id, name).
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub gender: Option<person::Gender>,
    pub living: bool,
}

pub struct IdentityMap;

impl IdentityMap {
    /// Resolves `id` to a canonical internal ID.
    ///
    /// Tie-break order (spec.md §4.2, unchanged): exact canonical-ID match wins; then
    /// `hint_source` match; then any source; then the input unchanged (caller decides
    /// whether to treat the result as not-found).
    pub async fn resolve<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        hint_source: Option<&str>,
    ) -> StoreResult<String> {
        if ulid::is_ulid(id) {
            if person::Entity::find_by_id(id.to_string()).one(conn).await?.is_some() {
                return Ok(id.to_string());
            }
        }

        if let Some(source) = hint_source {
            if let Some(row) = external_identity::Entity::find()
                .filter(external_identity::Column::Source.eq(source))
                .filter(external_identity::Column::ExternalId.eq(id))
                .order_by_desc(external_identity::Column::Confidence)
                .order_by_desc(external_identity::Column::RegisteredAt)
                .one(conn)
                .await?
            {
                return Ok(row.person_id);
            }
        }

        if let Some(row) = external_identity::Entity::find()
            .filter(external_identity::Column::ExternalId.eq(id))
            .order_by_desc(external_identity::Column::Confidence)
            .order_by_desc(external_identity::Column::RegisteredAt)
            .one(conn)
            .await?
        {
            return Ok(row.person_id);
        }

        Ok(id.to_string())
    }

    /// Highest-confidence identity for `internal_id` under `source`, if any.
    pub async fn get_external<C: ConnectionTrait>(
        conn: &C,
        internal_id: &str,
        source: &str,
    ) -> StoreResult<Option<String>> {
        let row = external_identity::Entity::find()
            .filter(external_identity::Column::PersonId.eq(internal_id))
            .filter(external_identity::Column::Source.eq(source))
            .order_by_desc(external_identity::Column::Confidence)
            .order_by_desc(external_identity::Column::RegisteredAt)
            .one(conn)
            .await?;
        Ok(row.map(|r| r.external_id))
    }

    /// Full registration history for `internal_id` under `source`, newest first. See
    /// DESIGN.md's Open Question decision: the default lookup hides demoted identities,
    /// but callers that need the full picture (e.g. discovery diagnostics) use this.
    pub async fn list_external<C: ConnectionTrait>(
        conn: &C,
        internal_id: &str,
        source: &str,
    ) -> StoreResult<Vec<external_identity::Model>> {
        Ok(external_identity::Entity::find()
            .filter(external_identity::Column::PersonId.eq(internal_id))
            .filter(external_identity::Column::Source.eq(source))
            .order_by_desc(external_identity::Column::Confidence)
            .order_by_desc(external_identity::Column::RegisteredAt)
            .all(conn)
            .await?)
    }

    /// Looks up `(source, external_id)`; if absent, atomically creates a person row plus
    /// an identity row at full confidence.
    pub async fn get_or_create<C: ConnectionTrait>(
        conn: &C,
        source: &str,
        external_id: &str,
        display_name: &str,
        options: CreateOptions,
    ) -> StoreResult<String> {
        if let Some(row) = external_identity::Entity::find()
            .filter(external_identity::Column::Source.eq(source))
            .filter(external_identity::Column::ExternalId.eq(external_id))
            .order_by_desc(external_identity::Column::Confidence)
            .order_by_desc(external_identity::Column::RegisteredAt)
            .one(conn)
            .await?
        {
            return Ok(row.person_id);
        }

        let internal_id = ulid::new();
        let now = chrono::Utc::now();
        person::ActiveModel {
            person_id: Set(internal_id.clone()),
            display_name: Set(display_name.to_string()),
            birth_name: Set(None),
            gender: Set(options.gender.unwrap_or(person::Gender::Unknown)),
            living: Set(options.living),
            biography: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        Self::register(conn, &internal_id, source, external_id, None, 1.0).await?;
        debug!(person_id = %internal_id, source, external_id, "created person via identity map");
        Ok(internal_id)
    }

    /// Idempotent upsert of an external identity. Preserves prior rows at lower
    /// confidence rather than overwriting (spec.md §3: "older ones retained with lower
    /// confidence for historical lookup").
    pub async fn register<C: ConnectionTrait>(
        conn: &C,
        internal_id: &str,
        source: &str,
        external_id: &str,
        url: Option<&str>,
        confidence: f64,
    ) -> StoreResult<()> {
        let existing = external_identity::Entity::find()
            .filter(external_identity::Column::Source.eq(source))
            .filter(external_identity::Column::ExternalId.eq(external_id))
            .one(conn)
            .await?;

        match existing {
            Some(row) if row.person_id == internal_id => {
                // Re-registration of the same mapping: bump confidence/url if higher.
                if confidence > row.confidence {
                    let mut active: external_identity::ActiveModel = row.into();
                    active.confidence = Set(confidence);
                    active.url = Set(url.map(str::to_string));
                    active.registered_at = Set(chrono::Utc::now());
                    active.update(conn).await?;
                }
            }
            Some(row) => {
                return Err(StoreError::Constraint {
                    key: format!(
                        "external_identity({source}, {external_id}) already maps to {}",
                        row.person_id
                    ),
                });
            }
            None => {
                external_identity::ActiveModel {
                    id: sea_orm::ActiveValue::NotSet,
                    person_id: Set(internal_id.to_string()),
                    source: Set(source.to_string()),
                    external_id: Set(external_id.to_string()),
                    url: Set(url.map(str::to_string)),
                    confidence: Set(confidence),
                    registered_at: Set(chrono::Utc::now()),
                }
                .insert(conn)
                .await?;
            }
        }
        Ok(())
    }

    /// Demotes every existing identity row for `(internal_id, source, external_id)`
    /// below `new_confidence` and registers a fresh mapping — used when the crawler
    /// discovers a provider-side merge has redirected an external ID elsewhere.
    pub async fn demote_and_register<C: ConnectionTrait>(
        conn: &C,
        old_internal_id: &str,
        new_internal_id: &str,
        source: &str,
        external_id: &str,
    ) -> StoreResult<()> {
        let rows = external_identity::Entity::find()
            .filter(external_identity::Column::PersonId.eq(old_internal_id))
            .filter(external_identity::Column::Source.eq(source))
            .all(conn)
            .await?;
        for row in rows {
            let confidence = row.confidence;
            let mut active: external_identity::ActiveModel = row.into();
            active.confidence = Set((confidence - 0.5).max(0.0));
            active.update(conn).await?;
        }
        Self::register(conn, new_internal_id, source, external_id, None, 1.0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("t.db"), dir.path().join("blobs")).await.unwrap();

        let id1 = IdentityMap::get_or_create(store.conn(), "family_search", "X1", "Ada Lovelace", CreateOptions::default())
            .await
            .unwrap();
        let id2 = IdentityMap::get_or_create(store.conn(), "family_search", "X1", "Ada Lovelace", CreateOptions::default())
            .await
            .unwrap();

        assert_eq!(id1, id2);
        let count = external_identity::Entity::find()
            .filter(external_identity::Column::PersonId.eq(id1))
            .count(store.conn())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn resolve_prefers_canonical_id_then_hint_source_then_any() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("t.db"), dir.path().join("blobs")).await.unwrap();

        let id = IdentityMap::get_or_create(store.conn(), "ancestry", "A1", "Bob", CreateOptions::default())
            .await
            .unwrap();
        IdentityMap::register(store.conn(), &id, "family_search", "F1", None, 0.9).await.unwrap();

        assert_eq!(IdentityMap::resolve(store.conn(), &id, None).await.unwrap(), id);
        assert_eq!(IdentityMap::resolve(store.conn(), "F1", Some("family_search")).await.unwrap(), id);
        assert_eq!(IdentityMap::resolve(store.conn(), "A1", Some("wikitree")).await.unwrap(), id);
        assert_eq!(IdentityMap::resolve(store.conn(), "nope", None).await.unwrap(), "nope");
    }
}
