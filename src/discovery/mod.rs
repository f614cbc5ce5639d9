//! Discovery (spec.md §4.8): parent-linkage-gap detection plus cross-provider
//! fuzzy-name matching.

pub mod http_fetcher;

pub use http_fetcher::HttpParentLinkFetcher;

use crate::identity::IdentityMap;
use crate::store::entities::{database_membership, external_identity, parent_edge, person};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct LinkageGap {
    pub person_id: String,
    pub child_id: String,
    pub role: parent_edge::ParentRole,
}

/// Finds persons in `db_id` whose children are linked to `target_provider` but whose
/// own link under that provider is missing.
pub async fn find_linkage_gaps<C: ConnectionTrait>(
    conn: &C,
    db_id: &str,
    target_provider: &str,
) -> crate::store::error::StoreResult<Vec<LinkageGap>> {
    let members = database_membership::Entity::find()
        .filter(database_membership::Column::DbId.eq(db_id))
        .all(conn)
        .await?;

    let mut gaps = Vec::new();
    for member in &members {
        let edges = parent_edge::Entity::find()
            .filter(parent_edge::Column::ChildId.eq(&member.person_id))
            .all(conn)
            .await?;
        for edge in edges {
            let child_has_link = external_identity::Entity::find()
                .filter(external_identity::Column::PersonId.eq(&member.person_id))
                .filter(external_identity::Column::Source.eq(target_provider))
                .one(conn)
                .await?
                .is_some();
            if !child_has_link {
                continue;
            }
            let parent_has_link = external_identity::Entity::find()
                .filter(external_identity::Column::PersonId.eq(&edge.parent_id))
                .filter(external_identity::Column::Source.eq(target_provider))
                .one(conn)
                .await?
                .is_some();
            if !parent_has_link {
                gaps.push(LinkageGap {
                    person_id: edge.parent_id,
                    child_id: member.person_id.clone(),
                    role: edge.parent_role,
                });
            }
        }
    }
    Ok(gaps)
}

/// A candidate provider-parent record scraped from the child's provider page, to be
/// matched fuzzily against the local parent record.
#[derive(Debug, Clone)]
pub struct ProviderParentCandidate {
    pub external_id: String,
    pub display_name: String,
    pub role: parent_edge::ParentRole,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchConfidence {
    NameMatch,
    RoleOnly,
}

impl MatchConfidence {
    pub fn value(self) -> f64 {
        match self {
            MatchConfidence::NameMatch => 1.0,
            MatchConfidence::RoleOnly => 0.7,
        }
    }
}

/// Attempts to confirm `candidate` as the external identity of `gap`'s local parent
/// record. A match is confirmed when role agrees and a fuzzy name match agrees (1.0),
/// or when only the role agrees (0.7) — spec.md §4.8.
pub async fn match_candidate<C: ConnectionTrait>(
    conn: &C,
    gap: &LinkageGap,
    candidate: &ProviderParentCandidate,
) -> crate::store::error::StoreResult<Option<MatchConfidence>> {
    if candidate.role != gap.role {
        return Ok(None);
    }
    let local = person::Entity::find_by_id(gap.person_id.clone())
        .one(conn)
        .await?
        .ok_or_else(|| crate::store::error::StoreError::NotFound(gap.person_id.clone()))?;

    if fuzzy_name_match(&local.display_name, &candidate.display_name) {
        Ok(Some(MatchConfidence::NameMatch))
    } else {
        Ok(Some(MatchConfidence::RoleOnly))
    }
}

/// Registers `candidate` as an external identity for `gap`'s local parent at the given
/// confidence.
pub async fn register_match<C: ConnectionTrait>(
    conn: &C,
    gap: &LinkageGap,
    target_provider: &str,
    candidate: &ProviderParentCandidate,
    confidence: MatchConfidence,
) -> crate::store::error::StoreResult<()> {
    IdentityMap::register(conn, &gap.person_id, target_provider, &candidate.external_id, None, confidence.value()).await?;
    info!(
        person_id = %gap.person_id,
        external_id = %candidate.external_id,
        confidence = confidence.value(),
        "discovery registered cross-provider identity"
    );
    Ok(())
}

/// Scrapes a child's provider page for the external IDs of its parents, so a linkage
/// gap can be resolved without the codec having run (spec.md §4.8). Same object-safe,
/// swappable-implementation discipline as the crawler's `Fetcher` port.
#[async_trait]
pub trait ParentLinkFetcher: Send + Sync {
    async fn fetch_parent_candidates(
        &self,
        provider: &str,
        child_external_id: &str,
    ) -> Result<Vec<ProviderParentCandidate>, crate::crawler::FetchError>;
}

#[derive(Debug, Default, Clone)]
pub struct BulkDiscoveryStats {
    pub gaps_found: u64,
    pub resolved: u64,
    pub unresolved: u64,
    pub errors: u64,
}

/// Bulk mode (spec.md §4.8): iterates every linkage gap in `db_id` for
/// `target_provider`, rate-limited by `delay`, as a cancellable operation. Checks
/// `is_cancelled` between gaps (a suspension point per spec.md §5).
pub async fn run_bulk<C: ConnectionTrait>(
    conn: &C,
    db_id: &str,
    target_provider: &str,
    fetcher: &dyn ParentLinkFetcher,
    delay: crate::config::DelayRange,
    mut on_progress: impl FnMut(u64, u64),
    mut is_cancelled: impl FnMut() -> bool,
) -> crate::store::error::StoreResult<BulkDiscoveryStats> {
    let gaps = find_linkage_gaps(conn, db_id, target_provider).await?;
    let mut stats = BulkDiscoveryStats {
        gaps_found: gaps.len() as u64,
        ..Default::default()
    };

    for (i, gap) in gaps.iter().enumerate() {
        if is_cancelled() {
            break;
        }

        let candidates = match fetcher.fetch_parent_candidates(target_provider, &gap.child_id).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(person_id = %gap.person_id, error = %e, "discovery scrape failed, skipping gap");
                stats.errors += 1;
                continue;
            }
        };

        let mut matched = false;
        for candidate in &candidates {
            if let Some(confidence) = match_candidate(conn, gap, candidate).await? {
                register_match(conn, gap, target_provider, candidate, confidence).await?;
                matched = true;
                break;
            }
        }
        if matched {
            stats.resolved += 1;
        } else {
            stats.unresolved += 1;
        }

        on_progress(i as u64 + 1, stats.gaps_found);

        if i + 1 < gaps.len() {
            let sleep_ms = crate::crawler::rand_between(delay.min_ms, delay.max_ms);
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
    }

    info!(
        gaps = stats.gaps_found,
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        "bulk discovery finished"
    );
    Ok(stats)
}

/// Case-insensitive, accent-stripped fuzzy match: containment OR last-name equality
/// with length > 2 (spec.md §4.8).
pub fn fuzzy_name_match(a: &str, b: &str) -> bool {
    let a = fold(a);
    let b = fold(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.contains(&b) || b.contains(&a) {
        return true;
    }
    let last_a = a.split_whitespace().last().unwrap_or("");
    let last_b = b.split_whitespace().last().unwrap_or("");
    last_a.len() > 2 && last_a == last_b
}

fn fold(s: &str) -> String {
    strip_accents(s).to_lowercase()
}

fn strip_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_match_ignores_accents_and_case() {
        assert!(fuzzy_name_match("Jean Dupont", "JEAN DUPONT"));
        assert!(fuzzy_name_match("Renee Dubois", "Renée Dubois"));
    }

    #[test]
    fn fuzzy_match_on_last_name_equality() {
        assert!(fuzzy_name_match("Jean-Marc Dupont", "Marie Dupont"));
    }

    #[test]
    fn fuzzy_match_rejects_short_last_names() {
        assert!(!fuzzy_name_match("A Li", "B Li"));
    }

    #[test]
    fn fuzzy_match_rejects_unrelated_names() {
        assert!(!fuzzy_name_match("Jean Dupont", "Marie Lefevre"));
    }

    struct FakeParentLinkFetcher {
        candidates: Vec<ProviderParentCandidate>,
    }

    #[async_trait]
    impl ParentLinkFetcher for FakeParentLinkFetcher {
        async fn fetch_parent_candidates(
            &self,
            _provider: &str,
            _child_external_id: &str,
        ) -> Result<Vec<ProviderParentCandidate>, crate::crawler::FetchError> {
            Ok(self.candidates.clone())
        }
    }

    /// A child already linked to the target provider, whose father is not, with a
    /// scraped candidate whose name fuzzily matches the local father record. Bulk
    /// discovery should find the gap and register the match at full confidence.
    #[tokio::test]
    async fn run_bulk_resolves_a_linkage_gap_by_name_match() {
        use crate::store::entities::{database_info, database_membership, external_identity};
        use sea_orm::{ActiveModelTrait, ActiveValue::Set};

        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::Store::create(&dir.path().join("t.db"), dir.path().join("blobs")).await.unwrap();
        let conn = store.conn();

        store.create_person("child", "Child Person").await.unwrap();
        store.create_person("father", "Jean Dupont").await.unwrap();

        database_info::ActiveModel {
            db_id: Set("db1".to_string()),
            name: Set("db1".to_string()),
            root_id: Set("child".to_string()),
            max_generations: Set(None),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(conn)
        .await
        .unwrap();

        parent_edge::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            child_id: Set("child".to_string()),
            parent_id: Set("father".to_string()),
            parent_role: Set(parent_edge::ParentRole::Father),
            source: Set("family_search".to_string()),
        }
        .insert(conn)
        .await
        .unwrap();

        database_membership::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            db_id: Set("db1".to_string()),
            person_id: Set("child".to_string()),
            is_root: Set(false),
            generation: Set(1),
        }
        .insert(conn)
        .await
        .unwrap();

        external_identity::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            person_id: Set("child".to_string()),
            source: Set("ancestry".to_string()),
            external_id: Set("A-child".to_string()),
            url: Set(None),
            confidence: Set(1.0),
            registered_at: Set(chrono::Utc::now()),
        }
        .insert(conn)
        .await
        .unwrap();

        let fetcher = FakeParentLinkFetcher {
            candidates: vec![ProviderParentCandidate {
                external_id: "A-father".to_string(),
                display_name: "JEAN DUPONT".to_string(),
                role: parent_edge::ParentRole::Father,
            }],
        };

        let stats = run_bulk(
            conn,
            "db1",
            "ancestry",
            &fetcher,
            crate::config::DelayRange { min_ms: 0, max_ms: 0 },
            |_, _| {},
            || false,
        )
        .await
        .unwrap();

        assert_eq!(stats.gaps_found, 1);
        assert_eq!(stats.resolved, 1);

        let registered = IdentityMap::get_external(conn, "father", "ancestry").await.unwrap();
        assert_eq!(registered.as_deref(), Some("A-father"));
    }
}
