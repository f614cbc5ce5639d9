//! Graph Algorithms (spec.md §4.5).
//!
//! All traversals are iterative with an explicit visited set — recursion is forbidden
//! so arbitrarily deep pedigrees and cycles (mis-linked provider data) are tolerated,
//! matching the teacher's iterative-BFS discipline in its indexing-phase walkers.

use crate::store::entities::parent_edge;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::{HashMap, HashSet, VecDeque};

pub type StoreResult<T> = crate::store::error::StoreResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPolicy {
    Shortest,
    Longest,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lineage {
    Paternal,
    Maternal,
    SelfNode,
}

/// `{id -> (parent_in_path, depth)}` for every ancestor reachable from `start`.
/// `parent_in_path` is the node through which this ancestor was first reached (BFS —
/// first reached is shortest reached).
pub type AncestryMap = HashMap<String, (Option<String>, u32)>;

async fn parents_of<C: ConnectionTrait>(conn: &C, child_id: &str) -> StoreResult<Vec<(String, parent_edge::ParentRole)>> {
    let rows = parent_edge::Entity::find()
        .filter(parent_edge::Column::ChildId.eq(child_id))
        .all(conn)
        .await?;
    let mut out: Vec<_> = rows.into_iter().map(|r| (r.parent_id, r.parent_role)).collect();
    // Father before mother (spec.md §4.4 ordering, reused here for deterministic BFS).
    out.sort_by_key(|(_, role)| match role {
        parent_edge::ParentRole::Father => 0,
        parent_edge::ParentRole::Mother => 1,
        parent_edge::ParentRole::Parent => 2,
    });
    Ok(out)
}

async fn children_of<C: ConnectionTrait>(conn: &C, parent_id: &str) -> StoreResult<Vec<String>> {
    let rows = parent_edge::Entity::find()
        .filter(parent_edge::Column::ParentId.eq(parent_id))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.child_id).collect())
}

/// BFS through `parent_edge` child->parent, up to `max_depth`. Cycle-tolerant via an
/// explicit visited set.
pub async fn ancestors<C: ConnectionTrait>(conn: &C, start: &str, max_depth: u32) -> StoreResult<Vec<(String, u32)>> {
    walk(conn, start, max_depth, true).await
}

/// BFS through `parent_edge` parent->child, up to `max_depth`.
pub async fn descendants<C: ConnectionTrait>(conn: &C, start: &str, max_depth: u32) -> StoreResult<Vec<(String, u32)>> {
    walk(conn, start, max_depth, false).await
}

async fn walk<C: ConnectionTrait>(conn: &C, start: &str, max_depth: u32, up: bool) -> StoreResult<Vec<(String, u32)>> {
    let mut visited = HashSet::new();
    visited.insert(start.to_string());
    let mut queue = VecDeque::new();
    queue.push_back((start.to_string(), 0u32));
    let mut out = Vec::new();

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let neighbors = if up {
            parents_of(conn, &id).await?.into_iter().map(|(p, _)| p).collect::<Vec<_>>()
        } else {
            children_of(conn, &id).await?
        };
        for next in neighbors {
            if visited.insert(next.clone()) {
                out.push((next.clone(), depth + 1));
                queue.push_back((next, depth + 1));
            }
        }
    }
    Ok(out)
}

/// Builds `{id -> (parent_in_path, depth)}` for every ancestor reachable from `start`,
/// via BFS through parent edges (cycle-tolerant).
pub async fn ancestry_map<C: ConnectionTrait>(conn: &C, start: &str) -> StoreResult<AncestryMap> {
    let mut map: AncestryMap = HashMap::new();
    map.insert(start.to_string(), (None, 0));
    let mut queue = VecDeque::new();
    queue.push_back(start.to_string());

    while let Some(id) = queue.pop_front() {
        let depth = map.get(&id).map(|(_, d)| *d).unwrap_or(0);
        for (parent, _role) in parents_of(conn, &id).await? {
            if !map.contains_key(&parent) {
                map.insert(parent.clone(), (Some(id.clone()), depth + 1));
                queue.push_back(parent);
            }
        }
    }
    Ok(map)
}

#[derive(Debug, Clone)]
pub struct PathResult {
    pub common_ancestor: String,
    pub path: Vec<String>,
    pub length: u32,
}

/// Finds a path between `a` and `b` via a common ancestor, per `policy` (spec.md §4.5).
pub async fn find_path<C: ConnectionTrait>(
    conn: &C,
    a: &str,
    b: &str,
    policy: PathPolicy,
) -> StoreResult<Option<PathResult>> {
    let map_a = ancestry_map(conn, a).await?;
    let map_b = ancestry_map(conn, b).await?;

    let mut candidates: Vec<(String, u32)> = map_a
        .keys()
        .filter(|k| map_b.contains_key(*k))
        .map(|k| {
            let depth_a = map_a[k].1;
            let depth_b = map_b[k].1;
            (k.clone(), depth_a + depth_b)
        })
        .collect();

    if candidates.is_empty() {
        return Ok(None);
    }

    let chosen = match policy {
        PathPolicy::Shortest => candidates.iter().min_by_key(|(_, d)| *d).cloned(),
        PathPolicy::Longest => candidates.iter().max_by_key(|(_, d)| *d).cloned(),
        PathPolicy::Random => {
            use rand::Rng;
            let idx = rand::thread_rng().gen_range(0..candidates.len());
            candidates.drain(idx..=idx).next()
        }
    };
    let (ancestor, total_depth) = chosen.expect("candidates non-empty");

    let mut side_a = reconstruct(&map_a, &ancestor); // [ancestor, ..., a]
    side_a.reverse(); // [a, ..., ancestor]
    let mut side_b = reconstruct(&map_b, &ancestor); // [ancestor, ..., b]
    side_b.remove(0); // drop the duplicated common ancestor before joining.
    let mut path = side_a;
    path.append(&mut side_b);

    Ok(Some(PathResult {
        common_ancestor: ancestor,
        path,
        length: total_depth,
    }))
}

/// Walks `parent_in_path` from `ancestor` back down to the map's start, capping
/// iterations to guard against a malformed map (spec.md §4.5: cap at 10 000).
fn reconstruct(map: &AncestryMap, ancestor: &str) -> Vec<String> {
    const MAX_ITERATIONS: usize = 10_000;
    let mut out = vec![ancestor.to_string()];
    let mut seen = HashSet::new();
    seen.insert(ancestor.to_string());
    let mut current = ancestor.to_string();

    for _ in 0..MAX_ITERATIONS {
        let Some((Some(next), _)) = map.get(&current) else { break };
        if !seen.insert(next.clone()) {
            break;
        }
        out.push(next.clone());
        current = next.clone();
    }
    out
}

#[derive(Debug, Clone)]
pub struct SparseNode {
    pub person_id: String,
    pub generation_from_root: u32,
    pub lineage_from_parent: Lineage,
    pub generations_skipped: u32,
    pub children: Vec<SparseNode>,
}

/// Sparse tree over a favorites set (spec.md §4.5): the tree rooted at `root`
/// containing exactly the union of the favorites, the root, and every ancestor on a
/// path from the root to a favorite, with other nodes collapsed.
pub async fn sparse_tree<C: ConnectionTrait>(conn: &C, root: &str, favorites: &[String]) -> StoreResult<SparseNode> {
    let descendant_map = ancestry_map_reversed(conn, root).await?;

    let mut kept: HashSet<String> = HashSet::new();
    kept.insert(root.to_string());
    for fav in favorites {
        if let Some(chain) = shortest_chain_from_root(&descendant_map, root, fav) {
            kept.extend(chain);
        }
    }

    build_sparse_node(conn, &descendant_map, root.to_string(), 0, Lineage::SelfNode, 0, &kept).await
}

/// Searches the real `parent_edge` rows — not the single first-discovered pointer
/// recorded in `map` — for an alternate route from `start` up to `target`, excluding
/// the direct edge `start -> exclude`. A kept-to-kept edge in the map can itself be a
/// data shortcut spanning several real generations (a provider recording a distant
/// ancestor as a direct parent); when an alternate, longer real chain between the same
/// two endpoints exists, its hop count is the number of generations that edge elides.
async fn detour_length<C: ConnectionTrait>(conn: &C, start: &str, exclude: &str, target: &str) -> StoreResult<Option<u32>> {
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.to_string());
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();
    for (parent, _role) in parents_of(conn, start).await? {
        if parent == exclude {
            continue;
        }
        if visited.insert(parent.clone()) {
            queue.push_back((parent, 1));
        }
    }

    while let Some((id, depth)) = queue.pop_front() {
        if id == target {
            return Ok(Some(depth));
        }
        for (parent, _role) in parents_of(conn, &id).await? {
            if visited.insert(parent.clone()) {
                queue.push_back((parent, depth + 1));
            }
        }
    }
    Ok(None)
}

/// Like `ancestry_map` but walked from the root downward (parent->child), used to find
/// root-to-favorite chains for the sparse tree. Keyed by child id -> (parent, depth,
/// lineage-from-that-parent).
async fn ancestry_map_reversed<C: ConnectionTrait>(
    conn: &C,
    root: &str,
) -> StoreResult<HashMap<String, (Option<(String, Lineage)>, u32)>> {
    let mut map: HashMap<String, (Option<(String, Lineage)>, u32)> = HashMap::new();
    map.insert(root.to_string(), (None, 0));
    let mut queue = VecDeque::new();
    queue.push_back(root.to_string());

    while let Some(id) = queue.pop_front() {
        let depth = map.get(&id).map(|(_, d)| *d).unwrap_or(0);
        let rows = parent_edge::Entity::find()
            .filter(parent_edge::Column::ParentId.eq(&id))
            .all(conn)
            .await?;
        for row in rows {
            let lineage = match row.parent_role {
                parent_edge::ParentRole::Father => Lineage::Paternal,
                parent_edge::ParentRole::Mother => Lineage::Maternal,
                parent_edge::ParentRole::Parent => Lineage::SelfNode,
            };
            if !map.contains_key(&row.child_id) {
                map.insert(row.child_id.clone(), (Some((id.clone(), lineage)), depth + 1));
                queue.push_back(row.child_id);
            }
        }
    }
    Ok(map)
}

fn shortest_chain_from_root(
    map: &HashMap<String, (Option<(String, Lineage)>, u32)>,
    root: &str,
    target: &str,
) -> Option<Vec<String>> {
    let mut chain = vec![target.to_string()];
    let mut current = target.to_string();
    while current != root {
        let (parent, _) = map.get(&current)?;
        let (parent_id, _) = parent.clone()?;
        chain.push(parent_id.clone());
        current = parent_id;
    }
    Some(chain)
}

fn build_sparse_node<'a, C: ConnectionTrait>(
    conn: &'a C,
    map: &'a HashMap<String, (Option<(String, Lineage)>, u32)>,
    id: String,
    generation_from_root: u32,
    lineage: Lineage,
    generations_skipped: u32,
    kept: &'a HashSet<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = StoreResult<SparseNode>> + 'a>> {
    Box::pin(async move {
        // Find kept descendants reachable from `id`, collapsing unkept intermediates.
        let mut children = Vec::new();
        for (candidate, (parent, depth)) in map {
            if !kept.contains(candidate) || *candidate == id {
                continue;
            }
            // Walk up from candidate until hitting `id` or another kept node.
            let mut cursor = candidate.clone();
            let mut skipped = 0u32;
            let mut first_lineage = None;
            loop {
                let Some((p, (parent_of_cursor, _))) = map.get(&cursor).map(|v| (cursor.clone(), v.clone())) else { break };
                let _ = p;
                let Some((pid, lin)) = parent_of_cursor else { break };
                if first_lineage.is_none() {
                    first_lineage = Some(lin);
                }
                if pid == id {
                    let detour = detour_length(conn, &cursor, &id, &id).await?;
                    let total_skipped = skipped.max(detour.unwrap_or(0));
                    children.push((candidate.clone(), total_skipped, first_lineage.unwrap_or(Lineage::SelfNode)));
                    break;
                }
                if kept.contains(&pid) {
                    break; // belongs to a different branch point.
                }
                skipped += 1;
                cursor = pid;
            }
            let _ = (parent, depth);
        }

        let mut child_nodes = Vec::with_capacity(children.len());
        for (child_id, skipped, lin) in children {
            let node = build_sparse_node(conn, map, child_id, generation_from_root + skipped + 1, lin, skipped, kept).await?;
            child_nodes.push(node);
        }

        Ok(SparseNode {
            person_id: id,
            generation_from_root,
            lineage_from_parent: lineage,
            generations_skipped,
            children: child_nodes,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::entities::parent_edge as pe;
    use crate::store::Store;
    use sea_orm::{ActiveModelTrait, ActiveValue::Set};

    async fn link(store: &Store, child: &str, parent: &str, role: pe::ParentRole) {
        pe::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            child_id: Set(child.to_string()),
            parent_id: Set(parent.to_string()),
            parent_role: Set(role),
            source: Set("test".to_string()),
        }
        .insert(store.conn())
        .await
        .unwrap();
    }

    async fn make_store() -> Store {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("t.db"), dir.path().join("blobs")).await.unwrap();
        std::mem::forget(dir);
        store
    }

    #[tokio::test]
    async fn ancestor_enumeration_terminates_on_cycle() {
        let store = make_store().await;
        for p in ["A", "B"] {
            store.create_person(p, p).await.unwrap();
        }
        link(&store, "A", "B", pe::ParentRole::Father).await;
        link(&store, "B", "A", pe::ParentRole::Father).await;

        let result = ancestors(store.conn(), "A", 100).await.unwrap();
        let ids: HashSet<_> = result.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids, HashSet::from(["B".to_string()]));
    }

    #[tokio::test]
    async fn zero_parents_yields_empty_ancestor_set() {
        let store = make_store().await;
        store.create_person("A", "A").await.unwrap();
        let result = ancestors(store.conn(), "A", 10).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn shortest_path_via_common_ancestor() {
        let store = make_store().await;
        for p in ["A", "B", "C", "D"] {
            store.create_person(p, p).await.unwrap();
        }
        link(&store, "A", "B", pe::ParentRole::Father).await;
        link(&store, "B", "C", pe::ParentRole::Father).await;
        link(&store, "D", "B", pe::ParentRole::Father).await;

        let result = find_path(store.conn(), "A", "D", PathPolicy::Shortest).await.unwrap().unwrap();
        assert_eq!(result.common_ancestor, "B");
        assert_eq!(result.length, 2);
        assert_eq!(result.path, vec!["A".to_string(), "B".to_string(), "D".to_string()]);
    }

    /// spec.md §8 scenario 3: with only one common ancestor, `longest` agrees with
    /// `shortest`; adding a second, more distant common ancestor (E) makes `longest`
    /// pick it instead.
    #[tokio::test]
    async fn longest_path_prefers_more_distant_common_ancestor() {
        let store = make_store().await;
        for p in ["A", "B", "D", "X", "Y", "E"] {
            store.create_person(p, p).await.unwrap();
        }
        link(&store, "A", "B", pe::ParentRole::Father).await;
        link(&store, "D", "B", pe::ParentRole::Father).await;

        let only_b = find_path(store.conn(), "A", "D", PathPolicy::Longest).await.unwrap().unwrap();
        assert_eq!(only_b.common_ancestor, "B");
        assert_eq!(only_b.length, 2);

        // A separate, longer lineage to E runs through X and Y — not through B — so E
        // becomes a second, more distant common ancestor.
        link(&store, "A", "X", pe::ParentRole::Mother).await;
        link(&store, "X", "E", pe::ParentRole::Father).await;
        link(&store, "D", "Y", pe::ParentRole::Mother).await;
        link(&store, "Y", "E", pe::ParentRole::Father).await;

        let longest = find_path(store.conn(), "A", "D", PathPolicy::Longest).await.unwrap().unwrap();
        assert_eq!(longest.common_ancestor, "E");
        assert_eq!(longest.length, 4);
        assert_eq!(
            longest.path,
            vec!["A".to_string(), "X".to_string(), "E".to_string(), "Y".to_string(), "D".to_string()]
        );

        let shortest = find_path(store.conn(), "A", "D", PathPolicy::Shortest).await.unwrap().unwrap();
        assert_eq!(shortest.common_ancestor, "B");
        assert!(shortest.length <= longest.length);
    }

    /// spec.md §8 scenario 4: a database root R with favorites F1 (direct descent
    /// through P1 -> P2) and F2 (through P1 -> P2 -> P3 -> P4). The sparse tree keeps
    /// only R, P1, P2, F1, P3, P4, F2 with zero skipped generations on every edge.
    #[tokio::test]
    async fn sparse_tree_collapses_non_favorite_ancestors() {
        let store = make_store().await;
        for p in ["R", "P1", "P2", "F1", "P3", "P4", "F2"] {
            store.create_person(p, p).await.unwrap();
        }
        link(&store, "P1", "R", pe::ParentRole::Father).await;
        link(&store, "P2", "P1", pe::ParentRole::Father).await;
        link(&store, "F1", "P2", pe::ParentRole::Father).await;
        link(&store, "P3", "P2", pe::ParentRole::Mother).await;
        link(&store, "P4", "P3", pe::ParentRole::Father).await;
        link(&store, "F2", "P4", pe::ParentRole::Father).await;

        let tree = sparse_tree(store.conn(), "R", &["F1".to_string(), "F2".to_string()]).await.unwrap();
        assert_eq!(tree.person_id, "R");
        assert_eq!(tree.generations_skipped, 0);
        assert_eq!(tree.children.len(), 1);

        let p1 = &tree.children[0];
        assert_eq!(p1.person_id, "P1");
        assert_eq!(p1.generations_skipped, 0);

        let p2 = &p1.children[0];
        assert_eq!(p2.person_id, "P2");

        let mut grandchildren: Vec<&str> = p2.children.iter().map(|c| c.person_id.as_str()).collect();
        grandchildren.sort();
        assert_eq!(grandchildren, vec!["F1", "P3"]);
        for child in &p2.children {
            assert_eq!(child.generations_skipped, 0);
        }

        let p3 = p2.children.iter().find(|c| c.person_id == "P3").unwrap();
        let p4 = &p3.children[0];
        assert_eq!(p4.person_id, "P4");
        assert_eq!(p4.generations_skipped, 0);
        let f2 = &p4.children[0];
        assert_eq!(f2.person_id, "F2");
    }

    /// spec.md §8 boundary: zero favorites returns just the root with no children.
    #[tokio::test]
    async fn sparse_tree_with_no_favorites_returns_only_root() {
        let store = make_store().await;
        store.create_person("R", "R").await.unwrap();
        let tree = sparse_tree(store.conn(), "R", &[]).await.unwrap();
        assert_eq!(tree.person_id, "R");
        assert_eq!(tree.generations_skipped, 0);
        assert!(tree.children.is_empty());
    }

    /// spec.md §8 scenario 4's shortcut case: F1 descends from R through a normal
    /// two-generation chain (R -> P1 -> P2 -> F1) but also carries a second, direct
    /// `parent_edge` row straight from F1 to R (a provider recording a distant
    /// ancestor as if it were an immediate parent). The sparse tree keeps the direct
    /// edge but reports the elided real generations on it.
    #[tokio::test]
    async fn sparse_tree_reports_generations_skipped_on_a_direct_shortcut_edge() {
        let store = make_store().await;
        for p in ["R", "P1", "P2", "F1"] {
            store.create_person(p, p).await.unwrap();
        }
        link(&store, "P1", "R", pe::ParentRole::Father).await;
        link(&store, "P2", "P1", pe::ParentRole::Father).await;
        link(&store, "F1", "P2", pe::ParentRole::Father).await;
        // The shortcut: F1 also linked directly to R, skipping P1 and P2.
        link(&store, "F1", "R", pe::ParentRole::Mother).await;

        let tree = sparse_tree(store.conn(), "R", &["F1".to_string()]).await.unwrap();
        assert_eq!(tree.person_id, "R");
        assert_eq!(tree.children.len(), 1);

        let f1 = &tree.children[0];
        assert_eq!(f1.person_id, "F1");
        assert_eq!(f1.generation_from_root, 4);
        assert_eq!(f1.generations_skipped, 3);
    }
}
