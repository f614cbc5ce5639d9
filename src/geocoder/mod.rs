//! Geocoder (spec.md §4.7): a serial, globally rate-limited place lookup with a
//! sticky cache, fronted by a single background task owning an `mpsc` FIFO request
//! queue — the teacher's single-writer-through-a-channel idiom, mirrored from how
//! `JobManager` serializes dispatch, guaranteeing one in-flight HTTP call globally
//! regardless of how many callers enqueue concurrently.

use crate::store::entities::{place_geocode::{self, GeocodeStatus}, vital_event};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error(transparent)]
    Store(#[from] crate::store::error::StoreError),
    #[error("geocoder shut down")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct GeocodeResult {
    pub status: GeocodeStatus,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
    display_name: String,
}

struct Request {
    place_text: String,
    reply: oneshot::Sender<Result<GeocodeResult, GeocodeError>>,
}

/// Handle used by callers to enqueue geocode requests; clones share the same
/// underlying FIFO and therefore the same rate limit.
#[derive(Clone)]
pub struct Geocoder {
    tx: mpsc::Sender<Request>,
}

impl Geocoder {
    pub fn spawn(conn: DatabaseConnection, endpoint: String, user_agent: String, min_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run_worker(conn, endpoint, user_agent, min_interval, rx));
        Self { tx }
    }

    /// Normalizes, looks up the cache, and geocodes `place_text` if needed.
    pub async fn geocode(&self, place_text: &str) -> Result<GeocodeResult, GeocodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request {
                place_text: normalize(place_text),
                reply,
            })
            .await
            .map_err(|_| GeocodeError::Closed)?;
        rx.await.map_err(|_| GeocodeError::Closed)?
    }
}

/// Normalizes place text: lowercase, trimmed, internal whitespace collapsed.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn run_worker(
    conn: DatabaseConnection,
    endpoint: String,
    user_agent: String,
    min_interval: Duration,
    mut rx: mpsc::Receiver<Request>,
) {
    let client = reqwest::Client::new();
    let mut last_request = None::<tokio::time::Instant>;

    while let Some(req) = rx.recv().await {
        if let Some(last) = last_request {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
        let result = handle_one(&conn, &client, &endpoint, &user_agent, &req.place_text).await;
        last_request = Some(tokio::time::Instant::now());
        let _ = req.reply.send(result);
    }
}

async fn handle_one(
    conn: &DatabaseConnection,
    client: &reqwest::Client,
    endpoint: &str,
    user_agent: &str,
    place_text: &str,
) -> Result<GeocodeResult, GeocodeError> {
    if let Some(row) = place_geocode::Entity::find_by_id(place_text.to_string()).one(conn).await.map_err(crate::store::error::StoreError::classify)? {
        if matches!(row.geocode_status, GeocodeStatus::Resolved | GeocodeStatus::NotFound) {
            return Ok(GeocodeResult {
                status: row.geocode_status,
                lat: row.lat,
                lng: row.lng,
                display_name: row.display_name,
            });
        }
    }

    upsert_row(conn, place_text, GeocodeStatus::Pending, None, None, None).await?;

    let segments: Vec<&str> = place_text.split(',').map(str::trim).collect();
    let mut broadened = false;
    let mut hit = None;

    let mut start = 0;
    loop {
        let query = segments[start..].join(", ");
        match query_nominatim(client, endpoint, user_agent, &query).await {
            Ok(Some(h)) => {
                hit = Some(h);
                break;
            }
            Ok(None) => {
                if segments.len() - start <= 2 {
                    break;
                }
                broadened = true;
                start += 1;
            }
            Err(GeocodeHttpError::RateLimited) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                match query_nominatim(client, endpoint, user_agent, &query).await {
                    Ok(Some(h)) => {
                        hit = Some(h);
                        break;
                    }
                    _ => break,
                }
            }
            Err(GeocodeHttpError::Other(msg)) => {
                warn!(place_text, error = %msg, "geocode request failed");
                upsert_row(conn, place_text, GeocodeStatus::Error, None, None, None).await?;
                return Ok(GeocodeResult {
                    status: GeocodeStatus::Error,
                    lat: None,
                    lng: None,
                    display_name: None,
                });
            }
        }
    }

    if broadened {
        info!(place_text, "geocode succeeded after progressive broadening");
    }

    match hit {
        Some(h) => {
            let lat: f64 = h.lat.parse().unwrap_or_default();
            let lng: f64 = h.lon.parse().unwrap_or_default();
            upsert_row(conn, place_text, GeocodeStatus::Resolved, Some(lat), Some(lng), Some(h.display_name.clone())).await?;
            Ok(GeocodeResult {
                status: GeocodeStatus::Resolved,
                lat: Some(lat),
                lng: Some(lng),
                display_name: Some(h.display_name),
            })
        }
        None => {
            upsert_row(conn, place_text, GeocodeStatus::NotFound, None, None, None).await?;
            Ok(GeocodeResult {
                status: GeocodeStatus::NotFound,
                lat: None,
                lng: None,
                display_name: None,
            })
        }
    }
}

enum GeocodeHttpError {
    RateLimited,
    Other(String),
}

async fn query_nominatim(
    client: &reqwest::Client,
    endpoint: &str,
    user_agent: &str,
    query: &str,
) -> Result<Option<NominatimHit>, GeocodeHttpError> {
    let response = client
        .get(endpoint)
        .query(&[("q", query), ("format", "json"), ("limit", "1")])
        .header("User-Agent", user_agent)
        .send()
        .await
        .map_err(|e| GeocodeHttpError::Other(e.to_string()))?;

    if response.status().as_u16() == 429 {
        return Err(GeocodeHttpError::RateLimited);
    }
    if !response.status().is_success() {
        return Err(GeocodeHttpError::Other(format!("http {}", response.status())));
    }

    let hits: Vec<NominatimHit> = response.json().await.map_err(|e| GeocodeHttpError::Other(e.to_string()))?;
    Ok(hits.into_iter().next())
}

async fn upsert_row(
    conn: &DatabaseConnection,
    place_text: &str,
    status: GeocodeStatus,
    lat: Option<f64>,
    lng: Option<f64>,
    display_name: Option<String>,
) -> Result<(), GeocodeError> {
    let existing = place_geocode::Entity::find_by_id(place_text.to_string()).one(conn).await.map_err(crate::store::error::StoreError::classify)?;
    let model = place_geocode::ActiveModel {
        place_text: Set(place_text.to_string()),
        lat: Set(lat),
        lng: Set(lng),
        display_name: Set(display_name),
        geocode_status: Set(status),
        geocoded_at: Set(Some(chrono::Utc::now())),
    };
    match existing {
        Some(_) => {
            model.update(conn).await.map_err(crate::store::error::StoreError::classify)?;
        }
        None => {
            model.insert(conn).await.map_err(crate::store::error::StoreError::classify)?;
        }
    }
    Ok(())
}

/// Maintenance operation: resets every `not_found` row to `pending` so progressive
/// broadening can be re-tried after it is improved (spec.md §4.7).
pub async fn reset_not_found(conn: &DatabaseConnection) -> Result<u64, GeocodeError> {
    let rows = place_geocode::Entity::find()
        .filter(place_geocode::Column::GeocodeStatus.eq(GeocodeStatus::NotFound))
        .all(conn)
        .await
        .map_err(crate::store::error::StoreError::classify)?;
    let count = rows.len() as u64;
    for row in rows {
        let mut active: place_geocode::ActiveModel = row.into();
        active.geocode_status = Set(GeocodeStatus::Pending);
        active.update(conn).await.map_err(crate::store::error::StoreError::classify)?;
    }
    Ok(count)
}

/// Registers a `pending` cache row for every distinct vital-event place text not
/// already present in `place_geocode`, so a subsequent batch run has something to
/// process. Returns the number of rows found still pending.
pub async fn enqueue_places_from_events(conn: &DatabaseConnection) -> Result<Vec<String>, GeocodeError> {
    let events = vital_event::Entity::find().all(conn).await.map_err(crate::store::error::StoreError::classify)?;
    let mut seen = std::collections::HashSet::new();
    for event in events {
        let Some(place) = event.place else { continue };
        let normalized = normalize(&place);
        if normalized.is_empty() || !seen.insert(normalized.clone()) {
            continue;
        }
        let exists = place_geocode::Entity::find_by_id(normalized.clone())
            .one(conn)
            .await
            .map_err(crate::store::error::StoreError::classify)?
            .is_some();
        if !exists {
            upsert_row(conn, &normalized, GeocodeStatus::Pending, None, None, None).await?;
        }
    }

    let pending = place_geocode::Entity::find()
        .filter(place_geocode::Column::GeocodeStatus.eq(GeocodeStatus::Pending))
        .all(conn)
        .await
        .map_err(crate::store::error::StoreError::classify)?;
    Ok(pending.into_iter().map(|r| r.place_text).collect())
}

/// Runs every `pending` place text in `place_texts` through `geocoder`, reporting
/// progress via `on_progress` and honoring `is_cancelled` between requests (spec.md
/// §4.7 batched geocoding, §5 suspension point discipline).
pub async fn run_batch(
    geocoder: &Geocoder,
    place_texts: &[String],
    mut on_progress: impl FnMut(u64, u64),
    mut is_cancelled: impl FnMut() -> bool,
) -> Result<u64, GeocodeError> {
    let mut done = 0u64;
    for place_text in place_texts {
        if is_cancelled() {
            break;
        }
        geocoder.geocode(place_text).await?;
        done += 1;
        on_progress(done, place_texts.len() as u64);
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize("  Brittany,   FRANCE "), "brittany, france");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("Brittany,  France");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }
}
