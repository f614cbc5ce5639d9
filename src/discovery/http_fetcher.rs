//! A simple HTTP-backed `ParentLinkFetcher`, used by the CLI's bulk-discovery command.
//! Mirrors `crawler::HttpFetcher`'s shape: talks to a generic JSON endpoint shaped like
//! the codec's generic record tree, at `<base_url>/<provider>/<external_id>`.

use super::{ParentLinkFetcher, ProviderParentCandidate};
use crate::crawler::fetcher::{is_deleted_signal, FetchError};
use crate::store::entities::parent_edge::ParentRole;
use async_trait::async_trait;
use std::time::Duration;

pub struct HttpParentLinkFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpParentLinkFetcher {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds");
        Self { client, base_url }
    }
}

#[async_trait]
impl ParentLinkFetcher for HttpParentLinkFetcher {
    async fn fetch_parent_candidates(
        &self,
        provider: &str,
        child_external_id: &str,
    ) -> Result<Vec<ProviderParentCandidate>, FetchError> {
        let url = format!("{}/{provider}/{child_external_id}", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(FetchError::Auth(format!("http {status}")));
        }
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(FetchError::Transient(format!("http {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_deleted_signal(&body) {
                return Err(FetchError::Deleted);
            }
            return Err(FetchError::Permanent(format!("http {status}: {body}")));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| FetchError::Permanent(e.to_string()))?;

        let mut candidates = Vec::new();
        for (ext_key, name_key, role) in [
            ("father_external_id", "father_display_name", ParentRole::Father),
            ("mother_external_id", "mother_display_name", ParentRole::Mother),
        ] {
            if let (Some(ext), Some(name)) = (
                json.get(ext_key).and_then(|v| v.as_str()),
                json.get(name_key).and_then(|v| v.as_str()),
            ) {
                candidates.push(ProviderParentCandidate {
                    external_id: ext.to_string(),
                    display_name: name.to_string(),
                    role,
                });
            }
        }
        Ok(candidates)
    }
}
