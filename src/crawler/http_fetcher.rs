//! A simple HTTP-backed `Fetcher` implementation, used by the CLI. Real
//! provider scraping (browser automation, auth flows) is an external collaborator per
//! spec.md §1; this talks to a generic JSON endpoint shaped like the codec's generic
//! record tree, at `<base_url>/<provider>/<external_id>`.

use super::fetcher::{is_deleted_signal, FetchError, Fetcher, RawRecord};
use async_trait::async_trait;
use std::time::Duration;

pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds");
        Self { client, base_url }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, provider: &str, external_id: &str) -> Result<RawRecord, FetchError> {
        let url = format!("{}/{provider}/{external_id}", self.base_url.trim_end_matches('/'));
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
        if let Some(message) = json.get("error").and_then(|v| v.as_str()) {
            if is_deleted_signal(message) {
                return Err(FetchError::Deleted);
            }
            return Err(FetchError::Permanent(message.to_string()));
        }

        Ok(RawRecord {
            father_external_id: json.get("father_external_id").and_then(|v| v.as_str()).map(str::to_string),
            mother_external_id: json.get("mother_external_id").and_then(|v| v.as_str()).map(str::to_string),
            json,
        })
    }
}
