//! alquran.cloud API client
//!
//! Both endpoints wrap their payload in `{ code, status, data }`.

use crate::error::{Error, Result};
use crate::metadata::MetadataProvider;
use async_trait::async_trait;
use qari_common::models::{Reciter, Surah};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

const USER_AGENT: &str = concat!("qari-ap/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: u16,
    status: String,
    data: T,
}

/// Audio edition as listed by `/edition`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Edition {
    identifier: String,
    english_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

impl From<Edition> for Reciter {
    fn from(edition: Edition) -> Self {
        let has_audio = edition
            .format
            .as_deref()
            .map(|f| f.eq_ignore_ascii_case("audio"))
            .unwrap_or(true);
        Reciter {
            identifier: edition.identifier,
            english_name: edition.english_name,
            name: edition.name,
            has_audio,
            server_base_url: None,
        }
    }
}

/// HTTP metadata provider
pub struct AlQuranClient {
    http_client: reqwest::Client,
    base_url: String,
    surahs: OnceCell<Vec<Surah>>,
}

impl AlQuranClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Metadata(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            surahs: OnceCell::new(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(url = %url, "Querying metadata API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Metadata(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Metadata(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::Metadata(format!("invalid response: {}", e)))?;

        if envelope.code != 200 {
            return Err(Error::Metadata(format!(
                "API returned {} ({})",
                envelope.code, envelope.status
            )));
        }

        Ok(envelope.data)
    }
}

#[async_trait]
impl MetadataProvider for AlQuranClient {
    async fn list_surahs(&self) -> Result<Vec<Surah>> {
        let surahs = self
            .surahs
            .get_or_try_init(|| async {
                let mut surahs: Vec<Surah> = self.get("/surah").await?;
                surahs.sort_by_key(|s| s.number);
                debug!(count = surahs.len(), "Surah list cached");
                Ok::<_, Error>(surahs)
            })
            .await?;
        Ok(surahs.clone())
    }

    async fn list_reciters(&self) -> Result<Vec<Reciter>> {
        let editions: Vec<Edition> = self
            .get("/edition?format=audio&type=versebyverse")
            .await?;
        Ok(editions.into_iter().map(Reciter::from).collect())
    }
}
