//! Reciter catalog and audio URL resolution
//!
//! Holds the merged reciter list: upstream audio editions first, then
//! `[[reciters]]` entries from the TOML file, which replace an upstream
//! entry with the same identifier or add a new one. When the upstream API
//! cannot be reached a small built-in list stands in for it.

use crate::metadata::{AudioUrlResolver, MetadataProvider};
use qari_common::config::ReciterOverride;
use qari_common::models::{Reciter, Surah};
use reqwest::Url;
use std::sync::RwLock;
use tracing::{info, warn};

/// Audio editions known to be served by the default CDN
const BUILTIN_RECITERS: &[(&str, &str)] = &[
    ("ar.alafasy", "Alafasy"),
    ("ar.abdulbasitmurattal", "Abdul Basit"),
    ("ar.husary", "Husary"),
    ("ar.minshawi", "Minshawi"),
    ("ar.mahermuaiqly", "Maher Al Muaiqly"),
    ("ar.abdurrahmaansudais", "Abdurrahmaan As-Sudais"),
];

pub struct ReciterCatalog {
    reciters: RwLock<Vec<Reciter>>,
    overrides: Vec<ReciterOverride>,
    cdn_base_url: String,
    bitrate: u32,
}

impl ReciterCatalog {
    /// Catalog seeded with the built-in list plus overrides
    pub fn new(cdn_base_url: &str, bitrate: u32, overrides: Vec<ReciterOverride>) -> Self {
        let reciters = merge(builtin_reciters(), &overrides);
        Self {
            reciters: RwLock::new(reciters),
            overrides,
            cdn_base_url: cdn_base_url.trim_end_matches('/').to_string(),
            bitrate,
        }
    }

    /// Replace the catalog contents with the provider's reciter list
    ///
    /// On failure the current contents are kept and the error is logged.
    /// Returns the number of reciters in the catalog afterwards.
    pub async fn refresh(&self, provider: &dyn MetadataProvider) -> usize {
        match provider.list_reciters().await {
            Ok(upstream) if !upstream.is_empty() => {
                let merged = merge(upstream, &self.overrides);
                let count = merged.len();
                if let Ok(mut reciters) = self.reciters.write() {
                    *reciters = merged;
                }
                info!(count, "Reciter catalog loaded");
                count
            }
            Ok(_) => {
                warn!("Metadata API returned no reciters, keeping built-in list");
                self.len()
            }
            Err(err) => {
                warn!(error = %err, "Reciter list unavailable, keeping built-in list");
                self.len()
            }
        }
    }

    pub fn list(&self) -> Vec<Reciter> {
        self.reciters
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, identifier: &str) -> Option<Reciter> {
        self.reciters
            .read()
            .ok()?
            .iter()
            .find(|r| r.identifier == identifier)
            .cloned()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    pub fn len(&self) -> usize {
        self.reciters.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AudioUrlResolver for ReciterCatalog {
    fn resolve_audio_url(&self, surah_number: u16, reciter_id: &str) -> Option<Url> {
        if !Surah::is_valid_number(surah_number) {
            return None;
        }
        let reciter = self.get(reciter_id)?;
        if !reciter.has_audio {
            return None;
        }

        let url = match reciter.server_base_url.as_deref() {
            Some(base) => format!("{}/{:03}.mp3", base.trim_end_matches('/'), surah_number),
            None => format!(
                "{}/{}/{}/{}.mp3",
                self.cdn_base_url, self.bitrate, reciter.identifier, surah_number
            ),
        };

        match Url::parse(&url) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(reciter = reciter_id, url = %url, error = %err, "Unparseable audio URL");
                None
            }
        }
    }
}

fn builtin_reciters() -> Vec<Reciter> {
    BUILTIN_RECITERS
        .iter()
        .map(|(identifier, english_name)| Reciter {
            identifier: identifier.to_string(),
            english_name: english_name.to_string(),
            name: None,
            has_audio: true,
            server_base_url: None,
        })
        .collect()
}

fn merge(mut reciters: Vec<Reciter>, overrides: &[ReciterOverride]) -> Vec<Reciter> {
    for entry in overrides {
        let reciter = Reciter {
            identifier: entry.identifier.clone(),
            english_name: entry.english_name.clone(),
            name: None,
            has_audio: entry.has_audio,
            server_base_url: entry.server_base_url.clone(),
        };
        match reciters.iter_mut().find(|r| r.identifier == entry.identifier) {
            Some(existing) => {
                let name = existing.name.take();
                *existing = Reciter { name, ..reciter };
            }
            None => reciters.push(reciter),
        }
    }
    reciters
}
