//! Surah and reciter metadata
//!
//! [`MetadataProvider`] fetches reference data from the upstream API.
//! [`AudioUrlResolver`] maps `(surah, reciter)` to a stream URL and is the
//! only metadata the playback controller depends on.

pub mod catalog;
pub mod client;

pub use catalog::ReciterCatalog;
pub use client::AlQuranClient;

use crate::Result;
use async_trait::async_trait;
use qari_common::models::{Reciter, Surah};
use reqwest::Url;

/// Source of surah and reciter listings
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// All 114 surahs, ordered by number
    async fn list_surahs(&self) -> Result<Vec<Surah>>;

    /// Reciters offering per-surah audio
    async fn list_reciters(&self) -> Result<Vec<Reciter>>;

    /// One surah by number; `None` when out of range
    async fn surah(&self, number: u16) -> Result<Option<Surah>> {
        if !Surah::is_valid_number(number) {
            return Ok(None);
        }
        let surahs = self.list_surahs().await?;
        Ok(surahs.into_iter().find(|s| s.number == number))
    }
}

/// Maps a surah and reciter to a playable URL
///
/// Must be deterministic for a given pair. `None` means the reciter cannot
/// play this surah, and the engine is never asked to try.
pub trait AudioUrlResolver: Send + Sync {
    fn resolve_audio_url(&self, surah_number: u16, reciter_id: &str) -> Option<Url>;
}
