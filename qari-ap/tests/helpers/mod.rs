//! Shared fixtures for qari-ap integration tests
//!
//! - `MockEngine`: records every engine call and tracks live handles
//! - `FakeMetadata`: in-memory surah and reciter listings
//! - `memory_pool`: in-memory SQLite with the settings table

#![allow(dead_code)]

use async_trait::async_trait;
use qari_ap::metadata::{MetadataProvider, ReciterCatalog};
use qari_ap::playback::{EngineError, EngineEvent, EngineEventKind, EngineHandle, PlaybackEngine, StatusUpdate};
use qari_ap::{Error, Result};
use qari_common::config::ReciterOverride;
use qari_common::models::{Reciter, Surah, SURAH_COUNT};
use reqwest::Url;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

pub const ALAFASY: &str = "ar.alafasy";
pub const HUSARY: &str = "ar.husary";
/// Present in the catalog but without audio
pub const TEXT_ONLY: &str = "en.sahih";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create(String),
    Play(u64),
    Pause(u64),
    Stop(u64),
    Seek(u64, u64),
    Release(u64),
}

#[derive(Debug, Default)]
struct MockLog {
    calls: Vec<EngineCall>,
    live: BTreeSet<u64>,
    max_live: usize,
    next: u64,
    fail_create: Option<EngineError>,
    fail_play: Option<EngineError>,
}

/// Engine double; clones share one log
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    log: Arc<Mutex<MockLog>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Create(_)))
            .count()
    }

    pub fn live_handles(&self) -> Vec<u64> {
        self.log.lock().unwrap().live.iter().copied().collect()
    }

    /// Highest number of simultaneously live handles ever observed
    pub fn max_live(&self) -> usize {
        self.log.lock().unwrap().max_live
    }

    pub fn fail_next_create(&self, err: EngineError) {
        self.log.lock().unwrap().fail_create = Some(err);
    }

    pub fn fail_next_play(&self, err: EngineError) {
        self.log.lock().unwrap().fail_play = Some(err);
    }

    /// Handle returned by the most recent successful create
    pub fn last_handle(&self) -> EngineHandle {
        EngineHandle(self.log.lock().unwrap().next)
    }

    fn record(&self, call: EngineCall) -> std::sync::MutexGuard<'_, MockLog> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(call);
        log
    }

    fn check_live(log: &MockLog, handle: EngineHandle) -> std::result::Result<(), EngineError> {
        if log.live.contains(&handle.0) {
            Ok(())
        } else {
            Err(EngineError::Failure(format!("unknown handle {}", handle)))
        }
    }
}

impl PlaybackEngine for MockEngine {
    fn create(&mut self, url: &Url) -> std::result::Result<EngineHandle, EngineError> {
        let mut log = self.record(EngineCall::Create(url.to_string()));
        if let Some(err) = log.fail_create.take() {
            return Err(err);
        }
        log.next += 1;
        let handle = log.next;
        log.live.insert(handle);
        log.max_live = log.max_live.max(log.live.len());
        Ok(EngineHandle(handle))
    }

    fn play(&mut self, handle: EngineHandle) -> std::result::Result<(), EngineError> {
        let mut log = self.record(EngineCall::Play(handle.0));
        if let Some(err) = log.fail_play.take() {
            return Err(err);
        }
        Self::check_live(&log, handle)
    }

    fn pause(&mut self, handle: EngineHandle) -> std::result::Result<(), EngineError> {
        let log = self.record(EngineCall::Pause(handle.0));
        Self::check_live(&log, handle)
    }

    fn stop(&mut self, handle: EngineHandle) -> std::result::Result<(), EngineError> {
        let log = self.record(EngineCall::Stop(handle.0));
        Self::check_live(&log, handle)
    }

    fn seek(&mut self, handle: EngineHandle, position_ms: u64) -> std::result::Result<(), EngineError> {
        let log = self.record(EngineCall::Seek(handle.0, position_ms));
        Self::check_live(&log, handle)
    }

    fn release(&mut self, handle: EngineHandle) -> std::result::Result<(), EngineError> {
        let mut log = self.record(EngineCall::Release(handle.0));
        if log.live.remove(&handle.0) {
            Ok(())
        } else {
            Err(EngineError::Failure(format!("double release of {}", handle)))
        }
    }
}

pub fn surah(number: u16) -> Surah {
    Surah {
        number,
        name: format!("سورة {}", number),
        english_name: format!("Surah {}", number),
        english_name_translation: format!("Surah number {}", number),
        number_of_ayahs: Some(7),
        revelation_type: Some("Meccan".to_string()),
    }
}

pub fn reciter(identifier: &str, has_audio: bool) -> Reciter {
    Reciter {
        identifier: identifier.to_string(),
        english_name: identifier.to_string(),
        name: None,
        has_audio,
        server_base_url: None,
    }
}

/// Metadata provider backed by fixed lists
pub struct FakeMetadata {
    pub reciters: Vec<Reciter>,
    pub unavailable: bool,
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self {
            reciters: vec![
                reciter(ALAFASY, true),
                reciter(HUSARY, true),
                reciter(TEXT_ONLY, false),
            ],
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadata {
    async fn list_surahs(&self) -> Result<Vec<Surah>> {
        if self.unavailable {
            return Err(Error::Metadata("metadata service unreachable".to_string()));
        }
        Ok((1..=SURAH_COUNT).map(surah).collect())
    }

    async fn list_reciters(&self) -> Result<Vec<Reciter>> {
        if self.unavailable {
            return Err(Error::Metadata("metadata service unreachable".to_string()));
        }
        Ok(self.reciters.clone())
    }
}

/// Catalog holding ALAFASY, HUSARY and the audio-less TEXT_ONLY
pub async fn catalog() -> Arc<ReciterCatalog> {
    let catalog = ReciterCatalog::new("http://audio.test/quran", 128, Vec::<ReciterOverride>::new());
    catalog.refresh(&FakeMetadata::new()).await;
    Arc::new(catalog)
}

pub fn audio_url(reciter_id: &str, surah: u16) -> String {
    format!("http://audio.test/quran/128/{}/{}.mp3", reciter_id, surah)
}

pub async fn memory_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    qari_common::db::init::create_settings_table(&pool)
        .await
        .unwrap();
    pool
}

pub fn loaded(handle: EngineHandle, duration_ms: u64) -> EngineEvent {
    EngineEvent::new(handle, EngineEventKind::Loaded { duration_ms })
}

pub fn load_failed(handle: EngineHandle, err: EngineError) -> EngineEvent {
    EngineEvent::new(handle, EngineEventKind::LoadFailed(err))
}

pub fn engine_error(handle: EngineHandle, err: EngineError) -> EngineEvent {
    EngineEvent::new(handle, EngineEventKind::Error(err))
}

pub fn progress(handle: EngineHandle, position_ms: u64) -> EngineEvent {
    EngineEvent::new(
        handle,
        EngineEventKind::Status(StatusUpdate {
            position_ms,
            duration_ms: 0,
            is_playing: true,
            did_finish: false,
        }),
    )
}

pub fn finished(handle: EngineHandle) -> EngineEvent {
    EngineEvent::new(
        handle,
        EngineEventKind::Status(StatusUpdate {
            position_ms: 0,
            duration_ms: 0,
            is_playing: false,
            did_finish: true,
        }),
    )
}
