//! Settings defaults seeded at startup

use crate::db::settings::SELECTED_RECITER_KEY;
use crate::error::Result;
use qari_common::db::ensure_setting;
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Initialize settings table rows this module relies on
///
/// Missing or NULL rows get defaults; existing values are kept.
pub async fn init_settings_defaults(pool: &Pool<Sqlite>, default_reciter: &str) -> Result<()> {
    info!("Initializing default settings");
    ensure_setting(pool, SELECTED_RECITER_KEY, default_reciter).await?;
    Ok(())
}
