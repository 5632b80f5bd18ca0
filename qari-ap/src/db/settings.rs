//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! The selected reciter is the only setting the playback path consumes;
//! it is read once per session creation and passed to the controller.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Key holding the selected reciter identifier
pub const SELECTED_RECITER_KEY: &str = "selected_reciter";

/// Get the selected reciter identifier
///
/// Writes `default` back when the setting is missing.
pub async fn get_selected_reciter(db: &Pool<Sqlite>, default: &str) -> Result<String> {
    match get_setting::<String>(db, SELECTED_RECITER_KEY).await? {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => {
            set_selected_reciter(db, default).await?;
            Ok(default.to_string())
        }
    }
}

/// Persist the selected reciter identifier
pub async fn set_selected_reciter(db: &Pool<Sqlite>, identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        return Err(Error::BadRequest("Reciter identifier must not be empty".to_string()));
    }
    set_setting(db, SELECTED_RECITER_KEY, identifier).await
}

/// Generic setting getter
///
/// Returns None if key doesn't exist (or is NULL).
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
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

    #[tokio::test]
    async fn test_selected_reciter_default_written_back() {
        let db = setup_test_db().await;

        let id = get_selected_reciter(&db, "ar.alafasy").await.unwrap();
        assert_eq!(id, "ar.alafasy");

        let stored: Option<String> = get_setting(&db, SELECTED_RECITER_KEY).await.unwrap();
        assert_eq!(stored.as_deref(), Some("ar.alafasy"));
    }

    #[tokio::test]
    async fn test_selected_reciter_set_get() {
        let db = setup_test_db().await;

        set_selected_reciter(&db, "ar.husary").await.unwrap();
        let id = get_selected_reciter(&db, "ar.alafasy").await.unwrap();
        assert_eq!(id, "ar.husary");
    }

    #[tokio::test]
    async fn test_empty_reciter_rejected() {
        let db = setup_test_db().await;
        let result = set_selected_reciter(&db, "   ").await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_generic_setting_get_set() {
        let db = setup_test_db().await;

        set_setting(&db, "test_int", 42).await.unwrap();
        let value: Option<i32> = get_setting(&db, "test_int").await.unwrap();
        assert_eq!(value, Some(42));

        let value: Option<String> = get_setting(&db, "nonexistent").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_setting_update_upserts() {
        let db = setup_test_db().await;

        set_setting(&db, "test_key", "value1").await.unwrap();
        set_setting(&db, "test_key", "value2").await.unwrap();
        let value: Option<String> = get_setting(&db, "test_key").await.unwrap();
        assert_eq!(value, Some("value2".to_string()));
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let db = setup_test_db().await;

        set_setting(&db, "test_int", "not-a-number").await.unwrap();
        let result: Result<Option<u32>> = get_setting(&db, "test_int").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
