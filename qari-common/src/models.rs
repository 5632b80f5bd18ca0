//! Surah and reciter models
//!
//! Field names serialize in camelCase, matching the upstream metadata API
//! (`englishName`, `englishNameTranslation`, `numberOfAyahs`).

use serde::{Deserialize, Serialize};

/// Number of surahs in the mushaf
pub const SURAH_COUNT: u16 = 114;

/// One surah of the Quran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surah {
    /// Surah number (1..=114)
    pub number: u16,
    /// Arabic name
    pub name: String,
    /// Transliterated name
    pub english_name: String,
    /// English meaning of the name
    pub english_name_translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_ayahs: Option<u16>,
    /// "Meccan" or "Medinan"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revelation_type: Option<String>,
}

impl Surah {
    /// Whether `number` names a surah
    pub fn is_valid_number(number: u16) -> bool {
        (1..=SURAH_COUNT).contains(&number)
    }
}

/// A recitation source
///
/// `has_audio` is the capability flag: reciters without it can be selected
/// in settings but never produce a playable URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reciter {
    /// Stable identifier, e.g. `ar.alafasy`
    pub identifier: String,
    pub english_name: String,
    /// Native-script name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub has_audio: bool,
    /// Base URL of a per-reciter server hosting `001.mp3` .. `114.mp3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surah_number_bounds() {
        assert!(!Surah::is_valid_number(0));
        assert!(Surah::is_valid_number(1));
        assert!(Surah::is_valid_number(114));
        assert!(!Surah::is_valid_number(115));
    }

    #[test]
    fn test_surah_deserializes_api_shape() {
        let json = r#"{
            "number": 36,
            "name": "سورة يس",
            "englishName": "Yaseen",
            "englishNameTranslation": "Yaseen",
            "numberOfAyahs": 83,
            "revelationType": "Meccan"
        }"#;

        let surah: Surah = serde_json::from_str(json).unwrap();
        assert_eq!(surah.number, 36);
        assert_eq!(surah.english_name, "Yaseen");
        assert_eq!(surah.number_of_ayahs, Some(83));
        assert_eq!(surah.revelation_type.as_deref(), Some("Meccan"));
    }

    #[test]
    fn test_reciter_defaults_to_no_audio() {
        let json = r#"{"identifier": "en.sahih", "englishName": "Saheeh International"}"#;
        let reciter: Reciter = serde_json::from_str(json).unwrap();
        assert!(!reciter.has_audio);
        assert!(reciter.server_base_url.is_none());
    }
}
