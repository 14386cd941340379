pub mod classify;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod harvester;
pub mod store;
pub mod utils;
pub mod viewport;

pub use error::{HarvestError, Result};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use classify::{AudienceCategory, TopicCategory};

/// One row collected from the inbox list. `identity_key` is the rendered
/// accessible label; `label` keeps the same text for later extraction.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub identity_key: String,
    pub label: String,
}

impl RawItem {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            identity_key: label.clone(),
            label,
        }
    }
}

/// Flat field map as written to the record store.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct StoredRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub raw: String,
}

/// Accepts any JSON value for a text field: strings as-is, `null` as
/// empty, anything else in its JSON text form.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl StoredRecord {
    /// Splits a row label into the stored fields. Fields that cannot be
    /// found fall back to `unknown` or to a prefix of the label.
    pub fn from_label(label: &str) -> Self {
        let text = label.trim();

        Self {
            sender: extract::parse_sender(text).unwrap_or_else(|| extract::UNKNOWN.to_string()),
            subject: extract::parse_subject(text).unwrap_or_else(|| extract::prefix(text, 40)),
            date: extract::parse_date_token(text).unwrap_or_else(|| extract::UNKNOWN.to_string()),
            content: extract::prefix(text, 120),
            raw: text.to_string(),
        }
    }
}

impl From<&RawItem> for StoredRecord {
    fn from(item: &RawItem) -> Self {
        Self::from_label(&item.label)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub sender: String,
    pub date: Option<NaiveDate>,
    pub hour: Option<u32>,
    pub topic: TopicCategory,
    pub audience: AudienceCategory,
    pub unit: String,
    pub raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_record_splits_outlook_label() {
        let label = "  未讀取 【總務處公告】停電通知 寄件者: 長庚大學公告系統 週三 下午 06:34  ";
        let record = StoredRecord::from_label(label);

        assert_eq!(record.subject, "【總務處公告】停電通知");
        assert_eq!(record.sender, "長庚大學公告系統 週三 下午 06:34");
        assert_eq!(record.date, "06:34");
        assert_eq!(record.raw, label.trim());
        assert_eq!(record.content, label.trim());
    }

    #[test]
    fn stored_record_falls_back_to_prefixes() {
        let label = "一".repeat(200);
        let record = StoredRecord::from_label(&label);

        assert_eq!(record.sender, "unknown");
        assert_eq!(record.date, "unknown");
        assert_eq!(record.subject.chars().count(), 40);
        assert_eq!(record.content.chars().count(), 120);
    }

    #[test]
    fn stored_record_stringifies_non_text_fields() {
        let record: StoredRecord = serde_json::from_str(
            r#"{"raw":"講座","date":20251019,"sender":null,"subject":true,"content":[1]}"#,
        )
        .unwrap();
        assert_eq!(record.raw, "講座");
        assert_eq!(record.date, "20251019");
        assert_eq!(record.sender, "");
        assert_eq!(record.subject, "true");
        assert_eq!(record.content, "[1]");
    }

    #[test]
    fn stored_record_tolerates_missing_fields() {
        let record: StoredRecord = serde_json::from_str(r#"{"subject":"hello"}"#).unwrap();
        assert_eq!(record.subject, "hello");
        assert!(record.raw.is_empty());
    }
}
