use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UnknownVariant;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Deck {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A single flashcard. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Content {
    pub id: i64,
    pub deck_id: i64,
    pub content_type: String,
    pub front: String,
    pub back: String,
    pub example: Option<String>,
    pub unit: Option<String>,
    pub page: Option<String>,
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Which side of the card is shown as the prompt.
///
/// Stored and requested values parse the same way: `zh_first`, or any other
/// non-empty value for front-first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum StudyOrder {
    /// Show the back (translation) and ask for the front.
    #[default]
    ZhFirst,
    /// Show the front and ask for the back.
    Other,
}

impl StudyOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyOrder::ZhFirst => "zh_first",
            StudyOrder::Other => "other",
        }
    }
}

impl TryFrom<String> for StudyOrder {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "zh_first" => Ok(StudyOrder::ZhFirst),
            // Anything else was historically rendered front-first.
            _ if !value.is_empty() => Ok(StudyOrder::Other),
            _ => Err(UnknownVariant {
                kind: "study_order",
                value,
            }),
        }
    }
}

pub const DEFAULT_MODE: &str = "en_to_zh";

/// Per-deck study settings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudyConfig {
    pub deck_id: i64,
    pub mode: String,
    pub daily_goal: i32,
    #[sqlx(try_from = "String")]
    pub study_order: StudyOrder,
    pub is_configured: bool,
}

impl StudyConfig {
    /// Settings used for a deck nobody has configured yet.
    pub fn unconfigured(deck_id: i64, daily_goal: i32) -> Self {
        Self {
            deck_id,
            mode: DEFAULT_MODE.to_string(),
            daily_goal,
            study_order: StudyOrder::default(),
            is_configured: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_study_order_parses_known_values() {
        assert_eq!(
            StudyOrder::try_from("zh_first".to_string()).unwrap(),
            StudyOrder::ZhFirst
        );
        assert_eq!(
            StudyOrder::try_from("en_first".to_string()).unwrap(),
            StudyOrder::Other
        );
    }

    #[test]
    fn test_study_order_rejects_empty() {
        assert!(StudyOrder::try_from(String::new()).is_err());
    }

    #[test]
    fn test_request_body_parses_like_stored_value() {
        let order: StudyOrder = serde_json::from_str("\"en_first\"").unwrap();
        assert_eq!(order, StudyOrder::Other);
        assert_eq!(
            serde_json::from_str::<StudyOrder>("\"zh_first\"").unwrap(),
            StudyOrder::ZhFirst
        );
        assert!(serde_json::from_str::<StudyOrder>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&order).unwrap(), "\"other\"");
    }

    #[test]
    fn test_unconfigured_defaults() {
        let config = StudyConfig::unconfigured(7, 20);
        assert_eq!(config.study_order, StudyOrder::ZhFirst);
        assert_eq!(config.mode, "en_to_zh");
        assert!(!config.is_configured);
    }
}
