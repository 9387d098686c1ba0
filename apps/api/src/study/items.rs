use serde::{Deserialize, Serialize};

use crate::models::deck::StudyOrder;
use crate::selection::{ItemKind, SelectedItem};

/// A card as the study client shows it: prompt side and expected answer
/// already picked from the deck's study order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub display_text: String,
    pub answer: String,
    pub example: Option<String>,
}

pub fn present(item: SelectedItem, order: StudyOrder) -> StudyItem {
    let content = item.content;
    let (display_text, answer) = match order {
        StudyOrder::ZhFirst => (content.back, content.front),
        StudyOrder::Other => (content.front, content.back),
    };
    StudyItem {
        id: content.id,
        kind: item.kind,
        display_text,
        answer,
        example: content.example,
    }
}

pub fn present_all(items: Vec<SelectedItem>, order: StudyOrder) -> Vec<StudyItem> {
    items.into_iter().map(|i| present(i, order)).collect()
}
