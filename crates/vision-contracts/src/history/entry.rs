use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Prefix that marks a history prompt as coming from an edit action.
pub const EDIT_PROMPT_PREFIX: &str = "Edit: ";

/// A web reference the model consulted during a search-grounded generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

/// One finished generation or edit. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResult {
    pub id: String,
    #[serde(alias = "url")]
    pub image_data: String,
    pub prompt: String,
    #[serde(alias = "timestamp")]
    pub created_at: i64,
    #[serde(alias = "model")]
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

impl GeneratedResult {
    pub fn new(
        image_data: impl Into<String>,
        prompt: impl Into<String>,
        model_name: impl Into<String>,
        citations: Option<Vec<Citation>>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_data: image_data.into(),
            prompt: prompt.into(),
            created_at: Utc::now().timestamp_millis(),
            model_name: model_name.into(),
            citations,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.prompt.starts_with(EDIT_PROMPT_PREFIX)
    }
}
