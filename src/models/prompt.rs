//! Community prompt rows as stored in the Supabase `community_prompts` table.

use serde::{Deserialize, Deserializer, Serialize};

/// One row of `community_prompts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityPrompt {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub likes: i64,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default = "default_active", deserialize_with = "null_as_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_active() -> bool {
    true
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn null_as_active<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(true))
}

fn null_as_zero<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(d)?.unwrap_or_default())
}

impl CommunityPrompt {
    pub fn field(&self, field: PromptField) -> &str {
        match field {
            PromptField::Title => &self.title,
            PromptField::Prompt => &self.prompt,
        }
    }
}

/// Text columns the batch tools rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptField {
    Title,
    Prompt,
}

impl PromptField {
    pub const ALL: [PromptField; 2] = [PromptField::Title, PromptField::Prompt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Prompt => "prompt",
        }
    }
}

/// Partial update for one row. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromptPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl PromptPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.prompt.is_none() && self.is_active.is_none()
    }

    pub fn set(&mut self, field: PromptField, value: String) {
        match field {
            PromptField::Title => self.title = Some(value),
            PromptField::Prompt => self.prompt = Some(value),
        }
    }

    pub fn get(&self, field: PromptField) -> Option<&str> {
        match field {
            PromptField::Title => self.title.as_deref(),
            PromptField::Prompt => self.prompt.as_deref(),
        }
    }
}
