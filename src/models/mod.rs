//! Data models for genfriends.

mod prompt;
mod relocation;

pub use prompt::{CommunityPrompt, PromptField, PromptPatch};
pub use relocation::{IntentState, RelocationIntent};
