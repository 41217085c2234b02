//! Batch tooling for the `community_prompts` dataset.
//!
//! Cleanups are declarative, versioned [`transforms::Transform`]s run by the
//! [`runner::TransformRunner`], which records each applied `(name, version)`
//! in the local transform log. LLM rewriting lives in [`rewrite`].

pub mod ddl;
pub mod rewrite;
pub mod rules;
pub mod runner;
pub mod scan;
pub mod store;
pub mod transforms;
pub mod validate;

pub use rewrite::{PromptRewriter, RewriteMode, RewriteOutcome};
pub use runner::{RunOptions, RunReport, TransformRunner};
pub use store::{MemoryPromptStore, PromptStore, PromptStoreError, SupabasePromptStore};
pub use transforms::{Transform, TransformError, NO_CHANGE_SENTINEL};
