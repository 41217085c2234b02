//! genfriends: a proxy in front of AI image and video generation APIs, plus
//! batch tooling for the community prompt dataset.
//!
//! The HTTP service ([`server`]) forwards generation requests to KIE.AI,
//! Seedream and Kling with server-held credentials, uploads images to the
//! public FTP host, and moves images out of Supabase Storage. The CLI
//! ([`cli`]) runs versioned cleanups and LLM rewrites over `community_prompts`.

pub mod cli;
pub mod config;
pub mod models;
pub mod prompts;
pub mod repository;
pub mod schema;
pub mod server;
pub mod storage;
pub mod upstream;
