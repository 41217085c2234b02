//! Local state persistence.
//!
//! The app's user data lives in Supabase; this SQLite database only tracks
//! what the tooling itself has done (relocation intents, transform runs).

pub mod diesel_context;
pub mod diesel_models;
pub mod diesel_pool;
pub mod diesel_relocation;
pub mod diesel_transform_log;
pub mod util;

pub use diesel_context::DieselDbContext;
pub use diesel_pool::{AsyncSqlitePool, DieselError};
pub use diesel_relocation::DieselRelocationRepository;
pub use diesel_transform_log::{AppliedTransform, DieselTransformLogRepository, RunCounts};
