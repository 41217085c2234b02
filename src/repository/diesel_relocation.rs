//! Relocation intent log (SQLite).
//!
//! Every Storage -> FTP move is recorded before any bytes are touched, so an
//! interrupted move can be found and finished later.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::{NewRelocationIntent, RelocationIntentRecord};
use super::diesel_pool::{AsyncSqlitePool, DieselError};
use super::util::{format_datetime, parse_datetime, to_diesel_error};
use crate::models::{IntentState, RelocationIntent};
use crate::schema::relocation_intents;

impl TryFrom<RelocationIntentRecord> for RelocationIntent {
    type Error = DieselError;

    fn try_from(record: RelocationIntentRecord) -> Result<Self, Self::Error> {
        let state = IntentState::from_str(&record.state).ok_or_else(|| {
            to_diesel_error(format!(
                "relocation intent {} has unknown state '{}'",
                record.id, record.state
            ))
        })?;
        Ok(RelocationIntent {
            id: record.id,
            source_bucket: record.source_bucket,
            source_key: record.source_key,
            username: record.username,
            filename: record.filename,
            remote_dir: record.remote_dir,
            public_url: record.public_url,
            state,
            attempts: record.attempts,
            last_error: record.last_error,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        })
    }
}

fn from_records(records: Vec<RelocationIntentRecord>) -> Result<Vec<RelocationIntent>, DieselError> {
    records.into_iter().map(RelocationIntent::try_from).collect()
}

#[derive(Clone)]
pub struct DieselRelocationRepository {
    pool: AsyncSqlitePool,
}

impl DieselRelocationRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Record a new intent.
    pub async fn create(&self, intent: &RelocationIntent) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let created_at = format_datetime(intent.created_at);
        let updated_at = format_datetime(intent.updated_at);

        let record = NewRelocationIntent {
            id: &intent.id,
            source_bucket: &intent.source_bucket,
            source_key: &intent.source_key,
            username: &intent.username,
            filename: &intent.filename,
            remote_dir: &intent.remote_dir,
            public_url: &intent.public_url,
            state: intent.state.as_str(),
            attempts: intent.attempts,
            last_error: intent.last_error.as_deref(),
            created_at: &created_at,
            updated_at: &updated_at,
        };

        diesel::insert_into(relocation_intents::table)
            .values(&record)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Count one more attempt at the intent.
    pub async fn begin_attempt(&self, id: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = format_datetime(Utc::now());

        diesel::update(relocation_intents::table.find(id))
            .set((
                relocation_intents::attempts.eq(relocation_intents::attempts + 1),
                relocation_intents::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Move the intent to a new state, recording the error (if any).
    pub async fn set_state(
        &self,
        id: &str,
        state: IntentState,
        error: Option<&str>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = format_datetime(Utc::now());

        diesel::update(relocation_intents::table.find(id))
            .set((
                relocation_intents::state.eq(state.as_str()),
                relocation_intents::last_error.eq(error),
                relocation_intents::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<RelocationIntent>, DieselError> {
        let mut conn = self.pool.get().await?;

        relocation_intents::table
            .find(id)
            .first::<RelocationIntentRecord>(&mut conn)
            .await
            .optional()?
            .map(RelocationIntent::try_from)
            .transpose()
    }

    /// All intents, optionally filtered by state, newest first.
    pub async fn list(
        &self,
        state: Option<IntentState>,
        limit: i64,
    ) -> Result<Vec<RelocationIntent>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = relocation_intents::table
            .order(relocation_intents::created_at.desc())
            .limit(limit)
            .into_boxed();
        if let Some(state) = state {
            query = query.filter(relocation_intents::state.eq(state.as_str()));
        }

        query
            .load::<RelocationIntentRecord>(&mut conn)
            .await
            .and_then(from_records)
    }

    /// Intents needing work: all `uploaded`, and `pending` ones untouched since `cutoff`.
    pub async fn unfinished(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RelocationIntent>, DieselError> {
        let mut conn = self.pool.get().await?;
        let cutoff = format_datetime(cutoff);

        relocation_intents::table
            .filter(
                relocation_intents::state
                    .eq(IntentState::Uploaded.as_str())
                    .or(relocation_intents::state
                        .eq(IntentState::Pending.as_str())
                        .and(relocation_intents::updated_at.lt(cutoff))),
            )
            .order(relocation_intents::created_at.asc())
            .load::<RelocationIntentRecord>(&mut conn)
            .await
            .and_then(from_records)
    }
}
