//! Diesel ORM models for the local state tables.

use diesel::prelude::*;

use crate::schema;

/// Relocation intent record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::relocation_intents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RelocationIntentRecord {
    pub id: String,
    pub source_bucket: String,
    pub source_key: String,
    pub username: String,
    pub filename: String,
    pub remote_dir: String,
    pub public_url: String,
    pub state: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New relocation intent for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::relocation_intents)]
pub struct NewRelocationIntent<'a> {
    pub id: &'a str,
    pub source_bucket: &'a str,
    pub source_key: &'a str,
    pub username: &'a str,
    pub filename: &'a str,
    pub remote_dir: &'a str,
    pub public_url: &'a str,
    pub state: &'a str,
    pub attempts: i32,
    pub last_error: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Applied transform record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::applied_transforms)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AppliedTransformRecord {
    pub id: i32,
    pub name: String,
    pub version: i32,
    pub applied_at: String,
    pub rows_scanned: i32,
    pub rows_changed: i32,
    pub rows_deactivated: i32,
    pub rows_skipped: i32,
}

/// New applied transform for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::applied_transforms)]
pub struct NewAppliedTransform<'a> {
    pub name: &'a str,
    pub version: i32,
    pub applied_at: &'a str,
    pub rows_scanned: i32,
    pub rows_changed: i32,
    pub rows_deactivated: i32,
    pub rows_skipped: i32,
}
