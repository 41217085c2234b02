//! Postgres DDL for the Supabase tables the app uses.
//!
//! `users`, `user_stats` and `daily_usage_history` are defined for the app's
//! account features; nothing in this crate reads or writes them.

pub const COMMUNITY_PROMPTS: &str = r#"CREATE TABLE IF NOT EXISTS community_prompts (
    id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    prompt TEXT NOT NULL,
    category TEXT,
    likes INTEGER NOT NULL DEFAULT 0,
    author TEXT,
    image_url TEXT,
    source_url TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT community_prompts_no_sentinel
        CHECK (prompt <> 'NO_CHANGE' AND title <> 'NO_CHANGE')
);
CREATE INDEX IF NOT EXISTS idx_community_prompts_active_likes
    ON community_prompts (is_active, likes DESC);
CREATE INDEX IF NOT EXISTS idx_community_prompts_category
    ON community_prompts (category);"#;

pub const USERS: &str = r#"CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    api_key TEXT UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);"#;

pub const USER_STATS: &str = r#"CREATE TABLE IF NOT EXISTS user_stats (
    user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    total_images INTEGER NOT NULL DEFAULT 0,
    total_videos INTEGER NOT NULL DEFAULT 0,
    total_tokens BIGINT NOT NULL DEFAULT 0,
    total_cost NUMERIC(12, 4) NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);"#;

pub const DAILY_USAGE_HISTORY: &str = r#"CREATE TABLE IF NOT EXISTS daily_usage_history (
    id BIGSERIAL PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    usage_date DATE NOT NULL,
    images INTEGER NOT NULL DEFAULT 0,
    videos INTEGER NOT NULL DEFAULT 0,
    tokens BIGINT NOT NULL DEFAULT 0,
    cost NUMERIC(12, 4) NOT NULL DEFAULT 0,
    UNIQUE (user_id, usage_date)
);"#;

/// All statements, in dependency order.
pub fn all() -> [(&'static str, &'static str); 4] {
    [
        ("community_prompts", COMMUNITY_PROMPTS),
        ("users", USERS),
        ("user_stats", USER_STATS),
        ("daily_usage_history", DAILY_USAGE_HISTORY),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_in_dependency_order() {
        let names: Vec<_> = all().iter().map(|(n, _)| *n).collect();
        let users = names.iter().position(|n| *n == "users").unwrap();
        let stats = names.iter().position(|n| *n == "user_stats").unwrap();
        assert!(users < stats);
        assert!(COMMUNITY_PROMPTS.contains("is_active BOOLEAN"));
    }
}
