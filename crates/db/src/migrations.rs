/// Inline SQL migrations for the worklog database schema.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained. Never edit an entry
/// that has shipped; append a new one instead.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: users
    r#"
CREATE TABLE IF NOT EXISTS users (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    username              TEXT NOT NULL UNIQUE,
    email                 TEXT NOT NULL UNIQUE,
    password_hash         TEXT NOT NULL,
    created_at            INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    last_login            INTEGER,
    is_active             BOOLEAN NOT NULL DEFAULT 1,
    is_admin              BOOLEAN NOT NULL DEFAULT 0,
    failed_login_attempts INTEGER NOT NULL DEFAULT 0 CHECK (failed_login_attempts >= 0),
    locked_until          INTEGER,
    calendar_id           TEXT
);
"#,
    // Migration 2: logs
    r#"
CREATE TABLE IF NOT EXISTS logs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    date          TEXT NOT NULL,
    start_time    TEXT NOT NULL,
    duration      INTEGER NOT NULL CHECK (duration >= 0),
    content       TEXT NOT NULL,
    impression    TEXT,
    created_at    INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    calendar_link TEXT
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_logs_user_date ON logs(user_id, date DESC);"#,
    // Migration 3: tags as a many-to-many relation
    r#"
CREATE TABLE IF NOT EXISTS tags (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS log_tags (
    log_id   INTEGER NOT NULL REFERENCES logs(id) ON DELETE CASCADE,
    tag_id   INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (log_id, tag_id)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_log_tags_tag ON log_tags(tag_id);"#,
    // Migration 4: password history + reset tokens
    r#"
CREATE TABLE IF NOT EXISTS password_history (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    password_hash TEXT NOT NULL,
    created_at    INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_password_history_user ON password_history(user_id, created_at DESC);"#,
    r#"
CREATE TABLE IF NOT EXISTS password_reset_tokens (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    used       BOOLEAN NOT NULL DEFAULT 0
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_reset_tokens_user ON password_reset_tokens(user_id);"#,
    // Migration 5: sessions issued before this instant are revoked
    r#"ALTER TABLE users ADD COLUMN password_changed_at INTEGER NOT NULL DEFAULT 0;"#,
];
