use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE,
            password_hash   BLOB NOT NULL,
            password_salt   BLOB NOT NULL,
            gender          TEXT NOT NULL CHECK (gender IN ('male', 'female')),
            date_of_birth   TEXT NOT NULL,
            known_as        TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            last_active     TEXT NOT NULL,
            introduction    TEXT,
            looking_for     TEXT,
            interests       TEXT,
            city            TEXT NOT NULL DEFAULT '',
            country         TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS roles (
            name        TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS user_roles (
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role_name   TEXT NOT NULL REFERENCES roles(name),
            PRIMARY KEY (user_id, role_name)
        );

        CREATE TABLE IF NOT EXISTS photos (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            url         TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            date_added  TEXT NOT NULL,
            is_main     INTEGER NOT NULL DEFAULT 0,
            public_id   TEXT,
            is_approved INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_photos_user
            ON photos(user_id, date_added);

        -- At most one main photo per user
        CREATE UNIQUE INDEX IF NOT EXISTS idx_photos_one_main
            ON photos(user_id) WHERE is_main = 1;

        CREATE TABLE IF NOT EXISTS likes (
            liker_id    TEXT NOT NULL REFERENCES users(id),
            likee_id    TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (liker_id, likee_id),
            CHECK (liker_id <> likee_id)
        );

        INSERT OR IGNORE INTO roles (name)
            VALUES ('Member'), ('Admin'), ('Moderator'), ('VIP');
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
