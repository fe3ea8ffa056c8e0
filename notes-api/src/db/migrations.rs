use lazy_static::lazy_static;
use rusqlite_migration::{Migrations, M};

lazy_static! {
    pub static ref MIGRATIONS: Migrations<'static> = Migrations::new(vec![
        // rows are provisioned by the identity provider, notes only reference them
        M::up(
            r#"
            CREATE TABLE users (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE DEFAULT (uuid7_now()),
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,

                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#
        ),
        M::up(
            r#"
            CREATE TABLE notes (
                id BLOB PRIMARY KEY CHECK(length(id) = 16) NOT NULL UNIQUE,

                title TEXT NOT NULL CHECK(length(title) BETWEEN 1 AND 255),
                content TEXT NOT NULL CHECK(length(content) >= 1),
                is_favorite INTEGER NOT NULL DEFAULT 0,
                summary TEXT,
                keywords TEXT,

                user_id BLOB NOT NULL CHECK(length(user_id) = 16),
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL CHECK(updated_at >= created_at),

                FOREIGN KEY (user_id) REFERENCES users (id)
            );

            CREATE INDEX notes_user_updated ON notes (user_id, updated_at, id);
            CREATE INDEX notes_user_created ON notes (user_id, created_at, id);
        "#
        ),
    ]);
}

