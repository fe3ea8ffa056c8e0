mod migrations;

use rusqlite::functions::FunctionFlags;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use migrations::MIGRATIONS;

pub use rusqlite;
pub use tokio_rusqlite;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),
    #[error(transparent)]
    TokioRusqlite(tokio_rusqlite::Error),
    #[error(transparent)]
    Rusqlite(rusqlite::Error),
    #[error(transparent)]
    Migration(#[from] rusqlite_migration::Error),
}

impl From<tokio_rusqlite::Error> for Error {
    fn from(error: tokio_rusqlite::Error) -> Self {
        match error {
            tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows) => Self::NotFound("Not found".into()),
            tokio_rusqlite::Error::Other(err) if err.is::<rusqlite_migration::Error>() => match err.downcast() {
                Ok(err) => Self::Migration(*err),
                Err(err) => Self::TokioRusqlite(tokio_rusqlite::Error::Other(err)),
            },
            error => Self::TokioRusqlite(error),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound("Not found".into()),
            error => Self::Rusqlite(error),
        }
    }
}

/// Handle to the single SQLite connection. Every `call` on it is one scoped
/// unit of work on the connection thread.
pub type DB = Connection;

pub async fn init_db(path: &str) -> Result<DB> {
    let conn = tokio_rusqlite::Connection::open(path).await?;

    conn.call(|conn| {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        setup(conn)
    })
    .await?;

    tracing::info!(path, "database ready");

    Ok(conn)
}

#[cfg(test)]
pub async fn init_test_db() -> Result<DB> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;

    conn.call(|conn| {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        setup(conn)
    })
    .await?;

    Ok(conn)
}

fn setup(conn: &mut rusqlite::Connection) -> tokio_rusqlite::Result<()> {
    add_functions(conn)?;

    MIGRATIONS
        .to_latest(conn)
        .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;

    Ok(())
}

fn add_functions(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("uuid7_now", 0, FunctionFlags::SQLITE_UTF8, |_| Ok(Uuid::now_v7()))?;

    // contains_ci(haystack, needle): unicode case-insensitive substring test,
    // the needle is taken literally
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack = ctx.get::<Option<String>>(0)?;
            let needle = ctx.get::<Option<String>>(1)?;

            Ok(match (haystack, needle) {
                (Some(haystack), Some(needle)) => contains_ignore_case(&haystack, &needle),
                _ => false,
            })
        },
    )?;

    Ok(())
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_ignores_case() {
        assert!(contains_ignore_case("Alpha", "alpha"));
        assert!(contains_ignore_case("ÇAĞDAŞ notlar", "çağdaş"));
        assert!(contains_ignore_case("anything", ""));
        assert!(!contains_ignore_case("Alpha", "beta"));
    }

    #[tokio::test]
    async fn registers_search_function() -> Result<()> {
        let db = init_test_db().await?;

        let (hit, wildcard) = db
            .call(|conn| {
                let hit = conn.query_row("SELECT contains_ci('Hello World', 'WORLD')", [], |r| r.get::<_, bool>(0))?;
                let wildcard = conn.query_row("SELECT contains_ci('Hello World', 'H%d')", [], |r| r.get::<_, bool>(0))?;
                Ok((hit, wildcard))
            })
            .await?;

        assert!(hit);
        assert!(!wildcard);
        Ok(())
    }

    #[tokio::test]
    async fn migrates_schema() -> Result<()> {
        let db = init_test_db().await?;

        let tables = db
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'notes') ORDER BY name")?;
                let names = stmt
                    .query_map([], |r| r.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await?;

        assert_eq!(tables, vec!["notes".to_string(), "users".to_string()]);
        Ok(())
    }
}
