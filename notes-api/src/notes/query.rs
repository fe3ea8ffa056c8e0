//! Note query engine.
//!
//! A [`NoteQuery`] is turned into one predicate set, which then feeds both the
//! page statement and the count statement. The owner predicate always comes
//! first and nothing in the query can widen it.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use schemars::JsonSchema;
use sea_query::{Cond, Condition, Expr, Func, Iden, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;
use serde::{Deserialize, Serialize};

use crate::auth::UserId;

use super::Note;

/// Window of the `recent` category.
pub const RECENT_DAYS: i64 = 7;

/// SQLite binds LIMIT/OFFSET as signed 64-bit integers.
const MAX_BOUND: u64 = i64::MAX as u64;

#[derive(Iden, Clone, Copy)]
pub enum Notes {
    Table,
    Id,
    Title,
    Content,
    IsFavorite,
    Summary,
    Keywords,
    UserId,
    CreatedAt,
    UpdatedAt,
}

/// Column order expected by `Note::try_from(&Row)`.
pub const NOTE_COLUMNS: [Notes; 9] = [
    Notes::Id,
    Notes::Title,
    Notes::Content,
    Notes::IsFavorite,
    Notes::Summary,
    Notes::Keywords,
    Notes::UserId,
    Notes::CreatedAt,
    Notes::UpdatedAt,
];

/// Unicode case-insensitive substring test registered on the connection.
#[derive(Iden)]
#[iden = "contains_ci"]
struct ContainsCi;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    Title,
    Content,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter {
    #[default]
    #[serde(alias = "oldest")]
    All,
    Favorites,
    /// Created within the last seven days.
    Recent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Last updated first.
    #[default]
    #[serde(alias = "updated_desc")]
    Newest,
    #[serde(alias = "updated_asc")]
    Oldest,
    #[serde(alias = "created_desc")]
    CreatedNewest,
    #[serde(alias = "created_asc")]
    CreatedOldest,
}

impl SortOrder {
    fn key(self) -> (Notes, Order) {
        match self {
            Self::Newest => (Notes::UpdatedAt, Order::Desc),
            Self::Oldest => (Notes::UpdatedAt, Order::Asc),
            Self::CreatedNewest => (Notes::CreatedAt, Order::Desc),
            Self::CreatedOldest => (Notes::CreatedAt, Order::Asc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    pub search: Option<String>,
    pub scope: SearchScope,
    pub filter: CategoryFilter,
    pub sort: SortOrder,
    pub skip: u64,
    pub limit: u64,
}

impl Default for NoteQuery {
    fn default() -> Self {
        Self {
            search: None,
            scope: SearchScope::default(),
            filter: CategoryFilter::default(),
            sort: SortOrder::default(),
            skip: 0,
            limit: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotePage {
    pub notes: Vec<Note>,
    /// Matches before `skip`/`limit`.
    pub total: u64,
}

impl NoteQuery {
    fn search_text(&self) -> Option<&str> {
        self.search.as_deref().filter(|text| !text.is_empty())
    }

    pub fn condition(&self, owner: UserId, now: DateTime<Utc>) -> Condition {
        let mut cond = Cond::all().add(Expr::col(Notes::UserId).eq(owner));

        match self.filter {
            CategoryFilter::All => {}
            CategoryFilter::Favorites => cond = cond.add(Expr::col(Notes::IsFavorite).eq(true)),
            CategoryFilter::Recent => cond = cond.add(Expr::col(Notes::CreatedAt).gte(now - Duration::days(RECENT_DAYS))),
        }

        if let Some(text) = self.search_text() {
            cond = cond.add(match self.scope {
                SearchScope::Title => Cond::any().add(contains(Notes::Title, text)),
                SearchScope::Content => Cond::any().add(contains(Notes::Content, text)),
                SearchScope::Both => Cond::any()
                    .add(contains(Notes::Title, text))
                    .add(contains(Notes::Content, text)),
            });
        }

        cond
    }

    pub fn page_statement(&self, cond: Condition) -> SelectStatement {
        let (column, order) = self.sort.key();

        Query::select()
            .columns(NOTE_COLUMNS)
            .from(Notes::Table)
            .cond_where(cond)
            .order_by(column, order.clone())
            // equal timestamps keep a stable order
            .order_by(Notes::Id, order)
            .limit(self.limit.min(MAX_BOUND))
            .offset(self.skip.min(MAX_BOUND))
            .to_owned()
    }

    pub fn count_statement(cond: Condition) -> SelectStatement {
        Query::select()
            .expr(Func::count(Expr::col(Notes::Id)))
            .from(Notes::Table)
            .cond_where(cond)
            .to_owned()
    }
}

fn contains(column: Notes, text: &str) -> SimpleExpr {
    SimpleExpr::FunctionCall(Func::cust(ContainsCi).arg(Expr::col(column)).arg(text.to_owned()))
}

/// Runs the count and the page for `owner`. Callers run this inside a
/// transaction so both statements see the same snapshot.
pub fn find_notes(conn: &Connection, owner: UserId, query: &NoteQuery, now: DateTime<Utc>) -> rusqlite::Result<NotePage> {
    let cond = query.condition(owner, now);

    let (sql, values) = NoteQuery::count_statement(cond.clone()).build_rusqlite(SqliteQueryBuilder);
    let total = conn.query_row(&sql, &*values.as_params(), |row| row.get::<_, i64>(0))?;

    let (sql, values) = query.page_statement(cond).build_rusqlite(SqliteQueryBuilder);
    let mut stmt = conn.prepare(&sql)?;
    let notes = stmt
        .query_map(&*values.as_params(), |row| Note::try_from(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    tracing::debug!(%owner, total, returned = notes.len(), "notes query");

    Ok(NotePage {
        notes,
        total: u64::try_from(total).unwrap_or_default(),
    })
}
