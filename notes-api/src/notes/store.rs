use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::{auth::UserId, Error, Result, DB};

use super::{
    query::{self, NotePage, NoteQuery},
    CreateNote, Note, UpdateNote,
};

const NOTE_FIELDS: &str = "id, title, content, is_favorite, summary, keywords, user_id, created_at, updated_at";

impl<'a> TryFrom<&Row<'a>> for Note {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            is_favorite: row.get(3)?,
            summary: row.get(4)?,
            keywords: row.get(5)?,
            user_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// Owner-scoped access to notes. Every operation takes the caller's id and
/// treats notes of other users exactly like missing ones.
#[derive(Clone)]
pub struct NoteStore {
    db: DB,
}

impl NoteStore {
    pub fn new(db: DB) -> Self {
        Self { db }
    }

    pub async fn list_notes(&self, owner: UserId, query: NoteQuery) -> Result<NotePage> {
        let now = Utc::now();

        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                let page = query::find_notes(&tx, owner, &query, now)?;
                tx.commit()?;
                Ok(page)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn create_note(&self, owner: UserId, note: CreateNote) -> Result<Note> {
        note.validate()?;

        let CreateNote {
            title,
            content,
            is_favorite,
            summary,
            keywords,
        } = note;
        let id = Uuid::now_v7();
        let now = Utc::now();

        let note = self
            .db
            .call(move |conn| {
                conn.query_row(
                    &format!(
                        "INSERT INTO notes ({NOTE_FIELDS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {NOTE_FIELDS}"
                    ),
                    params![id, title, content, is_favorite, summary, keywords, owner, now, now],
                    |row| Note::try_from(row),
                )
                .map_err(|e| e.into())
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(%owner, note_id = %note.id, "note created");
        Ok(note)
    }

    pub async fn get_owned_note(&self, note_id: Uuid, owner: UserId) -> Result<Option<Note>> {
        self.db
            .call(move |conn| Ok(find_owned(conn, note_id, owner)?))
            .await
            .map_err(Error::from)
    }

    pub async fn update_note(&self, note_id: Uuid, owner: UserId, update: UpdateNote) -> Result<Option<Note>> {
        let changes = update.into_changes()?;

        let note = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;

                let Some(mut note) = find_owned(&tx, note_id, owner)? else {
                    return Ok(None);
                };
                for change in changes {
                    note.apply(change);
                }
                let updated_at = next_updated_at(note.updated_at, Utc::now());

                let note = tx.query_row(
                    &format!(
                        r#"UPDATE notes
                        SET title = ?, content = ?, is_favorite = ?, summary = ?, keywords = ?, updated_at = ?
                        WHERE id = ? AND user_id = ?
                        RETURNING {NOTE_FIELDS}"#
                    ),
                    params![
                        note.title,
                        note.content,
                        note.is_favorite,
                        note.summary,
                        note.keywords,
                        updated_at,
                        note_id,
                        owner
                    ],
                    |row| Note::try_from(row),
                )?;

                tx.commit()?;
                Ok(Some(note))
            })
            .await
            .map_err(Error::from)?;

        if note.is_some() {
            tracing::debug!(%owner, %note_id, "note updated");
        }
        Ok(note)
    }

    pub async fn delete_note(&self, note_id: Uuid, owner: UserId) -> Result<bool> {
        let deleted = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;

                if find_owned(&tx, note_id, owner)?.is_none() {
                    return Ok(false);
                }
                tx.execute("DELETE FROM notes WHERE id = ? AND user_id = ?", params![note_id, owner])?;

                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)?;

        if deleted {
            tracing::debug!(%owner, %note_id, "note deleted");
        }
        Ok(deleted)
    }
}

/// Lookup by id and owner at once, so "not yours" and "does not exist" give
/// the same answer.
fn find_owned(conn: &Connection, note_id: Uuid, owner: UserId) -> rusqlite::Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {NOTE_FIELDS} FROM notes WHERE id = ? AND user_id = ?"),
        params![note_id, owner],
        |row| Note::try_from(row),
    )
    .optional()
}

/// `now`, or just past `previous` when the clock has not moved since the last
/// write.
fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
