use uuid::Uuid;

use crate::{ctx::BaseParams, Error, Result};

use super::{
    query::NoteQuery, CreateNote, FindNotesQuery, FindNotesResponse, Note, NoteStore, UpdateNote, MAX_PER_PAGE,
};

const NOTE_NOT_FOUND: &str = "Note not found";

pub async fn find_notes(query: FindNotesQuery, BaseParams { db, ctx }: BaseParams) -> Result<FindNotesResponse> {
    let FindNotesQuery {
        search,
        search_in,
        filter_by,
        sort_by,
        page,
        per_page,
    } = query;

    if page < 1 {
        return Err(Error::validation("page must be at least 1"));
    }
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        return Err(Error::validation(format!("per_page must be between 1 and {MAX_PER_PAGE}")));
    }

    let found = NoteStore::new(db)
        .list_notes(
            ctx.user_id(),
            NoteQuery {
                search,
                scope: search_in,
                filter: filter_by,
                sort: sort_by,
                skip: (page - 1).saturating_mul(per_page),
                limit: per_page,
            },
        )
        .await?;

    Ok(FindNotesResponse {
        notes: found.notes,
        total: found.total,
        page,
        per_page,
    })
}

pub async fn create_note(note: CreateNote, BaseParams { db, ctx }: BaseParams) -> Result<Note> {
    NoteStore::new(db).create_note(ctx.user_id(), note).await
}

pub async fn get_note(note_id: Uuid, BaseParams { db, ctx }: BaseParams) -> Result<Note> {
    NoteStore::new(db)
        .get_owned_note(note_id, ctx.user_id())
        .await?
        .ok_or_else(|| Error::NotFound(NOTE_NOT_FOUND.into()))
}

pub async fn update_note(note_id: Uuid, update: UpdateNote, BaseParams { db, ctx }: BaseParams) -> Result<Note> {
    NoteStore::new(db)
        .update_note(note_id, ctx.user_id(), update)
        .await?
        .ok_or_else(|| Error::NotFound(NOTE_NOT_FOUND.into()))
}

pub async fn delete_note(note_id: Uuid, BaseParams { db, ctx }: BaseParams) -> Result<()> {
    if NoteStore::new(db).delete_note(note_id, ctx.user_id()).await? {
        Ok(())
    } else {
        Err(Error::NotFound(NOTE_NOT_FOUND.into()))
    }
}
