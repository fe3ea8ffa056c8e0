use crate::{
    ctx::BaseParams,
    openapi::{
        aide::{
            axum::{routing::get_with, ApiRouter, IntoApiResponse},
            transform::TransformOperation,
            NoApi,
        },
        Json, Path, Query,
    },
};
use axum::http::StatusCode;

use schemars::JsonSchema;

use serde::Deserialize;
use uuid::Uuid;

use super::{CreateNote, FindNotesQuery, FindNotesResponse, Note, UpdateNote};

use super::handlers;

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdPath {
    note_id: Uuid,
}

pub fn router() -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/v1/notes",
            get_with(find_notes, find_notes_docs).post_with(create_note, |t| {
                t.summary("Create a note").response::<201, Json<Note>>()
            }),
        )
        .api_route(
            "/api/v1/notes/{note_id}",
            get_with(get_note, |t| t.summary("Get one of the caller's notes"))
                .put_with(update_note, update_note_docs)
                .patch_with(update_note, update_note_docs)
                .delete_with(delete_note, |t| t.summary("Delete a note").response::<204, ()>()),
        )
}

fn find_notes_docs(t: TransformOperation) -> TransformOperation {
    t.summary("List the caller's notes")
        .description("Search, filter, sort and paginate. `total` counts every match before pagination.")
        .response::<200, Json<FindNotesResponse>>()
}

fn update_note_docs(t: TransformOperation) -> TransformOperation {
    t.summary("Update a note")
        .description("Only the fields present in the body change. `null` clears `summary` and `keywords`.")
}

async fn find_notes(NoApi(base): NoApi<BaseParams>, Query(query): Query<FindNotesQuery>) -> impl IntoApiResponse {
    handlers::find_notes(query, base).await.map(Json)
}

async fn create_note(NoApi(base): NoApi<BaseParams>, Json(args): Json<CreateNote>) -> impl IntoApiResponse {
    handlers::create_note(args, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn get_note(
    NoApi(base): NoApi<BaseParams>,
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
) -> impl IntoApiResponse {
    handlers::get_note(note_id, base).await.map(Json)
}

async fn update_note(
    NoApi(base): NoApi<BaseParams>,
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    Json(args): Json<UpdateNote>,
) -> impl IntoApiResponse {
    handlers::update_note(note_id, args, base).await.map(Json)
}

async fn delete_note(
    NoApi(base): NoApi<BaseParams>,
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
) -> impl IntoApiResponse {
    handlers::delete_note(note_id, base)
        .await
        .map(|_| (StatusCode::NO_CONTENT, ()))
}
