//! HTTP handlers for a user's notes

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::Value;

use super::{NewNote, Note, NoteChanges, NoteFilter, NoteKind, Notebook, PopulatedNote};
use crate::api::{AppJson, MessageResponse, from_body, id_text, is_blank};
use crate::auth::AuthUser;
use crate::catalog::Catalog;
use crate::error::{ApiError, FieldError};
use crate::handler::AppState;
use crate::model::{Color, PageNumber, UserId, normalize_tags, parse_id};

const NOTE_NOT_FOUND: &str = "Note not found";
const NOT_AUTHORIZED: &str = "User not authorized";

#[derive(Debug, Deserialize)]
pub struct NoteQuery {
    pub book: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub content: Option<String>,
    pub book: Option<Value>,
    pub page_number: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<NoteKind>,
    pub color: Option<Color>,
    pub tags: Option<Vec<String>>,
}

/// A validated create request; `book` is still the raw identifier text.
#[derive(Debug)]
pub struct ValidNote {
    pub book: String,
    pub content: String,
    pub page_number: PageNumber,
    pub kind: NoteKind,
    pub color: Color,
    pub tags: Vec<String>,
}

impl CreateNoteRequest {
    pub fn validate(self) -> Result<ValidNote, ApiError> {
        let mut errors = Vec::new();

        if is_blank(&self.content) {
            errors.push(FieldError::new("content", "Content is required"));
        }
        let book = self.book.as_ref().and_then(id_text);
        if book.is_none() {
            errors.push(FieldError::new("book", "Book ID is required"));
        }
        let page_number = self.page_number.as_ref().and_then(PageNumber::parse);
        if page_number.is_none() {
            errors.push(FieldError::new("pageNumber", "Page number is required"));
        }

        match (book, page_number) {
            (Some(book), Some(page_number)) if errors.is_empty() => Ok(ValidNote {
                book,
                content: self.content.unwrap_or_default(),
                page_number,
                kind: self.kind.unwrap_or_default(),
                color: self.color.unwrap_or_default(),
                tags: normalize_tags(self.tags.unwrap_or_default()),
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// Only these fields can be changed; anything else in the body is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    pub content: Option<String>,
    pub page_number: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<NoteKind>,
    pub color: Option<Color>,
    pub tags: Option<Vec<String>>,
}

impl UpdateNoteRequest {
    pub fn validate(self) -> Result<NoteChanges, ApiError> {
        let mut errors = Vec::new();

        if self.content.is_some() && is_blank(&self.content) {
            errors.push(FieldError::new("content", "Content is required"));
        }
        let page_number = match &self.page_number {
            Some(raw) => {
                let parsed = PageNumber::parse(raw);
                if parsed.is_none() {
                    errors.push(FieldError::new("pageNumber", "Page number is required"));
                }
                parsed
            }
            None => None,
        };

        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        Ok(NoteChanges {
            content: self.content,
            page_number,
            kind: self.kind,
            color: self.color,
            tags: self.tags.map(normalize_tags),
        })
    }
}

impl NoteQuery {
    /// `None` means the filter can match nothing.
    fn into_filter(self) -> Result<Option<NoteFilter>, ApiError> {
        let kind = match self.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(raw) => Some(NoteKind::from_str(raw).ok_or_else(|| {
                ApiError::Validation(vec![FieldError::new("type", "Invalid note type")])
            })?),
            None => None,
        };

        let book = match self.book.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(raw) => match parse_id(raw) {
                Some(id) => Some(id),
                None => return Ok(None),
            },
            None => None,
        };

        Ok(Some(NoteFilter {
            book,
            kind,
            q: self.q,
        }))
    }
}

async fn owned_note(notebook: &Notebook<'_>, raw_id: &str, caller: &UserId) -> Result<Note, ApiError> {
    let id = parse_id(raw_id).ok_or(ApiError::NotFound(NOTE_NOT_FOUND))?;
    let note = notebook
        .get_note(id)
        .await?
        .ok_or(ApiError::NotFound(NOTE_NOT_FOUND))?;

    if &note.user != caller {
        tracing::warn!(user = %caller, note = id, "rejected access to another user's note");
        return Err(ApiError::Unauthorized(NOT_AUTHORIZED));
    }
    Ok(note)
}

pub async fn list_notes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<NoteQuery>,
) -> Result<Json<Vec<PopulatedNote>>, ApiError> {
    let Some(filter) = params.into_filter()? else {
        return Ok(Json(vec![]));
    };

    let notes = Notebook::new(state.db.connection())
        .list_notes(&user, &filter)
        .await?;
    tracing::info!(user = %user, "listed {} notes", notes.len());
    Ok(Json(notes))
}

pub async fn get_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    let notebook = Notebook::new(state.db.connection());
    let note = owned_note(&notebook, &id, &user).await?;
    Ok(Json(note))
}

pub async fn create_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<CreateNoteRequest>,
) -> Result<Json<Note>, ApiError> {
    let valid = payload.validate()?;

    let book = parse_id(&valid.book).ok_or(ApiError::NotFound("Book not found"))?;
    if !Catalog::new(&state.db).book_exists(book).await? {
        return Err(ApiError::NotFound("Book not found"));
    }

    let note = Notebook::new(state.db.connection())
        .create_note(NewNote {
            user: user.clone(),
            book,
            content: valid.content,
            page_number: valid.page_number,
            kind: valid.kind,
            color: valid.color,
            tags: valid.tags,
        })
        .await?;

    tracing::info!(user = %user, note = note.id, book, "created note");
    Ok(Json(note))
}

pub async fn update_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<Value>,
) -> Result<Json<Note>, ApiError> {
    let notebook = Notebook::new(state.db.connection());
    let note = owned_note(&notebook, &id, &user).await?;
    let changes = from_body::<UpdateNoteRequest>(body)?.validate()?;

    match notebook.update_note(note.id, changes).await? {
        Some(updated) => {
            tracing::info!(user = %user, note = note.id, "updated note");
            Ok(Json(updated))
        }
        None => Err(ApiError::NotFound(NOTE_NOT_FOUND)),
    }
}

pub async fn delete_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let notebook = Notebook::new(state.db.connection());
    let note = owned_note(&notebook, &id, &user).await?;

    if !notebook.delete_note(note.id).await? {
        return Err(ApiError::NotFound(NOTE_NOT_FOUND));
    }

    tracing::info!(user = %user, note = note.id, "deleted note");
    Ok(Json(MessageResponse::new("Note removed")))
}
