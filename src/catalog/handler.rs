//! HTTP handlers for books and their highlights

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::convert::Infallible;

use super::{Book, BookSummary, Catalog, Highlight, HighlightError, NewBook, NewHighlight, TocEntry};
use crate::api::{AppJson, is_blank};
use crate::auth::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::handler::AppState;
use crate::model::{Color, PageNumber, normalize_tags, parse_id};

const BOOK_NOT_FOUND: &str = "Book not found";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub table_of_contents: Option<Vec<TocEntry>>,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl CreateBookRequest {
    pub fn validate(self) -> Result<NewBook, ApiError> {
        let mut errors = Vec::new();
        for (field, value, msg) in [
            ("title", &self.title, "Title is required"),
            ("author", &self.author, "Author is required"),
            ("content", &self.content, "Content is required"),
            ("category", &self.category, "Category is required"),
        ] {
            if is_blank(value) {
                errors.push(FieldError::new(field, msg));
            }
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        Ok(NewBook {
            title: self.title.unwrap_or_default().trim().to_string(),
            author: self.author.unwrap_or_default().trim().to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            content: self.content.unwrap_or_default(),
            table_of_contents: self.table_of_contents.unwrap_or_default(),
            cover_image: self.cover_image.filter(|c| !c.trim().is_empty()),
            category: self.category.unwrap_or_default().trim().to_string(),
            tags: normalize_tags(self.tags.unwrap_or_default()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddHighlightRequest {
    pub content: Option<String>,
    pub color: Option<Color>,
    pub page_number: Option<PageNumber>,
}

impl From<AddHighlightRequest> for NewHighlight {
    fn from(req: AddHighlightRequest) -> Self {
        NewHighlight {
            content: req.content,
            color: req.color.unwrap_or_default(),
            page_number: req.page_number,
        }
    }
}

pub async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<BookSummary>>, ApiError> {
    let books = Catalog::new(&state.db).list_books().await?;
    tracing::info!("listed {} books", books.len());
    Ok(Json(books))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Book>, ApiError> {
    let id = parse_id(&id).ok_or(ApiError::NotFound(BOOK_NOT_FOUND))?;

    match Catalog::new(&state.db).get_book(id).await? {
        Some(book) => Ok(Json(book)),
        None => Err(ApiError::NotFound(BOOK_NOT_FOUND)),
    }
}

pub async fn create_book(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<CreateBookRequest>,
) -> Result<Json<Book>, ApiError> {
    let input = payload.validate()?;
    let book = Catalog::new(&state.db).create_book(input).await?;
    tracing::info!(user = %user, book = book.id, "created book");
    Ok(Json(book))
}

pub async fn add_highlight(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<AddHighlightRequest>,
) -> Result<Json<Vec<Highlight>>, ApiError> {
    let id = parse_id(&id).ok_or(ApiError::NotFound(BOOK_NOT_FOUND))?;
    let input = NewHighlight::from(payload);

    let outcome = Catalog::new(&state.db)
        .modify_book(id, |book| {
            book.add_highlight(&user, input);
            Ok::<_, Infallible>(book.highlights.clone())
        })
        .await?;

    match outcome {
        Some(Ok(highlights)) => {
            tracing::info!(user = %user, book = id, "added highlight");
            Ok(Json(highlights))
        }
        Some(Err(never)) => match never {},
        None => Err(ApiError::NotFound(BOOK_NOT_FOUND)),
    }
}

pub async fn remove_highlight(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((id, highlight_id)): Path<(String, String)>,
) -> Result<Json<Vec<Highlight>>, ApiError> {
    let id = parse_id(&id).ok_or(ApiError::NotFound(BOOK_NOT_FOUND))?;

    let outcome = Catalog::new(&state.db)
        .modify_book(id, |book| {
            book.remove_highlight(&highlight_id, &user)?;
            Ok::<_, HighlightError>(book.highlights.clone())
        })
        .await?;

    match outcome {
        Some(Ok(highlights)) => {
            tracing::info!(user = %user, book = id, highlight = %highlight_id, "removed highlight");
            Ok(Json(highlights))
        }
        Some(Err(HighlightError::NotFound)) => Err(ApiError::NotFound("Highlight not found")),
        Some(Err(HighlightError::NotOwner)) => Err(ApiError::Unauthorized("User not authorized")),
        None => Err(ApiError::NotFound(BOOK_NOT_FOUND)),
    }
}
