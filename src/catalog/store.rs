use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::model::{Color, PageNumber, UserId, format_timestamp, now, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocSubSection {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub page_number: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub sub_sections: Vec<TocSubSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: UserId,
    pub content: Option<String>,
    pub color: Color,
    pub page_number: Option<PageNumber>,
    pub created_at: DateTime<Utc>,
}

/// Every book field except the full text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub table_of_contents: Vec<TocEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub highlights: Vec<Highlight>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    pub table_of_contents: Vec<TocEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub highlights: Vec<Highlight>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated book ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub content: String,
    pub table_of_contents: Vec<TocEntry>,
    pub cover_image: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewHighlight {
    pub content: Option<String>,
    pub color: Color,
    pub page_number: Option<PageNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HighlightError {
    #[error("highlight not found")]
    NotFound,
    #[error("highlight belongs to another user")]
    NotOwner,
}

impl Book {
    /// Prepends a highlight owned by `owner` and returns it.
    pub fn add_highlight(&mut self, owner: &UserId, input: NewHighlight) -> &Highlight {
        let highlight = Highlight {
            id: Uuid::new_v4().to_string(),
            user_id: owner.clone(),
            content: input.content,
            color: input.color,
            page_number: input.page_number,
            created_at: now(),
        };
        self.highlights.insert(0, highlight);
        &self.highlights[0]
    }

    /// Removes the highlight `id` if `caller` owns it.
    pub fn remove_highlight(&mut self, id: &str, caller: &UserId) -> Result<Highlight, HighlightError> {
        let index = self
            .highlights
            .iter()
            .position(|h| h.id == id)
            .ok_or(HighlightError::NotFound)?;

        if &self.highlights[index].user_id != caller {
            return Err(HighlightError::NotOwner);
        }

        Ok(self.highlights.remove(index))
    }
}

const SUMMARY_COLUMNS: &str = "id, title, author, description, table_of_contents, cover_image, \
     category, tags, highlights, created_at, updated_at";

pub struct Catalog<'a> {
    db: &'a Database,
}

impl<'a> Catalog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn list_books(&self) -> Result<Vec<BookSummary>> {
        let query = format!("SELECT {} FROM books ORDER BY id ASC", SUMMARY_COLUMNS);

        let mut rows = self.db.connection().query(&query, ()).await?;
        let mut books = Vec::new();

        while let Some(row) = rows.next().await? {
            books.push(row_to_summary(&row)?);
        }

        Ok(books)
    }

    pub async fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let query = format!("SELECT {}, content FROM books WHERE id = ?", SUMMARY_COLUMNS);

        let mut rows = self
            .db
            .connection()
            .query(&query, libsql::params![id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_book(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn book_exists(&self, id: i64) -> Result<bool> {
        let mut rows = self
            .db
            .connection()
            .query("SELECT 1 FROM books WHERE id = ?", libsql::params![id])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    pub async fn create_book(&self, input: NewBook) -> Result<Book> {
        let query = r#"
            INSERT INTO books (title, author, description, content, table_of_contents,
                               cover_image, category, tags, highlights, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?)
            RETURNING id
        "#;

        let created_at = format_timestamp(&now());
        let mut rows = self
            .db
            .connection()
            .query(
                query,
                libsql::params![
                    input.title,
                    input.author,
                    input.description,
                    input.content,
                    serde_json::to_string(&input.table_of_contents)?,
                    input.cover_image,
                    input.category,
                    serde_json::to_string(&input.tags)?,
                    created_at.clone(),
                    created_at
                ],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            anyhow::bail!("Failed to create book");
        };
        let id: i64 = row.get(0)?;
        drop(rows);

        self.get_book(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("book {} vanished after insert", id))
    }

    /// Loads a book, applies `apply` to it and, when that succeeds, writes the
    /// whole document back. Returns `None` when the book does not exist.
    /// Concurrent modifications are serialized so no update is lost.
    pub async fn modify_book<T, E>(
        &self,
        id: i64,
        apply: impl FnOnce(&mut Book) -> Result<T, E>,
    ) -> Result<Option<Result<T, E>>> {
        let _guard = self.db.lock_writes().await;

        let Some(mut book) = self.get_book(id).await? else {
            return Ok(None);
        };

        let value = match apply(&mut book) {
            Ok(value) => value,
            Err(e) => return Ok(Some(Err(e))),
        };

        book.updated_at = now();
        self.save_book(&book).await?;
        Ok(Some(Ok(value)))
    }

    async fn save_book(&self, book: &Book) -> Result<()> {
        let query = r#"
            UPDATE books SET
                title = ?, author = ?, description = ?, content = ?, table_of_contents = ?,
                cover_image = ?, category = ?, tags = ?, highlights = ?, updated_at = ?
            WHERE id = ?
        "#;

        let updated = self
            .db
            .connection()
            .execute(
                query,
                libsql::params![
                    book.title.clone(),
                    book.author.clone(),
                    book.description.clone(),
                    book.content.clone(),
                    serde_json::to_string(&book.table_of_contents)?,
                    book.cover_image.clone(),
                    book.category.clone(),
                    serde_json::to_string(&book.tags)?,
                    serde_json::to_string(&book.highlights)?,
                    format_timestamp(&book.updated_at),
                    book.id
                ],
            )
            .await?;

        if updated == 0 {
            anyhow::bail!("book {} disappeared before it could be saved", book.id);
        }
        Ok(())
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &libsql::Row, idx: i32) -> Result<T> {
    let raw: String = row.get(idx)?;
    Ok(serde_json::from_str(&raw)?)
}

fn row_to_summary(row: &libsql::Row) -> Result<BookSummary> {
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(BookSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        description: row.get(3)?,
        table_of_contents: json_column(row, 4)?,
        cover_image: row.get(5)?,
        category: row.get(6)?,
        tags: json_column(row, 7)?,
        highlights: json_column(row, 8)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_book(row: &libsql::Row) -> Result<Book> {
    let summary = row_to_summary(row)?;

    Ok(Book {
        id: summary.id,
        title: summary.title,
        author: summary.author,
        description: summary.description,
        content: row.get(11)?,
        table_of_contents: summary.table_of_contents,
        cover_image: summary.cover_image,
        category: summary.category,
        tags: summary.tags,
        highlights: summary.highlights,
        created_at: summary.created_at,
        updated_at: summary.updated_at,
    })
}
