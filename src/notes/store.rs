use anyhow::Result;
use chrono::{DateTime, Utc};
use libsql::Connection;
use serde::{Deserialize, Serialize};

use crate::model::{Color, PageNumber, UserId, format_timestamp, now, parse_timestamp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    #[default]
    Note,
    Highlight,
    Bookmark,
}

impl NoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::Note => "note",
            NoteKind::Highlight => "highlight",
            NoteKind::Bookmark => "bookmark",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "note" => Some(NoteKind::Note),
            "highlight" => Some(NoteKind::Highlight),
            "bookmark" => Some(NoteKind::Bookmark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: i64,
    pub user: UserId,
    pub book: i64,
    pub content: String,
    pub page_number: PageNumber,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub color: Color,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a book that note listings carry along.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookRef {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    pub author: String,
}

/// A note with its book reference resolved; `book` is `None` when the
/// referenced book no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedNote {
    #[serde(rename = "_id")]
    pub id: i64,
    pub user: UserId,
    pub book: Option<BookRef>,
    pub content: String,
    pub page_number: PageNumber,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub color: Color,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNote {
    pub user: UserId,
    pub book: i64,
    pub content: String,
    pub page_number: PageNumber,
    pub kind: NoteKind,
    pub color: Color,
    pub tags: Vec<String>,
}

/// Fields an owner may change. Ownership and the book reference are not here.
#[derive(Debug, Clone, Default)]
pub struct NoteChanges {
    pub content: Option<String>,
    pub page_number: Option<PageNumber>,
    pub kind: Option<NoteKind>,
    pub color: Option<Color>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub book: Option<i64>,
    pub kind: Option<NoteKind>,
    pub q: Option<String>,
}

const NOTE_COLUMNS: &str = "notes.id, notes.user_id, notes.book_id, notes.content, notes.page_number, \
     notes.type, notes.color, notes.tags, notes.created_at, notes.updated_at";

pub struct Notebook<'a> {
    conn: &'a Connection,
}

impl<'a> Notebook<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn create_note(&self, input: NewNote) -> Result<Note> {
        let query = r#"
            INSERT INTO notes (user_id, book_id, content, page_number, type, color, tags, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#;

        let created_at = format_timestamp(&now());
        let mut rows = self
            .conn
            .query(
                query,
                libsql::params![
                    input.user.as_str(),
                    input.book,
                    input.content,
                    input.page_number.get(),
                    input.kind.as_str(),
                    input.color.as_str(),
                    serde_json::to_string(&input.tags)?,
                    created_at.clone(),
                    created_at
                ],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            anyhow::bail!("Failed to create note");
        };
        let id: i64 = row.get(0)?;
        drop(rows);

        self.get_note(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("note {} vanished after insert", id))
    }

    pub async fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let query = format!("SELECT {} FROM notes WHERE notes.id = ?", NOTE_COLUMNS);

        let mut rows = self.conn.query(&query, libsql::params![id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(self.row_to_note(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Notes owned by `user`, newest first, each with its book resolved.
    pub async fn list_notes(&self, user: &UserId, filter: &NoteFilter) -> Result<Vec<PopulatedNote>> {
        let mut conditions = vec!["notes.user_id = ?"];
        let mut params: Vec<libsql::Value> = vec![user.as_str().into()];

        if let Some(book) = filter.book {
            conditions.push("notes.book_id = ?");
            params.push(book.into());
        }
        if let Some(kind) = filter.kind {
            conditions.push("notes.type = ?");
            params.push(kind.as_str().into());
        }

        let query = format!(
            r#"
            SELECT {}, books.title, books.author
            FROM notes
            LEFT JOIN books ON books.id = notes.book_id
            WHERE {}
            ORDER BY notes.created_at DESC, notes.id DESC
            "#,
            NOTE_COLUMNS,
            conditions.join(" AND ")
        );

        let mut rows = self.conn.query(&query, params).await?;
        let mut notes = Vec::new();

        while let Some(row) = rows.next().await? {
            notes.push(self.row_to_populated_note(&row)?);
        }

        if let Some(needle) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = needle.to_lowercase();
            notes.retain(|n| n.content.to_lowercase().contains(&needle));
        }

        Ok(notes)
    }

    pub async fn update_note(&self, id: i64, input: NoteChanges) -> Result<Option<Note>> {
        if self.get_note(id).await?.is_none() {
            return Ok(None);
        }

        let mut updates = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(content) = &input.content {
            updates.push("content = ?");
            params.push(content.clone().into());
        }
        if let Some(page_number) = input.page_number {
            updates.push("page_number = ?");
            params.push(page_number.get().into());
        }
        if let Some(kind) = input.kind {
            updates.push("type = ?");
            params.push(kind.as_str().into());
        }
        if let Some(color) = input.color {
            updates.push("color = ?");
            params.push(color.as_str().into());
        }
        if let Some(tags) = &input.tags {
            updates.push("tags = ?");
            params.push(serde_json::to_string(tags)?.into());
        }

        updates.push("updated_at = ?");
        params.push(format_timestamp(&now()).into());
        params.push(id.into());

        let query = format!("UPDATE notes SET {} WHERE id = ?", updates.join(", "));

        self.conn.execute(&query, params).await?;
        self.get_note(id).await
    }

    pub async fn delete_note(&self, id: i64) -> Result<bool> {
        let result = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?", libsql::params![id])
            .await?;
        Ok(result > 0)
    }

    fn row_to_note(&self, row: &libsql::Row) -> Result<Note> {
        let user: String = row.get(1)?;
        let kind: String = row.get(5)?;
        let color: String = row.get(6)?;
        let tags: String = row.get(7)?;
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;

        Ok(Note {
            id: row.get(0)?,
            user: UserId::new(&user).ok_or_else(|| anyhow::anyhow!("note has a blank owner"))?,
            book: row.get(2)?,
            content: row.get(3)?,
            page_number: page_column(row, 4)?,
            kind: NoteKind::from_str(&kind)
                .ok_or_else(|| anyhow::anyhow!("Invalid note type: {}", kind))?,
            color: Color::from_str(&color)
                .ok_or_else(|| anyhow::anyhow!("Invalid color: {}", color))?,
            tags: serde_json::from_str(&tags)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn row_to_populated_note(&self, row: &libsql::Row) -> Result<PopulatedNote> {
        let note = self.row_to_note(row)?;
        let title: Option<String> = row.get(10)?;
        let author: Option<String> = row.get(11)?;

        let book = match (title, author) {
            (Some(title), Some(author)) => Some(BookRef {
                id: note.book,
                title,
                author,
            }),
            _ => None,
        };

        Ok(PopulatedNote {
            id: note.id,
            user: note.user,
            book,
            content: note.content,
            page_number: note.page_number,
            kind: note.kind,
            color: note.color,
            tags: note.tags,
            created_at: note.created_at,
            updated_at: note.updated_at,
        })
    }
}

fn page_column(row: &libsql::Row, idx: i32) -> Result<PageNumber> {
    let page = match row.get_value(idx)? {
        libsql::Value::Integer(n) => PageNumber::new(n as f64),
        libsql::Value::Real(f) => PageNumber::new(f),
        other => anyhow::bail!("Invalid page number: {:?}", other),
    };
    page.ok_or_else(|| anyhow::anyhow!("page number is not finite"))
}
