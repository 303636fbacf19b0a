//! Notes
//!
//! Per-user notes, highlights and bookmarks that point at a book by id.
//! A note belongs to the user who created it; every read-by-id, update and
//! delete checks that the caller is that user.

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::*;

pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[("notes_001_notes.sql", include_str!("migrations/001_notes.sql"))]
}
