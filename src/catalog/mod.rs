//! Book Catalog
//!
//! Books are stored as whole documents: scalar columns plus JSON columns for
//! the table of contents, tags and the embedded highlights. Highlights have
//! no table of their own; they are created by prepending to a book's list and
//! destroyed by removing from it, and every change re-persists the book.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lectern::catalog;
//!
//! let app = Router::new()
//!     .nest("/api/books", catalog::routes())
//!     .with_state(app_state);
//!
//! let lib = catalog::Catalog::new(&db);
//! let book = lib.get_book(id).await?;
//! ```

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::*;

pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[("catalog_001_books.sql", include_str!("migrations/001_books.sql"))]
}
