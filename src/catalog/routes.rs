use axum::{
    Router,
    routing::{delete, get, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_books).post(handler::create_book))
        .route("/:id", get(handler::get_book))
        .route("/:id/highlight", put(handler::add_highlight))
        .route("/:id/highlight/:highlight_id", delete(handler::remove_highlight))
}
