use axum::{Router, routing::get};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_notes).post(handler::create_note))
        .route(
            "/:id",
            get(handler::get_note)
                .put(handler::update_note)
                .delete(handler::delete_note),
        )
}
