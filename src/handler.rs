use std::sync::Arc;

use axum::{Json, response::IntoResponse};
use tracing::info;

use crate::api::HealthResponse;
use crate::auth::TokenAuthority;
use crate::db::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<TokenAuthority>,
}

impl AppState {
    pub fn new(db: Database, auth: TokenAuthority) -> Self {
        AppState {
            db: Arc::new(db),
            auth: Arc::new(auth),
        }
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(HealthResponse { status: "ok" })
}
