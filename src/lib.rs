pub mod contacts;
pub mod conversations;
pub mod db;
pub mod error;
pub mod event;
pub mod session;
pub mod store;
pub mod sync;

pub use error::{AppError, AppResult};

use axum::{extract::FromRef, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use sync::SyncEngine;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub engine: SyncEngine,
}

impl AppState {
    pub fn new(db_pool: SqlitePool) -> Self {
        let engine = SyncEngine::new(db_pool.clone());
        Self { db_pool, engine }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/c", conversations::router())
        .nest("/contacts", contacts::router())
        .merge(sync::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
