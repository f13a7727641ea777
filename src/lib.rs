use axum::{
    routing::{get, patch},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod config;
pub mod models;
pub mod routes;
pub mod utils;

use config::{BackendType, Config};
use models::storage::{BookStore, MemoryBackend, PostgresBackend, RedisBackend, StorageError};
use routes::{
    books::{create_book, delete_book, list_books, method_not_allowed, not_found, update_book},
    health::health_check,
};

pub type Backend = Arc<dyn BookStore + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub store: Backend,
    pub books_per_shelf: usize,
}

impl AppState {
    pub fn new(store: Backend, books_per_shelf: usize) -> Self {
        Self {
            store,
            books_per_shelf,
        }
    }
}

pub async fn connect_backend(config: &Config) -> Result<Backend, StorageError> {
    let backend: Backend = match config.backend_type {
        BackendType::Postgres => {
            info!("Using PostgreSQL backend");
            Arc::new(PostgresBackend::new(&config.database_url).await?)
        }
        BackendType::Redis => {
            info!("Using Redis backend");
            Arc::new(RedisBackend::new(&config.redis_url)?)
        }
        BackendType::Memory => {
            info!("Using in-memory backend");
            Arc::new(MemoryBackend::new())
        }
    };

    backend.test_connection().await?;
    Ok(backend)
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/status", get(health_check).fallback(method_not_allowed))
        .route(
            "/books",
            get(list_books)
                .post(create_book)
                .fallback(method_not_allowed),
        )
        .route(
            "/books/:id",
            patch(update_book)
                .delete(delete_book)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
