use bookshelf_service::config::Config;
use bookshelf_service::{app, connect_backend, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bookshelf_service=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let backend = match connect_backend(&config).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to connect to storage backend: {}", e);
            std::process::exit(1);
        }
    };
    info!("Storage backend connection successful");

    let app = app(AppState::new(backend, config.books_per_shelf));

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Bookshelf service starting on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
