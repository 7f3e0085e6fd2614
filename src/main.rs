use std::sync::Arc;

use gatehouse::backend::http::HttpBackend;
use gatehouse::{config, routes, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    // Missing backend coordinates are fatal: refuse to serve.
    let backend_config = config::BackendConfig::from_env().expect("backend configuration");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let backend = Arc::new(HttpBackend::new(backend_config));
    let state = state::AppState::new(backend.clone(), backend);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "gatehouse listening");
    axum::serve(listener, app).await.expect("server failed");
}
