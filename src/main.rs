mod config;
mod db;
mod error;
mod ids;
mod issue;
mod render;
mod routes;
mod state;
mod storage;
mod templates;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use storage::StorageBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certmint=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(config::Config::from_env()?);

    std::fs::create_dir_all(&config.upload_folder)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let backend: Arc<dyn StorageBackend> = match &config.cloud {
        Some(cloud) => {
            tracing::info!("cloud storage configured, rendered assets will be uploaded");
            Arc::new(storage::CloudBackend::new(cloud.clone())?)
        }
        None => {
            tracing::info!(
                "cloud storage not configured, serving assets from {}",
                config.upload_folder.display()
            );
            Arc::new(storage::LocalBackend::new(&config.upload_folder)?)
        }
    };

    let renderer = Arc::new(render::ChromeRenderer::new(config.render_timeout)?);

    let state = Arc::new(state::AppState {
        pool,
        config: config.clone(),
        backend,
        renderer,
    });

    let app = Router::new()
        .route("/api/courses", post(routes::create_course).get(routes::list_courses))
        .route("/api/students", post(routes::create_student))
        .route("/api/students/:student_id", get(routes::get_student))
        .route(
            "/api/certificates",
            post(routes::issue_certificate).get(routes::list_certificates),
        )
        .route("/api/certificates/verify/:cert_no", get(routes::verify_certificate))
        .route("/api/certificates/:cert_no", delete(routes::delete_certificate))
        .nest_service(
            "/uploads",
            tower_http::services::ServeDir::new(&config.upload_folder),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Certmint listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
