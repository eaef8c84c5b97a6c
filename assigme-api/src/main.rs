use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod models;
mod routes;
mod schema;
mod services;

use assigme_shared::clients::db::{create_pool, DbPool};
use assigme_shared::clients::minio::MinioClient;
use assigme_shared::clients::redis::RedisClient;
use config::AppConfig;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub redis: RedisClient,
    pub minio: MinioClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    assigme_shared::middleware::init_tracing("assigme-api");

    let config = AppConfig::load()?;
    let port = config.port;
    assigme_shared::middleware::set_jwt_secret(config.jwt_secret.clone());

    let db = create_pool(&config.database_url)?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let minio = MinioClient::new(
        &config.minio_endpoint,
        &config.minio_access_key,
        &config.minio_secret_key,
        &config.minio_bucket,
        &config.minio_public_url,
    )
    .await;

    let state = Arc::new(AppState {
        db,
        config,
        redis,
        minio,
    });

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/profile", get(routes::auth::profile))
        // Annonces
        .route(
            "/api/annonces",
            get(routes::annonces::list_annonces).post(routes::annonces::create_annonce),
        )
        .route("/api/annonces/mes-annonces", get(routes::annonces::list_mes_annonces))
        .route(
            "/api/annonces/:id",
            get(routes::annonces::get_annonce)
                .put(routes::annonces::update_annonce)
                .delete(routes::annonces::delete_annonce),
        )
        // Images
        .route(
            "/api/annonces/:id/images",
            post(routes::images::upload_images)
                .layer(DefaultBodyLimit::max(30 * 1024 * 1024)),
        )
        .route("/api/annonces/:id/images/order", put(routes::images::reorder_images))
        .route(
            "/api/annonces/:id/images/:image_id",
            delete(routes::images::delete_image),
        )
        // Categories
        .route("/api/categories", get(routes::categories::list_categories))
        .route("/api/categories/simple", get(routes::categories::list_categories_simple))
        .route(
            "/api/categories/:id/sous-categories",
            get(routes::categories::list_sous_categories),
        )
        // Favoris
        .route("/api/favoris", get(routes::favoris::list_favoris))
        .route("/api/favoris/:annonce_id/check", get(routes::favoris::check_favori))
        .route(
            "/api/favoris/:annonce_id",
            post(routes::favoris::add_favori).delete(routes::favoris::remove_favori),
        )
        // Conversations
        .route("/api/conversations", get(routes::conversations::list_conversations))
        .route(
            "/api/conversations/annonce/:annonce_id",
            post(routes::conversations::start_conversation),
        )
        .route(
            "/api/conversations/:id/messages",
            get(routes::conversations::get_messages).post(routes::conversations::send_message),
        )
        .route("/api/conversations/:id/status", put(routes::conversations::update_status))
        // Calls
        .route("/api/calls", post(routes::calls::initiate_call))
        .route("/api/calls/:call_id/response", put(routes::calls::respond_call))
        .route("/api/calls/:call_id/end", put(routes::calls::end_call))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "assigme-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
