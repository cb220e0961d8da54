//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, mentor_llm::OpenAiMentorAdapter},
    config::Config,
    error::ApiError,
    web::{
        activity_calendar_handler, award_handler, chat_handler, complete_activity_handler,
        create_conversation_handler, delete_conversation_handler, get_conversation_handler,
        list_achievements_handler, require_auth, rest::ApiDoc, send_message_handler,
        state::{AppState, ConversationRegistry},
        tap_chip_handler, update_preferences_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Mentor Adapter ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let mentor_adapter = Arc::new(OpenAiMentorAdapter::new(
        openai_client,
        config.mentor_model.clone(),
        config.mentor_temperature,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        auth: db_adapter.clone(),
        mentor: mentor_adapter,
        achievements: db_adapter.clone(),
        activity: db_adapter.clone(),
        preferences: db_adapter,
        conversations: ConversationRegistry::new(),
    });

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Every API route needs a bearer token.
    let protected_routes = Router::new()
        .route("/mentor/chat", post(chat_handler))
        .route("/mentor/conversations", post(create_conversation_handler))
        .route(
            "/mentor/conversations/{id}",
            get(get_conversation_handler).delete(delete_conversation_handler),
        )
        .route("/mentor/conversations/{id}/messages", post(send_message_handler))
        .route("/mentor/conversations/{id}/chips", post(tap_chip_handler))
        .route(
            "/mentor/conversations/{id}/activity/complete",
            post(complete_activity_handler),
        )
        .route("/achievements", get(list_achievements_handler))
        .route("/achievements/award", post(award_handler))
        .route("/achievements/preferences", put(update_preferences_handler))
        .route("/activity/calendar", get(activity_calendar_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
