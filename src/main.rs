//! roomhub server binary.

use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::Secret;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use roomhub::adapters::access::OpenRoomAccess;
use roomhub::adapters::auth::JwtSessionValidator;
use roomhub::adapters::history::{InMemoryChatHistory, PostgresChatHistory};
use roomhub::adapters::http::{api_router, middleware::AuthState, RealtimeHandlers};
use roomhub::adapters::websocket::{Hub, HubConfig, PumpConfig, WebSocketState};
use roomhub::application::{GetChatHistoryHandler, GetOnlineUsersHandler};
use roomhub::config::{AppConfig, DatabaseConfig, RealtimeConfig, ServerConfig};
use roomhub::ports::{ChatHistory, RoomAccessChecker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let history = chat_history(config.database.as_ref()).await?;
    let validator = Arc::new(JwtSessionValidator::new(Secret::new(
        config.auth.jwt_secret.clone(),
    )));
    let access: Arc<dyn RoomAccessChecker> = Arc::new(OpenRoomAccess::new());

    let hub = Hub::spawn(hub_config(&config.realtime), history.clone());

    if config.auth.allow_anonymous {
        tracing::warn!("anonymous WebSocket access is enabled");
    }

    let ws_state = WebSocketState {
        hub: hub.clone(),
        validator: validator.clone(),
        access: access.clone(),
        allow_anonymous: config.auth.allow_anonymous,
        queue_capacity: config.realtime.session_queue_capacity,
        pump: pump_config(&config.realtime),
    };
    let handlers = RealtimeHandlers::new(
        Arc::new(GetOnlineUsersHandler::new(hub)),
        Arc::new(GetChatHistoryHandler::new(history, access)),
    );
    let auth: AuthState = validator;

    let app = api_router(
        ws_state,
        handlers,
        auth,
        std::time::Duration::from_secs(config.server.request_timeout_secs),
    )
    .layer(cors_layer(&config.server))
    .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, environment = ?config.server.environment, "starting roomhub");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("roomhub stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn chat_history(
    database: Option<&DatabaseConfig>,
) -> Result<Arc<dyn ChatHistory>, Box<dyn std::error::Error>> {
    let Some(db) = database else {
        tracing::warn!("no database configured, chat history is kept in memory");
        return Ok(Arc::new(InMemoryChatHistory::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(db.acquire_timeout())
        .connect(&db.url)
        .await?;
    tracing::info!(url = %db.redacted_url(), "chat history stored in PostgreSQL");

    if db.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }

    Ok(Arc::new(PostgresChatHistory::new(pool)))
}

fn hub_config(realtime: &RealtimeConfig) -> HubConfig {
    HubConfig {
        register_capacity: realtime.register_queue_capacity,
        unregister_capacity: realtime.unregister_queue_capacity,
        dispatch_capacity: realtime.dispatch_queue_capacity,
        history_timeout: realtime.history_timeout(),
    }
}

fn pump_config(realtime: &RealtimeConfig) -> PumpConfig {
    PumpConfig {
        pong_wait: realtime.pong_wait(),
        ping_period: realtime.ping_period(),
        write_wait: realtime.write_wait(),
        max_message_bytes: realtime.max_message_bytes,
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
