use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ylab_server::{
    audit_middleware,
    auth::{require_admin, require_session, require_team},
    cli::{Cli, Commands},
    config::ServerConfig,
    handlers::{
        admin, admin_login, get_poll, get_poll_results, get_resource, health_check,
        list_polls, list_resources, logout, team, team_login, verify,
    },
    notify::Notifier,
    state::ServerState,
    storage::{initialize_schema, AuditStore, PostgresAuditStore},
    AuditMiddlewareState,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ylab_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;

    initialize_schema(&pool).await?;

    match cli.command {
        Some(Commands::Team(cmd)) => return cmd.execute(pool, config.starting_credit).await,
        Some(Commands::Admin(cmd)) => return cmd.execute(pool).await,
        Some(Commands::Resource(cmd)) => return cmd.execute(pool).await,
        Some(Commands::Composition(cmd)) => return cmd.execute(pool).await,
        Some(Commands::Poll(cmd)) => return cmd.execute(pool).await,
        Some(Commands::Audit { limit, principal }) => {
            let audit_store = PostgresAuditStore::new(pool);
            let entries = match principal {
                Some(principal) => audit_store.for_principal(&principal, limit).await?,
                None => audit_store.recent(limit).await?,
            };

            println!(
                "{:<20} {:<12} {:<24} {:<16} {:<16} {:<8}",
                "Timestamp", "Principal", "Action", "Resource", "IP", "Success"
            );
            println!("{}", "-".repeat(100));

            for entry in entries {
                println!(
                    "{:<20} {:<12} {:<24} {:<16} {:<16} {:<8}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.principal.as_deref().unwrap_or("-"),
                    entry.action.as_str(),
                    entry
                        .resource_type
                        .as_ref()
                        .map(|t| format!("{}:{}", t, entry.resource_id.as_deref().unwrap_or("")))
                        .unwrap_or_else(|| "-".to_string()),
                    entry.ip_address.as_deref().unwrap_or("-"),
                    if entry.success { "Yes" } else { "No" }
                );
            }

            return Ok(());
        }
        Some(Commands::Serve) | None => {}
    }

    info!("🚀 Starting YLab Market Server v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   Session timeout: {}s", config.session_timeout_seconds);
    info!("   Starting credit: {}", config.starting_credit);
    info!("✅ Database connected and schema initialized");

    let notifier = Notifier::from_config(&config.smtp);
    info!("   Email transport: {}", notifier.transport());

    let state = Arc::new(ServerState::new(config.clone(), pool, notifier));

    let audit_middleware_state = AuditMiddlewareState {
        audit_store: state.audit_store.clone(),
        session_manager: state.auth_state.session_manager.clone(),
    };

    // Spawn background task to cleanup expired sessions
    {
        let session_manager = state.auth_state.session_manager.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                let cleaned = session_manager.cleanup_expired();
                if cleaned > 0 {
                    info!("Cleaned up {} expired sessions", cleaned);
                }
            }
        });
    }

    // Spawn background task to cleanup rate limiter entries
    {
        let rate_limiter = state.auth_state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(120)); // Every 2 minutes
            loop {
                interval.tick().await;
                let cleaned = rate_limiter.cleanup();
                if cleaned > 0 {
                    info!("Cleaned up {} rate limiter entries", cleaned);
                }
            }
        });
    }

    // Build router
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/auth/team/login", post(team_login))
        .route("/api/auth/admin/login", post(admin_login))
        .route("/api/resources", get(list_resources))
        .route("/api/resources/{id}", get(get_resource))
        .route("/api/polls", get(list_polls))
        .route("/api/polls/{id}", get(get_poll))
        .route("/api/polls/{id}/results", get(get_poll_results));

    let session_routes = Router::new()
        .route("/api/auth/verify", get(verify))
        .route("/api/auth/logout", post(logout))
        .layer(middleware::from_fn_with_state(
            state.auth_state.clone(),
            require_session,
        ));

    let team_routes = Router::new()
        .route(
            "/api/team/profile",
            get(team::get_profile).put(team::update_profile),
        )
        .route(
            "/api/team/purchases",
            get(team::list_purchases).post(team::create_purchase),
        )
        .route("/api/team/purchases/batch", post(team::create_batch_purchase))
        .route("/api/team/purchases/{id}/return", post(team::return_purchase))
        .route("/api/team/votes", get(team::list_votes).post(team::cast_vote))
        .route("/api/team/votes/poll/{poll_id}", get(team::get_vote_for_poll))
        .layer(middleware::from_fn_with_state(
            state.auth_state.clone(),
            require_team,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/purchases", get(admin::list_purchases))
        .route("/api/admin/purchases/batch/action", post(admin::decide_batch))
        .route("/api/admin/purchases/{id}", get(admin::get_purchase))
        .route("/api/admin/purchases/{id}/action", post(admin::decide_purchase))
        .route(
            "/api/admin/purchases/{id}/mark-returned",
            post(admin::mark_returned),
        )
        .route(
            "/api/admin/purchases/{id}/unmark-returned",
            post(admin::unmark_returned),
        )
        .route("/api/admin/teams", get(admin::list_teams))
        .route("/api/admin/team-compositions", get(admin::list_compositions))
        .route(
            "/api/admin/team-compositions/{id}/toggle",
            post(admin::toggle_slot),
        )
        .layer(middleware::from_fn_with_state(
            state.auth_state.clone(),
            require_admin,
        ));

    // CORS configuration - configurable via CORS_ORIGINS env var
    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    info!("   CORS origins: {:?}", config.cors_origins);
    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true);

    let app = Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(team_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            audit_middleware_state,
            audit_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("🎧 Listening on http://{}", addr);
    info!("🔑 Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
