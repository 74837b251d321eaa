use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    routing::{delete, get, post},
};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

mod cli;
mod config;
mod db;
mod error;
mod export;
mod handlers;
mod hub;
mod metrics;
mod models;
mod repository;
mod service;
mod views;
mod ws;

#[cfg(test)]
mod test_helpers;

use config::{FileConfig, MeetConfig, ServerConfig, load_config};
use db::Database;
use hub::EventHub;
use metrics::ServerMetrics;
use repository::MeetRepository;
use service::MeetService;

/// Custom span maker that adds a unique request_id to each HTTP request span
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "meetd")]
#[command(about = "Real-time coordination server for powerlifting meets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.meetd)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordination server (default)
    Serve(ServeArgs),
    /// Follow the live meet state from the command line
    Watch(WatchArgs),
    /// Write the lifter and lift CSVs to the exports directory
    Export,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Args)]
struct WatchArgs {
    /// Channel URL, e.g. ws://127.0.0.1:5000/ws
    #[arg(long)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Whether the chosen command asked for debug logging.
    fn debug(&self) -> bool {
        match &self.command {
            Some(Commands::Serve(args)) => args.debug,
            Some(Commands::Watch(args)) => args.debug,
            Some(Commands::Export) | None => false,
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: Arc<MeetConfig>,
    pub db: Arc<Database>,
    pub service: Arc<MeetService>,
    pub metrics: Arc<ServerMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug());
    let config = MeetConfig::new(cli.data_dir)?;
    let file_config: FileConfig = load_config(&config.data_dir)
        .extract()
        .with_context(|| format!("Invalid {}", config.config_toml_path().display()))?;

    match cli.command {
        Some(Commands::Watch(args)) => {
            cli::watch_command(&file_config, args.endpoint.as_deref()).await
        }
        Some(Commands::Export) => cli::export_command(&config, &file_config).await,
        Some(Commands::Serve(args)) => run_server(args, config, file_config).await,
        None => run_server(ServeArgs::default(), config, file_config).await,
    }
}

fn init_logging(debug: bool) {
    let default_directive = if debug {
        "meetd=debug,meet_link=debug,tower_http=debug,info"
    } else {
        "meetd=info,meet_link=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}

/// Open the database and wire the service, hub and metrics together.
pub(crate) async fn build_state(config: MeetConfig, file_config: &FileConfig) -> Result<AppState> {
    let db = Database::new(&config).await?;
    let metrics = Arc::new(ServerMetrics::new());
    let hub = Arc::new(EventHub::new(metrics.clone()));
    let service = MeetService::new(
        MeetRepository::new(db.pool.clone()),
        hub,
        config::judge_panel(&file_config.judges),
        file_config.meet.date,
    );

    Ok(AppState {
        config: Arc::new(config),
        db: Arc::new(db),
        service: Arc::new(service),
        metrics,
    })
}

pub(crate) fn build_router(state: AppState) -> Router {
    let surfaces = views::SURFACE_ROUTES
        .iter()
        .fold(Router::<AppState>::new(), |router, route| {
            let surface = route.surface;
            router.route(
                route.path,
                get(move |State(state): State<AppState>| views::render_surface(surface, state)),
            )
        });

    surfaces
        // Meet state
        .route(
            "/api/meet_state",
            get(handlers::get_meet_state).post(handlers::update_meet_state),
        )
        .route(
            "/api/meet_state/advance_attempt",
            post(handlers::advance_attempt),
        )
        .route(
            "/api/meet_state/display_mode",
            post(handlers::set_display_mode),
        )
        .route("/api/set_active_lift", post(handlers::set_active_lift))
        .route("/api/current_lift", get(handlers::current_lift))
        // Lifters
        .route(
            "/api/lifters",
            get(handlers::list_lifters).post(handlers::create_lifter),
        )
        .route(
            "/api/lifters/{id}/add_additional_weight_class",
            post(handlers::add_additional_weight_class),
        )
        .route(
            "/api/lifters/{id}/remove_additional_weight_class",
            post(handlers::remove_additional_weight_class),
        )
        .route(
            "/api/lifters/{id}/add_additional_age_class",
            post(handlers::add_additional_age_class),
        )
        .route(
            "/api/lifters/{id}/remove_additional_age_class",
            post(handlers::remove_additional_age_class),
        )
        // Classes
        .route(
            "/api/weight_classes",
            get(handlers::list_weight_classes).post(handlers::create_weight_class),
        )
        .route(
            "/api/weight_classes/{id}",
            delete(handlers::delete_weight_class),
        )
        .route(
            "/api/age_classes",
            get(handlers::list_age_classes).post(handlers::create_age_class),
        )
        .route("/api/age_classes/{id}", delete(handlers::delete_age_class))
        // Lifts and judging
        .route("/api/lifts", get(handlers::list_lifts))
        .route("/api/lifts/{id}/score", post(handlers::score_lift))
        .route("/api/login_judge", post(handlers::login_judge))
        .route("/api/export_meet_data", get(handlers::export_meet_data))
        // Channel
        .route("/ws", get(handlers::websocket_handler))
        // Health
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn run_server(args: ServeArgs, config: MeetConfig, file_config: FileConfig) -> Result<()> {
    info!("Starting meetd - powerlifting meet coordination");

    let server_config = ServerConfig::from_file(&file_config.server, args.host, args.port);
    let state = build_state(config, &file_config).await?;

    let stats = state.db.get_stats().await?;
    info!(
        "Meet loaded: {} lifters, {} lifts ({} completed), {} weight classes, {} age classes",
        stats.lifters, stats.lifts, stats.completed_lifts, stats.weight_classes, stats.age_classes
    );

    let app = build_router(state);

    let addr = server_config
        .bind_addr()
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid bind address: {}", server_config.bind_addr()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on http://{}", actual_addr);
    info!("Organizer: http://{}/organizer", actual_addr);
    info!("Channel: ws://{}/ws", actual_addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, stopping...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["meetd", "--data-dir", "/tmp/m", "serve", "--port", "5050"])
            .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/m")));
        match cli.command {
            Some(Commands::Serve(args)) => {
                assert_eq!(args.port, Some(5050));
                assert!(args.host.is_none());
                assert!(!args.debug);
            }
            _ => panic!("expected serve"),
        }

        let cli = Cli::try_parse_from(["meetd", "watch", "--endpoint", "ws://h:1/ws"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Watch(WatchArgs { endpoint: Some(ref e), .. })) if e == "ws://h:1/ws"
        ));

        let cli = Cli::try_parse_from(["meetd"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn every_command_picks_a_log_level() {
        let cli = Cli::try_parse_from(["meetd", "export"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Export)));
        assert!(!cli.debug());

        let cli = Cli::try_parse_from(["meetd", "watch", "--debug"]).unwrap();
        assert!(cli.debug());
        let cli = Cli::try_parse_from(["meetd", "serve", "--debug"]).unwrap();
        assert!(cli.debug());
        assert!(!Cli::try_parse_from(["meetd"]).unwrap().debug());
    }
}
