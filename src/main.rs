use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mindgate::auth::spawn_sweep_task;
use mindgate::config::{Config, SameSitePolicy};
use mindgate::db::UserStore;
use mindgate::predict::{HttpPredictor, TracingAuditSink};
use mindgate::AppState;

#[derive(Parser, Debug)]
#[command(name = "mindgate")]
#[command(author, version, about = "Session-authenticated gateway to a text prediction service", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "MINDGATE_CONFIG", default_value = "mindgate.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// The one origin allowed to call the API from a browser
    #[arg(long, env = "FRONTEND_ORIGIN")]
    frontend_origin: Option<String>,

    /// Mark the session cookie Secure (true/false)
    #[arg(long, env = "COOKIE_SECURE")]
    cookie_secure: Option<bool>,

    /// SameSite policy of the session cookie (strict, lax, none)
    #[arg(long, env = "COOKIE_SAMESITE")]
    cookie_same_site: Option<SameSitePolicy>,

    /// URL the prediction requests are posted to
    #[arg(long, env = "PREDICTOR_URL")]
    predictor_url: Option<String>,
}

impl Cli {
    /// Command line and environment values win over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(origin) = &self.frontend_origin {
            config.cors.allowed_origin = Some(origin.clone());
        }
        if let Some(secure) = self.cookie_secure {
            config.session.secure = secure;
        }
        if let Some(same_site) = self.cookie_same_site {
            config.session.same_site = same_site;
        }
        if let Some(url) = &self.predictor_url {
            config.predictor.url = url.clone();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    cli.apply(&mut config);
    config.validate()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting mindgate v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;

    let db = mindgate::db::init(&config.server.data_dir, &config.database).await?;
    let accounts = UserStore::new(db.clone()).count_users().await?;
    tracing::info!("{} registered accounts", accounts);

    let predictor = Arc::new(HttpPredictor::new(
        config.predictor.url.clone(),
        config.predictor.timeout(),
    ));
    tracing::info!(
        "Forwarding predictions to {} (timeout {}s)",
        predictor.url(),
        config.predictor.timeout_secs
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        db,
        predictor,
        Arc::new(TracingAuditSink),
    ));

    spawn_sweep_task(state.sessions(), config.session.sweep_interval_secs);

    let mut app = mindgate::api::create_router(state);

    // Serve the browser frontend for anything the API does not handle
    if let Some(static_dir) = &config.server.static_dir {
        let index_file = static_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)));
        tracing::info!("Serving frontend from {}", static_dir.display());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Backend listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
