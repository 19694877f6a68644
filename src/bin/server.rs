use std::{
    fs::OpenOptions,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{HeaderValue, Method, header},
    middleware,
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use clap::Parser;
use rusqlite::Connection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use expense_tracker::{
    AppState, BudgetCheckWorker, DEFAULT_QUEUE_CAPACITY, NotificationDispatcher, WebPushTransport,
    budget_check_queue, build_router, graceful_shutdown, logging_middleware,
};

/// Origins the frontend is served from during development.
const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "https://localhost:5173"];

/// The REST API server for the expense tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// Directory containing an SSL certificate `cert.pem` and key `key.pem`.
    ///
    /// The server uses plain HTTP when this is not set.
    #[arg(long, env = "CERT_PATH")]
    cert_path: Option<String>,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The secret used to sign access tokens.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    secret: String,

    /// The canonical timezone used to decide which month a transaction falls in.
    #[arg(long, env = "TIMEZONE", default_value = "Etc/UTC")]
    timezone: String,

    /// The base64url encoded VAPID public key given to browsers.
    #[arg(long, env = "VAPID_PUBLIC_KEY")]
    vapid_public_key: String,

    /// The base64url encoded VAPID private key used to sign push messages.
    #[arg(long, env = "VAPID_PRIVATE_KEY", hide_env_values = true)]
    vapid_private_key: String,

    /// The contact address push services can use to reach the operator.
    #[arg(
        long,
        env = "VAPID_SUBJECT",
        default_value = "mailto:admin@expense-tracker.local"
    )]
    vapid_subject: String,

    /// An extra origin allowed to call the API from a browser.
    #[arg(long = "allowed-origin", env = "FRONTEND_URL")]
    allowed_origins: Vec<String>,

    /// File path for the debug log.
    #[arg(long, env = "LOG_PATH", default_value = "debug.log")]
    log_path: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(&args.log_path);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let conn = Connection::open(&args.db_path)
        .unwrap_or_else(|error| panic!("Could not open database at {}: {error}", args.db_path));

    let (budget_checks, budget_check_receiver) = budget_check_queue(DEFAULT_QUEUE_CAPACITY);
    let state = AppState::new(
        conn,
        &args.secret,
        &args.timezone,
        &args.vapid_public_key,
        budget_checks,
    )
    .expect("Could not create app state");

    let transport = WebPushTransport::new(&args.vapid_private_key, &args.vapid_subject)
        .expect("Could not load VAPID keys");
    let dispatcher = NotificationDispatcher::new(state.db_connection.clone(), transport);
    let worker = BudgetCheckWorker::new(state.db_connection.clone(), dispatcher, &args.timezone);
    tokio::spawn(worker.run(budget_check_receiver));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);
    let router = router.layer(create_cors_layer(&args.allowed_origins));

    match args.cert_path {
        Some(cert_path) => {
            let tls_config = RustlsConfig::from_pem_file(
                PathBuf::from(&cert_path).join("cert.pem"),
                PathBuf::from(&cert_path).join("key.pem"),
            )
            .await
            .expect("Could not open TLS certificates.");

            tracing::info!("HTTPS server listening on {}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await
                .expect("Server stopped unexpectedly");
        }
        None => {
            tracing::info!("HTTP server listening on {}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await
                .expect("Server stopped unexpectedly");
        }
    }
}

fn setup_logging(log_path: &Path) {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn create_cors_layer(extra_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = DEFAULT_ALLOWED_ORIGINS
        .iter()
        .map(|origin| origin.to_string())
        .chain(extra_origins.iter().cloned())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!("Ignoring invalid CORS origin {origin:?}: {error}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
