//! SQL Coach CLI
//!
//! Main entry point for serving an interactive SQL learning session.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sqlcoach_session::{
    create_router, AppState, Config, EventBroadcaster, GeminiBackend, LessonCatalog, Session,
    SessionController, SessionSnapshot, TutorAssembler,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// SQL Coach - Interactive SQL Tutor
///
/// Serves a lesson-by-lesson SQL course over HTTP and WebSocket. Learners
/// edit and run queries against an in-memory seeded database and can ask an
/// AI tutor for help grounded in their current query and lesson.
#[derive(Parser, Debug)]
#[command(name = "sqlcoach")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: sqlcoach.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// JSON lesson file replacing the built-in course
    #[arg(short, long, value_name = "FILE")]
    lessons: Option<String>,

    /// SQL script replacing the built-in dataset
    #[arg(short, long, value_name = "FILE")]
    seed: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("SQL Coach starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the SQL Coach server.
///
/// 1. Load config and apply CLI overrides
/// 2. Load the lesson catalog and dataset seed
/// 3. Build the tutor backend and session controller
/// 4. Seed the engine
/// 5. Serve HTTP and WebSocket until Ctrl+C
async fn run_server(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(lessons) = args.lessons {
        config.lessons_file = Some(lessons);
    }
    if let Some(seed) = args.seed {
        config.seed_file = Some(seed);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let catalog = config.lesson_catalog()?;
    print_catalog_info(&catalog);
    let seed = config.dataset_seed()?;

    let backend = GeminiBackend::new(&config.tutor)?;
    if std::env::var(&config.tutor.api_key_env).is_err() {
        tracing::warn!(
            env = %config.tutor.api_key_env,
            "Tutor credential not set; tutor answers will fall back to a canned reply"
        );
    }

    let controller = SessionController::new(
        Session::new(catalog, seed),
        TutorAssembler::new(Arc::new(backend), config.tutor.model.clone()),
        EventBroadcaster::new(config.event_capacity),
    );

    println!();
    println!("Loading dataset...");
    match controller.initialize().await {
        Ok(()) => println!("Database ready"),
        Err(e) => {
            // Keep serving so the learner surface can show the failure
            tracing::error!(error = %e, "Engine failed to load");
            println!("Database failed to load: {e}");
        }
    }

    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();
    let router = create_router(AppState::new(config, controller.clone()));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Event stream on ws://{addr}/ws");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!();
    print_summary(&controller.snapshot().await);
    Ok(())
}

/// Resolves when Ctrl+C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Tutor model: {}", config.tutor.model);
    println!("  Credential variable: {}", config.tutor.api_key_env);
    println!("  Tutor timeout: {}s", config.tutor.timeout_seconds);
    println!(
        "  Lessons: {}",
        config.lessons_file.as_deref().unwrap_or("built-in")
    );
    println!(
        "  Dataset: {}",
        config.seed_file.as_deref().unwrap_or("built-in")
    );
}

/// Prints catalog information.
fn print_catalog_info(catalog: &LessonCatalog) {
    println!();
    println!("Course loaded: {} lessons", catalog.count());
    for (index, lesson) in catalog.iter().enumerate() {
        tracing::debug!(index, id = %lesson.id, title = %lesson.title, "Lesson loaded");
    }
}

/// Prints a summary of the session at shutdown.
fn print_summary(snapshot: &SessionSnapshot) {
    println!("=== SQL Coach Summary ===");
    println!("Engine: {:?}", snapshot.status);
    println!(
        "Lesson reached: {} of {} ({})",
        snapshot.progress.position, snapshot.progress.total, snapshot.lesson.title
    );
    println!("Transcript messages: {}", snapshot.transcript.len());
}
