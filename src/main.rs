// Define data modules
mod config; // Environment configuration (address, db path, static dir)
mod error; // Error type and HTTP mapping
mod models; // Data structures (Task, StreakCache, Db, etc.)
mod reminder; // Daily digest and per-task reminder planning
mod routes_stats; // HTTP handlers for stats, streaks and reminders
mod routes_tasks; // HTTP handlers for task & settings APIs
mod state; // Handler state (store + clock)
mod stats; // Day bucketing, totals and streak computation
mod store; // Persistent storage (load/save db.json)

// Import axum routing utilities and Router
use axum::{
    routing::{get, post, put}, // HTTP method helpers
    Router,                    // Main router type
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, DEFAULT_LOG_DIRECTIVES};
use crate::state::{AppState, Clock};
use crate::store::JsonStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn api(state: AppState) -> Router {
    Router::new()
        // tasks
        .route("/tasks", get(routes_tasks::get_tasks).post(routes_tasks::create_task))
        .route("/tasks/:id", put(routes_tasks::update_task).delete(routes_tasks::delete_task))
        .route("/tasks/:id/toggle", post(routes_tasks::toggle_task))
        .route("/tasks/:id/snooze", post(routes_tasks::snooze_task))
        .route("/tasks/:id/abandon", post(routes_tasks::abandon_task))
        // stats
        .route("/stats", get(routes_stats::get_stats))
        .route("/stats/days", get(routes_stats::get_day_history))
        .route("/streaks", get(routes_stats::get_streaks))
        // reminders
        .route("/reminders", get(routes_stats::get_reminders))
        .route("/reminders/daily", post(routes_stats::schedule_daily_reminder))
        // settings
        .route("/settings", get(routes_tasks::get_settings).put(routes_tasks::put_settings))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env()?;
    let store = JsonStore::new(&config.db_path);
    tracing::info!(db = %store.path().display(), "using task store");

    if config.seed_tutorial {
        store.seed_if_missing(Clock::System.now())?;
    }

    let app = Router::new()
        .nest("/api", api(AppState::new(store.shared())))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http());

    // Print the link to the server
    tracing::info!("Server running at http://{}", config.addr);
    tracing::info!("Static files: http://{}/ ({})", config.addr, config.static_dir.display());
    tracing::info!("API base:     http://{}/api", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
