//! Daykeeper CLI entry point: load config, connect the database, run
//! migrations, wire the service layer, then dispatch on the subcommand.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use daykeeper::domain::ports::clock::SystemClock;
use daykeeper::infrastructure::config::loader::ConfigLoader;
use daykeeper::infrastructure::http::state::AppState;
use daykeeper::infrastructure::http::wake_client::ReqwestWakePoster;
use daykeeper::infrastructure::store::sqlite::{SqliteEventStore, SqliteSettingsStore};
use daykeeper::infrastructure::{http, logging};
use daykeeper::services::builtins::register_builtins;
use daykeeper::services::event_loop::EventLoop;
use daykeeper::services::event_model::EventModel;
use daykeeper::services::wake_scheduler::WakeScheduler;

#[derive(Debug, Parser)]
#[command(name = "daykeeper", about = "Personal scheduling service", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP server and the background event loop.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _logger_guard = logging::init(&config.logging).context("failed to initialize logging")?;

    let store = SqliteEventStore::connect(&config.database.url)
        .await
        .context("failed to connect to database")?;
    store.migrate().await.context("failed to run database migrations")?;

    if matches!(cli.command, Commands::Migrate) {
        tracing::info!("migrations applied");
        return Ok(());
    }

    let pool = store.pool().clone();
    let event_store = Arc::new(store);
    let settings_store: Arc<dyn daykeeper::domain::ports::settings_store::SettingsStore> =
        Arc::new(SqliteSettingsStore::new(pool));

    seed_user_settings(settings_store.as_ref(), &config.user).await?;

    let clock = Arc::new(SystemClock);
    let registries = daykeeper::domain::ports::registry::CallbackRegistry::new();
    register_builtins(&registries);

    let model = Arc::new(EventModel::new(event_store, clock.clone()));
    model.load_from_store().await.context("failed to replay events from the durable store")?;

    let event_loop = Arc::new(EventLoop::new(model.clone(), clock.clone()));
    event_loop
        .replay_from_model(&registries)
        .await
        .context("failed to replay task events into the event loop")?;
    event_loop.start();

    let poster = Arc::new(
        ReqwestWakePoster::new(
            std::time::Duration::from_secs(config.wake_client.timeout_secs),
            std::time::Duration::from_secs(config.wake_client.connect_timeout_secs),
        )
        .context("failed to build the wake HTTP client")?,
    );
    let wake_scheduler = Arc::new(WakeScheduler::new(
        model.clone(),
        event_loop.clone(),
        settings_store.clone(),
        poster,
        clock.clone(),
    ));
    wake_scheduler.schedule_today().await.context("failed to schedule today's wake task")?;
    wake_scheduler
        .schedule_daily_maintenance()
        .await
        .context("failed to arm the daily wake maintenance task")?;

    let state = AppState {
        model,
        event_loop,
        wake_scheduler,
        settings: settings_store,
        registries,
        clock,
    };

    let app = http::router(state, &config);
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid server.bind_addr '{}'", config.server.bind_addr))?;

    tracing::info!(%addr, "starting daykeeper");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;

    Ok(())
}

/// Seeds `user.id`/`user.timezone` from config on first run; afterward the
/// settings store is the source of truth.
async fn seed_user_settings(
    settings: &dyn daykeeper::domain::ports::settings_store::SettingsStore,
    user: &daykeeper::infrastructure::config::model::UserConfig,
) -> Result<()> {
    use daykeeper::domain::models::settings::{USER_ID, USER_TIMEZONE};

    if settings.get_string(USER_ID).await?.is_none() {
        settings.set_string(USER_ID, &user.id).await?;
    }
    if settings.get_string(USER_TIMEZONE).await?.is_none() {
        settings.set_string(USER_TIMEZONE, &user.timezone).await?;
    }
    Ok(())
}
