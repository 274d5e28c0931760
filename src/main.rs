//! bright4event server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints, restores
//! persisted state and spawns the background workers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use bright4event::api;
use bright4event::app_state::AppState;
use bright4event::config::{AppConfig, LogFormat};
use bright4event::notify::DiscordNotifier;
use bright4event::persistence::PostgresPersistence;
use bright4event::persistence::worker::{self, Snapshotter};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting bright4event");

    // Build application state
    let app_state = AppState::new(config.clone());
    let events = Arc::clone(app_state.event_service.registry());
    let accounts = Arc::clone(app_state.account_service.registry());

    // Restore and mirror state to PostgreSQL
    if config.persistence_enabled {
        let store = PostgresPersistence::connect(&config).await?;
        store.migrate().await?;

        let report = worker::restore(&store, &events, &accounts).await?;
        tracing::info!(
            events = report.events,
            skipped = report.skipped,
            accounts = report.accounts,
            "state restored"
        );

        let mut snapshotter = Snapshotter::new();
        snapshotter.seed(&events, &accounts).await;

        worker::spawn_event_log_writer(
            store.clone(),
            app_state.event_bus.subscribe(),
            config.event_log_enabled,
        );
        worker::spawn_snapshotter(
            store.clone(),
            Arc::clone(&events),
            Arc::clone(&accounts),
            snapshotter,
            Duration::from_secs(config.snapshot_interval_secs.max(1)),
        );
        if config.cleanup_after_days > 0 {
            worker::spawn_cleanup(store, config.cleanup_after_days);
        }
    } else {
        tracing::warn!("persistence disabled, state lives in memory only");
    }

    if let Some((email, password)) = &config.bootstrap_admin {
        if app_state
            .account_service
            .bootstrap_admin(email, password)
            .await?
        {
            tracing::info!(%email, "platform admin provisioned");
        }
    }

    // Operator notifications
    if let Some(url) = &config.discord_webhook_url {
        DiscordNotifier::new(url.as_str())?.spawn(app_state.event_bus.subscribe());
        tracing::info!("discord notifier enabled");
    }

    // Expire sessions and OTP challenges
    {
        let sessions = Arc::clone(&app_state.sessions);
        let guests = Arc::clone(&app_state.guest_service);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let now = Utc::now();
                let expired_sessions = sessions.purge_expired(now).await;
                let expired_challenges = guests.purge_expired(now).await;
                if expired_sessions + expired_challenges > 0 {
                    tracing::debug!(
                        sessions = expired_sessions,
                        challenges = expired_challenges,
                        "expired credentials purged"
                    );
                }
            }
        });
    }

    // Build router
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
