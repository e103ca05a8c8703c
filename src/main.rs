//! thread-scout binary entrypoint.
//! Wires config, connector, history, scheduler and composer, optionally serves
//! the status router, then runs discovery cycles until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use thread_scout::clock::{Clock, SystemClock};
use thread_scout::compose::build_composer;
use thread_scout::history::HistoryStore;
use thread_scout::metrics::Metrics;
use thread_scout::source::{connect, Credentials};
use thread_scout::{
    create_router, AppState, BusinessContext, CancelSignal, CycleSummary, NotifierMux, Pipeline,
    PostingScheduler, ScoutConfig,
};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("thread_scout=info,warn"));
    let json = std::env::var("SCOUT_LOG_JSON").is_ok_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init().context("installing metrics recorder")?;
    let config = ScoutConfig::load().context("loading scout config")?;
    let context = BusinessContext::load_default().context("loading business context")?;

    let connection = connect(
        Credentials::from_env(),
        Duration::from_secs(config.discovery.connect_timeout_secs),
    )
    .await;
    let mode = connection.mode();

    let store = HistoryStore::open(&config.data_dir).context("opening history store")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(PostingScheduler::new(
        &config.posting,
        store,
        connection.connector(),
        Arc::clone(&clock),
    ));
    let composer = build_composer(
        &config.composer,
        Duration::from_secs(config.reply.compose_timeout_secs),
    );
    tracing::info!(
        %mode,
        dry_run = config.posting.dry_run,
        composer = composer.name(),
        fingerprint = %context.fingerprint(),
        "scout starting"
    );

    if let Ok(addr) = std::env::var("SCOUT_STATUS_ADDR") {
        let state = AppState::new(Arc::clone(&scheduler), mode).with_metrics(metrics.handle.clone());
        let router = create_router(state);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding status server on {addr}"))?;
        tracing::info!(%addr, "status server listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "status server stopped");
            }
        });
    }

    let interval = Duration::from_secs(config.discovery.cycle_interval_secs);
    let oneshot = env_flag("SCOUT_ONESHOT");
    let pipeline = Pipeline::new(config, connection, scheduler, composer, clock);
    let notifiers = NotifierMux::from_env();

    let cancel = CancelSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    loop {
        let report = pipeline.run_cycle(&context, &cancel).await;
        if !notifiers.is_empty() {
            notifiers.notify(&CycleSummary::from_report(&report)).await;
        }
        if oneshot || cancel.is_cancelled() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!("scout stopped");
    Ok(())
}
