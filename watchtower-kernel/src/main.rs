/**
 * WATCHTOWER - Point d'entrée du moniteur de joignabilité
 *
 * RÔLE : Assemble config, probe, sinks, scheduler et API HTTP observer.
 *
 * DÉMARRAGE :
 * - .env, tracing, fichier de config ($WATCHTOWER_CONFIG ou watchtower.yaml)
 * - alert sinks / log sinks / cue sont liés une seule fois ici
 * - le scheduler tourne en tâche de fond, HTTP sert jusqu'à SIGINT/SIGTERM
 * - à l'arrêt le scheduler termine son tick en cours puis s'arrête
 */

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use watchtower_kernel::config::{config_path, load_config, WatchtowerConfig};
use watchtower_kernel::http::{build_router, AppState};
use watchtower_kernel::monitor::Monitor;
use watchtower_kernel::notify::{
    cue_from_config, ActivityFeed, EmailAlertSink, FileLog, MqttAlertSink, Notifier, TracingLog,
};
use watchtower_kernel::probe::probe_from_config;
use watchtower_kernel::scheduler::PollScheduler;

const ACTIVITY_CAPACITY: usize = 500;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchtower_kernel=info,watchtower=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = config_path();
    let cfg = load_config(&path)
        .await
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    tracing::info!(path = %path.display(), devices = cfg.devices.len(), "configuration loaded");

    let activity = Arc::new(ActivityFeed::new(ACTIVITY_CAPACITY));
    let notifier = build_notifier(&cfg, activity.clone())?;

    let monitor = Monitor::new(&cfg, probe_from_config(&cfg.probe), notifier)
        .context("invalid configuration")?
        .with_probe_factory(Box::new(probe_from_config))
        .with_activity(activity)
        .with_config_path(path);
    let monitor = Arc::new(monitor);

    let cancel = CancellationToken::new();
    let scheduler = PollScheduler::new(monitor.clone()).spawn(cancel.clone());

    let addr: SocketAddr = cfg
        .http
        .bind
        .parse()
        .with_context(|| format!("invalid http.bind '{}'", cfg.http.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "observer API listening");

    let app = build_router(AppState::new(monitor));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("http server failed")?;

    cancel.cancel();
    scheduler.await.context("scheduler task panicked")?;
    tracing::info!("watchtower stopped");
    Ok(())
}

fn build_notifier(cfg: &WatchtowerConfig, activity: Arc<ActivityFeed>) -> Result<Notifier> {
    let mut notifier = Notifier::new(cue_from_config(cfg.cue))
        .with_log_sink(Arc::new(TracingLog))
        .with_log_sink(activity);

    if let Some(file) = &cfg.log_file {
        let log = FileLog::open(file).with_context(|| format!("cannot open log file {}", file.display()))?;
        notifier = notifier.with_log_sink(Arc::new(log));
    }

    if let Some(email) = &cfg.alerts.email {
        let sink = EmailAlertSink::new(email).context("invalid email alert settings")?;
        notifier = notifier.with_alert_sink(Arc::new(sink));
    }

    if let Some(mqtt) = &cfg.alerts.mqtt {
        notifier = notifier.with_alert_sink(Arc::new(MqttAlertSink::spawn(mqtt)));
    }

    let sinks = notifier.alert_sink_names();
    if sinks.is_empty() {
        tracing::warn!("no alert sinks configured, alerts are log-only");
    } else {
        tracing::info!(?sinks, "alert sinks ready");
    }
    Ok(notifier)
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
    cancel.cancel();
}
