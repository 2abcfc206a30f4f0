use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{
    AnalyticsService, BusDispatcher, ComplianceService, DeviceBridge, LabelService, LineService,
    ScheduleResolver, ScheduleService, StaleDeviceMonitor,
};
use domain::event::EventPublisher;
use domain::repository::{
    AnalyticsRepository, DeviceRepository, HolidayProvider, LabelRepository, LineRepository,
    ScheduleRepository, StatusLogRepository,
};
use infrastructure::database::{
    self, PgAnalyticsRepository, PgDeviceRepository, PgLabelRepository, PgLineRepository,
    PgScheduleRepository, PgStatusLogRepository,
};
use infrastructure::messaging::MqttPublisherClient;
use infrastructure::{AppConfig, EventHub, MqttClient, MqttEventPublisher, OpenHolidaysClient};

use api_server::routes::create_router;
use api_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(config.log_level.clone())
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(port = config.port, log_level = %config.log_level,
        mqtt_broker = %config.mqtt_broker_url, "starting production line API");

    // Database
    info!("connecting to database");
    let pool = database::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    info!("running database migrations");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    // Repositories
    let line_repo: Arc<dyn LineRepository> = Arc::new(PgLineRepository::new(pool.clone()));
    let status_log_repo: Arc<dyn StatusLogRepository> =
        Arc::new(PgStatusLogRepository::new(pool.clone()));
    let label_repo: Arc<dyn LabelRepository> = Arc::new(PgLabelRepository::new(pool.clone()));
    let schedule_repo: Arc<dyn ScheduleRepository> =
        Arc::new(PgScheduleRepository::new(pool.clone()));
    let device_repo: Arc<dyn DeviceRepository> = Arc::new(PgDeviceRepository::new(pool.clone()));
    let analytics_repo: Arc<dyn AnalyticsRepository> =
        Arc::new(PgAnalyticsRepository::new(pool.clone()));

    // Event fan-out
    let hub = EventHub::new();

    // Bus client
    info!(broker = %config.mqtt_broker_url, "connecting to MQTT broker");
    let mqtt_client = MqttClient::new(
        &config.mqtt_broker_url,
        &config.mqtt_client_id,
        config.mqtt_qos,
    )
    .await
    .context("failed to create MQTT client")?;

    let publisher: Arc<dyn EventPublisher> = Arc::new(MqttEventPublisher::new(
        Arc::new(mqtt_client.clone()) as Arc<dyn MqttPublisherClient>,
        hub.clone(),
    ));

    // External holidays API
    let holidays_client: Option<Arc<dyn HolidayProvider>> = if config.holidays_api_enabled {
        info!(country = %config.holidays_country_code, "holidays API client enabled");
        Some(Arc::new(OpenHolidaysClient::new()))
    } else {
        None
    };

    // Services
    let lines = Arc::new(LineService::new(
        line_repo.clone(),
        status_log_repo.clone(),
        device_repo.clone(),
        publisher.clone(),
    ));
    let labels = Arc::new(LabelService::new(label_repo.clone(), line_repo.clone()));
    let resolver = Arc::new(ScheduleResolver::new(schedule_repo.clone()));
    let schedules = Arc::new(ScheduleService::new(
        schedule_repo.clone(),
        line_repo.clone(),
        holidays_client,
        config.holidays_country_code.clone(),
    ));
    let compliance = Arc::new(ComplianceService::new(
        line_repo.clone(),
        status_log_repo.clone(),
        resolver.clone(),
    ));
    let analytics = Arc::new(AnalyticsService::new(analytics_repo, line_repo.clone()));

    // Device bridge; the line service is injected behind its status seam.
    let bridge = Arc::new(DeviceBridge::new(
        device_repo.clone(),
        publisher.clone(),
        lines.clone(),
    ));

    // Bus dispatcher with its subscription set.
    let dispatcher = Arc::new(BusDispatcher::new(bridge.clone(), lines.clone()));
    for topic in BusDispatcher::subscriptions() {
        mqtt_client
            .subscribe(topic)
            .await
            .with_context(|| format!("failed to subscribe to {topic}"))?;
    }
    info!("MQTT subscriptions registered");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Inbound bus messages -> dispatcher.
    let mut bus_rx = mqtt_client.subscribe_messages();
    let dispatch = dispatcher.clone();
    let mut dispatcher_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = bus_rx.recv() => match msg {
                    Ok(msg) => dispatch.dispatch(&msg.topic, &msg.payload).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "bus dispatcher lagged; messages dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = dispatcher_shutdown.changed() => break,
            }
        }
    });

    // Stale-device sweep.
    let monitor = StaleDeviceMonitor::new(device_repo.clone());
    let monitor_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        monitor.run(monitor_shutdown).await;
    });

    // HTTP server
    let state = Arc::new(AppState {
        lines,
        labels,
        schedules,
        compliance,
        analytics,
        resolver,
        bridge,
        devices: device_repo,
        hub: hub.clone(),
    });

    let app = create_router(state, &config.cors_origins());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("HTTP server listening on http://{addr}");

    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    wait_for_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // Bounded graceful shutdown, then tear down in dependency order:
    // HTTP server, hub, bus client, store pool.
    match tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), server).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped gracefully"),
        Ok(Ok(Err(err))) => error!(%err, "HTTP server error during shutdown"),
        Ok(Err(err)) => error!(%err, "HTTP server task panicked"),
        Err(_) => warn!("graceful shutdown timed out"),
    }

    hub.shutdown();

    tokio::time::sleep(Duration::from_millis(250)).await;
    if let Err(err) = mqtt_client.disconnect().await {
        warn!(%err, "failed to disconnect MQTT client");
    }

    pool.close().await;
    info!("server stopped");

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
