use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use domain::repository::DeviceRepository;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const OFFLINE_THRESHOLD_MINUTES: i64 = 2;

/// Background sweep that marks devices offline once their last beacon is
/// older than the threshold. Runs until shutdown; a failing sweep is
/// logged and the loop continues.
pub struct StaleDeviceMonitor {
    devices: Arc<dyn DeviceRepository>,
}

impl StaleDeviceMonitor {
    pub fn new(devices: Arc<dyn DeviceRepository>) -> Self {
        Self { devices }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(threshold_minutes = OFFLINE_THRESHOLD_MINUTES, "started stale device monitor");

        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => self.sweep_once().await,
                _ = shutdown.changed() => {
                    info!("stale device monitor stopping");
                    return;
                }
            }
        }
    }

    pub async fn sweep_once(&self) {
        match self
            .devices
            .mark_stale_offline(chrono::Duration::minutes(OFFLINE_THRESHOLD_MINUTES))
            .await
        {
            Ok(0) => {}
            Ok(count) => info!(count, "marked stale devices offline"),
            Err(err) => error!(%err, "failed to mark stale devices offline"),
        }
    }
}
