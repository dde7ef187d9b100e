use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::service::MarketplaceService;

/// Runs [`MarketplaceService::run_sweeps`] on a fixed period until shutdown is signalled.
pub struct SweepScheduler {
    service: Arc<MarketplaceService>,
    period: Duration,
}

impl SweepScheduler {
    pub fn new(service: Arc<MarketplaceService>, period: Duration) -> Self {
        Self { service, period: period.max(Duration::from_secs(1)) }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = self.period.as_secs(), "sweep scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = self.service.now();
                        if let Err(e) = self.service.run_sweeps(now).await {
                            error!(error = %e, "sweep pass failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("sweep scheduler stopped");
        })
    }
}
