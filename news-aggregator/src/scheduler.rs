use crate::aggregator::RssAggregator;
use crate::registry::SourceRegistry;
use crate::store::NewsStore;
use crate::types::RefreshOutcome;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Drives registry -> fetch -> store, on a timer and on demand.
pub struct RefreshScheduler {
    registry: SourceRegistry,
    aggregator: Arc<RssAggregator>,
    store: NewsStore,
    interval: Duration,
    in_flight: AtomicBool,
}

// Clears the in-flight flag however the timed cycle ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RefreshScheduler {
    pub fn new(
        registry: SourceRegistry,
        aggregator: Arc<RssAggregator>,
        store: NewsStore,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            aggregator,
            store,
            interval,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a timer-driven cycle is currently running.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start the recurring timer. The first tick fires right away.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.interval.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!("Refresh scheduler started (every {}s)", period.as_secs());

            loop {
                ticker.tick().await;
                let scheduler = Arc::clone(&self);
                tokio::spawn(async move {
                    scheduler.tick().await;
                });
            }
        })
    }

    /// One timer tick. Returns `None` when a previous cycle is still running;
    /// such a tick is dropped, never queued.
    pub async fn tick(&self) -> Option<RefreshOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh cycle still in flight, dropping tick");
            return None;
        }
        let _guard = InFlight(&self.in_flight);

        Some(self.run_cycle().await)
    }

    /// Run a full cycle now and report how it went. Independent of the timer.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        info!("Manual refresh requested");
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> RefreshOutcome {
        let ran_at = Utc::now();

        let sources = match self.registry.load() {
            Ok(sources) => sources,
            Err(e) => {
                error!("Refresh cycle aborted: {}", e);
                return RefreshOutcome::failed(0, ran_at, e.to_string());
            }
        };

        let items = self.aggregator.run(&sources).await;
        let total = items.len();

        match self.store.upsert(&items).await {
            Ok(new_items) => {
                info!(
                    "Refresh cycle done: {} new items ({} fetched from {} sources)",
                    new_items,
                    total,
                    sources.len()
                );
                RefreshOutcome::ok(new_items, total, ran_at)
            }
            Err(e) => {
                error!("Refresh cycle could not store items: {}", e);
                RefreshOutcome::failed(total, ran_at, e.to_string())
            }
        }
    }
}
