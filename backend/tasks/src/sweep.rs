//! Background eviction of idle tasks.

use std::time::Duration;

use quickzip_core::SessionId;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::registry::TaskRegistry;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Sweep `registry` every `interval` until the returned handle is aborted.
/// `on_evicted` runs once per removed session.
pub fn spawn_sweeper<F>(registry: TaskRegistry, interval: Duration, on_evicted: F) -> JoinHandle<()>
where
    F: Fn(SessionId) + Send + Sync + 'static,
{
    tokio::spawn(run_sweep_loop(registry, interval, on_evicted))
}

pub async fn run_sweep_loop<F>(registry: TaskRegistry, interval: Duration, on_evicted: F)
where
    F: Fn(SessionId) + Send + Sync + 'static,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "Task sweeper started");

    loop {
        ticker.tick().await;
        let evicted = registry.evict_expired().await;
        if evicted.is_empty() {
            debug!("Sweep found no idle tasks");
        }
        for session in evicted {
            on_evicted(session);
        }
    }
}
