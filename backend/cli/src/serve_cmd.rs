//! `quickzip serve`: wire the bot together and run it until Ctrl-C.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use teloxide::Bot;
use tracing::{error, info, warn};

use quickzip_channels::{
    ChannelAdapter, ChatRateLimiter, ObservedMessages, TelegramAdapter, TelegramProgressReporter,
    TelegramTransport,
};
use quickzip_commands::{build_dispatcher, ZipService};
use quickzip_config::{load_and_prepare, QuickZipConfig};
use quickzip_logging::{init_logger, TaskEvent, TaskEventLogger};
use quickzip_media::GroupResolver;
use quickzip_security::{AccessPolicy, SqliteApprovalStore};
use quickzip_tasks::{spawn_sweeper, TaskRegistry, WorkDirs};

pub async fn run(path: &Path) -> Result<()> {
    let (config, report) = load_and_prepare(path).await?;
    init_logger(config.log_dir(), config.log_level(), config.log_json());
    // Findings from loading were emitted before the subscriber existed.
    for w in &report.warnings {
        warn!(path = %w.path, message = %w.message, "Config warning");
    }
    if !report.is_valid() {
        for e in &report.errors {
            error!(path = %e.path, message = %e.message, "Invalid configuration");
        }
        bail!("configuration has {} error(s); run `quickzip check-config`", report.errors.len());
    }
    run_server(config).await
}

async fn run_server(config: QuickZipConfig) -> Result<()> {
    let token = config
        .bot_token()
        .context("telegram.botToken is not set")?
        .to_string();
    let storage = config.storage_root();
    tokio::fs::create_dir_all(&storage)
        .await
        .with_context(|| format!("Failed to create storage root {}", storage.display()))?;

    info!(
        storage = %storage.display(),
        db = %config.database_path().display(),
        concurrency = config.concurrency(),
        group_radius = config.group_radius(),
        "Starting QuickZip"
    );

    let store = Arc::new(SqliteApprovalStore::open(&config.database_path())?);
    let policy = AccessPolicy::new(config.admin_id(), store);

    let registry = TaskRegistry::new(WorkDirs::new(&storage))
        .with_timeout(config.task_timeout())
        .with_max_bytes(config.max_task_bytes());

    let bot = Bot::new(token);
    let observed = Arc::new(ObservedMessages::default());
    let resolver = GroupResolver::with_radius(observed.clone(), config.group_radius());
    let reporter = TelegramProgressReporter::new(Arc::new(bot.clone()), ChatRateLimiter::default());

    let service = ZipService::new(
        registry.clone(),
        resolver,
        Arc::new(TelegramTransport::new(bot.clone())),
    )
    .with_observer(Arc::new(reporter))
    .with_concurrency(config.concurrency());
    let dispatcher = Arc::new(build_dispatcher(Arc::new(service), policy));

    let events = TaskEventLogger;
    let sweeper = spawn_sweeper(registry, config.sweep_interval(), move |session| {
        events.log(session.0, TaskEvent::Evicted);
    });

    let adapter = Arc::new(TelegramAdapter::new(bot, dispatcher, observed));
    info!(adapter = adapter.name(), "Channel adapter registered");
    let outcome = adapter.start().await;

    sweeper.abort();
    info!("QuickZip stopped");
    outcome
}
