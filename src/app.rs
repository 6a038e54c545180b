//! Wiring configuration into running services.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use golink_cache::{Database, Repository};
use golink_config::{Config, NotifyConfig, ReconcileConfig};
use golink_pull::{
    LogNotifier, NotifierHandle, OriginFetcher, PullCoordinator, Reconciler, SendmailNotifier,
};
use golink_storage::BackendHandle;
use golink_storage::backend::LocalBackend;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Name local storage is registered under in logs.
const LOCAL_STORAGE: &str = "local";

/// Everything built from a [`Config`].
#[derive(Clone)]
pub struct Services {
    pub db: Database,
    pub coordinator: PullCoordinator,
    pub reconciler: Reconciler,
}

impl Services {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::connect(&config.database).await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(database = %config.database.display(), "Opened record store");
        let records = Repository::from(&db);

        let storage: BackendHandle = Arc::new(
            LocalBackend::new(LOCAL_STORAGE, &config.storage.root)
                .or_raise(|| ErrorKind::Storage(LOCAL_STORAGE.to_string()))?,
        );

        let mut origins = OriginFetcher::new();
        for (name, origin) in &config.origins {
            let backend = LocalBackend::new(name.as_str(), &origin.root).or_raise(|| ErrorKind::Storage(name.clone()))?;
            tracing::info!(origin = %name, root = %origin.root.display(), pullable = origin.pullable, "Configured origin");
            origins = origins.with_origin(Arc::new(backend), origin.pullable);
        }
        let fetcher = Arc::new(origins);

        let notifier = notifier(&config.notify)?;
        let coordinator = PullCoordinator::new(records.clone(), storage.clone(), fetcher.clone(), notifier);
        let reconciler = Reconciler::new(records, storage, fetcher);
        Ok(Self { db, coordinator, reconciler })
    }
}

fn notifier(config: &NotifyConfig) -> Result<NotifierHandle> {
    Ok(match config {
        NotifyConfig::Log => Arc::new(LogNotifier),
        NotifyConfig::Sendmail { from, binary: Some(binary) } => Arc::new(SendmailNotifier::new(from, binary.clone())),
        NotifyConfig::Sendmail { from, binary: None } => {
            Arc::new(SendmailNotifier::discover(from).or_raise(|| ErrorKind::Notify)?)
        },
    })
}

/// Run a reconciliation pass every `config.interval` until aborted.
pub fn spawn_reconciler(reconciler: Reconciler, config: ReconcileConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = reconciler.reconcile(config.stale_after()).await {
                tracing::error!(error = ?err, "Reconciliation pass failed");
            }
        }
    })
}
