pub mod config;
pub mod matching;
pub mod models;
pub mod notify;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod services;
pub mod store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use config::AppConfig;
use notify::Notifier;
use scheduler::MatchScheduler;
use services::{AvailabilityConfigService, MatchService, RematchJob, RematchQueue};
use store::Stores;

pub struct AppState {
    pub config: AppConfig,
    pub stores: Stores,
    pub matches: Arc<MatchService>,
    pub availability: AvailabilityConfigService,
    pub scheduler: MatchScheduler,
    pub rematch: RematchQueue,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wires the services over `stores`. The returned receiver feeds the
    /// rematch worker.
    pub fn new(
        config: AppConfig,
        stores: Stores,
        notifier: Arc<dyn Notifier>,
        metrics: Option<PrometheusHandle>,
        cancel: &CancellationToken,
    ) -> (Self, mpsc::Receiver<RematchJob>) {
        let (rematch, rx) = RematchQueue::channel(config.rematch_queue_capacity);
        let matches = Arc::new(MatchService::new(stores.clone(), notifier, rematch.clone()));
        let availability = AvailabilityConfigService::new(stores.clone(), rematch.clone());
        let scheduler = MatchScheduler::new(
            Arc::clone(&matches),
            Arc::clone(&stores.organisations),
            config.scheduler_org_timeout(),
            cancel.child_token(),
        );

        let state = Self {
            config,
            stores,
            matches,
            availability,
            scheduler,
            rematch,
            metrics,
        };
        (state, rx)
    }
}
