use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, Local, NaiveTime, TimeZone};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cuppa_shared::errors::ErrorCode;

use crate::services::MatchService;
use crate::store::OrganisationStore;

const RUN_HOUR: u32 = 9;

/// The next Monday 09:00 strictly after `now`, in `now`'s time zone. A
/// Monday before 09:00 resolves to the same day.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let local = now.naive_local();
    let run_time = NaiveTime::from_hms_opt(RUN_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);

    let days_ahead = (7 - local.weekday().num_days_from_monday()) % 7;
    let mut date = local.date() + Days::new(u64::from(days_ahead));
    if days_ahead == 0 && local.time() >= run_time {
        date = date + Days::new(7);
    }

    let target = date.and_time(run_time);
    tz.from_local_datetime(&target)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&target))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub organisations: usize,
    pub successful: usize,
    pub matches_created: usize,
    pub timed_out: usize,
}

/// Weekly driver for bulk generation across every organisation.
#[derive(Clone)]
pub struct MatchScheduler {
    service: Arc<MatchService>,
    organisations: Arc<dyn OrganisationStore>,
    org_timeout: Duration,
    cancel: CancellationToken,
}

impl MatchScheduler {
    pub fn new(
        service: Arc<MatchService>,
        organisations: Arc<dyn OrganisationStore>,
        org_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            organisations,
            org_timeout,
            cancel,
        }
    }

    /// Spawns the weekly loop. The next deadline is recomputed after every
    /// run so clock changes are absorbed.
    pub fn start(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let now = Local::now();
                let next = next_run_after(&now);
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tracing::info!(next_run = %next, "match scheduler waiting for next run");

                tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                this.check_and_generate_matches().await;
            }
            tracing::info!("match scheduler stopped");
        })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn run_immediately(&self) -> RunSummary {
        self.check_and_generate_matches().await
    }

    /// Fire-and-forget run for operator triggers.
    pub fn run_now(&self) -> JoinHandle<RunSummary> {
        let this = self.clone();
        tokio::spawn(async move { this.check_and_generate_matches().await })
    }

    pub async fn check_and_generate_matches(&self) -> RunSummary {
        let store = Arc::clone(&self.organisations);
        let organisations = match tokio::task::spawn_blocking(move || store.list_organisations()).await {
            Ok(Ok(organisations)) => organisations,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to list organisations");
                metrics::counter!("cuppa_scheduler_runs_total", "outcome" => "failed").increment(1);
                return RunSummary::default();
            }
            Err(e) => {
                tracing::error!(error = %e, "organisation listing task crashed");
                metrics::counter!("cuppa_scheduler_runs_total", "outcome" => "failed").increment(1);
                return RunSummary::default();
            }
        };

        let mut summary = RunSummary {
            organisations: organisations.len(),
            ..RunSummary::default()
        };

        for org in organisations {
            let service = Arc::clone(&self.service);
            let organisation_id = org.id;
            let task = tokio::task::spawn_blocking(move || service.generate_matches_for_organisation(organisation_id));

            match tokio::time::timeout(self.org_timeout, task).await {
                Ok(Ok(Ok(created))) => {
                    summary.successful += 1;
                    summary.matches_created += created;
                }
                Ok(Ok(Err(e))) if e.is(ErrorCode::NoUsersToMatch) => {
                    tracing::info!(organisation_id = %organisation_id, organisation = %org.name, "no users to match");
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(organisation_id = %organisation_id, error = %e, "match generation failed");
                }
                Ok(Err(e)) => {
                    tracing::error!(organisation_id = %organisation_id, error = %e, "match generation task crashed");
                }
                Err(_) => {
                    summary.timed_out += 1;
                    tracing::warn!(
                        organisation_id = %organisation_id,
                        timeout_secs = self.org_timeout.as_secs(),
                        "match generation timed out, moving on"
                    );
                }
            }
        }

        let outcome = if summary.timed_out > 0 { "partial" } else { "completed" };
        metrics::counter!("cuppa_scheduler_runs_total", "outcome" => outcome).increment(1);
        tracing::info!(
            organisations = summary.organisations,
            successful = summary.successful,
            matches_created = summary.matches_created,
            timed_out = summary.timed_out,
            "scheduled match generation finished"
        );
        summary
    }
}
