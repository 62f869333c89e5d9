use crate::errors::AppResult;
use crate::models::ReconciliationReport;
use crate::reconciler::RosterReconciler;
use crate::settings::AppSettings;
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use tokio::time::Duration;

/// Trigger boundary for the daily sweep. Fires once per day at the configured
/// local report hour; the reconciler itself short-circuits non-business days.
#[derive(Clone)]
pub struct ReconciliationScheduler {
    settings: AppSettings,
    reconciler: Arc<RosterReconciler>,
}

impl ReconciliationScheduler {
    pub fn new(settings: AppSettings, reconciler: Arc<RosterReconciler>) -> Self {
        Self {
            settings,
            reconciler,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<ReconciliationReport> {
        let today = self.settings.local_date(now);
        self.reconciler.run(today).await
    }

    pub fn start(&self) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_loop().await;
        });
    }

    async fn run_loop(self) {
        loop {
            let delay = self.delay_until_next_fire(Utc::now());
            tokio::time::sleep(delay).await;
            if let Err(error) = self.run_once(Utc::now()).await {
                tracing::warn!(error = %error, "scheduled reconciliation run failed");
            }
        }
    }

    fn delay_until_next_fire(&self, now: DateTime<Utc>) -> Duration {
        let offset = self.settings.offset();
        let local_now = now.with_timezone(&offset);
        let fire_time = NaiveTime::from_hms_opt(self.settings.report_hour, 0, 0)
            .unwrap_or(NaiveTime::MIN);

        let mut fire_date = local_now.date_naive();
        if local_now.time() >= fire_time {
            fire_date = fire_date.succ_opt().unwrap_or(fire_date);
        }

        let target = fire_date
            .and_time(fire_time)
            .and_local_timezone(offset)
            .earliest()
            .unwrap_or(local_now);
        let millis = target
            .signed_duration_since(local_now)
            .num_milliseconds()
            .max(0);
        Duration::from_millis(millis as u64)
    }
}
