use crate::dispatch::AlertDispatcher;
use crate::errors::AppResult;
use crate::locator::LedgerLocator;
use crate::models::{Ack, ReconciliationReport, SubmitEntryPayload};
use crate::reconciler::{weekday_calendar, BusinessDayPredicate, RosterReconciler};
use crate::scheduler::ReconciliationScheduler;
use crate::settings::AppSettings;
use crate::stores::{LedgerStore, NotificationChannel, ResourceStore, RosterStore};
use crate::writer::EntryWriter;
use chrono::Utc;
use std::sync::Arc;

/// Process facade composing the ledger components over injected store
/// handles. Initialized once per process; invocations are stateless beyond
/// the external stores.
pub struct LedgerCore {
    settings: AppSettings,
    writer: EntryWriter,
    reconciler: Arc<RosterReconciler>,
}

impl LedgerCore {
    pub fn new(
        settings: AppSettings,
        resources: Arc<dyn ResourceStore>,
        ledgers: Arc<dyn LedgerStore>,
        roster: Arc<dyn RosterStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> AppResult<Arc<Self>> {
        Self::with_calendar(settings, resources, ledgers, roster, channel, weekday_calendar())
    }

    pub fn with_calendar(
        settings: AppSettings,
        resources: Arc<dyn ResourceStore>,
        ledgers: Arc<dyn LedgerStore>,
        roster: Arc<dyn RosterStore>,
        channel: Arc<dyn NotificationChannel>,
        business_day: BusinessDayPredicate,
    ) -> AppResult<Arc<Self>> {
        settings.validate()?;

        let locator = Arc::new(LedgerLocator::new(
            settings.clone(),
            resources,
            ledgers.clone(),
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(channel));
        let writer = EntryWriter::new(
            settings.clone(),
            locator.clone(),
            ledgers.clone(),
            dispatcher.clone(),
        );
        let reconciler = Arc::new(RosterReconciler::new(
            settings.clone(),
            locator,
            ledgers,
            roster,
            dispatcher,
            business_day,
        ));

        Ok(Arc::new(Self {
            settings,
            writer,
            reconciler,
        }))
    }

    pub async fn submit_entry(&self, payload: SubmitEntryPayload) -> AppResult<Ack> {
        self.writer.append(payload).await
    }

    pub async fn run_daily_reconciliation(&self) -> AppResult<ReconciliationReport> {
        let today = self.settings.local_date(Utc::now());
        self.reconciler.run(today).await
    }

    pub fn scheduler(&self) -> ReconciliationScheduler {
        ReconciliationScheduler::new(self.settings.clone(), self.reconciler.clone())
    }
}
