use crate::dispatch::AlertDispatcher;
use crate::errors::AppResult;
use crate::locator::LedgerLocator;
use crate::models::{
    partition_for, ReconciliationReport, ReportLine, ReportStatus, RosterUser,
};
use crate::settings::AppSettings;
use crate::stores::{LedgerStore, RosterStore};
use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::Value;
use std::sync::Arc;

pub type BusinessDayPredicate = Arc<dyn Fn(NaiveDate) -> bool + Send + Sync>;

pub fn weekday_calendar() -> BusinessDayPredicate {
    Arc::new(|date: NaiveDate| {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    })
}

/// Daily sweep over the expected roster. Classifies each user against their
/// ledger rows for today and dispatches one batched report. A single user's
/// read failure degrades that user, never the sweep.
pub struct RosterReconciler {
    settings: AppSettings,
    locator: Arc<LedgerLocator>,
    ledgers: Arc<dyn LedgerStore>,
    roster: Arc<dyn RosterStore>,
    dispatcher: Arc<AlertDispatcher>,
    business_day: BusinessDayPredicate,
}

impl RosterReconciler {
    pub fn new(
        settings: AppSettings,
        locator: Arc<LedgerLocator>,
        ledgers: Arc<dyn LedgerStore>,
        roster: Arc<dyn RosterStore>,
        dispatcher: Arc<AlertDispatcher>,
        business_day: BusinessDayPredicate,
    ) -> Self {
        Self {
            settings,
            locator,
            ledgers,
            roster,
            dispatcher,
            business_day,
        }
    }

    pub async fn run(&self, today: NaiveDate) -> AppResult<ReconciliationReport> {
        if !(self.business_day)(today) {
            tracing::debug!(date = %today, "skipping reconciliation on non-business day");
            return Ok(ReconciliationReport::empty(today));
        }

        // Roster enumeration failure is fatal for the run; everything after
        // it degrades per user instead.
        let users = self.drain_roster().await?;
        tracing::info!(date = %today, users = users.len(), "reconciliation sweep started");

        let mut report = ReconciliationReport::empty(today);
        for user in &users {
            if let Some(line) = self.classify(user, today).await {
                report.lines.push(line);
            }
        }

        if !report.is_empty() {
            self.dispatcher.send_daily_report(&report).await;
        }
        tracing::info!(date = %today, flagged = report.lines.len(), "reconciliation sweep finished");
        Ok(report)
    }

    async fn drain_roster(&self) -> AppResult<Vec<RosterUser>> {
        let mut users = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.roster.list_users(page_token.as_deref()).await?;
            users.extend(page.users);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(users)
    }

    /// Returns a report line for missing/incomplete users, `None` when the
    /// user has logged a full day.
    async fn classify(&self, user: &RosterUser, today: NaiveDate) -> Option<ReportLine> {
        let ledger = match self.locator.locate(&user.email).await {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!(email = %user.email, error = %error, "ledger lookup failed, treating as missing");
                None
            }
        };
        let Some(ledger) = ledger else {
            return Some(self.line(user, ReportStatus::Missing, None));
        };

        let partition = partition_for(today);
        let rows = match self.ledgers.read_range(&ledger.id, partition).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(email = %user.email, ledger_id = %ledger.id, error = %error, "partition read failed, treating as zero rows");
                Vec::new()
            }
        };

        let wanted = today.to_string();
        let todays: Vec<&Vec<Value>> = rows
            .iter()
            .filter(|row| {
                row.first()
                    .and_then(Value::as_str)
                    .map(|cell| cell.trim() == wanted)
                    .unwrap_or(false)
            })
            .collect();

        if todays.is_empty() {
            return Some(self.line(user, ReportStatus::Missing, None));
        }

        let total: f64 = todays.iter().map(|row| cell_hours(row.get(3))).sum();
        if total < self.settings.required_daily_hours {
            Some(self.line(user, ReportStatus::Incomplete, Some(total)))
        } else {
            None
        }
    }

    fn line(
        &self,
        user: &RosterUser,
        status: ReportStatus,
        hours_logged: Option<f64>,
    ) -> ReportLine {
        ReportLine {
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            status,
            hours_logged,
        }
    }
}

/// Hours cell tolerance: numbers pass through, numeric strings parse, anything
/// else contributes zero rather than aborting aggregation.
fn cell_hours(cell: Option<&Value>) -> f64 {
    match cell {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}
