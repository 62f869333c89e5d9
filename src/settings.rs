use crate::errors::{AppError, AppResult};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    /// Id of the container resource all ledgers live under. Required.
    pub parent_container_id: String,
    pub ledger_name_prefix: String,
    pub required_daily_hours: f64,
    /// Offset used for "today" in backdate checks and reconciliation.
    pub utc_offset_minutes: i32,
    /// Local hour at which the scheduled daily sweep fires.
    pub report_hour: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            parent_container_id: String::new(),
            ledger_name_prefix: "Timesheet - ".to_string(),
            required_daily_hours: 8.0,
            utc_offset_minutes: 330,
            report_hour: 17,
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> AppResult<()> {
        if self.parent_container_id.trim().is_empty() {
            return Err(AppError::Configuration(
                "parentContainerId is not configured".to_string(),
            ));
        }
        if self.ledger_name_prefix.is_empty() {
            return Err(AppError::Configuration(
                "ledgerNamePrefix cannot be empty".to_string(),
            ));
        }
        if !(self.required_daily_hours > 0.0 && self.required_daily_hours <= 24.0) {
            return Err(AppError::Configuration(format!(
                "requiredDailyHours must be in (0, 24], got {}",
                self.required_daily_hours
            )));
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(AppError::Configuration(format!(
                "utcOffsetMinutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        if self.report_hour >= 24 {
            return Err(AppError::Configuration(format!(
                "reportHour must be 0..=23, got {}",
                self.report_hour
            )));
        }
        Ok(())
    }

    pub fn ledger_name(&self, email: &str) -> String {
        format!("{}{}", self.ledger_name_prefix, email)
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| {
            FixedOffset::east_opt(0).expect("zero utc offset")
        })
    }

    /// Calendar date "today" as seen from the configured offset. Time of day
    /// is discarded; only calendar-day ordering matters downstream.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset()).date_naive()
    }
}
