use crate::dispatch::AlertDispatcher;
use crate::errors::{AppError, AppResult};
use crate::locator::LedgerLocator;
use crate::models::{partition_for, Ack, SubmitEntryPayload};
use crate::settings::AppSettings;
use crate::stores::LedgerStore;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::Arc;

static EMAIL_RE: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

const MAX_HOURS_PER_ENTRY: f64 = 24.0;

/// Appends validated entries to the month partition matching the work date.
/// Back-dated submissions trigger a detached alert that can never fail the
/// append itself.
pub struct EntryWriter {
    settings: AppSettings,
    locator: Arc<LedgerLocator>,
    ledgers: Arc<dyn LedgerStore>,
    dispatcher: Arc<AlertDispatcher>,
}

impl EntryWriter {
    pub fn new(
        settings: AppSettings,
        locator: Arc<LedgerLocator>,
        ledgers: Arc<dyn LedgerStore>,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            settings,
            locator,
            ledgers,
            dispatcher,
        }
    }

    pub async fn append(&self, payload: SubmitEntryPayload) -> AppResult<Ack> {
        self.append_at(payload, Utc::now()).await
    }

    pub async fn append_at(
        &self,
        payload: SubmitEntryPayload,
        now: DateTime<Utc>,
    ) -> AppResult<Ack> {
        validate(&payload)?;

        let ledger = self.locator.locate_or_create(&payload.user_email).await?;
        let partition = partition_for(payload.date);

        let row: Vec<Value> = vec![
            Value::String(payload.date.to_string()),
            Value::String(payload.project.trim().to_string()),
            Value::String(payload.description.trim().to_string()),
            serde_json::json!(payload.hours),
        ];
        self.ledgers.append_row(&ledger.id, partition, &row).await?;

        // Only calendar-day ordering at the configured offset matters; future
        // dates are never back-dated.
        let today = self.settings.local_date(now);
        let backdated = payload.date < today;
        if backdated {
            let dispatcher = self.dispatcher.clone();
            let email = payload.user_email.clone();
            let label = payload
                .user_name
                .clone()
                .unwrap_or_else(|| payload.user_email.clone());
            let entry_date = payload.date;
            tokio::spawn(async move {
                dispatcher
                    .send_backdated_alert(&email, &label, entry_date, today)
                    .await;
            });
            tracing::info!(email = %payload.user_email, entry_date = %payload.date, today = %today, "back-dated entry appended");
        }

        Ok(Ack {
            ledger_id: ledger.id,
            partition: partition.to_string(),
            backdated,
        })
    }
}

fn validate(payload: &SubmitEntryPayload) -> AppResult<()> {
    if !EMAIL_RE.is_match(payload.user_email.trim()) {
        return Err(AppError::Validation(format!(
            "userEmail is not a valid address: {:?}",
            payload.user_email
        )));
    }
    if payload.project.trim().is_empty() {
        return Err(AppError::Validation("project cannot be empty".to_string()));
    }
    if payload.description.trim().is_empty() {
        return Err(AppError::Validation(
            "description cannot be empty".to_string(),
        ));
    }
    if !payload.hours.is_finite() || payload.hours <= 0.0 || payload.hours > MAX_HOURS_PER_ENTRY {
        return Err(AppError::Validation(format!(
            "hours must be in (0, {}], got {}",
            MAX_HOURS_PER_ENTRY, payload.hours
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::EntryWriter;
    use crate::dispatch::AlertDispatcher;
    use crate::errors::AppError;
    use crate::locator::LedgerLocator;
    use crate::models::SubmitEntryPayload;
    use crate::settings::AppSettings;
    use crate::stores::memory::{InMemoryBackend, RecordingChannel};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Arc;

    struct Fixture {
        writer: EntryWriter,
        backend: Arc<InMemoryBackend>,
        channel: Arc<RecordingChannel>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(InMemoryBackend::new());
        let parent = backend.add_container("Timesheets");
        let settings = AppSettings {
            parent_container_id: parent,
            ..AppSettings::default()
        };
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Arc::new(AlertDispatcher::new(channel.clone()));
        let locator = Arc::new(LedgerLocator::new(
            settings.clone(),
            backend.clone(),
            backend.clone(),
        ));
        let writer = EntryWriter::new(settings, locator, backend.clone(), dispatcher);
        Fixture {
            writer,
            backend,
            channel,
        }
    }

    fn payload(date: NaiveDate) -> SubmitEntryPayload {
        SubmitEntryPayload {
            date,
            project: "Apollo".to_string(),
            description: "Integration work".to_string(),
            hours: 4.0,
            user_email: "a@example.com".to_string(),
            user_name: Some("A Person".to_string()),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[tokio::test]
    async fn entry_routes_to_work_date_month_partition() {
        let fx = fixture();
        // Submitted in June, dated March: lands in March only.
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let ack = fx
            .writer
            .append_at(payload(date(2024, 3, 15)), now)
            .await
            .expect("append");

        assert_eq!(ack.partition, "March");
        let march = fx.backend.rows(&ack.ledger_id, "March");
        assert_eq!(march.len(), 2); // header + entry
        assert_eq!(march[1][0], serde_json::json!("2024-03-15"));
        let june = fx.backend.rows(&ack.ledger_id, "June");
        assert_eq!(june.len(), 1); // header only
    }

    #[tokio::test]
    async fn backdate_classification_uses_calendar_days() {
        let fx = fixture();
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).unwrap();

        let yesterday = fx
            .writer
            .append_at(payload(date(2024, 6, 9)), now)
            .await
            .expect("append yesterday");
        assert!(yesterday.backdated);

        let same_day = fx
            .writer
            .append_at(payload(date(2024, 6, 10)), now)
            .await
            .expect("append same day");
        assert!(!same_day.backdated);

        let tomorrow = fx
            .writer
            .append_at(payload(date(2024, 6, 11)), now)
            .await
            .expect("append tomorrow");
        assert!(!tomorrow.backdated);
    }

    #[tokio::test]
    async fn offset_shifts_the_backdate_boundary() {
        let fx = fixture();
        // 2024-06-09 20:00 UTC is already 2024-06-10 in UTC+5:30, so an entry
        // dated 2024-06-09 counts as back-dated.
        let now = Utc.with_ymd_and_hms(2024, 6, 9, 20, 0, 0).unwrap();
        let ack = fx
            .writer
            .append_at(payload(date(2024, 6, 9)), now)
            .await
            .expect("append");
        assert!(ack.backdated);
    }

    #[tokio::test]
    async fn validation_failures_leave_no_rows() {
        let fx = fixture();
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();

        let mut empty_project = payload(date(2024, 6, 10));
        empty_project.project = "  ".to_string();
        let error = fx
            .writer
            .append_at(empty_project, now)
            .await
            .expect_err("empty project");
        assert!(matches!(error, AppError::Validation(_)));

        let mut too_many_hours = payload(date(2024, 6, 10));
        too_many_hours.hours = 25.0;
        assert!(fx.writer.append_at(too_many_hours, now).await.is_err());

        let mut zero_hours = payload(date(2024, 6, 10));
        zero_hours.hours = 0.0;
        assert!(fx.writer.append_at(zero_hours, now).await.is_err());

        let mut bad_email = payload(date(2024, 6, 10));
        bad_email.user_email = "not-an-address".to_string();
        assert!(fx.writer.append_at(bad_email, now).await.is_err());

        // No ledger was ever provisioned for the failed submissions.
        assert_eq!(fx.backend.create_calls(), 0);
    }

    #[tokio::test]
    async fn channel_failure_does_not_fail_the_append() {
        let fx = fixture();
        fx.channel.fail_posts();
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let ack = fx
            .writer
            .append_at(payload(date(2024, 6, 9)), now)
            .await
            .expect("append succeeds despite channel failure");
        assert!(ack.backdated);
        let rows = fx.backend.rows(&ack.ledger_id, "June");
        assert_eq!(rows.len(), 2);
    }
}
