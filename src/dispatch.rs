use crate::models::{ChannelMessage, MessageSection, ReconciliationReport, ReportStatus};
use crate::stores::NotificationChannel;
use chrono::NaiveDate;
use std::sync::Arc;

/// Formats and posts structured notifications. Every send is best-effort: a
/// channel failure is logged and swallowed, never surfaced to the operation
/// that triggered the alert.
pub struct AlertDispatcher {
    channel: Arc<dyn NotificationChannel>,
}

impl AlertDispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self { channel }
    }

    pub async fn send_backdated_alert(
        &self,
        email: &str,
        display_name: &str,
        entry_date: NaiveDate,
        today: NaiveDate,
    ) {
        let message = ChannelMessage {
            header: "Back-dated timesheet entry".to_string(),
            sections: vec![MessageSection {
                title: display_name.to_string(),
                lines: vec![
                    format!("User: {}", email),
                    format!("Entry date: {}", entry_date),
                    format!("Submitted on: {}", today),
                ],
            }],
        };
        self.post_best_effort(&message).await;
    }

    /// One batched message per sweep, grouped missing before incomplete.
    /// Hours logged are shown for incomplete users only.
    pub async fn send_daily_report(&self, report: &ReconciliationReport) {
        let mut sections = Vec::new();

        let missing: Vec<String> = report
            .lines
            .iter()
            .filter(|line| line.status == ReportStatus::Missing)
            .map(|line| {
                format!(
                    "{}: no entries for {}",
                    line.display_name.as_deref().unwrap_or(&line.email),
                    report.date
                )
            })
            .collect();
        if !missing.is_empty() {
            sections.push(MessageSection {
                title: "Missing".to_string(),
                lines: missing,
            });
        }

        let incomplete: Vec<String> = report
            .lines
            .iter()
            .filter(|line| line.status == ReportStatus::Incomplete)
            .map(|line| {
                format!(
                    "{}: {} hours logged",
                    line.display_name.as_deref().unwrap_or(&line.email),
                    line.hours_logged.unwrap_or(0.0)
                )
            })
            .collect();
        if !incomplete.is_empty() {
            sections.push(MessageSection {
                title: "Incomplete".to_string(),
                lines: incomplete,
            });
        }

        if sections.is_empty() {
            return;
        }

        let message = ChannelMessage {
            header: format!("Timesheet report for {}", report.date),
            sections,
        };
        self.post_best_effort(&message).await;
    }

    async fn post_best_effort(&self, message: &ChannelMessage) {
        if let Err(error) = self.channel.post(message).await {
            tracing::warn!(error = %error, header = %message.header, "notification dispatch failed");
        }
    }
}
