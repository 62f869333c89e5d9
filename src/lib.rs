mod core;
mod dispatch;
mod errors;
mod locator;
mod models;
mod reconciler;
mod scheduler;
mod settings;
pub mod stores;
mod writer;

pub use crate::core::LedgerCore;
pub use dispatch::AlertDispatcher;
pub use errors::{AppError, AppResult};
pub use locator::LedgerLocator;
pub use models::{
    partition_for, Ack, ChannelMessage, LedgerRef, MessageSection, ReconciliationReport,
    ReportLine, ReportStatus, Resource, ResourceKind, RosterPage, RosterUser,
    SubmitEntryPayload, HEADER_ROW, MONTH_NAMES,
};
pub use reconciler::{weekday_calendar, BusinessDayPredicate, RosterReconciler};
pub use scheduler::ReconciliationScheduler;
pub use settings::AppSettings;
pub use writer::EntryWriter;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "timeledger.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
