pub mod memory;

use crate::errors::AppResult;
use crate::models::{ChannelMessage, Resource, ResourceKind, RosterPage};
use async_trait::async_trait;
use serde_json::Value;

/// Container/resource catalog of the backing service. Ledgers and their parent
/// container are both resources; lookup is by exact name under a parent.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn list_resources(
        &self,
        name: &str,
        parent_id: &str,
        kind: ResourceKind,
    ) -> AppResult<Vec<Resource>>;

    async fn create_resource(
        &self,
        name: &str,
        kind: ResourceKind,
        parent_id: &str,
    ) -> AppResult<Resource>;

    async fn get_resource(&self, id: &str) -> AppResult<Option<Resource>>;
}

/// Tabular operations against one ledger. Creating a ledger resource yields an
/// implicit default partition; provisioning renames it and adds the rest.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn rename_default_partition(&self, ledger_id: &str, new_name: &str) -> AppResult<()>;

    async fn add_partition(&self, ledger_id: &str, name: &str) -> AppResult<()>;

    /// Overwrites rows starting at `start_row` (zero-based) in the partition.
    async fn write_range(
        &self,
        ledger_id: &str,
        partition: &str,
        start_row: u32,
        rows: &[Vec<Value>],
    ) -> AppResult<()>;

    /// Inserts one row after the last occupied row. Never overwrites.
    async fn append_row(&self, ledger_id: &str, partition: &str, row: &[Value]) -> AppResult<()>;

    /// Reads every occupied row of the partition, header included.
    async fn read_range(&self, ledger_id: &str, partition: &str) -> AppResult<Vec<Vec<Value>>>;
}

/// Paginated enumeration of the expected-submitter roster.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn list_users(&self, page_token: Option<&str>) -> AppResult<RosterPage>;
}

/// Best-effort outbound notification channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn post(&self, message: &ChannelMessage) -> AppResult<()>;
}
