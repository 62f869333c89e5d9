use crate::errors::{AppError, AppResult};
use crate::models::{LedgerRef, ResourceKind, HEADER_ROW, MONTH_NAMES};
use crate::settings::AppSettings;
use crate::stores::{LedgerStore, ResourceStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Finds or provisions the per-user ledger. Provisioning lays down all twelve
/// month partitions in calendar order with the fixed header row; creation is
/// serialized per user email so concurrent callers cannot mint duplicates.
pub struct LedgerLocator {
    settings: AppSettings,
    resources: Arc<dyn ResourceStore>,
    ledgers: Arc<dyn LedgerStore>,
    creation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LedgerLocator {
    pub fn new(
        settings: AppSettings,
        resources: Arc<dyn ResourceStore>,
        ledgers: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            settings,
            resources,
            ledgers,
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the user's ledger if one exists. Absence is not an error.
    pub async fn locate(&self, email: &str) -> AppResult<Option<LedgerRef>> {
        self.ensure_parent().await?;
        let name = self.settings.ledger_name(email);
        let matches = self
            .resources
            .list_resources(&name, &self.settings.parent_container_id, ResourceKind::Ledger)
            .await?;
        if matches.len() > 1 {
            tracing::warn!(email = %email, count = matches.len(), "multiple ledgers match one user");
        }
        Ok(matches.into_iter().next().map(|resource| LedgerRef {
            id: resource.id,
            name: resource.name,
        }))
    }

    pub async fn locate_or_create(&self, email: &str) -> AppResult<LedgerRef> {
        if let Some(existing) = self.locate(email).await? {
            return Ok(existing);
        }

        let lock = self.creation_lock(email).await;
        let _guard = lock.lock().await;

        // Another caller may have provisioned while we waited on the lock.
        if let Some(existing) = self.locate(email).await? {
            return Ok(existing);
        }

        let name = self.settings.ledger_name(email);
        let resource = self
            .resources
            .create_resource(&name, ResourceKind::Ledger, &self.settings.parent_container_id)
            .await
            .map_err(|error| {
                AppError::Provisioning(format!("ledger creation for {} failed: {}", email, error))
            })?;

        self.provision_partitions(&resource.id).await.map_err(|error| {
            // Partial ledger state is left in place, not rolled back.
            tracing::error!(email = %email, ledger_id = %resource.id, error = %error, "partition provisioning failed partway");
            AppError::Provisioning(format!(
                "partition setup for {} failed: {}",
                email, error
            ))
        })?;

        tracing::info!(email = %email, ledger_id = %resource.id, "provisioned new ledger");
        Ok(LedgerRef {
            id: resource.id,
            name: resource.name,
        })
    }

    async fn ensure_parent(&self) -> AppResult<()> {
        let parent_id = &self.settings.parent_container_id;
        if parent_id.trim().is_empty() {
            return Err(AppError::Configuration(
                "parentContainerId is not configured".to_string(),
            ));
        }
        let parent = self.resources.get_resource(parent_id).await?;
        match parent {
            Some(resource) if resource.kind == ResourceKind::Container => Ok(()),
            Some(resource) => Err(AppError::Configuration(format!(
                "parent resource {} is a {}, not a container",
                parent_id,
                resource.kind.as_str()
            ))),
            None => Err(AppError::Configuration(format!(
                "parent container {} does not exist",
                parent_id
            ))),
        }
    }

    /// Partition setup is a single sequential workflow per ledger: the default
    /// partition must carry its month name before anything addresses it, and
    /// each header write addresses the partition by name.
    async fn provision_partitions(&self, ledger_id: &str) -> AppResult<()> {
        let header: Vec<Value> = HEADER_ROW
            .iter()
            .map(|cell| Value::String((*cell).to_string()))
            .collect();

        for (index, month) in MONTH_NAMES.iter().enumerate() {
            if index == 0 {
                self.ledgers
                    .rename_default_partition(ledger_id, month)
                    .await?;
            } else {
                self.ledgers.add_partition(ledger_id, month).await?;
            }
            self.ledgers
                .write_range(ledger_id, month, 0, &[header.clone()])
                .await?;
        }
        Ok(())
    }

    async fn creation_lock(&self, email: &str) -> Arc<Mutex<()>> {
        let mut locks = self.creation_locks.lock().await;
        locks
            .entry(email.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
