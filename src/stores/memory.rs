use super::{LedgerStore, NotificationChannel, ResourceStore, RosterStore};
use crate::errors::{AppError, AppResult};
use crate::models::{ChannelMessage, Resource, ResourceKind, RosterPage, RosterUser};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub const DEFAULT_PARTITION_NAME: &str = "Sheet1";

#[derive(Debug, Clone)]
struct Partition {
    name: String,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Default)]
struct BackendState {
    resources: HashMap<String, Resource>,
    children: HashMap<String, Vec<String>>,
    partitions: HashMap<String, Vec<Partition>>,
    failing_reads: HashSet<String>,
}

/// In-memory resource + ledger backend. Stands in for the remote spreadsheet
/// service in tests; creating a ledger resource yields the implicit default
/// partition the way the real backing store does.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    create_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a container resource and returns its id.
    pub fn add_container(&self, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().expect("backend state lock");
        state.resources.insert(
            id.clone(),
            Resource {
                id: id.clone(),
                name: name.to_string(),
                kind: ResourceKind::Container,
            },
        );
        id
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads_for(&self, ledger_id: &str) {
        let mut state = self.state.lock().expect("backend state lock");
        state.failing_reads.insert(ledger_id.to_string());
    }

    pub fn partition_names(&self, ledger_id: &str) -> Vec<String> {
        let state = self.state.lock().expect("backend state lock");
        state
            .partitions
            .get(ledger_id)
            .map(|partitions| partitions.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn rows(&self, ledger_id: &str, partition: &str) -> Vec<Vec<Value>> {
        let state = self.state.lock().expect("backend state lock");
        state
            .partitions
            .get(ledger_id)
            .and_then(|partitions| partitions.iter().find(|p| p.name == partition))
            .map(|p| p.rows.clone())
            .unwrap_or_default()
    }

    /// Seeds a pre-provisioned ledger without going through the locator.
    pub fn seed_ledger(&self, name: &str, parent_id: &str, partitions: &[&str]) -> String {
        let id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().expect("backend state lock");
        state.resources.insert(
            id.clone(),
            Resource {
                id: id.clone(),
                name: name.to_string(),
                kind: ResourceKind::Ledger,
            },
        );
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(id.clone());
        state.partitions.insert(
            id.clone(),
            partitions
                .iter()
                .map(|name| Partition {
                    name: (*name).to_string(),
                    rows: Vec::new(),
                })
                .collect(),
        );
        id
    }

    pub fn push_row(&self, ledger_id: &str, partition: &str, row: Vec<Value>) {
        let mut state = self.state.lock().expect("backend state lock");
        if let Some(target) = state
            .partitions
            .get_mut(ledger_id)
            .and_then(|partitions| partitions.iter_mut().find(|p| p.name == partition))
        {
            target.rows.push(row);
        }
    }
}

#[async_trait]
impl ResourceStore for InMemoryBackend {
    async fn list_resources(
        &self,
        name: &str,
        parent_id: &str,
        kind: ResourceKind,
    ) -> AppResult<Vec<Resource>> {
        let state = self.state.lock().expect("backend state lock");
        let child_ids = state.children.get(parent_id).cloned().unwrap_or_default();
        Ok(child_ids
            .iter()
            .filter_map(|id| state.resources.get(id))
            .filter(|resource| resource.name == name && resource.kind == kind)
            .cloned()
            .collect())
    }

    async fn create_resource(
        &self,
        name: &str,
        kind: ResourceKind,
        parent_id: &str,
    ) -> AppResult<Resource> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let resource = Resource {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            kind,
        };
        let mut state = self.state.lock().expect("backend state lock");
        if !state.resources.contains_key(parent_id) {
            return Err(AppError::NotFound(format!(
                "parent resource {} does not exist",
                parent_id
            )));
        }
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(resource.id.clone());
        if kind == ResourceKind::Ledger {
            state.partitions.insert(
                resource.id.clone(),
                vec![Partition {
                    name: DEFAULT_PARTITION_NAME.to_string(),
                    rows: Vec::new(),
                }],
            );
        }
        state.resources.insert(resource.id.clone(), resource.clone());
        Ok(resource)
    }

    async fn get_resource(&self, id: &str) -> AppResult<Option<Resource>> {
        let state = self.state.lock().expect("backend state lock");
        Ok(state.resources.get(id).cloned())
    }
}

#[async_trait]
impl LedgerStore for InMemoryBackend {
    async fn rename_default_partition(&self, ledger_id: &str, new_name: &str) -> AppResult<()> {
        let mut state = self.state.lock().expect("backend state lock");
        let partitions = state
            .partitions
            .get_mut(ledger_id)
            .ok_or_else(|| AppError::NotFound(format!("ledger {} does not exist", ledger_id)))?;
        let Some(first) = partitions.first_mut() else {
            return Err(AppError::Store(format!(
                "ledger {} has no default partition",
                ledger_id
            )));
        };
        first.name = new_name.to_string();
        Ok(())
    }

    async fn add_partition(&self, ledger_id: &str, name: &str) -> AppResult<()> {
        let mut state = self.state.lock().expect("backend state lock");
        let partitions = state
            .partitions
            .get_mut(ledger_id)
            .ok_or_else(|| AppError::NotFound(format!("ledger {} does not exist", ledger_id)))?;
        if partitions.iter().any(|p| p.name == name) {
            return Err(AppError::Store(format!(
                "partition {} already exists in ledger {}",
                name, ledger_id
            )));
        }
        partitions.push(Partition {
            name: name.to_string(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn write_range(
        &self,
        ledger_id: &str,
        partition: &str,
        start_row: u32,
        rows: &[Vec<Value>],
    ) -> AppResult<()> {
        let mut state = self.state.lock().expect("backend state lock");
        let target = state
            .partitions
            .get_mut(ledger_id)
            .and_then(|partitions| partitions.iter_mut().find(|p| p.name == partition))
            .ok_or_else(|| {
                AppError::NotFound(format!("partition {} in ledger {}", partition, ledger_id))
            })?;
        let end = start_row as usize + rows.len();
        if target.rows.len() < end {
            target.rows.resize(end, Vec::new());
        }
        for (offset, row) in rows.iter().enumerate() {
            target.rows[start_row as usize + offset] = row.clone();
        }
        Ok(())
    }

    async fn append_row(&self, ledger_id: &str, partition: &str, row: &[Value]) -> AppResult<()> {
        let mut state = self.state.lock().expect("backend state lock");
        let target = state
            .partitions
            .get_mut(ledger_id)
            .and_then(|partitions| partitions.iter_mut().find(|p| p.name == partition))
            .ok_or_else(|| {
                AppError::NotFound(format!("partition {} in ledger {}", partition, ledger_id))
            })?;
        target.rows.push(row.to_vec());
        Ok(())
    }

    async fn read_range(&self, ledger_id: &str, partition: &str) -> AppResult<Vec<Vec<Value>>> {
        let state = self.state.lock().expect("backend state lock");
        if state.failing_reads.contains(ledger_id) {
            return Err(AppError::Store(format!(
                "injected read failure for ledger {}",
                ledger_id
            )));
        }
        let target = state
            .partitions
            .get(ledger_id)
            .and_then(|partitions| partitions.iter().find(|p| p.name == partition))
            .ok_or_else(|| {
                AppError::NotFound(format!("partition {} in ledger {}", partition, ledger_id))
            })?;
        Ok(target.rows.clone())
    }
}

/// In-memory roster with configurable page size, for exercising pagination.
pub struct InMemoryRoster {
    users: Vec<RosterUser>,
    page_size: usize,
    fail: AtomicBool,
}

impl InMemoryRoster {
    pub fn new(users: Vec<RosterUser>, page_size: usize) -> Self {
        Self {
            users,
            page_size: page_size.max(1),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_enumeration(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RosterStore for InMemoryRoster {
    async fn list_users(&self, page_token: Option<&str>) -> AppResult<RosterPage> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Store("injected roster failure".to_string()));
        }
        let start = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| AppError::Store(format!("bad page token: {}", token)))?,
            None => 0,
        };
        let end = (start + self.page_size).min(self.users.len());
        let next_page_token = if end < self.users.len() {
            Some(end.to_string())
        } else {
            None
        };
        Ok(RosterPage {
            users: self.users[start..end].to_vec(),
            next_page_token,
        })
    }
}

/// Records every posted message; optionally fails to exercise the
/// error-swallowing boundary.
#[derive(Default)]
pub struct RecordingChannel {
    posts: Mutex<Vec<ChannelMessage>>,
    fail: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_posts(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn posts(&self) -> Vec<ChannelMessage> {
        self.posts.lock().expect("channel posts lock").clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn post(&self, message: &ChannelMessage) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Store("injected channel failure".to_string()));
        }
        let mut posts = self.posts.lock().expect("channel posts lock");
        posts.push(message.clone());
        Ok(())
    }
}
