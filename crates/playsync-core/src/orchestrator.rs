use crate::worker::{SyncGroup, SyncWorker};
use playsync_config::{Config, SyncGroupConfig, TRAKT_TARGET};
use playsync_models::IdentityPolicy;
use playsync_sources::{MediaServer, RemoteHistory};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A configured sync group resolved by name only, before any server exists.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    pub name: String,
    pub source: String,
    /// Server targets; the source and the remote-history entry are removed
    pub targets: Vec<String>,
    pub remote_history: bool,
    pub interval: Duration,
    pub identity: IdentityPolicy,
}

impl GroupPlan {
    pub fn from_config(config: &Config, group: &SyncGroupConfig) -> Self {
        let mut targets: Vec<String> = Vec::new();
        let mut remote_history = false;

        for target in &group.targets {
            if target == TRAKT_TARGET {
                remote_history = true;
            } else if *target == group.source {
                debug!(group = %group.name, target = %target, "Dropping target that is also the source");
            } else if !targets.contains(target) {
                targets.push(target.clone());
            }
        }

        Self {
            name: group.name.clone(),
            source: group.source.clone(),
            targets,
            remote_history,
            interval: config.group_interval(group),
            identity: group.identity_key,
        }
    }

    pub fn all(config: &Config) -> Vec<Self> {
        config.sync.iter().map(|group| Self::from_config(config, group)).collect()
    }
}

/// Owns one [`SyncWorker`] per valid group and the task group running them.
pub struct SyncOrchestrator {
    workers: Vec<Arc<SyncWorker>>,
    tasks: JoinSet<()>,
}

impl SyncOrchestrator {
    /// Resolve every configured group against the connected servers. Groups
    /// naming an unknown server are skipped.
    pub fn new(
        config: &Config,
        servers: &HashMap<String, Arc<dyn MediaServer>>,
        remote: Option<Arc<dyn RemoteHistory>>,
    ) -> Self {
        let workers = GroupPlan::all(config)
            .into_iter()
            .filter_map(|plan| Self::build_group(plan, servers, remote.as_ref()))
            .map(|group| Arc::new(SyncWorker::new(group)))
            .collect();

        Self {
            workers,
            tasks: JoinSet::new(),
        }
    }

    fn build_group(
        plan: GroupPlan,
        servers: &HashMap<String, Arc<dyn MediaServer>>,
        remote: Option<&Arc<dyn RemoteHistory>>,
    ) -> Option<SyncGroup> {
        let Some(source) = servers.get(&plan.source) else {
            warn!(group = %plan.name, source = %plan.source, "Unknown source server, skipping group");
            return None;
        };

        let mut targets = Vec::with_capacity(plan.targets.len());
        for name in &plan.targets {
            let Some(target) = servers.get(name) else {
                warn!(group = %plan.name, target = %name, "Unknown target server, skipping group");
                return None;
            };
            targets.push(target.clone());
        }

        let remote = match (plan.remote_history, remote) {
            (true, Some(remote)) => Some(remote.clone()),
            (true, None) => {
                warn!(group = %plan.name, "Trakt is listed as a target but not configured");
                None
            }
            (false, _) => None,
        };

        if targets.is_empty() && remote.is_none() {
            warn!(group = %plan.name, "Group has nothing to sync to, skipping");
            return None;
        }

        Some(SyncGroup {
            name: plan.name,
            source: source.clone(),
            targets,
            remote,
            interval: plan.interval,
            identity: plan.identity,
        })
    }

    pub fn workers(&self) -> &[Arc<SyncWorker>] {
        &self.workers
    }

    /// Spawn every worker and return immediately.
    pub fn start(&mut self, cancel: &CancellationToken) {
        if !self.tasks.is_empty() {
            warn!("Sync workers are already running");
            return;
        }

        for worker in &self.workers {
            let group = worker.group();
            info!(
                group = %group.name,
                source = %group.source.name(),
                targets = ?group.target_names(),
                trakt = group.remote.is_some(),
                "Starting sync group {}",
                group.name
            );
            let worker = worker.clone();
            let cancel = cancel.clone();
            self.tasks.spawn(async move { worker.run(cancel).await });
        }

        info!("Started {} sync worker(s)", self.workers.len());
    }

    /// Workers end when the shared token is cancelled; this only records
    /// that shutdown has begun.
    pub fn stop(&self) {
        info!("Stopping {} sync worker(s)", self.tasks.len());
    }

    /// Wait for every spawned worker to exit.
    pub async fn join(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Sync worker task failed");
            }
        }
        debug!("All sync workers exited");
    }
}
