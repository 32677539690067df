use crate::policy::prepare_delivery;
use crate::store::SessionStore;
use futures::future::join_all;
use playsync_config::DEFAULT_GROUP_INTERVAL;
use playsync_models::{IdentityPolicy, MediaSession, PlaybackState, ScrobbleAction};
use playsync_sources::{MediaServer, RemoteHistory};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Resolved sync group: one source polled on a fixed interval, fanned out to
/// its targets and optionally to remote history.
#[derive(Clone)]
pub struct SyncGroup {
    pub name: String,
    pub source: Arc<dyn MediaServer>,
    pub targets: Vec<Arc<dyn MediaServer>>,
    pub remote: Option<Arc<dyn RemoteHistory>>,
    pub interval: Duration,
    pub identity: IdentityPolicy,
}

impl SyncGroup {
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name()).collect()
    }
}

impl std::fmt::Debug for SyncGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncGroup")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("targets", &self.target_names())
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .field("interval", &self.interval)
            .field("identity", &self.identity)
            .finish()
    }
}

/// Polls one source and replays what it sees onto the group's targets.
///
/// The worker owns its [`SessionStore`]; stores are never shared.
pub struct SyncWorker {
    group: SyncGroup,
    store: SessionStore,
}

impl SyncWorker {
    pub fn new(mut group: SyncGroup) -> Self {
        if group.interval.is_zero() {
            group.interval = DEFAULT_GROUP_INTERVAL;
        }
        let store = SessionStore::new(group.identity);
        Self { group, store }
    }

    pub fn group(&self) -> &SyncGroup {
        &self.group
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Tick until `cancel` fires. In-flight deliveries are dropped on cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.group.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            group = %self.group.name,
            source = %self.group.source.name(),
            interval = ?period,
            "Sync worker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.tick() => {}
            }
        }

        info!(group = %self.group.name, "Sync worker stopped");
    }

    /// One poll-and-deliver cycle.
    #[instrument(skip(self), fields(group = %self.group.name))]
    pub async fn tick(&self) {
        let source = self.group.source.name();
        let active = match self.group.source.get_active_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to poll {}, skipping this tick", source);
                return;
            }
        };
        debug!(source = %source, count = active.len(), "Polled active sessions");

        let idle = active.is_empty();
        self.store.set_many(active);

        // An idle source reports nothing, so whatever we last saw has ended.
        if idle && !self.store.is_empty() {
            let stopped: Vec<_> = self
                .store
                .get_all()
                .into_iter()
                .map(|mut session| {
                    session.state = PlaybackState::Stopped;
                    session
                })
                .collect();
            self.store.set_many(stopped);
        }

        for session in self.store.get_all() {
            self.deliver(&session).await;
        }
    }

    async fn deliver(&self, session: &MediaSession) {
        let (session, action) = prepare_delivery(session);
        let remote = self.deliver_to_remote(&session, action);
        let targets = join_all(
            self.group
                .targets
                .iter()
                .map(|target| self.deliver_to_target(target.as_ref(), &session, action)),
        );
        futures::join!(remote, targets);
    }

    async fn deliver_to_remote(&self, session: &MediaSession, action: ScrobbleAction) {
        let Some(remote) = &self.group.remote else {
            return;
        };
        match remote.scrobble(session, action).await {
            Ok(()) => debug!(
                target = %remote.name(),
                title = %session.display_title(),
                action = %action,
                progress = session.progress,
                "Scrobbled to remote history"
            ),
            Err(e) => warn!(
                target = %remote.name(),
                title = %session.display_title(),
                action = %action,
                error = %e,
                "Failed to scrobble to {}",
                remote.name()
            ),
        }
    }

    async fn deliver_to_target(&self, target: &dyn MediaServer, session: &MediaSession, action: ScrobbleAction) {
        match target.scrobble(session, action).await {
            Ok(()) => debug!(
                target = %target.name(),
                title = %session.display_title(),
                action = %action,
                progress = session.progress,
                "Scrobbled"
            ),
            Err(e) => warn!(
                target = %target.name(),
                title = %session.display_title(),
                action = %action,
                error = %e,
                "Failed to scrobble to {}",
                target.name()
            ),
        }
    }
}
