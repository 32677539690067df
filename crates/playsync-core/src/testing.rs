use async_trait::async_trait;
use playsync_config::ServerKind;
use playsync_models::{MediaSession, ScrobbleAction};
use playsync_sources::{MediaServer, ProviderError, RemoteError, RemoteHistory};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Delivery = (MediaSession, ScrobbleAction);

/// In-memory media server: replays queued poll results and records scrobbles.
pub(crate) struct FakeServer {
    name: String,
    polls: Mutex<VecDeque<Result<Vec<MediaSession>, ProviderError>>>,
    fail_scrobble: bool,
    hang_scrobble: bool,
    scrobbles: Mutex<Vec<Delivery>>,
}

impl FakeServer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            polls: Mutex::new(VecDeque::new()),
            fail_scrobble: false,
            hang_scrobble: false,
            scrobbles: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_scrobble = true;
        self
    }

    /// Record scrobbles but never complete them.
    pub fn hanging(mut self) -> Self {
        self.hang_scrobble = true;
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Queue the result of the next poll. An empty queue polls as idle.
    pub fn push_poll(&self, sessions: Vec<MediaSession>) {
        self.polls.lock().unwrap().push_back(Ok(sessions));
    }

    pub fn push_poll_error(&self) {
        self.polls
            .lock()
            .unwrap()
            .push_back(Err(ProviderError::status(&self.name, 503, "unavailable")));
    }

    pub fn scrobbles(&self) -> Vec<Delivery> {
        self.scrobbles.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<ScrobbleAction> {
        self.scrobbles().into_iter().map(|(_, action)| action).collect()
    }
}

#[async_trait]
impl MediaServer for FakeServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn server_kind(&self) -> ServerKind {
        ServerKind::Jellyfin
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn get_active_sessions(&self) -> Result<Vec<MediaSession>, ProviderError> {
        self.polls.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn scrobble(&self, session: &MediaSession, action: ScrobbleAction) -> Result<(), ProviderError> {
        self.scrobbles.lock().unwrap().push((session.clone(), action));
        if self.hang_scrobble {
            std::future::pending::<()>().await;
        }
        if self.fail_scrobble {
            return Err(ProviderError::NotFound(session.display_title()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeHistory {
    fail: bool,
    scrobbles: Mutex<Vec<Delivery>>,
}

impl FakeHistory {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn scrobbles(&self) -> Vec<Delivery> {
        self.scrobbles.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteHistory for FakeHistory {
    fn name(&self) -> &str {
        "trakt"
    }

    async fn scrobble(&self, session: &MediaSession, action: ScrobbleAction) -> Result<(), RemoteError> {
        self.scrobbles.lock().unwrap().push((session.clone(), action));
        if self.fail {
            return Err(RemoteError::Status {
                status: 401,
                body: "invalid token".to_string(),
            });
        }
        Ok(())
    }
}
