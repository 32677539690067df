use crate::error::{ProviderError, RemoteError};
use async_trait::async_trait;
use playsync_config::ServerKind;
use playsync_models::{MediaSession, ScrobbleAction};

/// A media server that can act as a sync source, a target, or both.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Configured name, unique per process
    fn name(&self) -> &str;

    fn server_kind(&self) -> ServerKind;

    /// Probe the server once at startup.
    async fn connect(&self) -> Result<(), ProviderError>;

    /// Sessions currently playing or paused on this server.
    async fn get_active_sessions(&self) -> Result<Vec<MediaSession>, ProviderError>;

    /// Replay a playback transition observed elsewhere onto this server.
    async fn scrobble(&self, session: &MediaSession, action: ScrobbleAction) -> Result<(), ProviderError>;
}

/// Remote watch-history service.
#[async_trait]
pub trait RemoteHistory: Send + Sync {
    fn name(&self) -> &str;

    async fn scrobble(&self, session: &MediaSession, action: ScrobbleAction) -> Result<(), RemoteError>;
}
