use crate::error::ProviderError;
use crate::plex::api::{self, PlexHttpClient};
use crate::request::ResilientClient;
use crate::traits::MediaServer;
use async_trait::async_trait;
use futures::future::join_all;
use playsync_config::ServerKind;
use playsync_models::{MediaSession, ScrobbleAction};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, instrument, trace};

pub struct PlexServer {
    name: String,
    api: PlexHttpClient,
    username: Option<String>,
    library_count: AtomicUsize,
}

impl PlexServer {
    pub fn new(name: impl Into<String>, client: ResilientClient, server_url: &str, token: &str) -> Self {
        Self {
            name: name.into(),
            api: PlexHttpClient::new(client, server_url, token),
            username: None,
            library_count: AtomicUsize::new(0),
        }
    }

    /// Only report sessions of this Plex user.
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self
    }

    pub fn library_count(&self) -> usize {
        self.library_count.load(Ordering::Relaxed)
    }
}

/// Plex player state matching a scrobble action.
fn progress_state(action: ScrobbleAction) -> &'static str {
    match action {
        ScrobbleAction::Start => "playing",
        ScrobbleAction::Pause => "paused",
        ScrobbleAction::Stop => "stopped",
    }
}

#[async_trait]
impl MediaServer for PlexServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn server_kind(&self) -> ServerKind {
        ServerKind::Plex
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        let libraries = self.api.get_libraries().await?;
        self.library_count.store(libraries.len(), Ordering::Relaxed);
        info!(
            server = %self.name,
            url = %self.api.server_url(),
            "Connected to Plex server with {} libraries",
            libraries.len()
        );
        Ok(())
    }

    async fn get_active_sessions(&self) -> Result<Vec<MediaSession>, ProviderError> {
        let items = self.api.get_sessions().await?;
        Ok(api::to_sessions(items, &self.name, self.username.as_deref()))
    }

    #[instrument(skip(self, session), fields(server = %self.name, title = %session.display_title()))]
    async fn scrobble(&self, session: &MediaSession, action: ScrobbleAction) -> Result<(), ProviderError> {
        let matches = self.api.search(session.kind, &session.title, session.year).await?;
        if matches.is_empty() {
            return Err(ProviderError::NotFound(session.display_title()));
        }

        let state = progress_state(action);
        let results = join_all(matches.iter().map(|item| {
            self.api
                .update_progress(&item.rating_key, session.position_ms, state)
        }))
        .await;

        let errors: Vec<ProviderError> = results.into_iter().filter_map(Result::err).collect();
        if !errors.is_empty() {
            return Err(ProviderError::Multiple(errors));
        }

        trace!(action = %action, items = matches.len(), "Scrobbled to {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::testing::ScriptedTransport;
    use playsync_models::PlaybackState;
    use std::sync::Arc;

    fn server(transport: &Arc<ScriptedTransport>) -> PlexServer {
        let client = ResilientClient::new(transport.clone()).with_max_retries(0);
        PlexServer::new("plex", client, "http://plex:32400/", "token")
    }

    #[tokio::test]
    async fn test_connect_counts_libraries() {
        let transport = Arc::new(ScriptedTransport::responses(vec![(
            200,
            r#"{"MediaContainer":{"Directory":[{"key":"1","type":"movie","title":"Movies"},{"key":"2","type":"show","title":"TV"}]}}"#,
        )]));
        let plex = server(&transport);

        plex.connect().await.unwrap();

        assert_eq!(plex.library_count(), 2);
        let sent = transport.requests();
        assert_eq!(sent[0].url, "http://plex:32400/library/sections");
        assert_eq!(sent[0].headers["X-Plex-Token"], "token");
        assert_eq!(sent[0].headers["Accept"], "application/json");
    }

    #[tokio::test]
    async fn test_sessions_status_error() {
        let transport = Arc::new(ScriptedTransport::responses(vec![(401, "unauthorized")]));
        let err = server(&transport).get_active_sessions().await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_scrobble_updates_every_match() {
        let transport = Arc::new(ScriptedTransport::responses(vec![
            (
                200,
                r#"{"MediaContainer":{"Metadata":[{"ratingKey":"11","title":"Heat","type":"movie"},{"ratingKey":"12","title":"Heat","type":"movie"}]}}"#,
            ),
            (200, ""),
            (200, ""),
        ]));
        let session = MediaSession::movie("x", "Heat", Some(1995))
            .with_state(PlaybackState::Stopped)
            .with_position(9500, 10000);

        server(&transport)
            .scrobble(&session, ScrobbleAction::Stop)
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].url, "http://plex:32400/library/all?type=1&title=Heat&year=1995");
        let mut progress_urls: Vec<_> = sent[1..].iter().map(|r| r.url.clone()).collect();
        progress_urls.sort();
        assert_eq!(
            progress_urls,
            vec![
                "http://plex:32400/:/progress?key=11&state=stopped&time=9500&identifier=com.plexapp.plugins.library",
                "http://plex:32400/:/progress?key=12&state=stopped&time=9500&identifier=com.plexapp.plugins.library",
            ]
        );
    }

    #[tokio::test]
    async fn test_scrobble_without_match_is_not_found() {
        let transport = Arc::new(ScriptedTransport::responses(vec![(200, r#"{"MediaContainer":{"size":0}}"#)]));
        let session = MediaSession::episode("x", "Dark", "Secrets", 1, 1);

        let err = server(&transport)
            .scrobble(&session, ScrobbleAction::Start)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::NotFound(_)));
        assert_eq!(
            transport.requests()[0].url,
            "http://plex:32400/library/all?type=3&title=Secrets"
        );
    }
}
