use crate::emby::api::{self, EmbyHttpClient, PlaybackReport, TICKS_PER_MS};
use crate::emby::auth;
use crate::emby::Flavor;
use crate::error::ProviderError;
use crate::request::ResilientClient;
use crate::traits::MediaServer;
use async_trait::async_trait;
use playsync_config::ServerKind;
use playsync_models::{MediaKind, MediaSession, ScrobbleAction};
use tracing::{debug, info, instrument, trace};

pub struct EmbyServer {
    name: String,
    flavor: Flavor,
    api: EmbyHttpClient,
    username: Option<String>,
}

impl EmbyServer {
    /// Server authenticated with a static API token.
    pub fn with_token(
        name: impl Into<String>,
        flavor: Flavor,
        client: ResilientClient,
        server_url: &str,
        token: &str,
    ) -> Self {
        Self {
            name: name.into(),
            flavor,
            api: EmbyHttpClient::new(client, server_url, flavor, token),
            username: None,
        }
    }

    /// Log in with username and password to obtain a token first.
    pub async fn login(
        name: impl Into<String>,
        flavor: Flavor,
        client: ResilientClient,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, ProviderError> {
        let server_url = server_url.trim_end_matches('/');
        let token = auth::authenticate(&client, server_url, flavor, username, password).await?;
        Ok(Self::with_token(name, flavor, client, server_url, &token).with_username(Some(username.to_string())))
    }

    /// User to scrobble as; the first enabled user is used otherwise.
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self
    }

    /// Resolve the library item matching `session`: external ids first,
    /// then a title search.
    async fn find_item(&self, session: &MediaSession) -> Result<Option<String>, ProviderError> {
        let by_id = [("Imdb", session.ids.imdb_id.as_deref()), ("Tvdb", session.ids.tvdb_id.as_deref())];
        for (provider, id) in by_id {
            let Some(id) = id else { continue };
            match self.api.find_by_provider_id(provider, id).await {
                Ok(Some(item_id)) => return Ok(Some(item_id)),
                Ok(None) => {}
                Err(e) => debug!(provider, id, error = %e, "Lookup by provider id failed"),
            }
        }

        let items = self
            .api
            .search(&session.title, session.kind, session.year)
            .await?;
        let found = match session.kind {
            MediaKind::Episode => items.into_iter().find(|item| {
                item.parent_index_number == Some(session.season())
                    && item.index_number == Some(session.episode_number())
            }),
            MediaKind::Movie => items.into_iter().next(),
        };
        Ok(found.map(|item| item.id))
    }

    async fn resolve_user_id(&self) -> Result<String, ProviderError> {
        let users = self.api.users().await?;
        let enabled = || users.iter().filter(|u| !u.policy.is_disabled);
        let chosen = self
            .username
            .as_deref()
            .and_then(|wanted| enabled().find(|u| u.name == wanted))
            .or_else(|| enabled().next());
        chosen
            .map(|u| u.id.clone())
            .ok_or_else(|| ProviderError::Auth(format!("no enabled users found on {}", self.name)))
    }
}

#[async_trait]
impl MediaServer for EmbyServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn server_kind(&self) -> ServerKind {
        self.flavor.server_kind()
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        let info = self.api.system_info().await?;
        info!(
            server = %self.name,
            version = %info.version,
            "Connected to {} server: {}",
            self.flavor.label(),
            info.server_name
        );
        Ok(())
    }

    async fn get_active_sessions(&self) -> Result<Vec<MediaSession>, ProviderError> {
        let sessions = self.api.sessions().await?;
        Ok(api::to_sessions(sessions, &self.name))
    }

    #[instrument(skip(self, session), fields(server = %self.name, title = %session.display_title()))]
    async fn scrobble(&self, session: &MediaSession, action: ScrobbleAction) -> Result<(), ProviderError> {
        let item_id = self
            .find_item(session)
            .await?
            .ok_or_else(|| ProviderError::NotFound(session.display_title()))?;
        let user_id = self.resolve_user_id().await?;

        let report = PlaybackReport {
            item_id: &item_id,
            user_id: &user_id,
            position_ticks: session.position_ms * TICKS_PER_MS,
            is_paused: action == ScrobbleAction::Pause,
            play_session_id: &session.session_id,
        };
        let endpoint = match action {
            ScrobbleAction::Start => "/Sessions/Playing/Progress",
            ScrobbleAction::Pause | ScrobbleAction::Stop => "/Sessions/Playing/Stopped",
        };
        self.api.report_playback(endpoint, &report).await?;

        if action == ScrobbleAction::Stop && session.progress >= 100.0 {
            self.api.mark_played(&user_id, &item_id).await?;
        }

        trace!(action = %action, item = %item_id, "Scrobbled to {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::testing::ScriptedTransport;
    use playsync_models::{ExternalIds, PlaybackState};
    use std::sync::Arc;

    const USERS: &str = r#"[
        {"Id": "u0", "Name": "disabled", "Policy": {"IsDisabled": true}},
        {"Id": "u1", "Name": "alice", "Policy": {"IsDisabled": false}},
        {"Id": "u2", "Name": "bob"}
    ]"#;

    fn server(transport: &Arc<ScriptedTransport>, flavor: Flavor) -> EmbyServer {
        let client = ResilientClient::new(transport.clone()).with_max_retries(0);
        EmbyServer::with_token("media", flavor, client, "http://media:8096/", "tok")
    }

    #[tokio::test]
    async fn test_token_headers_per_flavor() {
        let transport = Arc::new(ScriptedTransport::responses(vec![
            (200, r#"{"ServerName":"home","Version":"10.9"}"#),
            (200, r#"{"ServerName":"home","Version":"4.8"}"#),
        ]));

        server(&transport, Flavor::Jellyfin).connect().await.unwrap();
        server(&transport, Flavor::Emby).connect().await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].url, "http://media:8096/System/Info");
        assert_eq!(sent[0].headers["Authorization"], "MediaBrowser Token=tok");
        assert_eq!(sent[1].headers["X-Emby-Token"], "tok");
        assert!(!sent[1].headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn test_stop_at_completion_marks_played() {
        let transport = Arc::new(ScriptedTransport::responses(vec![
            (200, r#"{"Items":[{"Id":"item9"}],"TotalRecordCount":1}"#),
            (200, USERS),
            (204, ""),
            (200, ""),
        ]));
        let mut session = MediaSession::movie("s1", "Heat", Some(1995))
            .with_state(PlaybackState::Stopped)
            .with_ids(ExternalIds::new().with_imdb("tt0113277"))
            .with_position(9_500, 10_000);
        session.progress = 100.0;

        server(&transport, Flavor::Jellyfin)
            .scrobble(&session, ScrobbleAction::Stop)
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[0].url,
            "http://media:8096/Items?AnyProviderIdEquals=Imdb.tt0113277&Recursive=true"
        );
        assert_eq!(sent[2].url, "http://media:8096/Sessions/Playing/Stopped");
        let body: serde_json::Value = serde_json::from_slice(sent[2].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["ItemId"], "item9");
        assert_eq!(body["UserId"], "u1");
        assert_eq!(body["PositionTicks"], 95_000_000u64);
        assert_eq!(body["IsPaused"], false);
        assert_eq!(body["PlaySessionId"], "s1");
        assert_eq!(sent[3].url, "http://media:8096/Users/u1/PlayedItems/item9");
    }

    #[tokio::test]
    async fn test_start_searches_episode_by_title() {
        let transport = Arc::new(ScriptedTransport::responses(vec![
            (
                200,
                r#"{"Items":[
                    {"Id":"e2","Name":"Secrets","ParentIndexNumber":2,"IndexNumber":1},
                    {"Id":"e1","Name":"Secrets","ParentIndexNumber":1,"IndexNumber":1}
                ]}"#,
            ),
            (200, USERS),
            (204, ""),
        ]));
        let session = MediaSession::episode("s2", "Dark", "Secrets", 1, 1).with_position(100, 1000);

        server(&transport, Flavor::Emby)
            .with_username(Some("bob".to_string()))
            .scrobble(&session, ScrobbleAction::Start)
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent[0].url,
            "http://media:8096/Items?searchTerm=Secrets&IncludeItemTypes=Episode&Recursive=true"
        );
        assert_eq!(sent[2].url, "http://media:8096/Sessions/Playing/Progress");
        let body: serde_json::Value = serde_json::from_slice(sent[2].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["ItemId"], "e1");
        assert_eq!(body["UserId"], "u2");
    }

    #[tokio::test]
    async fn test_no_match_is_not_found() {
        let transport = Arc::new(ScriptedTransport::responses(vec![(200, r#"{"Items":[]}"#)]));
        let session = MediaSession::movie("s1", "Unknown", None);

        let err = server(&transport, Flavor::Jellyfin)
            .scrobble(&session, ScrobbleAction::Pause)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_login_uses_returned_token() {
        let transport = Arc::new(ScriptedTransport::responses(vec![
            (200, r#"{"AccessToken":"fresh"}"#),
            (200, "[]"),
        ]));
        let client = ResilientClient::new(transport.clone()).with_max_retries(0);

        let server = EmbyServer::login("jf", Flavor::Jellyfin, client, "http://jf:8096", "alice", "pw")
            .await
            .unwrap();
        assert!(server.get_active_sessions().await.unwrap().is_empty());

        let sent = transport.requests();
        assert_eq!(sent[1].url, "http://jf:8096/Sessions");
        assert_eq!(sent[1].headers["Authorization"], "MediaBrowser Token=fresh");
    }
}
