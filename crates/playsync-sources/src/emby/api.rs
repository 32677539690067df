use crate::emby::auth::CLIENT_NAME;
use crate::emby::Flavor;
use crate::error::ProviderError;
use crate::request::{HttpRequest, HttpResponse, ResilientClient};
use playsync_models::{calculate_progress, ExternalIds, MediaKind, MediaSession, PlaybackState, User};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Ticks per millisecond (a tick is 100ns).
pub const TICKS_PER_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Session {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub client: String,
    pub now_playing_item: Option<NowPlayingItem>,
    #[serde(default)]
    pub play_state: PlayState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NowPlayingItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub type_: String,
    #[serde(default)]
    pub run_time_ticks: u64,
    pub production_year: Option<u32>,
    #[serde(default)]
    pub index_number: u32,
    #[serde(default)]
    pub parent_index_number: u32,
    #[serde(default)]
    pub series_name: String,
    #[serde(default)]
    pub provider_ids: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PlayState {
    #[serde(default)]
    pub position_ticks: u64,
    #[serde(default)]
    pub is_paused: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ItemsResult {
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Item {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub production_year: Option<u32>,
    pub index_number: Option<u32>,
    pub parent_index_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct UserDto {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub policy: UserPolicy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct UserPolicy {
    #[serde(default)]
    pub is_disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SystemInfo {
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PlaybackReport<'a> {
    pub item_id: &'a str,
    pub user_id: &'a str,
    pub position_ticks: u64,
    pub is_paused: bool,
    pub play_session_id: &'a str,
}

/// HTTP API shared by Jellyfin and Emby.
#[derive(Clone)]
pub struct EmbyHttpClient {
    client: ResilientClient,
    server_url: String,
    flavor: Flavor,
}

impl EmbyHttpClient {
    pub fn new(client: ResilientClient, server_url: &str, flavor: Flavor, token: &str) -> Self {
        let server_url = server_url.trim_end_matches('/').to_string();
        let client = client
            .with_headers([("Accept", "application/json"), ("Content-Type", "application/json")])
            .with_headers(flavor.token_headers(token));
        Self {
            client,
            server_url,
            flavor,
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, response: &HttpResponse) -> Result<T, ProviderError> {
        if !response.is_success() {
            return Err(ProviderError::status(self.flavor.label(), response.status, response.text()));
        }
        response
            .json()
            .map_err(|e| ProviderError::decode(self.flavor.label(), e))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.server_url, path_and_query);
        let response = self.client.execute(HttpRequest::get(url)).await?;
        self.decode(&response)
    }

    async fn post(&self, request: HttpRequest) -> Result<(), ProviderError> {
        let response = self.client.execute(request).await?;
        if response.status >= 400 {
            return Err(ProviderError::status(self.flavor.label(), response.status, response.text()));
        }
        Ok(())
    }

    pub(crate) async fn system_info(&self) -> Result<SystemInfo, ProviderError> {
        self.get("/System/Info").await
    }

    pub(crate) async fn sessions(&self) -> Result<Vec<Session>, ProviderError> {
        self.get("/Sessions").await
    }

    pub(crate) async fn users(&self) -> Result<Vec<UserDto>, ProviderError> {
        self.get("/Users").await
    }

    /// First item carrying `provider`'s id, e.g. (`Imdb`, `tt0113277`).
    pub(crate) async fn find_by_provider_id(
        &self,
        provider: &str,
        id: &str,
    ) -> Result<Option<String>, ProviderError> {
        let query = format!(
            "/Items?AnyProviderIdEquals={}&Recursive=true",
            urlencoding::encode(&format!("{}.{}", provider, id))
        );
        let result: ItemsResult = self.get(&query).await?;
        Ok(result.items.into_iter().next().map(|item| item.id))
    }

    pub(crate) async fn search(
        &self,
        term: &str,
        kind: MediaKind,
        year: Option<u32>,
    ) -> Result<Vec<Item>, ProviderError> {
        let item_type = match kind {
            MediaKind::Movie => "Movie",
            MediaKind::Episode => "Episode",
        };
        let mut query = format!(
            "/Items?searchTerm={}&IncludeItemTypes={}&Recursive=true",
            urlencoding::encode(term),
            item_type
        );
        if let Some(year) = year.filter(|y| *y > 0) {
            query.push_str(&format!("&Years={}", year));
        }
        let result: ItemsResult = self.get(&query).await?;
        Ok(result.items)
    }

    pub(crate) async fn report_playback(
        &self,
        endpoint: &str,
        report: &PlaybackReport<'_>,
    ) -> Result<(), ProviderError> {
        let request = HttpRequest::post(format!("{}{}", self.server_url, endpoint)).json(report)?;
        self.post(request).await
    }

    pub(crate) async fn mark_played(&self, user_id: &str, item_id: &str) -> Result<(), ProviderError> {
        let url = format!("{}/Users/{}/PlayedItems/{}", self.server_url, user_id, item_id);
        self.post(HttpRequest::post(url)).await
    }
}

/// Convert server sessions, skipping idle sessions and our own client.
pub(crate) fn to_sessions(sessions: Vec<Session>, source: &str) -> Vec<MediaSession> {
    sessions
        .into_iter()
        .filter_map(|raw| {
            let item = raw.now_playing_item.filter(|item| !item.id.is_empty())?;
            if raw.client == CLIENT_NAME {
                trace!(session_id = %raw.id, user = %raw.user_name, "Skipping our own session");
                return None;
            }

            let kind = if item.type_ == "Episode" {
                MediaKind::Episode
            } else {
                MediaKind::Movie
            };
            let duration_ms = item.run_time_ticks / TICKS_PER_MS;
            let position_ms = raw.play_state.position_ticks / TICKS_PER_MS;

            let mut session = match kind {
                MediaKind::Movie => MediaSession::movie(&raw.id, &item.name, None),
                MediaKind::Episode => MediaSession::episode(
                    &raw.id,
                    &item.series_name,
                    &item.name,
                    item.parent_index_number,
                    item.index_number,
                ),
            };
            session.year = item.production_year.filter(|y| *y > 0);
            session.state = if raw.play_state.is_paused {
                PlaybackState::Paused
            } else {
                PlaybackState::Playing
            };
            session.position_ms = position_ms;
            session.duration_ms = duration_ms;
            session.progress = calculate_progress(position_ms, duration_ms);
            let mut ids = ExternalIds::new();
            ids.imdb_id = item.provider_ids.get("Imdb").cloned();
            ids.tvdb_id = item.provider_ids.get("Tvdb").cloned();
            session.ids = ids;
            session.user = User {
                id: raw.user_id,
                name: raw.user_name,
            };
            session.source = source.to_string();
            Some(session)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSIONS: &str = r#"[
        {
            "Id": "s1",
            "UserId": "u1",
            "UserName": "alice",
            "Client": "Jellyfin Web",
            "NowPlayingItem": {
                "Id": "i1",
                "Name": "Heat",
                "Type": "Movie",
                "RunTimeTicks": 100000000,
                "ProductionYear": 1995,
                "ProviderIds": {"Imdb": "tt0113277", "Tmdb": "949"}
            },
            "PlayState": {"PositionTicks": 45000000, "IsPaused": false}
        },
        {
            "Id": "s2",
            "UserName": "bob",
            "Client": "Android TV",
            "NowPlayingItem": {
                "Id": "i2",
                "Name": "Secrets",
                "Type": "Episode",
                "SeriesName": "Dark",
                "ParentIndexNumber": 1,
                "IndexNumber": 1,
                "RunTimeTicks": 10000000,
                "ProviderIds": {"Tvdb": "6351940"}
            },
            "PlayState": {"PositionTicks": 9500000, "IsPaused": true}
        },
        {"Id": "s3", "Client": "Jellyfin Web", "PlayState": {}},
        {
            "Id": "s4",
            "Client": "Playsync",
            "NowPlayingItem": {"Id": "i1", "Name": "Heat", "Type": "Movie"}
        }
    ]"#;

    #[test]
    fn test_to_sessions() {
        let raw: Vec<Session> = serde_json::from_str(SESSIONS).unwrap();
        let sessions = to_sessions(raw, "jellyfin");
        assert_eq!(sessions.len(), 2);

        let movie = &sessions[0];
        assert_eq!(movie.kind, MediaKind::Movie);
        assert_eq!(movie.duration_ms, 10_000);
        assert_eq!(movie.position_ms, 4_500);
        assert_eq!(movie.progress, 45.0);
        assert_eq!(movie.state, PlaybackState::Playing);
        assert_eq!(movie.year, Some(1995));
        assert_eq!(movie.ids.imdb_id.as_deref(), Some("tt0113277"));
        assert_eq!(movie.user.name, "alice");
        assert_eq!(movie.source, "jellyfin");

        let episode = &sessions[1];
        assert_eq!(episode.kind, MediaKind::Episode);
        assert_eq!(episode.show_title(), "Dark");
        assert_eq!(episode.episode_number(), 1);
        assert_eq!(episode.state, PlaybackState::Paused);
        assert_eq!(episode.progress, 95.0);
        assert_eq!(episode.ids.tvdb_id.as_deref(), Some("6351940"));
    }
}
