use crate::error::ProviderError;
use crate::request::{HttpRequest, HttpResponse, ResilientClient};
use playsync_models::{calculate_progress, ExternalIds, MediaKind, MediaSession, PlaybackState, User};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const LIBRARY_IDENTIFIER: &str = "com.plexapp.plugins.library";

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub key: String,
    pub type_: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct PlexResponse {
    #[serde(rename = "MediaContainer")]
    media_container: MediaContainer,
}

#[derive(Debug, Default, Deserialize)]
struct MediaContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Metadata>,
    #[serde(rename = "Directory", default)]
    directory: Vec<Directory>,
}

#[derive(Debug, Deserialize)]
struct Directory {
    #[serde(default)]
    key: String,
    #[serde(rename = "type", default)]
    type_: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Metadata {
    #[serde(default)]
    pub rating_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub view_offset: u64,
    #[serde(default)]
    pub grandparent_title: String,
    #[serde(default)]
    pub parent_index: u32,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub guid: String,
    #[serde(rename = "Player", default)]
    pub player: Option<Player>,
    #[serde(rename = "User", default)]
    pub user: Option<PlexUser>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Player {
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PlexUser {
    /// A string on most servers, a number on some
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: String,
}

/// Thin wrapper over the Plex Media Server HTTP API.
#[derive(Clone)]
pub struct PlexHttpClient {
    client: ResilientClient,
    server_url: String,
}

impl PlexHttpClient {
    pub fn new(client: ResilientClient, server_url: &str, token: &str) -> Self {
        let client = client.with_headers([
            ("Accept", "application/json"),
            ("X-Plex-Token", token),
        ]);
        Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn get_container(&self, url: String) -> Result<MediaContainer, ProviderError> {
        let response = self.client.execute(HttpRequest::get(url)).await?;
        let parsed: PlexResponse = decode(&response)?;
        Ok(parsed.media_container)
    }

    pub async fn get_libraries(&self) -> Result<Vec<LibraryInfo>, ProviderError> {
        let container = self
            .get_container(format!("{}/library/sections", self.server_url))
            .await?;
        Ok(container
            .directory
            .into_iter()
            .map(|dir| LibraryInfo {
                key: dir.key,
                type_: dir.type_,
                title: dir.title,
            })
            .collect())
    }

    pub(crate) async fn get_sessions(&self) -> Result<Vec<Metadata>, ProviderError> {
        let container = self
            .get_container(format!("{}/status/sessions", self.server_url))
            .await?;
        Ok(container.metadata)
    }

    /// Library items of `kind` matching `title` (and `year` when known).
    pub(crate) async fn search(
        &self,
        kind: MediaKind,
        title: &str,
        year: Option<u32>,
    ) -> Result<Vec<Metadata>, ProviderError> {
        let mut url = format!(
            "{}/library/all?type={}&title={}",
            self.server_url,
            search_type(kind),
            urlencoding::encode(title)
        );
        if let Some(year) = year.filter(|y| *y > 0) {
            url.push_str(&format!("&year={}", year));
        }
        debug!("Plex search: '{}' (type: {}, year: {:?})", title, kind, year);
        let container = self.get_container(url).await?;
        Ok(container.metadata)
    }

    pub async fn update_progress(
        &self,
        rating_key: &str,
        time_ms: u64,
        state: &str,
    ) -> Result<(), ProviderError> {
        let url = format!(
            "{}/:/progress?key={}&state={}&time={}&identifier={}",
            self.server_url,
            urlencoding::encode(rating_key),
            state,
            time_ms,
            LIBRARY_IDENTIFIER
        );
        let response = self.client.execute(HttpRequest::get(url)).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ProviderError::status("plex", response.status, response.text()))
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T, ProviderError> {
    if !response.is_success() {
        return Err(ProviderError::status("plex", response.status, response.text()));
    }
    response.json().map_err(|e| ProviderError::decode("plex", e))
}

/// Plex library type codes used by `/library/all`.
fn search_type(kind: MediaKind) -> u8 {
    match kind {
        MediaKind::Movie => 1,
        MediaKind::Episode => 3,
    }
}

/// Extract the external id from a legacy agent guid such as
/// `com.plexapp.agents.imdb://tt0113277?lang=en`.
pub(crate) fn parse_guid(guid: &str) -> ExternalIds {
    let ids = ExternalIds::new();
    let Some((_, rest)) = guid.split_once("//") else {
        return ids;
    };
    let value = rest.split('?').next().unwrap_or(rest).to_string();
    if value.is_empty() {
        return ids;
    }
    if guid.contains("imdb") {
        ids.with_imdb(value)
    } else if guid.contains("tvdb") {
        ids.with_tvdb(value)
    } else {
        ids
    }
}

/// Convert Plex metadata into sessions, dropping non-video items and, when
/// `username` is set, items played by other users.
pub(crate) fn to_sessions(items: Vec<Metadata>, source: &str, username: Option<&str>) -> Vec<MediaSession> {
    items
        .into_iter()
        .filter_map(|item| {
            let kind = MediaKind::from_provider(&item.type_)?;
            let user = item.user.unwrap_or_default();
            if let Some(wanted) = username {
                if !user.title.is_empty() && user.title != wanted {
                    debug!("Plex: skipping session of user '{}'", user.title);
                    return None;
                }
            }

            let mut session = match kind {
                MediaKind::Movie => MediaSession::movie(&item.rating_key, &item.title, None),
                MediaKind::Episode => MediaSession::episode(
                    &item.rating_key,
                    &item.grandparent_title,
                    &item.title,
                    item.parent_index,
                    item.index,
                ),
            };
            session.year = item.year.filter(|y| *y > 0);
            session.state = PlaybackState::parse(
                item.player.as_ref().map(|p| p.state.as_str()).unwrap_or_default(),
            );
            session.position_ms = item.view_offset;
            session.duration_ms = item.duration;
            session.progress = calculate_progress(item.view_offset, item.duration);
            session.ids = parse_guid(&item.guid);
            session.user = User {
                id: match user.id {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    _ => String::new(),
                },
                name: user.title,
            };
            session.source = source.to_string();
            Some(session)
        })
        .collect()
}
