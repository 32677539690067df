use crate::media_ids::ExternalIds;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
}

impl MediaKind {
    /// Map a provider type string ("movie", "Episode", ...) to a kind.
    /// Anything that is not a movie or an episode (tracks, photos, trailers)
    /// is not scrobbled.
    pub fn from_provider(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "movie" => Some(MediaKind::Movie),
            "episode" => Some(MediaKind::Episode),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Episode => "episode",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    /// Provider states we do not model ("buffering", ...)
    #[serde(other)]
    Unknown,
}

impl PlaybackState {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "playing" => PlaybackState::Playing,
            "paused" => PlaybackState::Paused,
            "stopped" => PlaybackState::Stopped,
            _ => PlaybackState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub show_title: String,
    pub episode_title: String,
    pub season: u32,
    pub number: u32,
}

/// A snapshot of one playback instance as reported by a media server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaSession {
    /// Opaque provider identifier. May change between polls for the same item.
    pub session_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    pub kind: MediaKind,
    pub state: PlaybackState,
    /// Percentage in 0..=100, derived from position and duration
    pub progress: f64,
    pub duration_ms: u64,
    pub position_ms: u64,
    #[serde(default)]
    pub ids: ExternalIds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeInfo>,
    #[serde(default)]
    pub user: User,
    /// Name of the server that produced this snapshot
    pub source: String,
}

impl MediaSession {
    pub fn movie(session_id: impl Into<String>, title: impl Into<String>, year: Option<u32>) -> Self {
        Self {
            session_id: session_id.into(),
            title: title.into(),
            year,
            kind: MediaKind::Movie,
            state: PlaybackState::Playing,
            progress: 0.0,
            duration_ms: 0,
            position_ms: 0,
            ids: ExternalIds::default(),
            episode: None,
            user: User::default(),
            source: String::new(),
        }
    }

    pub fn episode(
        session_id: impl Into<String>,
        show_title: impl Into<String>,
        episode_title: impl Into<String>,
        season: u32,
        number: u32,
    ) -> Self {
        let episode_title = episode_title.into();
        Self {
            session_id: session_id.into(),
            title: episode_title.clone(),
            year: None,
            kind: MediaKind::Episode,
            state: PlaybackState::Playing,
            progress: 0.0,
            duration_ms: 0,
            position_ms: 0,
            ids: ExternalIds::default(),
            episode: Some(EpisodeInfo {
                show_title: show_title.into(),
                episode_title,
                season,
                number,
            }),
            user: User::default(),
            source: String::new(),
        }
    }

    pub fn with_state(mut self, state: PlaybackState) -> Self {
        self.state = state;
        self
    }

    /// Set position and duration; progress is recomputed from them.
    pub fn with_position(mut self, position_ms: u64, duration_ms: u64) -> Self {
        self.position_ms = position_ms;
        self.duration_ms = duration_ms;
        self.progress = calculate_progress(position_ms, duration_ms);
        self
    }

    pub fn with_ids(mut self, ids: ExternalIds) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn show_title(&self) -> &str {
        self.episode.as_ref().map(|e| e.show_title.as_str()).unwrap_or("")
    }

    pub fn episode_title(&self) -> &str {
        self.episode.as_ref().map(|e| e.episode_title.as_str()).unwrap_or("")
    }

    pub fn season(&self) -> u32 {
        self.episode.as_ref().map(|e| e.season).unwrap_or(0)
    }

    pub fn episode_number(&self) -> u32 {
        self.episode.as_ref().map(|e| e.number).unwrap_or(0)
    }

    /// Human readable label used in logs ("Show S01E02" or "Title (2020)").
    pub fn display_title(&self) -> String {
        match (&self.episode, self.year) {
            (Some(ep), _) => format!("{} S{:02}E{:02}", ep.show_title, ep.season, ep.number),
            (None, Some(year)) => format!("{} ({})", self.title, year),
            (None, None) => self.title.clone(),
        }
    }
}

/// Progress percentage from a position and a duration, both in milliseconds.
pub fn calculate_progress(position_ms: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    position_ms as f64 / duration_ms as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_progress() {
        assert_eq!(calculate_progress(0, 0), 0.0);
        assert_eq!(calculate_progress(500, 0), 0.0);
        assert_eq!(calculate_progress(450, 1000), 45.0);
        assert_eq!(calculate_progress(1000, 1000), 100.0);
    }

    #[test]
    fn test_with_position_recomputes_progress() {
        let session = MediaSession::movie("1", "Heat", Some(1995)).with_position(950, 1000);
        assert_eq!(session.progress, 95.0);
        assert_eq!(session.display_title(), "Heat (1995)");
    }

    #[test]
    fn test_episode_accessors() {
        let session = MediaSession::episode("7", "Dark", "Secrets", 1, 1);
        assert_eq!(session.kind, MediaKind::Episode);
        assert_eq!(session.show_title(), "Dark");
        assert_eq!(session.episode_title(), "Secrets");
        assert_eq!(session.display_title(), "Dark S01E01");

        let movie = MediaSession::movie("8", "Heat", None);
        assert_eq!(movie.show_title(), "");
        assert_eq!(movie.episode_title(), "");
        assert_eq!(movie.season(), 0);
    }

    #[test]
    fn test_playback_state_parse() {
        assert_eq!(PlaybackState::parse("playing"), PlaybackState::Playing);
        assert_eq!(PlaybackState::parse("Paused"), PlaybackState::Paused);
        assert_eq!(PlaybackState::parse("stopped"), PlaybackState::Stopped);
        assert_eq!(PlaybackState::parse("buffering"), PlaybackState::Unknown);
    }

    #[test]
    fn test_unknown_state_deserializes() {
        let state: PlaybackState = serde_json::from_str("\"buffering\"").unwrap();
        assert_eq!(state, PlaybackState::Unknown);
    }

    #[test]
    fn test_media_kind_from_provider() {
        assert_eq!(MediaKind::from_provider("Episode"), Some(MediaKind::Episode));
        assert_eq!(MediaKind::from_provider("movie"), Some(MediaKind::Movie));
        assert_eq!(MediaKind::from_provider("track"), None);
    }
}
