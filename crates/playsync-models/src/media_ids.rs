use serde::{Deserialize, Serialize};

/// External identifiers a provider could attach to a playing item.
///
/// Media servers expose these through different shapes (Plex guids,
/// Jellyfin/Emby `ProviderIds`); they are normalized here so targets can
/// match items without relying on titles alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ExternalIds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvdb_id: Option<String>,
}

impl ExternalIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_imdb(mut self, imdb_id: impl Into<String>) -> Self {
        self.imdb_id = Some(imdb_id.into());
        self
    }

    pub fn with_tvdb(mut self, tvdb_id: impl Into<String>) -> Self {
        self.tvdb_id = Some(tvdb_id.into());
        self
    }

    /// Check if all ID fields are empty
    pub fn is_empty(&self) -> bool {
        self.imdb_id.is_none() && self.tvdb_id.is_none()
    }
}
