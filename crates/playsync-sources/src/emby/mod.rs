//! Jellyfin and Emby share one API; the flavor only changes how the
//! client authenticates.

pub mod api;
pub mod auth;
pub mod client;

use playsync_config::ServerKind;

pub use api::EmbyHttpClient;
pub use client::EmbyServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Jellyfin,
    Emby,
}

impl Flavor {
    pub fn label(&self) -> &'static str {
        match self {
            Flavor::Jellyfin => "jellyfin",
            Flavor::Emby => "emby",
        }
    }

    pub fn server_kind(&self) -> ServerKind {
        match self {
            Flavor::Jellyfin => ServerKind::Jellyfin,
            Flavor::Emby => ServerKind::Emby,
        }
    }

    /// Scheme of the `Authorization` header used when logging in.
    pub fn auth_scheme(&self) -> &'static str {
        match self {
            Flavor::Jellyfin => "MediaBrowser",
            Flavor::Emby => "Emby",
        }
    }

    pub fn token_headers(&self, token: &str) -> Vec<(&'static str, String)> {
        match self {
            Flavor::Jellyfin => vec![("Authorization", format!("MediaBrowser Token={}", token))],
            Flavor::Emby => vec![("X-Emby-Token", token.to_string())],
        }
    }
}
