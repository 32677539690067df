use crate::duration::parse_duration;
use playsync_models::IdentityPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Interval used when a group or global interval cannot be parsed.
pub const DEFAULT_GROUP_INTERVAL: Duration = Duration::from_secs(30);

/// Name reserved for the remote watch-history service in target lists.
pub const TRAKT_TARGET: &str = "trakt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Global poll interval. `"0"` disables scrobbling altogether.
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trakt: Option<TraktConfig>,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
    #[serde(default)]
    pub sync: Vec<SyncGroupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktConfig {
    pub client_id: String,
}

/// Settings shared by every outbound client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Requests per second; no limiting when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout: default_timeout(),
            rate_limit: None,
            burst: None,
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or_else(|e| {
            warn!(value = %self.timeout, error = %e, "Invalid request timeout, using default");
            Duration::from_secs(30)
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Plex,
    Jellyfin,
    Emby,
}

impl ServerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKind::Plex => "plex",
            ServerKind::Jellyfin => "jellyfin",
            ServerKind::Emby => "emby",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub kind: ServerKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Restricts sessions to this user and picks the user to scrobble as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncGroupConfig {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub targets: Vec<String>,
    /// Overrides the global interval for this group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default)]
    pub identity_key: IdentityPolicy,
}

fn default_interval() -> String {
    "10s".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> String {
    "30s".to_string()
}

impl Default for Config {
    fn default() -> Self {
        let mut servers = BTreeMap::new();
        servers.insert(
            "plex".to_string(),
            ServerConfig {
                kind: ServerKind::Plex,
                url: "http://localhost:32400".to_string(),
                token: Some("YOUR_PLEX_TOKEN".to_string()),
                username: None,
                password: None,
            },
        );
        Self {
            interval: default_interval(),
            log_level: default_log_level(),
            trakt: None,
            request: RequestConfig::default(),
            servers,
            sync: vec![SyncGroupConfig {
                name: "plex-to-trakt".to_string(),
                source: "plex".to_string(),
                targets: vec![TRAKT_TARGET.to_string()],
                interval: None,
                identity_key: IdentityPolicy::default(),
            }],
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the config, writing a default one first when the file is missing.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, creating default");
            Config::default().save_to_file(path)?;
        }
        Self::load_from_file(path)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.servers.is_empty() {
            return Err(anyhow::anyhow!("At least one server must be configured"));
        }

        for (name, server) in &self.servers {
            if server.url.trim().is_empty() {
                return Err(anyhow::anyhow!("Server '{}' has no url", name));
            }
        }

        for group in &self.sync {
            if group.name.trim().is_empty() {
                return Err(anyhow::anyhow!("Sync group has no name"));
            }
            if group.source.trim().is_empty() {
                return Err(anyhow::anyhow!("Sync group '{}' has no source", group.name));
            }
            if group.targets.iter().any(|t| t.trim().is_empty()) {
                return Err(anyhow::anyhow!("Sync group '{}' has an empty target name", group.name));
            }
            if let Some(interval) = &group.interval {
                if matches!(parse_duration(interval), Ok(d) if d.is_zero()) {
                    return Err(anyhow::anyhow!(
                        "Sync group '{}' interval cannot be 0",
                        group.name
                    ));
                }
            }
        }

        if self.request.rate_limit.is_some_and(|rate| rate <= 0.0) {
            return Err(anyhow::anyhow!("request.rate_limit must be positive"));
        }

        Ok(())
    }

    /// `false` when the global interval is zero.
    pub fn scrobbling_enabled(&self) -> bool {
        !matches!(parse_duration(&self.interval), Ok(d) if d.is_zero())
    }

    /// Poll interval for a group: its own override, else the global interval.
    /// Unparsable or zero values fall back to 30 seconds.
    pub fn group_interval(&self, group: &SyncGroupConfig) -> Duration {
        let raw = group.interval.as_deref().unwrap_or(&self.interval);
        match parse_duration(raw) {
            Ok(d) if !d.is_zero() => d,
            Ok(_) => DEFAULT_GROUP_INTERVAL,
            Err(e) => {
                warn!(group = %group.name, value = %raw, error = %e, "Invalid interval, using default");
                DEFAULT_GROUP_INTERVAL
            }
        }
    }

    pub fn is_trakt_configured(&self) -> bool {
        self.trakt
            .as_ref()
            .is_some_and(|t| !t.client_id.is_empty() && t.client_id != "YOUR_CLIENT_ID")
    }

    /// Copy of the config with tokens and passwords replaced, for display.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        for server in masked.servers.values_mut() {
            if server.token.is_some() {
                server.token = Some("********".to_string());
            }
            if server.password.is_some() {
                server.password = Some("********".to_string());
            }
        }
        masked
    }
}
