//! Server factory pattern for creating media servers from configuration
//!
//! Each server kind registers a factory; the registry builds every configured
//! server, keyed by its configured name.

use crate::emby::{EmbyServer, Flavor};
use crate::plex::PlexServer;
use crate::request::ResilientClient;
use crate::trakt::TraktClient;
use crate::traits::{MediaServer, RemoteHistory};
use anyhow::Result;
use async_trait::async_trait;
use playsync_config::{Config, CredentialStore, ServerConfig, ServerKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Factory trait for creating media servers from configuration
#[async_trait]
pub trait ServerFactory: Send + Sync {
    fn kind(&self) -> ServerKind;

    /// Build the server and authenticate if needed. Does not call `connect`.
    async fn create_server(
        &self,
        name: &str,
        config: &ServerConfig,
        client: ResilientClient,
    ) -> Result<Arc<dyn MediaServer>>;

    fn validate_config(&self, name: &str, config: &ServerConfig) -> Result<()>;
}

/// Registry of server factories
pub struct ServerFactoryRegistry {
    factories: HashMap<ServerKind, Box<dyn ServerFactory>>,
}

impl ServerFactoryRegistry {
    /// Create a new registry with all built-in factories registered
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register(Box::new(PlexFactory));
        registry.register(Box::new(EmbyFactory(Flavor::Jellyfin)));
        registry.register(Box::new(EmbyFactory(Flavor::Emby)));
        registry
    }

    pub fn register(&mut self, factory: Box<dyn ServerFactory>) {
        self.factories.insert(factory.kind(), factory);
    }

    pub fn is_registered(&self, kind: ServerKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn validate_all_configs(&self, config: &Config) -> Result<()> {
        for (name, server) in &config.servers {
            let factory = self
                .factories
                .get(&server.kind)
                .ok_or_else(|| anyhow::anyhow!("No factory registered for server kind '{}'", server.kind))?;
            factory.validate_config(name, server)?;
        }
        Ok(())
    }

    /// Build and connect every configured server. A server that fails is
    /// logged and left out; having none at all is an error.
    pub async fn create_all_servers(
        &self,
        config: &Config,
        client: &ResilientClient,
    ) -> Result<HashMap<String, Arc<dyn MediaServer>>> {
        let mut servers = HashMap::new();

        for (name, server_config) in &config.servers {
            match self.create_and_connect(name, server_config, client.clone()).await {
                Ok(server) => {
                    servers.insert(name.clone(), server);
                }
                Err(e) => {
                    error!(server = %name, error = %e, "Failed to connect to {}", name);
                }
            }
        }

        if servers.is_empty() {
            return Err(anyhow::anyhow!("No media server could be reached"));
        }
        info!("Connected to {} media server(s)", servers.len());
        Ok(servers)
    }

    async fn create_and_connect(
        &self,
        name: &str,
        config: &ServerConfig,
        client: ResilientClient,
    ) -> Result<Arc<dyn MediaServer>> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| anyhow::anyhow!("Unsupported media server type: {}", config.kind))?;
        factory.validate_config(name, config)?;
        let server = factory.create_server(name, config, client).await?;
        server.connect().await?;
        Ok(server)
    }
}

impl Default for ServerFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Trakt client when a client id is configured and an access token is stored.
pub fn create_remote_history(
    config: &Config,
    credentials: &CredentialStore,
    client: &ResilientClient,
) -> Option<Arc<dyn RemoteHistory>> {
    let trakt = config.trakt.as_ref().filter(|_| config.is_trakt_configured())?;
    let Some(token) = credentials.get_trakt_access_token() else {
        warn!("Trakt is configured but no access token is stored. Run 'playsync config trakt' first");
        return None;
    };
    if credentials.is_trakt_token_expired() {
        warn!("Stored Trakt access token has expired; scrobbles to Trakt will likely fail");
    }
    Some(Arc::new(TraktClient::new(client.clone(), &trakt.client_id, token)))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

struct PlexFactory;

#[async_trait]
impl ServerFactory for PlexFactory {
    fn kind(&self) -> ServerKind {
        ServerKind::Plex
    }

    async fn create_server(
        &self,
        name: &str,
        config: &ServerConfig,
        client: ResilientClient,
    ) -> Result<Arc<dyn MediaServer>> {
        let token = non_empty(&config.token)
            .ok_or_else(|| anyhow::anyhow!("Plex server '{}' requires a token", name))?;
        let server = PlexServer::new(name, client, &config.url, token).with_username(config.username.clone());
        Ok(Arc::new(server))
    }

    fn validate_config(&self, name: &str, config: &ServerConfig) -> Result<()> {
        if config.url.is_empty() || non_empty(&config.token).is_none() {
            return Err(anyhow::anyhow!("Missing required Plex configuration for '{}'", name));
        }
        Ok(())
    }
}

struct EmbyFactory(Flavor);

#[async_trait]
impl ServerFactory for EmbyFactory {
    fn kind(&self) -> ServerKind {
        self.0.server_kind()
    }

    async fn create_server(
        &self,
        name: &str,
        config: &ServerConfig,
        client: ResilientClient,
    ) -> Result<Arc<dyn MediaServer>> {
        let server = match (non_empty(&config.token), non_empty(&config.username), non_empty(&config.password)) {
            (Some(token), _, _) => EmbyServer::with_token(name, self.0, client, &config.url, token)
                .with_username(config.username.clone()),
            (None, Some(username), Some(password)) => {
                EmbyServer::login(name, self.0, client, &config.url, username, password).await?
            }
            _ => return Err(anyhow::anyhow!("Missing authentication information for '{}'", name)),
        };
        Ok(Arc::new(server))
    }

    fn validate_config(&self, name: &str, config: &ServerConfig) -> Result<()> {
        if config.url.is_empty() {
            return Err(anyhow::anyhow!("Missing required URL for '{}'", name));
        }
        let has_login = non_empty(&config.username).is_some() && non_empty(&config.password).is_some();
        if non_empty(&config.token).is_none() && !has_login {
            return Err(anyhow::anyhow!("Missing authentication information for '{}'", name));
        }
        Ok(())
    }
}
