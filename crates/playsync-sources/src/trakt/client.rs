use crate::error::RemoteError;
use crate::request::{HttpRequest, ResilientClient};
use crate::trakt::api::ScrobbleRequest;
use crate::traits::RemoteHistory;
use async_trait::async_trait;
use playsync_models::{MediaSession, ScrobbleAction};
use tracing::{debug, instrument};

pub const TRAKT_API_URL: &str = "https://api.trakt.tv";

/// Scrobbles playback to Trakt with a user access token.
#[derive(Clone)]
pub struct TraktClient {
    client: ResilientClient,
    base_url: String,
    app_version: String,
}

impl TraktClient {
    pub fn new(client: ResilientClient, client_id: &str, access_token: &str) -> Self {
        let client = client.with_headers([
            ("Content-Type", "application/json".to_string()),
            ("trakt-api-version", "2".to_string()),
            ("trakt-api-key", client_id.to_string()),
            ("Authorization", format!("Bearer {}", access_token)),
        ]);
        Self {
            client,
            base_url: TRAKT_API_URL.to_string(),
            app_version: format!("playsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl RemoteHistory for TraktClient {
    fn name(&self) -> &str {
        "trakt"
    }

    #[instrument(skip(self, session), fields(title = %session.display_title(), action = %action))]
    async fn scrobble(&self, session: &MediaSession, action: ScrobbleAction) -> Result<(), RemoteError> {
        let payload = ScrobbleRequest::from_session(session, &self.app_version);
        let request = HttpRequest::post(format!("{}/scrobble/{}", self.base_url, action))
            .json(&payload)
            .map_err(|e| RemoteError::Encode(e.to_string()))?;

        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(RemoteError::Status {
                status: response.status,
                body: response.text(),
            });
        }

        debug!(progress = session.progress, "Scrobbled to Trakt");
        Ok(())
    }
}
