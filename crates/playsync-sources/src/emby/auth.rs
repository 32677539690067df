use crate::emby::Flavor;
use crate::error::ProviderError;
use crate::request::{HttpRequest, ResilientClient};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Client name announced to the server; sessions carrying it are our own.
pub const CLIENT_NAME: &str = "Playsync";

#[derive(Debug, Serialize)]
struct AuthenticateByName<'a> {
    #[serde(rename = "Username")]
    username: &'a str,
    #[serde(rename = "Pw")]
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "AccessToken")]
    access_token: String,
}

/// Stable device id derived from the username (64-bit FNV-1a, hex).
pub fn device_id(username: &str) -> String {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = username
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
    format!("{:x}", hash)
}

fn client_authorization(flavor: Flavor, username: &str) -> String {
    format!(
        "{} Client=\"{}\", Device=\"{}\", Version=\"{}\", DeviceId=\"{}\"",
        flavor.auth_scheme(),
        CLIENT_NAME,
        CLIENT_NAME,
        env!("CARGO_PKG_VERSION"),
        device_id(username)
    )
}

/// Exchange a username and password for an access token.
pub async fn authenticate(
    client: &ResilientClient,
    server_url: &str,
    flavor: Flavor,
    username: &str,
    password: &str,
) -> Result<String, ProviderError> {
    let request = HttpRequest::post(format!("{}/Users/AuthenticateByName", server_url))
        .header("Authorization", client_authorization(flavor, username))
        .json(&AuthenticateByName { username, password })?;

    let response = client.execute(request).await?;
    if !response.is_success() {
        return Err(ProviderError::Auth(format!(
            "{} returned status {}",
            flavor.label(),
            response.status
        )));
    }

    let result: AuthenticationResult = response
        .json()
        .map_err(|e| ProviderError::decode(flavor.label(), e))?;
    info!("Authenticated to {} as {}", flavor.label(), username);
    Ok(result.access_token)
}
