use crate::output::{Output, OutputFormat};
use crate::ConfigCommands;
use chrono::{Duration, Utc};
use color_eyre::Result;
use playsync_config::{Config, CredentialStore, PathManager};
use serde_json::json;

pub fn run_config(cmd: ConfigCommands, paths: &PathManager, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(paths, output),
        ConfigCommands::Trakt {
            access_token,
            refresh_token,
            expires_in,
        } => configure_trakt(paths, access_token, refresh_token, expires_in, output),
    }
}

fn load_credentials(paths: &PathManager) -> Result<CredentialStore> {
    let credentials_file = paths.credentials_file();
    let mut store = CredentialStore::new(credentials_file.clone());
    store.load().map_err(|e| {
        color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e)
    })?;
    Ok(store)
}

fn show_config(paths: &PathManager, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        output.warn(format!("Configuration file not found at: {}", config_file.display()));
        output.info("A default configuration is created the first time you run 'playsync run' or 'playsync check'.");
        return Ok(());
    }

    let config = Config::load_from_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?
        .masked();
    let credentials = load_credentials(paths)?;
    let trakt_token = credentials.get_trakt_access_token().is_some();

    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(());
            }
            println!("# {}", config_file.display());
            println!("{}", toml::to_string_pretty(&config)?);
            let status = match (trakt_token, credentials.is_trakt_token_expired()) {
                (false, _) => "not stored",
                (true, true) => "expired",
                (true, false) => "stored",
            };
            println!("# Trakt access token: {}", status);
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&json!({
                "config_file": config_file.display().to_string(),
                "config": config,
                "trakt_token_stored": trakt_token,
                "trakt_token_expires": credentials.get_trakt_token_expires(),
            }));
        }
    }
    Ok(())
}

fn configure_trakt(
    paths: &PathManager,
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    output: &Output,
) -> Result<()> {
    if access_token.trim().is_empty() {
        return Err(color_eyre::eyre::eyre!("Access token cannot be empty"));
    }

    let mut credentials = load_credentials(paths)?;
    credentials.clear_trakt();
    credentials.set_trakt_access_token(access_token.trim().to_string());
    if let Some(refresh_token) = refresh_token {
        credentials.set_trakt_refresh_token(refresh_token);
    }
    if let Some(seconds) = expires_in {
        let expires = Duration::try_seconds(seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| color_eyre::eyre::eyre!("--expires-in is out of range"))?;
        credentials.set_trakt_token_expires(expires);
    }
    credentials
        .save()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials: {}", e))?;

    let config = Config::load_or_create(&paths.config_file())
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config: {}", e))?;
    if !config.is_trakt_configured() {
        output.warn("Token stored, but [trakt] client_id is not set in the config file");
    }
    output.success(format!("Trakt credentials saved to {}", paths.credentials_file().display()));
    Ok(())
}
