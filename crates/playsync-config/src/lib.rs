pub mod config;
pub mod credentials;
pub mod duration;
pub mod paths;

pub use config::{Config, RequestConfig, ServerConfig, ServerKind, SyncGroupConfig, TraktConfig, DEFAULT_GROUP_INTERVAL, TRAKT_TARGET};
pub use credentials::CredentialStore;
pub use duration::{parse_duration, DurationError};
pub use paths::{container_base_path, PathManager};
