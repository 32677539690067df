pub mod api;
pub mod client;

pub use api::{LibraryInfo, PlexHttpClient};
pub use client::PlexServer;
