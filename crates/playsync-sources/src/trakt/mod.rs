pub mod api;
pub mod client;

pub use client::{TraktClient, TRAKT_API_URL};
