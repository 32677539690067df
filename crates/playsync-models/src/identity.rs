use crate::session::{MediaKind, MediaSession};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which session fields make up the key that correlates snapshots across polls.
///
/// `ShowEpisode` keys on kind + show title + episode title. Both titles are
/// empty for movies, so every movie playing on a source shares one entry.
/// `Title` adds the item title and year, giving each movie its own entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    #[default]
    ShowEpisode,
    Title,
}

/// Composite key identifying the same logical item regardless of the
/// provider's session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    kind: MediaKind,
    show_title: String,
    episode_title: String,
    title: Option<String>,
    year: Option<u32>,
}

impl IdentityKey {
    pub fn for_session(session: &MediaSession, policy: IdentityPolicy) -> Self {
        let (title, year) = match policy {
            IdentityPolicy::ShowEpisode => (None, None),
            IdentityPolicy::Title => (Some(session.title.clone()), session.year),
        };
        Self {
            kind: session.kind,
            show_title: session.show_title().to_string(),
            episode_title: session.episode_title().to_string(),
            title,
            year,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.kind, self.show_title, self.episode_title)?;
        if let Some(title) = &self.title {
            write!(f, "-{}", title)?;
        }
        if let Some(year) = self.year {
            write!(f, "-{}", year)?;
        }
        Ok(())
    }
}
