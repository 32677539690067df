use playsync_models::{MediaKind, MediaSession};
use serde::Serialize;
use std::collections::BTreeMap;

/// Body of `POST /scrobble/{action}`.
#[derive(Debug, Serialize)]
pub struct ScrobbleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<Movie>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<Show>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<Episode>,
    pub progress: f64,
    pub app_version: String,
}

#[derive(Debug, Serialize)]
pub struct Movie {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    pub ids: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct Show {
    pub title: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ids: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct Episode {
    pub title: String,
    pub season: u32,
    pub number: u32,
}

impl ScrobbleRequest {
    pub fn from_session(session: &MediaSession, app_version: &str) -> Self {
        let mut request = Self {
            movie: None,
            show: None,
            episode: None,
            progress: session.progress,
            app_version: app_version.to_string(),
        };

        match session.kind {
            MediaKind::Movie => {
                let mut ids = BTreeMap::new();
                if let Some(imdb) = &session.ids.imdb_id {
                    ids.insert("imdb".to_string(), imdb.clone());
                }
                request.movie = Some(Movie {
                    title: session.title.clone(),
                    year: session.year,
                    ids,
                });
            }
            MediaKind::Episode => {
                let mut ids = BTreeMap::new();
                if let Some(tvdb) = &session.ids.tvdb_id {
                    ids.insert("tvdb".to_string(), tvdb.clone());
                }
                request.show = Some(Show {
                    title: session.show_title().to_string(),
                    ids,
                });
                request.episode = Some(Episode {
                    title: session.episode_title().to_string(),
                    season: session.season(),
                    number: session.episode_number(),
                });
            }
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playsync_models::ExternalIds;
    use serde_json::json;

    #[test]
    fn test_movie_payload() {
        let session = MediaSession::movie("1", "Heat", Some(1995))
            .with_ids(ExternalIds::new().with_imdb("tt0113277"))
            .with_position(450, 1000);
        let payload = serde_json::to_value(ScrobbleRequest::from_session(&session, "playsync/0.1.0")).unwrap();
        assert_eq!(
            payload,
            json!({
                "movie": {"title": "Heat", "year": 1995, "ids": {"imdb": "tt0113277"}},
                "progress": 45.0,
                "app_version": "playsync/0.1.0"
            })
        );
    }

    #[test]
    fn test_episode_payload() {
        let session = MediaSession::episode("2", "Dark", "Secrets", 1, 1).with_ids(ExternalIds::new().with_tvdb("334824"));
        let payload = serde_json::to_value(ScrobbleRequest::from_session(&session, "v")).unwrap();
        assert_eq!(
            payload,
            json!({
                "show": {"title": "Dark", "ids": {"tvdb": "334824"}},
                "episode": {"title": "Secrets", "season": 1, "number": 1},
                "progress": 0.0,
                "app_version": "v"
            })
        );
    }

    #[test]
    fn test_movie_without_ids_keeps_empty_map() {
        let session = MediaSession::movie("1", "Heat", None);
        let payload = serde_json::to_value(ScrobbleRequest::from_session(&session, "v")).unwrap();
        assert_eq!(payload["movie"], json!({"title": "Heat", "ids": {}}));
    }
}
