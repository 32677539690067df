use playsync_models::{MediaSession, PlaybackState, ScrobbleAction};

/// Progress above which a stopped session counts as watched.
pub const COMPLETION_THRESHOLD: f64 = 90.0;

/// Map a session's playback state to the action forwarded to targets.
///
/// A stop past [`COMPLETION_THRESHOLD`] means the item was finished; an
/// earlier stop only pauses it. Unknown states are treated as playing.
pub fn derive_action(session: &MediaSession) -> ScrobbleAction {
    match session.state {
        PlaybackState::Playing => ScrobbleAction::Start,
        PlaybackState::Paused => ScrobbleAction::Pause,
        PlaybackState::Stopped if session.progress > COMPLETION_THRESHOLD => ScrobbleAction::Stop,
        PlaybackState::Stopped => ScrobbleAction::Pause,
        PlaybackState::Unknown => ScrobbleAction::Start,
    }
}

/// Round a finishing stop up to exactly 100%.
pub fn normalize_completion(session: &mut MediaSession, action: ScrobbleAction) {
    if action == ScrobbleAction::Stop && session.progress > COMPLETION_THRESHOLD {
        session.progress = 100.0;
    }
}

/// Session and action as they are handed to every target.
pub fn prepare_delivery(session: &MediaSession) -> (MediaSession, ScrobbleAction) {
    let action = derive_action(session);
    let mut session = session.clone();
    normalize_completion(&mut session, action);
    (session, action)
}
