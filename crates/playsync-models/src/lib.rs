pub mod action;
pub mod identity;
pub mod media_ids;
pub mod session;

pub use action::ScrobbleAction;
pub use identity::{IdentityKey, IdentityPolicy};
pub use media_ids::ExternalIds;
pub use session::{calculate_progress, EpisodeInfo, MediaKind, MediaSession, PlaybackState, User};
