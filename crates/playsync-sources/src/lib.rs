pub mod emby;
pub mod error;
pub mod factory;
pub mod plex;
pub mod request;
pub mod trakt;
pub mod traits;

pub use error::{ProviderError, RemoteError, RequestError};
pub use factory::{create_remote_history, ServerFactory, ServerFactoryRegistry};
pub use request::{HttpRequest, HttpResponse, HttpTransport, RateLimiter, ReqwestTransport, ResilientClient};
pub use traits::{MediaServer, RemoteHistory};
