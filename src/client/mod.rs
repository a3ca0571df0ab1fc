//! Outbound HTTP: the dispatcher every API call goes through, the request
//! and response types, and the refresh coordinator behind it.

pub mod dispatcher;
pub mod refresh;
pub mod request;
pub mod transport;

pub use dispatcher::ApiClient;
pub use refresh::RefreshCoordinator;
pub use request::{ApiRequest, ApiResponse, Attempt};
pub use transport::HttpTransport;
