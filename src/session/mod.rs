//! Session lifecycle: the observable session value and the operations that
//! establish or end it.

pub mod context;
pub mod controller;

pub use context::{Session, SessionContext, SessionState};
pub use controller::SessionController;
