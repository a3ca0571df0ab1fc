//! Configuration: the versioned file format, its loader, and the store and
//! logging sections.

pub mod config;
pub mod logging;
pub mod store;

pub use config::*;
pub use logging::*;
pub use store::*;
