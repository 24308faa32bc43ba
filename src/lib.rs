// Library surface consumed by the host application and the CLI.
pub mod achievements;
pub mod app_dirs;
pub mod celebration;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod export;
pub mod logging;
pub mod persistence;
pub mod progress;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod streak;
pub mod util;

pub use error::{Error, Result};
pub use session::Session;
