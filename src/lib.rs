//! RonyBase library root.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use cli::Commands;
pub use config::{load_config, StoreConfig};
pub use db::{AsyncStore, Store};
pub use error::{Error, Result};
