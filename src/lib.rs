pub mod config;
pub mod error;
pub mod db;
pub mod cache;
pub mod model;
pub mod fields;
pub mod store;
pub mod discovery;
pub mod import;

pub use config::Config;
pub use error::{RelmapError, Result};
pub use discovery::{discover, discover_concurrent, DiscoveryOptions, DiscoveryReport, DiscoveryResult};
