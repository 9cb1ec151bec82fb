//! Configuration for cumulus, read from a config file or environment variables.
//!

pub mod config;
pub mod error;
pub mod rewrite;

pub use config::{Config, Credentials, KeyPairConfig, setup_tracing};
pub use error::{Error, Result};
pub use rewrite::{UrlMap, UrlResolver, UrlRule};
