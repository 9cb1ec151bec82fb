//! Module providing the abstractions needed to read and write files on an object store
//! fronted by a distribution that may require signed URLs.
//!

pub use cumulus_config::rewrite::{UrlMap, UrlResolver, UrlRule};

pub mod error;
pub mod file;
pub mod gzip;
pub mod signed_url;
pub mod signer;
pub mod store;
pub mod types;

pub use error::{Result, StorageError};
pub use file::{RemoteFile, RemoteFileWriter};
pub use signed_url::{Expiry, SignedUrlBuilder, SignedUrlOptions};
pub use signer::{AccessPolicy, KeyPair, PolicyForm};
pub use store::ObjectStore;
pub use types::ObjectMetadata;
