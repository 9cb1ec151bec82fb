//! Configuration structs and parsing for a file and environment variables.
//!

use std::fmt::Debug;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing::subscriber::set_global_default;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::error::Error::{ParseError, TracingError};
use crate::error::Result;
use crate::rewrite::UrlMap;

const ENVIRONMENT_VARIABLE_PREFIX: &str = "CUMULUS_";

fn default_timeout() -> u64 {
  30
}

/// Credentials used to authorize object store requests.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Credentials {
  access_key_id: String,
  secret_access_key: String,
}

impl Credentials {
  /// Create new credentials.
  pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
    Self {
      access_key_id: access_key_id.into(),
      secret_access_key: secret_access_key.into(),
    }
  }

  /// Get the access key id.
  pub fn access_key_id(&self) -> &str {
    &self.access_key_id
  }

  /// Get the secret access key.
  pub fn secret_access_key(&self) -> &str {
    &self.secret_access_key
  }
}

/// The named key pair recognised by the distribution's verifier. Holds raw PEM, which is
/// parsed when a signer is constructed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct KeyPairConfig {
  key_pair_id: String,
  private_key_pem: String,
}

impl KeyPairConfig {
  /// Create a new key pair config.
  pub fn new(key_pair_id: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
    Self {
      key_pair_id: key_pair_id.into(),
      private_key_pem: private_key_pem.into(),
    }
  }

  /// Get the key pair id.
  pub fn key_pair_id(&self) -> &str {
    &self.key_pair_id
  }

  /// Get the private key PEM.
  pub fn private_key_pem(&self) -> &str {
    &self.private_key_pem
  }
}

/// Configuration for cumulus. Read-only after initialization, which must happen before
/// any file handle or URL builder is constructed.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
  endpoint: String,
  credentials: Option<Credentials>,
  key_pair: Option<KeyPairConfig>,
  base_url: UrlMap,
  private_base_url: Option<UrlMap>,
  gzip_content_types: Vec<String>,
  timeout: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      endpoint: "".to_string(),
      credentials: None,
      key_pair: None,
      base_url: Default::default(),
      private_base_url: None,
      gzip_content_types: vec![],
      timeout: default_timeout(),
    }
  }
}

impl Config {
  /// Get the object store endpoint.
  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  /// Get the credentials.
  pub fn credentials(&self) -> Option<&Credentials> {
    self.credentials.as_ref()
  }

  /// Get the key pair config.
  pub fn key_pair(&self) -> Option<&KeyPairConfig> {
    self.key_pair.as_ref()
  }

  /// Get the base url map.
  pub fn base_url(&self) -> &UrlMap {
    &self.base_url
  }

  /// Get the base url map for the private distribution.
  pub fn private_base_url(&self) -> Option<&UrlMap> {
    self.private_base_url.as_ref()
  }

  /// Get the content types eligible for gzip on upload.
  pub fn gzip_content_types(&self) -> &[String] {
    &self.gzip_content_types
  }

  /// Get the request timeout in seconds.
  pub fn timeout(&self) -> u64 {
    self.timeout
  }

  /// Set the endpoint.
  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }

  /// Set the credentials.
  pub fn with_credentials(mut self, credentials: Credentials) -> Self {
    self.credentials = Some(credentials);
    self
  }

  /// Set the key pair.
  pub fn with_key_pair(mut self, key_pair: KeyPairConfig) -> Self {
    self.key_pair = Some(key_pair);
    self
  }

  /// Set the base url map.
  pub fn with_base_url(mut self, base_url: UrlMap) -> Self {
    self.base_url = base_url;
    self
  }

  /// Set the private distribution base url map.
  pub fn with_private_base_url(mut self, private_base_url: UrlMap) -> Self {
    self.private_base_url = Some(private_base_url);
    self
  }

  /// Set the gzip-eligible content types.
  pub fn with_gzip_content_types(mut self, content_types: Vec<String>) -> Self {
    self.gzip_content_types = content_types;
    self
  }

  /// Set the request timeout in seconds.
  pub fn with_timeout(mut self, timeout: u64) -> Self {
    self.timeout = timeout;
    self
  }

  /// Read the config from a TOML file, merged with environment variables.
  pub fn from_path(path: &Path) -> Result<Self> {
    Self::parse(Toml::file(path))
  }

  /// Read the config from a TOML string, merged with environment variables.
  pub fn from_toml(toml: &str) -> Result<Self> {
    Self::parse(Toml::string(toml))
  }

  fn parse<P: figment::Provider>(provider: P) -> Result<Self> {
    let config: Self = Figment::from(Serialized::defaults(Self::default()))
      .merge(provider)
      .merge(Env::prefixed(ENVIRONMENT_VARIABLE_PREFIX).map(|k| {
        // Nested values have to be mapped by exact name to resolve ambiguity
        // when deserializing.
        match k.as_str().to_lowercase().as_str() {
          "credentials_access_key_id" => "credentials.access_key_id".into(),
          "credentials_secret_access_key" => "credentials.secret_access_key".into(),
          "key_pair_id" => "key_pair.key_pair_id".into(),
          "key_pair_private_key_pem" => "key_pair.private_key_pem".into(),
          key => key.to_string().into(),
        }
      }))
      .extract()
      .map_err(|err| ParseError(format!("failed to parse config: {err}")))?;

    info!(config = ?config, "config created");

    Ok(config)
  }
}

/// Set up the global tracing subscriber, reading the filter from the environment.
pub fn setup_tracing() -> Result<()> {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let subscriber = Registry::default().with(env_filter).with(layer());

  set_global_default(subscriber).map_err(|err| TracingError(err.to_string()))
}
