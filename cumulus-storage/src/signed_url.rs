//! Building plain and signed distribution URLs.
//!

use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::instrument;

use cumulus_config::Config;
use cumulus_config::rewrite::{UrlMap, UrlResolver};

use crate::error::Result;
use crate::error::StorageError::Configuration;
use crate::signer::{AccessPolicy, KeyPair, PolicyForm, encode_query_safe};

/// Characters that must be percent-encoded in the path component. Spaces become `%20`,
/// never `+`, and non-ASCII is escaped as UTF-8 bytes. `%` is treated as safe so
/// already-escaped sequences pass through unchanged.
pub(crate) const PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'/')
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'~')
  .remove(b'%');

/// When a signed URL stops being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
  /// An absolute unix timestamp.
  At(i64),
  /// A duration in seconds, resolved to `now + duration` when the URL is built.
  In(u64),
}

impl Expiry {
  /// Resolve to an absolute unix timestamp. Duration-based expiries read the clock at
  /// each call, so repeated calls can legitimately differ.
  pub fn resolve(&self) -> i64 {
    match *self {
      Expiry::At(expires_at) => expires_at,
      Expiry::In(duration) => Utc::now().timestamp() + duration as i64,
    }
  }
}

/// Options for building a signed URL.
#[derive(Debug, Clone, Default)]
pub struct SignedUrlOptions {
  secure: bool,
  private: bool,
  not_before: Option<i64>,
  source_ip: Option<String>,
}

impl SignedUrlOptions {
  /// Force the https scheme.
  pub fn with_secure(mut self) -> Self {
    self.secure = true;
    self
  }

  /// Target the private distribution rule set.
  pub fn with_private(mut self) -> Self {
    self.private = true;
    self
  }

  /// Make the URL invalid before a unix timestamp. Forces the custom policy encoding.
  pub fn with_not_before(mut self, not_before: i64) -> Self {
    self.not_before = Some(not_before);
    self
  }

  /// Restrict the URL to a source IP or CIDR range. Forces the custom policy encoding.
  pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
    self.source_ip = Some(source_ip.into());
    self
  }

  /// Whether the https scheme is forced.
  pub fn secure(&self) -> bool {
    self.secure
  }

  /// Whether the private distribution is targeted.
  pub fn private(&self) -> bool {
    self.private
  }
}

/// Builds distribution URLs, composing the URL rewriter with the policy signer. Pure
/// once constructed, no I/O.
#[derive(Debug, Clone)]
pub struct SignedUrlBuilder {
  base_url: UrlMap,
  private_base_url: Option<UrlMap>,
  key_pair: Option<KeyPair>,
}

impl SignedUrlBuilder {
  /// Create a builder for a base url map.
  pub fn new(base_url: UrlMap) -> Self {
    Self {
      base_url,
      private_base_url: None,
      key_pair: None,
    }
  }

  /// Set the rule set used for the private distribution.
  pub fn with_private_base_url(mut self, private_base_url: UrlMap) -> Self {
    self.private_base_url = Some(private_base_url);
    self
  }

  /// Set the key pair used for signing.
  pub fn with_key_pair(mut self, key_pair: KeyPair) -> Self {
    self.key_pair = Some(key_pair);
    self
  }

  /// Create a builder from config, parsing the configured key pair if present.
  pub fn from_config(config: &Config) -> Result<Self> {
    let mut builder = Self::new(config.base_url().clone());

    if let Some(private_base_url) = config.private_base_url() {
      builder = builder.with_private_base_url(private_base_url.clone());
    }
    if let Some(key_pair) = config.key_pair() {
      builder = builder.with_key_pair(KeyPair::from_pem(
        key_pair.key_pair_id(),
        key_pair.private_key_pem(),
      )?);
    }

    Ok(builder)
  }

  /// Resolve a path to its plain distribution URL without signing. Any query string on
  /// the path is preserved.
  #[instrument(level = "trace", skip(self), ret)]
  pub fn url(&self, path: &str) -> String {
    self.resolve(path, &self.base_url)
  }

  /// Build a signed URL for a path. Fails with a configuration error if no key pair is
  /// set. Never performs I/O, so this is the only failure mode besides key parsing.
  #[instrument(level = "trace", skip(self))]
  pub fn signed_url(
    &self,
    path: &str,
    expiry: Expiry,
    options: &SignedUrlOptions,
  ) -> Result<String> {
    let key_pair = self.key_pair.as_ref().ok_or_else(|| {
      Configuration("no key pair configured for signed URL generation".to_string())
    })?;

    let map = if options.private {
      self.private_base_url.as_ref().unwrap_or(&self.base_url)
    } else {
      &self.base_url
    };

    let mut url = self.resolve(path, map);
    if options.secure && url.starts_with("http://") {
      url = url.replacen("http://", "https://", 1);
    }

    let expires_at = expiry.resolve();
    let mut policy = AccessPolicy::new(url.as_str(), expires_at);
    if let Some(not_before) = options.not_before {
      policy = policy.with_not_before(not_before);
    }
    if let Some(ref source_ip) = options.source_ip {
      policy = policy.with_source_ip(source_ip.as_str());
    }

    let signature = encode_query_safe(&policy.sign(key_pair));
    let separator = if url.contains('?') { '&' } else { '?' };
    let key_pair_id = key_pair.key_pair_id();

    Ok(match policy.form() {
      PolicyForm::Canned => format!(
        "{url}{separator}Expires={expires_at}&Signature={signature}&Key-Pair-Id={key_pair_id}"
      ),
      PolicyForm::Custom => {
        let encoded_policy = encode_query_safe(policy.to_document().as_bytes());
        format!(
          "{url}{separator}Policy={encoded_policy}&Signature={signature}&Key-Pair-Id={key_pair_id}"
        )
      }
    })
  }

  fn resolve(&self, path: &str, map: &UrlMap) -> String {
    let (path, query) = match path.split_once('?') {
      Some((path, query)) => (path, Some(query)),
      None => (path, None),
    };
    let path = path.trim_start_matches('/');

    let base = map.resolve(path).trim_end_matches('/');
    let escaped = utf8_percent_encode(path, PATH_SET);

    match query {
      Some(query) => format!("{base}/{escaped}?{query}"),
      None => format!("{base}/{escaped}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use regex::Regex;

  use cumulus_config::rewrite::UrlRule;

  use crate::signer::tests::test_key_pair;

  use super::*;

  fn test_builder() -> SignedUrlBuilder {
    SignedUrlBuilder::new(UrlMap::new("http://bucket.s3.amazonaws.com/"))
      .with_private_base_url(UrlMap::new("http://bucket.s3.amazonaws.com/").with_rule(
        UrlRule::new(
          Regex::new("^horizon.jpg").unwrap(),
          "http://d604721fxaaqy9.cloudfront.net",
        ),
      ))
      .with_key_pair(test_key_pair())
  }

  #[test]
  fn golden_private_distribution_url() {
    let result = test_builder()
      .signed_url(
        "horizon.jpg?large=yes&license=yes",
        Expiry::At(1258237200),
        &SignedUrlOptions::default().with_private(),
      )
      .unwrap();

    assert_eq!(
      result,
      "http://d604721fxaaqy9.cloudfront.net/horizon.jpg?large=yes&license=yes&Expires=1258237200&Signature=Nql641NHEUkUaXQHZINK1FZ~SYeUSoBJMxjdgqrzIdzV2gyEXPDNv0pYdWJkflDKJ3xIu7lbwRpSkG98NBlgPi4ZJpRRnVX4kXAJK6tdNx6FucDB7OVqzcxkxHsGFd8VCG1BkC-Afh9~lOCMIYHIaiOB6~5jt9w2EOwi6sIIqrg_&Key-Pair-Id=PK12345EXAMPLE"
    );
  }

  #[test]
  fn signed_url_is_deterministic_for_fixed_expiry() {
    let builder = test_builder();
    let options = SignedUrlOptions::default();
    assert_eq!(
      builder
        .signed_url("file.txt", Expiry::At(1258237200), &options)
        .unwrap(),
      builder
        .signed_url("file.txt", Expiry::At(1258237200), &options)
        .unwrap()
    );
  }

  #[test]
  fn spaces_are_escaped_as_percent_20() {
    let result = test_builder()
      .signed_url(
        "test private file with spaces.txt",
        Expiry::At(1258237200),
        &SignedUrlOptions::default(),
      )
      .unwrap();

    assert!(result.contains("test%20private%20file%20with%20spaces.txt"));
    assert!(!result.split('?').next().unwrap().contains('+'));
  }

  #[test]
  fn non_ascii_is_escaped_as_utf8() {
    let result = test_builder().url("test/fil\u{00E9}.txt");
    assert_eq!(result, "http://bucket.s3.amazonaws.com/test/fil%C3%A9.txt");
  }

  #[test]
  fn canned_query_parameter_order() {
    let result = test_builder()
      .signed_url("file.txt", Expiry::At(1258237200), &SignedUrlOptions::default())
      .unwrap();

    let expires = result.find("?Expires=").unwrap();
    let signature = result.find("&Signature=").unwrap();
    let key_pair_id = result.find("&Key-Pair-Id=").unwrap();
    assert!(expires < signature && signature < key_pair_id);
  }

  #[test]
  fn custom_form_uses_policy_parameter() {
    let result = test_builder()
      .signed_url(
        "file.txt",
        Expiry::At(1258237200),
        &SignedUrlOptions::default().with_source_ip("216.98.35.1/32"),
      )
      .unwrap();

    let policy = result.find("?Policy=").unwrap();
    let signature = result.find("&Signature=").unwrap();
    let key_pair_id = result.find("&Key-Pair-Id=").unwrap();
    assert!(policy < signature && signature < key_pair_id);
    assert!(!result.contains("Expires="));
  }

  #[test]
  fn existing_query_string_is_preserved() {
    let result = test_builder()
      .signed_url(
        "file.txt?version=2",
        Expiry::At(1258237200),
        &SignedUrlOptions::default(),
      )
      .unwrap();

    assert!(result.starts_with("http://bucket.s3.amazonaws.com/file.txt?version=2&Expires="));
  }

  #[test]
  fn secure_forces_https() {
    let result = test_builder()
      .signed_url(
        "file.txt",
        Expiry::At(1258237200),
        &SignedUrlOptions::default().with_secure(),
      )
      .unwrap();

    assert!(result.starts_with("https://bucket.s3.amazonaws.com/file.txt"));
  }

  #[test]
  fn past_expiry_is_signed_identically_to_future() {
    // Construction never checks expiry, so only the embedded timestamp differs.
    let builder = test_builder();
    let options = SignedUrlOptions::default();
    let past = builder
      .signed_url("file.txt", Expiry::At(0), &options)
      .unwrap();
    let future = builder
      .signed_url("file.txt", Expiry::At(4102444800), &options)
      .unwrap();

    assert!(past.contains("Expires=0"));
    assert!(future.contains("Expires=4102444800"));
  }

  #[test]
  fn duration_expiry_resolves_from_now() {
    let before = Utc::now().timestamp();
    let resolved = Expiry::In(300).resolve();
    assert!(resolved >= before + 300);
    assert!(resolved <= Utc::now().timestamp() + 300);
  }

  #[test]
  fn missing_key_pair_fails_with_configuration_error() {
    let builder = SignedUrlBuilder::new(UrlMap::new("http://bucket.s3.amazonaws.com/"));
    let result = builder.signed_url(
      "file.txt",
      Expiry::At(1258237200),
      &SignedUrlOptions::default(),
    );
    assert!(matches!(
      result,
      Err(crate::error::StorageError::Configuration(_))
    ));
  }

  #[test]
  fn private_falls_back_to_default_rules() {
    let builder = SignedUrlBuilder::new(UrlMap::new("http://bucket.s3.amazonaws.com/"))
      .with_key_pair(test_key_pair());
    let result = builder
      .signed_url(
        "file.txt",
        Expiry::At(1258237200),
        &SignedUrlOptions::default().with_private(),
      )
      .unwrap();
    assert!(result.starts_with("http://bucket.s3.amazonaws.com/file.txt"));
  }

  #[test]
  fn plain_url_preserves_already_escaped_paths() {
    let result = test_builder().url("test/fil%C3%A9.txt");
    assert_eq!(result, "http://bucket.s3.amazonaws.com/test/fil%C3%A9.txt");
  }

  #[test]
  fn plain_url_escapes_spaces() {
    let result = test_builder().url("test/file quote.txt");
    assert_eq!(result, "http://bucket.s3.amazonaws.com/test/file%20quote.txt");
  }
}
