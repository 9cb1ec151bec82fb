//! Regex based URL rewriting, which decides the base URL an object path is served from.
//!

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Resolves a relative object path to a base URL. The seam that URL consumers, such as
/// asset renderers, call for every path.
pub trait UrlResolver {
  /// Return the base URL that the path should be joined to.
  fn resolve(&self, path: &str) -> &str;
}

/// A single rewrite rule, matching paths using Regex.
#[derive(Serialize, Debug, Clone, Deserialize)]
pub struct UrlRule {
  #[serde(with = "serde_regex")]
  pattern: Regex,
  base_url: String,
}

impl UrlRule {
  /// Create a new url rule.
  pub fn new(pattern: Regex, base_url: impl Into<String>) -> Self {
    Self {
      pattern,
      base_url: base_url.into(),
    }
  }

  /// Get the pattern.
  pub fn pattern(&self) -> &Regex {
    &self.pattern
  }

  /// Get the base url.
  pub fn base_url(&self) -> &str {
    &self.base_url
  }
}

/// An ordered set of rewrite rules with a default base URL. Rules are scanned in
/// declaration order and the first matching pattern wins.
#[derive(Serialize, Debug, Clone, Deserialize)]
#[serde(from = "UrlMapForm")]
pub struct UrlMap {
  base_url: String,
  rules: Vec<UrlRule>,
}

/// Accepts either a plain base URL string, for callers that do not need rewriting, or
/// the full rule table form.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum UrlMapForm {
  Plain(String),
  Full {
    base_url: String,
    #[serde(default)]
    rules: Vec<UrlRule>,
  },
}

impl From<UrlMapForm> for UrlMap {
  fn from(form: UrlMapForm) -> Self {
    match form {
      UrlMapForm::Plain(base_url) => Self::new(base_url),
      UrlMapForm::Full { base_url, rules } => Self::new(base_url).with_rules(rules),
    }
  }
}

impl Default for UrlMap {
  fn default() -> Self {
    Self::new("")
  }
}

impl UrlMap {
  /// Create a map with no rules, acting as a plain default base URL.
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      rules: vec![],
    }
  }

  /// Set the rewrite rules.
  pub fn with_rules(mut self, rules: Vec<UrlRule>) -> Self {
    self.rules = rules;
    self
  }

  /// Add a single rewrite rule.
  pub fn with_rule(mut self, rule: UrlRule) -> Self {
    self.rules.push(rule);
    self
  }

  /// Get the default base url.
  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Get the rules.
  pub fn rules(&self) -> &[UrlRule] {
    &self.rules
  }
}

impl UrlResolver for UrlMap {
  #[instrument(level = "trace", skip(self), ret)]
  fn resolve(&self, path: &str) -> &str {
    self
      .rules
      .iter()
      .find(|rule| rule.pattern().is_match(path))
      .map(|rule| rule.base_url())
      .unwrap_or(&self.base_url)
  }
}
