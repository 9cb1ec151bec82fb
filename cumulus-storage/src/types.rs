//! Common types for object metadata and directory-like listings.
//!

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::gzip;

/// Metadata for a stored object, populated from a metadata fetch when a handle is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
  size: u64,
  modified: Option<DateTime<Utc>>,
  content_type: Option<String>,
  content_encoding: Option<String>,
}

impl ObjectMetadata {
  /// Create new metadata.
  pub fn new(
    size: u64,
    modified: Option<DateTime<Utc>>,
    content_type: Option<String>,
    content_encoding: Option<String>,
  ) -> Self {
    Self {
      size,
      modified,
      content_type,
      content_encoding,
    }
  }

  /// Get the stored size in bytes. For gzip-encoded objects this is the wire size, not
  /// the logical size.
  pub fn size(&self) -> u64 {
    self.size
  }

  /// Get the modified time.
  pub fn modified(&self) -> Option<DateTime<Utc>> {
    self.modified
  }

  /// Get the content type.
  pub fn content_type(&self) -> Option<&str> {
    self.content_type.as_deref()
  }

  /// Get the content encoding.
  pub fn content_encoding(&self) -> Option<&str> {
    self.content_encoding.as_deref()
  }

  /// Whether the object is stored gzip-encoded.
  pub fn is_gzip(&self) -> bool {
    self.content_encoding() == Some(gzip::CONTENT_ENCODING)
  }
}

/// Partition keys under a directory-like prefix into immediate child directories and
/// immediate child files. Both lists are deduplicated and sorted.
pub fn partition_listing<I, S>(prefix: &str, keys: I) -> (Vec<String>, Vec<String>)
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut prefix = prefix.trim_start_matches('/').to_string();
  if !prefix.is_empty() && !prefix.ends_with('/') {
    prefix.push('/');
  }

  let mut dirs = BTreeSet::new();
  let mut files = BTreeSet::new();

  for key in keys {
    let key = key.as_ref().trim_start_matches('/');
    let Some(rest) = key.strip_prefix(&prefix) else {
      continue;
    };

    if rest.is_empty() {
      continue;
    }

    match rest.split_once('/') {
      Some((dir, _)) => {
        dirs.insert(dir.to_string());
      }
      None => {
        files.insert(rest.to_string());
      }
    }
  }

  (dirs.into_iter().collect(), files.into_iter().collect())
}

/// Infer a content type from the key's extension, used when uploading.
pub fn content_type_for(key: &str) -> &'static str {
  let extension = key.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

  match extension.to_ascii_lowercase().as_str() {
    "css" => "text/css",
    "js" => "application/javascript",
    "json" => "application/json",
    "html" | "htm" => "text/html",
    "txt" => "text/plain",
    "xml" => "application/xml",
    "svg" => "image/svg+xml",
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "ico" => "image/x-icon",
    "pdf" => "application/pdf",
    "zip" => "application/zip",
    "gz" => "application/gzip",
    "woff" => "font/woff",
    "woff2" => "font/woff2",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_keys() -> Vec<&'static str> {
    vec![
      "testsdir/file3.txt",
      "testsdir/file4.txt",
      "testsdir/sub/file5.txt",
    ]
  }

  #[test]
  fn listing_immediate_children() {
    let (dirs, files) = partition_listing("testsdir", test_keys());
    assert_eq!(dirs, vec!["sub"]);
    assert_eq!(files, vec!["file3.txt", "file4.txt"]);
  }

  #[test]
  fn listing_with_leading_slash() {
    let (dirs, files) = partition_listing("/testsdir", test_keys());
    assert_eq!(dirs, vec!["sub"]);
    assert_eq!(files, vec!["file3.txt", "file4.txt"]);
  }

  #[test]
  fn listing_with_trailing_slash() {
    let (dirs, files) = partition_listing("testsdir/", test_keys());
    assert_eq!(dirs, vec!["sub"]);
    assert_eq!(files, vec!["file3.txt", "file4.txt"]);
  }

  #[test]
  fn listing_subdirectory() {
    let (dirs, files) = partition_listing("testsdir/sub", test_keys());
    assert!(dirs.is_empty());
    assert_eq!(files, vec!["file5.txt"]);
  }

  #[test]
  fn listing_deduplicates_directories() {
    let (dirs, files) = partition_listing(
      "",
      vec!["sub/file1.txt", "sub/file2.txt", "sub/nested/file3.txt"],
    );
    assert_eq!(dirs, vec!["sub"]);
    assert!(files.is_empty());
  }

  #[test]
  fn listing_empty_prefix() {
    let (dirs, files) = partition_listing("", test_keys());
    assert_eq!(dirs, vec!["testsdir"]);
    assert!(files.is_empty());
  }

  #[test]
  fn listing_unrelated_keys_are_skipped() {
    let (dirs, files) = partition_listing("other", test_keys());
    assert!(dirs.is_empty());
    assert!(files.is_empty());
  }

  #[test]
  fn content_type_from_extension() {
    assert_eq!(content_type_for("media/style.css"), "text/css");
    assert_eq!(content_type_for("media/app.JS"), "application/javascript");
    assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
    assert_eq!(content_type_for("no-extension"), "application/octet-stream");
  }

  #[test]
  fn metadata_gzip_detection() {
    let metadata = ObjectMetadata::new(10, None, None, Some("gzip".to_string()));
    assert!(metadata.is_gzip());

    let metadata = ObjectMetadata::new(10, None, None, None);
    assert!(!metadata.is_gzip());
  }
}
