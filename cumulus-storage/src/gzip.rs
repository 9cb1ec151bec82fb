//! Gzip transcoding for configured content types.
//!
//! Eligible uploads are compressed in full and tagged with a gzip content encoding.
//! Reads of gzip-encoded objects decompress transparently, but only after fetching the
//! whole object, since compressed ranges cannot be decompressed independently.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::Result;

/// The content encoding tag for gzip-encoded objects.
pub const CONTENT_ENCODING: &str = "gzip";

/// The configured list of content types that are compressed on upload.
#[derive(Debug, Clone, Default)]
pub struct GzipRules {
  content_types: Vec<String>,
}

impl GzipRules {
  /// Create new rules from a list of content types.
  pub fn new(content_types: Vec<String>) -> Self {
    Self { content_types }
  }

  /// Whether uploads with this content type should be compressed.
  pub fn is_eligible(&self, content_type: &str) -> bool {
    self
      .content_types
      .iter()
      .any(|eligible| eligible == content_type)
  }
}

impl From<&[String]> for GzipRules {
  fn from(content_types: &[String]) -> Self {
    Self::new(content_types.to_vec())
  }
}

/// Compress a full body for upload.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(data)?;
  Ok(encoder.finish()?)
}

/// Decompress a full fetched body.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
  let mut decoder = GzDecoder::new(data);
  let mut decompressed = Vec::new();
  decoder.read_to_end(&mut decompressed)?;
  Ok(decompressed)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip() {
    let content = "Lorem ipsum ".repeat(512);
    let compressed = compress(content.as_bytes()).unwrap();
    assert!(compressed.len() < content.len());

    let decompressed = decompress(&compressed).unwrap();
    assert_eq!(decompressed, content.as_bytes());
  }

  #[test]
  fn empty_round_trip() {
    let compressed = compress(b"").unwrap();
    let decompressed = decompress(&compressed).unwrap();
    assert!(decompressed.is_empty());
  }

  #[test]
  fn decompress_invalid_data() {
    let result = decompress(b"not gzip");
    assert!(result.is_err());
  }

  #[test]
  fn eligibility() {
    let rules = GzipRules::new(vec![
      "text/css".to_string(),
      "application/javascript".to_string(),
    ]);
    assert!(rules.is_eligible("text/css"));
    assert!(!rules.is_eligible("image/jpeg"));
    assert!(!GzipRules::default().is_eligible("text/css"));
  }
}
