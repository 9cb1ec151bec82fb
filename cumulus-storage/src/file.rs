//! File-like handles over remote objects.
//!
//! `RemoteFile` reads an object through a cursor, fetching only the byte ranges
//! that are asked for. Gzip-encoded objects are transparent to the caller, the
//! handle reports the logical uncompressed size and serves reads from the
//! decompressed body. `RemoteFileWriter` buffers writes locally and uploads the
//! whole object in a single request when closed.

use std::io::SeekFrom;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use futures::stream;
use tracing::{debug, instrument};

use crate::error::StorageError::{ClosedHandle, InvalidInput};
use crate::error::Result;
use crate::gzip::{self, GzipRules};
use crate::store::ObjectStore;
use crate::types::{ObjectMetadata, content_type_for};

/// A read handle over a remote object.
///
/// Opening a handle fetches the object metadata only. The body is fetched lazily,
/// range by range for plain objects, or in full for gzip-encoded objects so that
/// reads and sizes see the decompressed content.
#[derive(Debug)]
pub struct RemoteFile {
  store: ObjectStore,
  key: String,
  metadata: ObjectMetadata,
  position: u64,
  local: Option<Bytes>,
  closed: bool,
}

impl RemoteFile {
  /// Open a handle, failing with `KeyNotFound` if the object is absent. No body
  /// bytes are fetched.
  #[instrument(level = "trace", skip(store))]
  pub async fn open(store: ObjectStore, key: impl Into<String> + std::fmt::Debug) -> Result<Self> {
    let key = key.into();
    let metadata = store.head(&key).await?;

    Ok(Self {
      store,
      key,
      metadata,
      position: 0,
      local: None,
      closed: false,
    })
  }

  /// The key this handle reads from.
  pub fn key(&self) -> &str {
    &self.key
  }

  /// The object metadata fetched when the handle was opened.
  pub fn metadata(&self) -> &ObjectMetadata {
    &self.metadata
  }

  /// The last modification time of the object, if the store reported one.
  pub fn modified(&self) -> Option<DateTime<Utc>> {
    self.metadata.modified()
  }

  fn ensure_open(&self) -> Result<()> {
    if self.closed {
      Err(ClosedHandle(self.key.to_string()))
    } else {
      Ok(())
    }
  }

  /// Fetch and decompress the whole body, keeping it for later reads. Only used
  /// for gzip-encoded objects, whose ranges are not addressable remotely.
  async fn materialized(&mut self) -> Result<&Bytes> {
    if self.local.is_none() {
      let body = self.store.get(&self.key).await?;
      let body = Bytes::from(gzip::decompress(&body)?);
      debug!(
        key = self.key.as_str(),
        size = body.len(),
        "materialized gzip object"
      );
      self.local = Some(body);
    }

    Ok(self.local.get_or_insert_with(Bytes::new))
  }

  /// The logical size of the object. For gzip-encoded objects this is the
  /// uncompressed size, which requires fetching the body.
  pub async fn size(&mut self) -> Result<u64> {
    self.ensure_open()?;

    if self.metadata.is_gzip() {
      Ok(self.materialized().await?.len() as u64)
    } else {
      Ok(self.metadata.size())
    }
  }

  /// Read up to `n` bytes from the current position, or the rest of the object
  /// if `n` is `None`. Returns empty bytes at or past the end.
  #[instrument(level = "trace", skip(self))]
  pub async fn read(&mut self, n: Option<u64>) -> Result<Bytes> {
    self.ensure_open()?;

    let bytes = if self.metadata.is_gzip() {
      let position = self.position;
      let body = self.materialized().await?;
      let len = body.len() as u64;
      let start = position.min(len);
      let end = n.map_or(len, |n| position.saturating_add(n)).min(len);
      body.slice(start as usize..end as usize)
    } else {
      let len = self.metadata.size();
      let start = self.position.min(len);
      let end = n.map_or(len, |n| self.position.saturating_add(n)).min(len);
      if start == end {
        Bytes::new()
      } else {
        self.store.get_range(&self.key, start, Some(end)).await?
      }
    };

    self.position += bytes.len() as u64;
    Ok(bytes)
  }

  /// Move the read position. Seeking backwards is allowed and later reads fetch
  /// the ranges again. Seeking before the start of the object is an error.
  ///
  /// End-relative positions use the decompressed length once a gzip body has
  /// been fetched, and the stored size before that.
  pub fn seek(&mut self, position: SeekFrom) -> Result<u64> {
    self.ensure_open()?;

    let (base, offset) = match position {
      SeekFrom::Start(offset) => {
        self.position = offset;
        return Ok(self.position);
      }
      SeekFrom::Current(offset) => (self.position, offset),
      SeekFrom::End(offset) => {
        // The materialized body carries the logical size for gzip objects.
        let end = self
          .local
          .as_ref()
          .map_or(self.metadata.size(), |body| body.len() as u64);
        (end, offset)
      }
    };

    let position = base
      .checked_add_signed(offset)
      .ok_or_else(|| InvalidInput(format!("cannot seek to a negative position in `{}`", self.key)))?;
    self.position = position;

    Ok(self.position)
  }

  /// Consume the handle into a stream of chunks read from the current position.
  /// A zero-byte object yields no chunks.
  pub fn chunks(self, chunk_size: u64) -> impl Stream<Item = Result<Bytes>> {
    stream::try_unfold(self, move |mut file| async move {
      let chunk = file.read(Some(chunk_size)).await?;
      if chunk.is_empty() {
        Ok(None)
      } else {
        Ok(Some((chunk, file)))
      }
    })
  }

  /// Close the handle. Any later operation fails with `ClosedHandle`.
  pub fn close(&mut self) -> Result<()> {
    self.ensure_open()?;
    self.closed = true;
    self.local = None;

    Ok(())
  }
}

/// A write handle that buffers locally and uploads on close.
///
/// Nothing is sent to the store until `close`, which performs a single upload of
/// the buffered content. Closing a handle that was never written to uploads
/// nothing. The content type is inferred from the key's extension, and bodies
/// whose content type matches the configured gzip rules are compressed before
/// upload.
#[derive(Debug)]
pub struct RemoteFileWriter {
  store: ObjectStore,
  key: String,
  gzip: GzipRules,
  buffer: Vec<u8>,
  dirty: bool,
  closed: bool,
}

impl RemoteFileWriter {
  /// Create a write handle. No request is made until the handle is closed.
  pub fn create(store: ObjectStore, key: impl Into<String>, gzip: GzipRules) -> Self {
    Self {
      store,
      key: key.into(),
      gzip,
      buffer: vec![],
      dirty: false,
      closed: false,
    }
  }

  /// The key this handle writes to.
  pub fn key(&self) -> &str {
    &self.key
  }

  fn ensure_open(&self) -> Result<()> {
    if self.closed {
      Err(ClosedHandle(self.key.to_string()))
    } else {
      Ok(())
    }
  }

  /// Append bytes to the local buffer. Marks the handle dirty even for an empty
  /// write, so closing afterwards uploads a zero-byte object.
  pub fn write(&mut self, buf: &[u8]) -> Result<()> {
    self.ensure_open()?;

    self.buffer.extend_from_slice(buf);
    self.dirty = true;

    Ok(())
  }

  /// The logical size of the buffered content, before any compression.
  pub fn size(&self) -> u64 {
    self.buffer.len() as u64
  }

  /// Upload the buffered content and close the handle. A handle that was never
  /// written to closes without touching the store.
  #[instrument(level = "trace", skip(self))]
  pub async fn close(&mut self) -> Result<()> {
    self.ensure_open()?;
    self.closed = true;

    if !self.dirty {
      return Ok(());
    }

    let content_type = content_type_for(&self.key);
    let body = std::mem::take(&mut self.buffer);

    let (body, content_encoding) = if self.gzip.is_eligible(content_type) {
      (gzip::compress(&body)?, Some(gzip::CONTENT_ENCODING))
    } else {
      (body, None)
    };

    self
      .store
      .put(&self.key, Bytes::from(body), content_type, content_encoding)
      .await
  }
}
