//! Scanner Module
//!
//! Lazy, paginated prefix scans.
//!
//! ## Responsibilities
//! - Fetch entries from the store in batches, in key order or reverse
//! - Bound the total number of entries per scan (`limit`)
//! - Hand out cursors so a later scan can resume after the last entry consumed
//!
//! ## Cursor Format
//! ```text
//! base64url( bincode { scope: u32, position: bytes } )
//! ```
//! `scope` is a CRC32 of the prefix and direction; `position` is the last
//! consumed key with the prefix stripped. A cursor presented to a scan with
//! a different prefix or direction is rejected.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bytes::{BufMut, BytesMut};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{KvError, Result};
use crate::key::{decode, NativeKey};
use crate::store::{ListRequest, NativeEntry, Store};

// =============================================================================
// Cursor
// =============================================================================

/// Opaque continuation token for a scan
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cursor(Vec<u8>);

#[derive(Serialize, Deserialize)]
struct CursorToken {
    scope: u32,
    position: Vec<u8>,
}

fn scope_of(prefix: &[u8], reverse: bool) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(prefix);
    hasher.update(&[reverse as u8]);
    hasher.finalize()
}

impl Cursor {
    /// Cursor positioned at `last_key`, for the scan over (`prefix`, `reverse`)
    fn new(prefix: &[u8], reverse: bool, last_key: &[u8]) -> Result<Self> {
        let position = last_key.strip_prefix(prefix).ok_or_else(|| {
            KvError::Store("scan returned a key outside its prefix".to_string())
        })?;
        let token = CursorToken {
            scope: scope_of(prefix, reverse),
            position: position.to_vec(),
        };
        Ok(Self(bincode::serialize(&token)?))
    }

    /// Recover the native key this cursor resumes after
    fn resolve(&self, prefix: &[u8], reverse: bool) -> Result<NativeKey> {
        let token: CursorToken = bincode::deserialize(&self.0)
            .map_err(|e| KvError::InvalidCursor(format!("malformed cursor: {}", e)))?;

        if token.scope != scope_of(prefix, reverse) {
            return Err(KvError::InvalidCursor(
                "cursor belongs to a different prefix or direction".to_string(),
            ));
        }
        if token.position.is_empty() {
            return Err(KvError::InvalidCursor("cursor has no position".to_string()));
        }

        let mut key = BytesMut::with_capacity(prefix.len() + token.position.len());
        key.put_slice(prefix);
        key.put_slice(&token.position);
        Ok(key.freeze())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cursor({})", self)
    }
}

impl FromStr for Cursor {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        URL_SAFE_NO_PAD
            .decode(s)
            .map(Self)
            .map_err(|e| KvError::InvalidCursor(format!("not base64url: {}", e)))
    }
}

// =============================================================================
// Options
// =============================================================================

/// Options for [`Kv::list`](crate::Kv::list)
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Descending key order
    pub reverse: bool,
    /// Max entries the scan returns in total
    pub limit: Option<usize>,
    /// Resume after the position this cursor encodes
    pub cursor: Option<Cursor>,
    /// Entries per store round-trip; `None` uses the configured default
    pub batch_size: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }
}

/// A drained scan
#[derive(Debug, Clone)]
pub struct Page {
    pub entries: Vec<Entry>,
    /// `Some` when the limit was reached and more entries may follow;
    /// `None` when the scan is exhausted
    pub cursor: Option<Cursor>,
}

// =============================================================================
// Scanner
// =============================================================================

/// Lazy ordered iteration over the entries under a prefix
pub struct Scanner {
    store: Arc<dyn Store>,
    prefix: NativeKey,
    reverse: bool,
    batch_size: usize,
    /// Entries still allowed by the limit (`None` = unbounded)
    remaining: Option<usize>,
    /// Where the next store batch resumes
    fetch_after: Option<NativeKey>,
    /// Last key handed to the caller
    consumed: Option<NativeKey>,
    start_cursor: Option<Cursor>,
    buffer: VecDeque<NativeEntry>,
    exhausted: bool,
}

impl Scanner {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        prefix: NativeKey,
        options: ListOptions,
        default_batch_size: usize,
    ) -> Result<Self> {
        let batch_size = options.batch_size.unwrap_or(default_batch_size);
        if batch_size == 0 {
            return Err(KvError::Config("list batch size must be greater than zero".to_string()));
        }
        if options.limit == Some(0) {
            return Err(KvError::Config("list limit must be greater than zero".to_string()));
        }

        let fetch_after = options
            .cursor
            .as_ref()
            .map(|c| c.resolve(&prefix, options.reverse))
            .transpose()?;

        Ok(Self {
            store,
            prefix,
            reverse: options.reverse,
            batch_size,
            remaining: options.limit,
            fetch_after,
            consumed: None,
            start_cursor: options.cursor,
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Next entry in scan order, or `None` once the scan or its limit is done
    pub async fn next(&mut self) -> Result<Option<Entry>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }

        if self.buffer.is_empty() && !self.exhausted {
            self.fetch().await?;
        }

        // An undecodable key stays at the front, so the scan never skips it
        let key = match self.buffer.front() {
            Some(native) => decode(&native.key)?,
            None => return Ok(None),
        };
        let native = match self.buffer.pop_front() {
            Some(native) => native,
            None => return Ok(None),
        };

        let entry = Entry {
            key,
            value: native.value,
            versionstamp: native.versionstamp,
        };

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.consumed = Some(native.key);

        Ok(Some(entry))
    }

    /// Cursor positioned after the last entry consumed.
    ///
    /// Before anything is consumed this is the cursor the scan started from.
    pub fn cursor(&self) -> Result<Option<Cursor>> {
        match &self.consumed {
            Some(key) => Cursor::new(&self.prefix, self.reverse, key).map(Some),
            None => Ok(self.start_cursor.clone()),
        }
    }

    /// Whether the limit has been reached
    pub fn limit_reached(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Drain the scan into a page
    pub async fn page(mut self) -> Result<Page> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next().await? {
            entries.push(entry);
        }

        let cursor = if self.limit_reached() {
            self.cursor()?
        } else {
            None
        };

        Ok(Page { entries, cursor })
    }

    /// Drain the scan, discarding the cursor
    pub async fn collect(self) -> Result<Vec<Entry>> {
        Ok(self.page().await?.entries)
    }

    /// Adapt the scan into a stream of entries
    pub fn into_stream(self) -> impl Stream<Item = Result<Entry>> + Send {
        stream::try_unfold(self, |mut scanner| async move {
            let next = scanner.next().await?;
            Ok::<_, KvError>(next.map(|entry| (entry, scanner)))
        })
    }

    async fn fetch(&mut self) -> Result<()> {
        let limit = match self.remaining {
            Some(remaining) => remaining.min(self.batch_size),
            None => self.batch_size,
        };

        let request = ListRequest {
            prefix: self.prefix.clone(),
            start_after: self.fetch_after.clone(),
            reverse: self.reverse,
            limit,
        };

        let batch = self.store.list(request).await?;
        tracing::trace!("Fetched scan batch of {} (requested {})", batch.len(), limit);

        if batch.len() < limit {
            self.exhausted = true;
        }
        if let Some(last) = batch.last() {
            self.fetch_after = Some(last.key.clone());
        }
        self.buffer.extend(batch);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::entry::Versionstamp;
    use crate::store::{AtomicBatch, Commit};
    use crate::value::Value;

    /// Store whose every list batch is the same fixed entries
    struct FixedStore(Vec<NativeEntry>);

    #[async_trait]
    impl Store for FixedStore {
        async fn get(&self, _key: &NativeKey) -> Result<Option<NativeEntry>> {
            Ok(None)
        }

        async fn set(&self, _key: NativeKey, _value: Value, _expire_in: Option<Duration>) -> Result<Versionstamp> {
            Err(KvError::store("read-only"))
        }

        async fn delete(&self, _key: &NativeKey) -> Result<()> {
            Err(KvError::store("read-only"))
        }

        async fn list(&self, _request: ListRequest) -> Result<Vec<NativeEntry>> {
            Ok(self.0.clone())
        }

        async fn commit(&self, _batch: AtomicBatch) -> Result<Commit> {
            Err(KvError::store("read-only"))
        }
    }

    fn native_entry(key: &'static [u8], version: u64) -> NativeEntry {
        NativeEntry {
            key: Bytes::from_static(key),
            value: Value::Null,
            versionstamp: Versionstamp::from_commit_version(version),
        }
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_not_skipped() {
        let store = FixedStore(vec![native_entry(&[0x99], 1), native_entry(&[0x10], 2)]);
        let mut scanner = Scanner::new(Arc::new(store), Bytes::new(), ListOptions::new(), 10).unwrap();

        assert!(matches!(scanner.next().await, Err(KvError::Decode(_))));
        assert!(matches!(scanner.next().await, Err(KvError::Decode(_))));
        assert!(scanner.cursor().unwrap().is_none());
    }

    #[test]
    fn test_cursor_roundtrip_through_string() {
        let cursor = Cursor::new(b"pre", false, b"prefix-key").unwrap();
        let parsed: Cursor = cursor.to_string().parse().unwrap();

        assert_eq!(parsed, cursor);
        assert_eq!(parsed.resolve(b"pre", false).unwrap().as_ref(), b"prefix-key");
    }

    #[test]
    fn test_cursor_rejects_other_scope() {
        let cursor = Cursor::new(b"pre", false, b"prefix-key").unwrap();

        assert!(matches!(cursor.resolve(b"pre", true), Err(KvError::InvalidCursor(_))));
        assert!(matches!(cursor.resolve(b"other", false), Err(KvError::InvalidCursor(_))));
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(matches!("!!".parse::<Cursor>(), Err(KvError::InvalidCursor(_))));

        let garbage: Cursor = "AAAA".parse().unwrap();
        assert!(matches!(garbage.resolve(b"p", false), Err(KvError::InvalidCursor(_))));
    }
}
