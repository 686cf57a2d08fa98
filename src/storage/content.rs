//! Link content and the content-addressable index over it.
//!
//! Content is kept per link address. The index groups links by the `xxh64`
//! hash of their bytes; lookups compare the bytes themselves so colliding
//! hashes never produce false hits.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh64::xxh64;

use crate::types::ScAddr;

const CONTENT_SEED: u64 = 0x5C5C_0001;

fn content_hash(bytes: &[u8]) -> u64 {
    xxh64(bytes, CONTENT_SEED)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

#[derive(Default)]
struct Inner {
    contents: FxHashMap<ScAddr, Arc<[u8]>>,
    index: FxHashMap<u64, SmallVec<[ScAddr; 2]>>,
}

impl Inner {
    fn unindex(&mut self, addr: ScAddr, bytes: &[u8]) {
        let hash = content_hash(bytes);
        if let Some(bucket) = self.index.get_mut(&hash) {
            bucket.retain(|a| *a != addr);
            if bucket.is_empty() {
                self.index.remove(&hash);
            }
        }
    }
}

/// Content blobs of every link.
#[derive(Default)]
pub struct LinkContentStore {
    inner: RwLock<Inner>,
}

impl LinkContentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the content of `addr` and re-indexes it.
    pub fn set(&self, addr: ScAddr, bytes: &[u8]) {
        let mut inner = self.inner.write();
        if let Some(old) = inner.contents.remove(&addr) {
            inner.unindex(addr, &old);
        }
        inner
            .index
            .entry(content_hash(bytes))
            .or_default()
            .push(addr);
        inner.contents.insert(addr, Arc::from(bytes));
    }

    /// Content of `addr`, `None` if it was never set.
    pub fn get(&self, addr: ScAddr) -> Option<Arc<[u8]>> {
        self.inner.read().contents.get(&addr).cloned()
    }

    /// Drops the content of `addr`; returns whether there was any.
    pub fn remove(&self, addr: ScAddr) -> bool {
        let mut inner = self.inner.write();
        match inner.contents.remove(&addr) {
            Some(old) => {
                inner.unindex(addr, &old);
                true
            }
            None => false,
        }
    }

    /// Links holding exactly `bytes`, in address order.
    pub fn find_by_content(&self, bytes: &[u8]) -> Vec<ScAddr> {
        let inner = self.inner.read();
        let mut found: Vec<ScAddr> = inner
            .index
            .get(&content_hash(bytes))
            .map(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .filter(|addr| {
                        inner
                            .contents
                            .get(addr)
                            .is_some_and(|content| content.as_ref() == bytes)
                    })
                    .collect()
            })
            .unwrap_or_default();
        found.sort_unstable();
        found
    }

    /// Links whose content contains `needle`, in address order.
    pub fn find_by_substring(&self, needle: &[u8]) -> Vec<ScAddr> {
        let inner = self.inner.read();
        let mut found: Vec<ScAddr> = inner
            .contents
            .iter()
            .filter(|(_, content)| contains(content, needle))
            .map(|(addr, _)| *addr)
            .collect();
        found.sort_unstable();
        found
    }

    /// Distinct contents containing `needle`, sorted.
    pub fn find_contents_by_substring(&self, needle: &[u8]) -> Vec<Vec<u8>> {
        let inner = self.inner.read();
        let mut found: Vec<Vec<u8>> = inner
            .contents
            .values()
            .filter(|content| contains(content, needle))
            .map(|content| content.to_vec())
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Number of links with content.
    pub fn len(&self) -> usize {
        self.inner.read().contents.len()
    }

    /// True when no link has content.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `(addr, content)` pair in address order.
    pub(crate) fn entries(&self) -> Vec<(ScAddr, Arc<[u8]>)> {
        let inner = self.inner.read();
        let mut entries: Vec<_> = inner
            .contents
            .iter()
            .map(|(addr, content)| (*addr, Arc::clone(content)))
            .collect();
        entries.sort_unstable_by_key(|(addr, _)| *addr);
        entries
    }
}
