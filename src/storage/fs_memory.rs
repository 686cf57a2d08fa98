//! Binary dump of the whole storage.
//!
//! The dump is a single little-endian file, `segments.scdb`, inside the
//! repository directory:
//!
//! ```text
//! header   magic[8] version:u16 capacity:u16 segment_count:u16
//! segment  num:u16 last_engaged:u16 free_head:u16
//!          free_count:u32 (offset:u16 next_free:u16)*
//!          live:u32 record*
//! record   offset:u16 type:u16 flags:u8 access:u8
//!          first_out:u32 first_in:u32 out_count:u32 in_count:u32
//!          connector:u8 [begin:u32 end:u32 (prev:u32 next:u32)x4]
//! content  count:u32 (addr:u32 len:u32 bytes)*
//! trailer  crc32:u32 over everything before it
//! ```
//!
//! Addresses survive a save/load cycle unchanged, including the free chains,
//! so allocation after a restore hands out the same slots it would have
//! handed out before.

use std::fs;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MemoryConfig;
use crate::error::{ScError, ScResult};
use crate::storage::element::{ConnectorRecord, Element, RingLink, FLAG_ERASING};
use crate::storage::{ScStorage, Segment, SegmentCursor};
use crate::types::{AccessLevels, ScAddr, ScType};

/// Name of the dump file inside the repository directory.
pub const DUMP_FILE_NAME: &str = "segments.scdb";

const MAGIC: &[u8; 8] = b"SCMEMDB\0";
const FORMAT_VERSION: u16 = 1;

/// Full path of the dump inside `dir`.
pub fn dump_path(dir: &Path) -> PathBuf {
    dir.join(DUMP_FILE_NAME)
}

/// True when `dir` holds a dump file.
pub fn dump_exists(dir: &Path) -> bool {
    dump_path(dir).is_file()
}

/// Summary of one save or load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DumpSummary {
    /// Segments written or restored.
    pub segments: u16,
    /// Live elements written or restored.
    pub elements: u64,
    /// Links with content written or restored.
    pub contents: u64,
    /// File size in bytes.
    pub bytes: u64,
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn addr(&mut self, addr: ScAddr) {
        self.u32(addr.to_packed());
    }

    fn link(&mut self, link: RingLink) {
        self.addr(link.prev);
        self.addr(link.next);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn element(&mut self, offset: u16, el: &Element) {
        self.u16(offset);
        self.u16(el.ty.bits());
        self.u8(el.flags & !FLAG_ERASING);
        self.u8(el.access.to_packed());
        self.addr(el.first_out);
        self.addr(el.first_in);
        self.u32(el.out_count);
        self.u32(el.in_count);
        match &el.connector {
            None => self.u8(0),
            Some(c) => {
                self.u8(1);
                self.addr(c.begin);
                self.addr(c.end);
                self.link(c.out_link);
                self.link(c.in_link);
                self.link(c.rev_out_link);
                self.link(c.rev_in_link);
            }
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> ScResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(ScError::Corruption("dump truncated"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> ScResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> ScResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> ScResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn addr(&mut self) -> ScResult<ScAddr> {
        Ok(ScAddr::from_packed(self.u32()?))
    }

    fn link(&mut self) -> ScResult<RingLink> {
        Ok(RingLink {
            prev: self.addr()?,
            next: self.addr()?,
        })
    }

    fn element(&mut self) -> ScResult<(u16, Element)> {
        let offset = self.u16()?;
        let ty = ScType::from_bits(self.u16()?);
        if ty.is_unknown() {
            return Err(ScError::Corruption("live record with unknown type"));
        }
        let flags = self.u8()?;
        let access = AccessLevels::from_packed(self.u8()?);
        let mut el = Element::node(ty, access);
        el.flags = flags & !FLAG_ERASING;
        el.first_out = self.addr()?;
        el.first_in = self.addr()?;
        el.out_count = self.u32()?;
        el.in_count = self.u32()?;
        el.connector = match self.u8()? {
            0 => None,
            1 => Some(ConnectorRecord {
                begin: self.addr()?,
                end: self.addr()?,
                out_link: self.link()?,
                in_link: self.link()?,
                rev_out_link: self.link()?,
                rev_in_link: self.link()?,
            }),
            _ => return Err(ScError::Corruption("bad connector marker")),
        };
        if el.connector.is_some() != ty.is_connector() {
            return Err(ScError::Corruption("connector record does not match type"));
        }
        Ok((offset, el))
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.buf.len()
    }
}

fn check_repo_dir(dir: &Path) -> ScResult<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(ScError::NoRepoPath)
    }
}

/// Writes the dump of `storage` into `dir`, creating the directory if needed.
///
/// The caller is expected to keep the storage quiescent while saving; the
/// dump is consistent per slot, not across concurrent mutations.
pub fn save(storage: &ScStorage, dir: &Path) -> ScResult<DumpSummary> {
    if dir.exists() {
        check_repo_dir(dir)?;
    } else {
        fs::create_dir_all(dir).map_err(|source| ScError::WriteError {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let segments = storage.segments();
    let mut w = Writer { buf: Vec::new() };
    w.bytes(MAGIC);
    w.u16(FORMAT_VERSION);
    w.u16(segments.capacity());
    let count = segments.count() as u16;
    w.u16(count);

    let mut summary = DumpSummary {
        segments: count,
        ..DumpSummary::default()
    };
    for segment in segments.iter() {
        let cursor = segment.cursor();
        let free = segment.free_chain();
        let live = segment.live_elements();
        w.u16(segment.num());
        w.u16(cursor.last_engaged);
        w.u16(cursor.free_head);
        w.u32(free.len() as u32);
        for (offset, next_free) in free {
            w.u16(offset);
            w.u16(next_free);
        }
        w.u32(live.len() as u32);
        for (offset, el) in &live {
            w.element(*offset, el);
        }
        summary.elements += live.len() as u64;
    }

    let contents = storage.content().entries();
    w.u32(contents.len() as u32);
    for (addr, bytes) in &contents {
        w.addr(*addr);
        w.u32(bytes.len() as u32);
        w.bytes(bytes);
    }
    summary.contents = contents.len() as u64;

    let mut hasher = Hasher::new();
    hasher.update(&w.buf);
    let crc = hasher.finalize();
    w.u32(crc);
    summary.bytes = w.buf.len() as u64;

    let path = dump_path(dir);
    let tmp = path.with_extension("scdb.tmp");
    fs::write(&tmp, &w.buf).map_err(|source| ScError::WriteError {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| ScError::WriteError {
        path: path.clone(),
        source,
    })?;
    info!(
        path = %path.display(),
        segments = summary.segments,
        elements = summary.elements,
        contents = summary.contents,
        "memory dump saved"
    );
    Ok(summary)
}

/// Rebuilds a storage from the dump in `dir`.
///
/// Segment capacity comes from the dump. The segment limit is the larger of
/// `config.max_segments` and the number of segments in the dump.
pub fn load(dir: &Path, config: &MemoryConfig) -> ScResult<(ScStorage, DumpSummary)> {
    check_repo_dir(dir)?;
    let path = dump_path(dir);
    let data = fs::read(&path).map_err(|source| ScError::ReadError {
        path: path.clone(),
        source,
    })?;

    let body_len = data
        .len()
        .checked_sub(4)
        .ok_or(ScError::Corruption("dump truncated"))?;
    let (body, trailer) = data.split_at(body_len);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut hasher = Hasher::new();
    hasher.update(body);
    if hasher.finalize() != stored {
        return Err(ScError::Corruption("dump checksum mismatch"));
    }

    let mut r = Reader { buf: body, pos: 0 };
    if r.take(MAGIC.len())? != MAGIC {
        return Err(ScError::Corruption("bad dump magic"));
    }
    if r.u16()? != FORMAT_VERSION {
        return Err(ScError::Corruption("unsupported dump version"));
    }
    let capacity = r.u16()?;
    let count = r.u16()?;
    if capacity == 0 {
        return Err(ScError::Corruption("zero segment capacity"));
    }
    if capacity != config.segment_capacity {
        warn!(
            dump = capacity,
            configured = config.segment_capacity,
            "segment capacity taken from dump"
        );
    }

    let effective = MemoryConfig {
        segment_capacity: capacity,
        max_segments: config.max_segments.max(count),
        ..config.clone()
    };
    let storage = ScStorage::new(&effective);
    let mut summary = DumpSummary {
        segments: count,
        bytes: data.len() as u64,
        ..DumpSummary::default()
    };

    for _ in 0..count {
        let num = r.u16()?;
        let last_engaged = r.u16()?;
        let free_head = r.u16()?;
        let free_count = r.u32()?;
        let mut free = Vec::new();
        for _ in 0..free_count {
            free.push((r.u16()?, r.u16()?));
        }
        let live = r.u32()?;
        let mut elements = Vec::new();
        for _ in 0..live {
            elements.push(r.element()?);
        }
        summary.elements += elements.len() as u64;
        let cursor = SegmentCursor {
            last_engaged,
            free_head,
            live,
        };
        let segment = Segment::restore(num, capacity, cursor, &free, elements)?;
        storage.segments().install(segment)?;
    }

    let contents = r.u32()?;
    for _ in 0..contents {
        let addr = r.addr()?;
        let len = r.u32()? as usize;
        let bytes = r.take(len)?;
        let is_link = storage
            .element_type(addr)
            .map(|ty| ty.is_link())
            .unwrap_or(false);
        if !is_link {
            return Err(ScError::Corruption("content attached to a non-link"));
        }
        storage.content().set(addr, bytes);
    }
    summary.contents = contents as u64;
    if !r.is_at_end() {
        return Err(ScError::Corruption("trailing bytes after content section"));
    }

    storage.recount();
    storage.segments().refresh_hint();
    info!(
        path = %path.display(),
        segments = summary.segments,
        elements = summary.elements,
        contents = summary.contents,
        "memory dump loaded"
    );
    Ok((storage, summary))
}
