//! DBPF envelope parsing, index lookup and entry readout.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use sc4_formats::{Tgi, TgiMask, catalog, exemplar, fsh, ltext, rul0, s3d};

use crate::source::{FileSource, Range};
use crate::{DIRECTORY_TGI, Error, RUL0_TGI, Result};

const HEADER_SIZE: usize = 0x60;
const INDEX_RECORD_SIZE: usize = 20;
const DIRECTORY_RECORD_SIZE: usize = 16;
const DBPF_MAGIC: [u8; 4] = *b"DBPF";
const SUPPORTED_INDEX_TYPE: u32 = 7;

/// Fixed-size archive envelope at offset 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Header {
    pub major_version: u32,
    pub minor_version: u32,
    pub date_created: u32,
    pub date_modified: u32,
    pub index_type: u32,
    pub index_entry_count: u32,
    pub index_offset: u32,
    pub index_size: u32,
    /// Parsed but unused.
    pub hole_entry_count: u32,
    pub hole_offset: u32,
    pub hole_size: u32,
}

/// One record of the index table, plus the decompressed size attached from
/// the directory entry when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub tgi: Tgi,
    pub offset: u32,
    pub size: u32,
    pub decompressed_size: Option<u32>,
}

impl IndexEntry {
    /// Size of the payload after decompression, or the stored size for
    /// entries the directory does not list.
    pub fn effective_size(&self) -> u32 {
        self.decompressed_size.unwrap_or(self.size)
    }

    /// Catalog label for this entry's key.
    pub fn label(&self) -> &'static str {
        catalog::describe(&self.tgi)
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IndexEntry({}, {}, {})",
            self.tgi,
            self.offset,
            self.effective_size()
        )
    }
}

/// An entry payload. Borrows the reader's buffer or holds a live file
/// mapping when possible; owns bytes only after decompression or a
/// read fallback.
pub struct EntryData<'a> {
    backing: Backing<'a>,
}

enum Backing<'a> {
    Borrowed(&'a [u8]),
    Mapped(Range),
    Owned(Vec<u8>),
}

impl<'a> EntryData<'a> {
    fn owned(bytes: Vec<u8>) -> Self {
        Self {
            backing: Backing::Owned(bytes),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Borrowed(bytes) => bytes,
            Backing::Mapped(range) => range.view(),
            Backing::Owned(bytes) => bytes,
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        match self.backing {
            Backing::Borrowed(bytes) => bytes.to_vec(),
            Backing::Mapped(range) => range.view().to_vec(),
            Backing::Owned(bytes) => bytes,
        }
    }
}

impl std::ops::Deref for EntryData<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes()
    }
}

impl AsRef<[u8]> for EntryData<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes()
    }
}

enum SourceKind {
    Buffer(Vec<u8>),
    File(FileSource),
}

impl SourceKind {
    fn len(&self) -> u64 {
        match self {
            Self::Buffer(buffer) => buffer.len() as u64,
            Self::File(source) => source.size(),
        }
    }

    fn range(&self, offset: u64, length: usize) -> Result<EntryData<'_>> {
        match self {
            Self::Buffer(buffer) => {
                let start = usize::try_from(offset).map_err(|_| Error::RangeOutOfBounds {
                    offset,
                    length,
                    size: self.len(),
                })?;
                let end = start.checked_add(length);
                match end {
                    Some(end) if end <= buffer.len() => Ok(EntryData {
                        backing: Backing::Borrowed(&buffer[start..end]),
                    }),
                    _ => Err(Error::RangeOutOfBounds {
                        offset,
                        length,
                        size: self.len(),
                    }),
                }
            }
            Self::File(source) => Ok(EntryData {
                backing: Backing::Mapped(source.map_range(offset, length)?),
            }),
        }
    }
}

/// Anything that can name an index entry: an exact key, a partial mask, a
/// catalog label, or an entry itself.
pub trait Locator {
    fn locate<'r>(&self, reader: &'r DbpfReader) -> Result<&'r IndexEntry>;
}

impl Locator for Tgi {
    fn locate<'r>(&self, reader: &'r DbpfReader) -> Result<&'r IndexEntry> {
        reader.find_entry(self).ok_or(Error::NotFound(*self))
    }
}

impl Locator for TgiMask {
    fn locate<'r>(&self, reader: &'r DbpfReader) -> Result<&'r IndexEntry> {
        reader
            .find_entries(self)
            .into_iter()
            .next()
            .ok_or(Error::NoMatch)
    }
}

impl Locator for &str {
    fn locate<'r>(&self, reader: &'r DbpfReader) -> Result<&'r IndexEntry> {
        let mask = catalog::mask_for_label(self)
            .ok_or_else(|| Error::LabelNotFound((*self).to_string()))?;
        mask.locate(reader)
    }
}

impl Locator for &IndexEntry {
    fn locate<'r>(&self, reader: &'r DbpfReader) -> Result<&'r IndexEntry> {
        reader.find_entry(&self.tgi).ok_or(Error::NotFound(self.tgi))
    }
}

/// A loaded archive: parsed envelope, key index and secondary indices.
pub struct DbpfReader {
    source: SourceKind,
    header: Header,
    index: Vec<IndexEntry>,
    by_tgi: HashMap<Tgi, usize>,
    by_type: HashMap<u32, Vec<usize>>,
    by_group: HashMap<u32, Vec<usize>>,
    by_instance: HashMap<u32, Vec<usize>>,
}

impl DbpfReader {
    /// Open an archive file, preferring memory-mapped access.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(SourceKind::File(FileSource::open(path)?))
    }

    /// Load an archive from an in-memory buffer.
    pub fn open_buffer(buffer: impl Into<Vec<u8>>) -> Result<Self> {
        Self::build(SourceKind::Buffer(buffer.into()))
    }

    fn build(source: SourceKind) -> Result<Self> {
        let file_len = source.len();
        if file_len < HEADER_SIZE as u64 {
            return Err(Error::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: file_len as usize,
            });
        }

        let header = {
            let bytes = source.range(0, HEADER_SIZE)?;
            parse_header(bytes.bytes())?
        };
        debug!(
            "DBPF {}.{}: {} index entries at {:#x}",
            header.major_version,
            header.minor_version,
            header.index_entry_count,
            header.index_offset
        );

        let record_bytes = (header.index_entry_count as usize)
            .checked_mul(INDEX_RECORD_SIZE)
            .filter(|&need| need <= header.index_size as usize)
            .ok_or(Error::IndexOutOfBounds {
                offset: header.index_offset,
                size: header.index_size,
                len: file_len as usize,
            })?;

        let index = {
            let bytes = source
                .range(u64::from(header.index_offset), record_bytes)
                .map_err(|_| Error::IndexOutOfBounds {
                    offset: header.index_offset,
                    size: header.index_size,
                    len: file_len as usize,
                })?;
            parse_index(bytes.bytes(), header.index_entry_count)?
        };

        for entry in &index {
            let end = u64::from(entry.offset) + u64::from(entry.size);
            if end > file_len {
                return Err(Error::EntryOutOfBounds {
                    tgi: entry.tgi,
                    offset: entry.offset,
                    size: entry.size,
                    len: file_len as usize,
                });
            }
        }

        let mut by_tgi = HashMap::with_capacity(index.len());
        let mut by_type: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut by_group: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut by_instance: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, entry) in index.iter().enumerate() {
            by_tgi.insert(entry.tgi, i);
            by_type.entry(entry.tgi.type_id).or_default().push(i);
            by_group.entry(entry.tgi.group).or_default().push(i);
            by_instance.entry(entry.tgi.instance).or_default().push(i);
        }

        let mut reader = Self {
            source,
            header,
            index,
            by_tgi,
            by_type,
            by_group,
            by_instance,
        };
        reader.apply_directory()?;
        Ok(reader)
    }

    /// Attach decompressed sizes from the directory entry, when one exists.
    fn apply_directory(&mut self) -> Result<()> {
        let Some(&dir_index) = self.by_tgi.get(&DIRECTORY_TGI) else {
            return Ok(());
        };
        let entry = self.index[dir_index];

        let mut sizes = Vec::new();
        {
            let payload = self.raw_payload(&entry)?;
            let bytes = payload.bytes();
            if bytes.len() % DIRECTORY_RECORD_SIZE != 0 {
                // Larger directory record variants exist in related archive
                // formats; only the 16-byte form is supported.
                warn!(
                    "directory payload of {} bytes is not a whole number of records",
                    bytes.len()
                );
            }
            let mut cursor = Cursor::new(bytes);
            while bytes.len() - cursor.position() as usize >= DIRECTORY_RECORD_SIZE {
                let tgi = Tgi::new(
                    cursor.read_u32::<LittleEndian>()?,
                    cursor.read_u32::<LittleEndian>()?,
                    cursor.read_u32::<LittleEndian>()?,
                );
                sizes.push((tgi, cursor.read_u32::<LittleEndian>()?));
            }
        }

        debug!("directory entry lists {} compressed entries", sizes.len());
        for (tgi, size) in sizes {
            match self.by_tgi.get(&tgi) {
                Some(&i) => self.index[i].decompressed_size = Some(size),
                None => warn!("directory lists {tgi} with no matching index entry"),
            }
        }
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    /// Exact-key lookup.
    pub fn find_entry(&self, tgi: &Tgi) -> Option<&IndexEntry> {
        self.by_tgi.get(tgi).map(|&i| &self.index[i])
    }

    /// Every entry matching a partial key. The search walks the narrowest
    /// secondary index the mask allows before filtering.
    pub fn find_entries(&self, mask: &TgiMask) -> Vec<&IndexEntry> {
        self.candidate_indices(mask)
            .into_iter()
            .map(|i| &self.index[i])
            .filter(|entry| mask.matches(&entry.tgi))
            .collect()
    }

    /// Every entry matching a catalog label.
    pub fn find_entries_by_label(&self, label: &str) -> Result<Vec<&IndexEntry>> {
        let mask =
            catalog::mask_for_label(label).ok_or_else(|| Error::LabelNotFound(label.to_string()))?;
        Ok(self.find_entries(&mask))
    }

    /// Resolve a key, mask, label or entry to a single index entry.
    pub fn entry(&self, locator: impl Locator) -> Result<&IndexEntry> {
        locator.locate(self)
    }

    fn candidate_indices(&self, mask: &TgiMask) -> Vec<usize> {
        if let Some(type_id) = mask.type_id {
            return self.by_type.get(&type_id).cloned().unwrap_or_default();
        }
        if let Some(group) = mask.group {
            return self.by_group.get(&group).cloned().unwrap_or_default();
        }
        if let Some(instance) = mask.instance {
            return self.by_instance.get(&instance).cloned().unwrap_or_default();
        }
        (0..self.index.len()).collect()
    }

    fn raw_payload(&self, entry: &IndexEntry) -> Result<EntryData<'_>> {
        self.source
            .range(u64::from(entry.offset), entry.size as usize)
            .map_err(|e| match e {
                Error::RangeOutOfBounds { .. } => Error::EntryOutOfBounds {
                    tgi: entry.tgi,
                    offset: entry.offset,
                    size: entry.size,
                    len: self.source.len() as usize,
                },
                other => other,
            })
    }

    /// Resolve and read an entry payload, decompressing when needed.
    pub fn read(&self, locator: impl Locator) -> Result<EntryData<'_>> {
        let entry = *self.entry(locator)?;
        self.read_entry(&entry)
    }

    /// Read an entry payload. A QFS stream anywhere in the normalization
    /// window is decompressed; everything else is returned as stored,
    /// without copying when the source is mapped.
    pub fn read_entry(&self, entry: &IndexEntry) -> Result<EntryData<'_>> {
        let raw = self.raw_payload(entry)?;

        let Some(stream_offset) = qfs_payload_offset(raw.bytes()) else {
            return Ok(raw);
        };

        let decompressed = qfs::decompress(&raw.bytes()[stream_offset..])?;
        if let Some(expected) = entry.decompressed_size {
            if expected as usize != decompressed.len() {
                warn!(
                    "{}: directory declares {expected} decompressed bytes, stream produced {}",
                    entry.tgi,
                    decompressed.len()
                );
            }
        }
        Ok(EntryData::owned(decompressed))
    }

    /// Read and decode an FSH image container.
    pub fn load_fsh(&self, locator: impl Locator) -> Result<fsh::Record> {
        let data = self.read(locator)?;
        Ok(fsh::parse(data.bytes())?)
    }

    /// Read and decode an S3D model.
    pub fn load_s3d(&self, locator: impl Locator) -> Result<s3d::Record> {
        let data = self.read(locator)?;
        Ok(s3d::parse(data.bytes())?)
    }

    /// Read and decode an Exemplar or Cohort property table.
    pub fn load_exemplar(&self, locator: impl Locator) -> Result<exemplar::Record> {
        let data = self.read(locator)?;
        Ok(exemplar::parse(data.bytes())?)
    }

    /// Read and decode a localized string.
    pub fn load_ltext(&self, locator: impl Locator) -> Result<ltext::Record> {
        let data = self.read(locator)?;
        Ok(ltext::parse(data.bytes())?)
    }

    /// Read and decode an arbitrary entry as a RUL0 rule script.
    pub fn load_rul0_at(&self, locator: impl Locator) -> Result<rul0::Record> {
        let data = self.read(locator)?;
        Ok(rul0::parse(data.bytes())?)
    }

    /// Read and decode the rule script at its well-known key.
    pub fn load_rul0(&self) -> Result<rul0::Record> {
        self.load_rul0_at(RUL0_TGI)
    }
}

fn parse_header(bytes: &[u8]) -> Result<Header> {
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[..4]);
    if magic != DBPF_MAGIC {
        return Err(Error::InvalidMagic(magic));
    }

    let mut cursor = Cursor::new(&bytes[4..]);
    let mut header = Header {
        major_version: cursor.read_u32::<LittleEndian>()?,
        minor_version: cursor.read_u32::<LittleEndian>()?,
        ..Header::default()
    };
    cursor.set_position(20);
    header.date_created = cursor.read_u32::<LittleEndian>()?;
    header.date_modified = cursor.read_u32::<LittleEndian>()?;
    header.index_type = cursor.read_u32::<LittleEndian>()?;
    header.index_entry_count = cursor.read_u32::<LittleEndian>()?;
    header.index_offset = cursor.read_u32::<LittleEndian>()?;
    header.index_size = cursor.read_u32::<LittleEndian>()?;
    header.hole_entry_count = cursor.read_u32::<LittleEndian>()?;
    header.hole_offset = cursor.read_u32::<LittleEndian>()?;
    header.hole_size = cursor.read_u32::<LittleEndian>()?;

    if header.major_version != 1 || header.minor_version != 0 {
        return Err(Error::UnsupportedVersion {
            major: header.major_version,
            minor: header.minor_version,
        });
    }
    if header.index_type != SUPPORTED_INDEX_TYPE {
        return Err(Error::UnsupportedIndexType(header.index_type));
    }
    Ok(header)
}

fn parse_index(bytes: &[u8], count: u32) -> Result<Vec<IndexEntry>> {
    let mut cursor = Cursor::new(bytes);
    let mut index = Vec::with_capacity(count as usize);
    for _ in 0..count {
        index.push(IndexEntry {
            tgi: Tgi::new(
                cursor.read_u32::<LittleEndian>()?,
                cursor.read_u32::<LittleEndian>()?,
                cursor.read_u32::<LittleEndian>()?,
            ),
            offset: cursor.read_u32::<LittleEndian>()?,
            size: cursor.read_u32::<LittleEndian>()?,
            decompressed_size: None,
        });
    }
    Ok(index)
}

/// Locate the start of a QFS stream inside a raw payload, if there is one.
///
/// Payloads may wrap the stream in a chunk header (compressed size,
/// uncompressed size, then a `0x10`/`0x11` flag byte, with an extra 4-byte
/// body length for `0x11`), and a few store leading garbage. The probe
/// strips a recognizable chunk header, then scans the first 16 bytes of
/// what remains for the stream magic.
fn qfs_payload_offset(data: &[u8]) -> Option<usize> {
    if qfs::is_compressed(data) {
        return Some(0);
    }

    let mut start = 0usize;
    if data.len() > 8 && matches!(data[8], 0x10 | 0x11) {
        start = if data[8] == 0x11 { 13 } else { 9 };
    } else if data.len() > 10 && matches!(data[10], 0x10 | 0x11) {
        start = if data[10] == 0x11 { 15 } else { 11 };
    }
    if start >= data.len() {
        start = 0;
    }

    let window = &data[start..];
    for i in 0..window.len().min(16) {
        if qfs::is_compressed(&window[i..]) {
            return Some(start + i);
        }
    }
    None
}
