//! File-backed byte source with memory mapping support.
//!
//! Opening only stats the file; every requested range is mapped lazily and
//! independently. When a mapping cannot be established the range falls back
//! to a plain seek-and-read into an owned buffer, and both paths expose the
//! same slice view.

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Error, Result};

/// A bounded view of file bytes, alive until dropped.
pub struct Range {
    backing: Backing,
}

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Range {
    pub fn view(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(map) => map,
            Backing::Owned(buffer) => buffer,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }
}

/// An open file serving bounded byte ranges.
pub struct FileSource {
    file: File,
    size: u64,
    path: PathBuf,
}

impl FileSource {
    /// Open the file and record its size. Mapping happens per range, so a
    /// file that cannot be mapped at all still opens successfully.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        debug!("opened {path:?} ({size} bytes)");
        Ok(Self {
            file,
            size,
            path: path.to_path_buf(),
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve exactly `length` bytes starting at `offset`, preferring a
    /// memory mapping and falling back to a buffered read.
    pub fn map_range(&self, offset: u64, length: usize) -> Result<Range> {
        let end = offset.checked_add(length as u64);
        if end.is_none() || end.is_some_and(|e| e > self.size) {
            return Err(Error::RangeOutOfBounds {
                offset,
                length,
                size: self.size,
            });
        }

        if length > 0 {
            match unsafe { MmapOptions::new().offset(offset).len(length).map(&self.file) } {
                Ok(map) => {
                    return Ok(Range {
                        backing: Backing::Mapped(map),
                    });
                }
                Err(e) => {
                    debug!("mmap of {offset}+{length} failed ({e}), using read fallback");
                }
            }
        }

        self.read_fallback(offset, length)
    }

    fn read_fallback(&self, offset: u64, length: usize) -> Result<Range> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; length];
        file.read_exact(&mut buffer)?;
        Ok(Range {
            backing: Backing::Owned(buffer),
        })
    }
}
