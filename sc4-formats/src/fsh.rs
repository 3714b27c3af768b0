//! FSH image container decoder.
//!
//! An FSH file is a small directory of named entries, each carrying a chain
//! of mip bitmaps in one of a handful of pixel formats. Uncompressed formats
//! convert to RGBA8 in-crate; the block-compressed DXT formats delegate to
//! the `texpresso` decoder.

use tracing::{debug, trace};

use crate::reader::SliceReader;
use crate::{Error, Result};

pub const MAGIC_SHPI: u32 = 0x4950_4853;
pub const MAGIC_G264: u32 = 0x3436_3247;
pub const MAGIC_G266: u32 = 0x3636_3247;
pub const MAGIC_G354: u32 = 0x3435_3347;

pub const CODE_DXT1: u8 = 0x60;
pub const CODE_DXT3: u8 = 0x61;
pub const CODE_DXT5: u8 = 0x62;
pub const CODE_ARGB4444: u8 = 0x6D;
pub const CODE_RGB565: u8 = 0x78;
pub const CODE_BGRA32: u8 = 0x7D;
pub const CODE_ARGB1555: u8 = 0x7E;
pub const CODE_BGR24: u8 = 0x7F;

/// Archive-wide FSH header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub magic: u32,
    pub size: u32,
    pub num_entries: u32,
    pub dir_id: u32,
}

impl Header {
    pub fn is_valid(&self) -> bool {
        matches!(
            self.magic,
            MAGIC_SHPI | MAGIC_G264 | MAGIC_G266 | MAGIC_G354
        )
    }
}

/// One bitmap in an entry's mip chain.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub code: u8,
    pub width: u16,
    pub height: u16,
    pub mip_level: u8,
    pub data: Vec<u8>,
}

/// A named directory entry and its decoded mip chain.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub code: u8,
    pub width: u16,
    pub height: u16,
    pub mip_count: u8,
    /// Optional text attachment found after the mip chain.
    pub label: Option<String>,
    pub bitmaps: Vec<Bitmap>,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub header: Header,
    pub entries: Vec<Entry>,
}

struct DirectoryEntry {
    name: String,
    offset: u32,
}

pub fn parse(data: &[u8]) -> Result<Record> {
    let mut reader = SliceReader::new(data);
    let header = Header {
        magic: reader.read_u32()?,
        size: reader.read_u32()?,
        num_entries: reader.read_u32()?,
        dir_id: reader.read_u32()?,
    };
    if !header.is_valid() {
        return Err(Error::BadFshMagic(header.magic));
    }
    debug!("FSH: {} bytes, {} entries", data.len(), header.num_entries);

    let mut directory = Vec::with_capacity(header.num_entries.min(4096) as usize);
    for _ in 0..header.num_entries {
        directory.push(DirectoryEntry {
            name: reader.read_string(4)?,
            offset: reader.read_u32()?,
        });
    }

    let mut entries = Vec::with_capacity(directory.len());
    for (i, dir) in directory.iter().enumerate() {
        let offset = dir.offset as usize;
        // An entry's payload runs to the next entry's offset, or to the end
        // of the file for the last one.
        let end = match directory.get(i + 1) {
            Some(next) => next.offset as usize,
            None => data.len(),
        };
        if offset >= data.len() || end > data.len() || end < offset {
            return Err(Error::FshEntryOutOfBounds {
                offset: dir.offset,
                len: data.len(),
            });
        }
        entries.push(parse_entry(data, dir, offset, end)?);
    }

    Ok(Record { header, entries })
}

fn parse_entry(data: &[u8], dir: &DirectoryEntry, offset: usize, end: usize) -> Result<Entry> {
    let mut reader = SliceReader::new(&data[offset..end]);

    let record_code = reader.read_u8()?;
    let code = record_code & 0x7F;
    let block = reader.take(3)?;
    let block_size = (u32::from(block[0]) << 16) | (u32::from(block[1]) << 8) | u32::from(block[2]);

    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let _x_center = reader.read_u16()?;
    let _y_center = reader.read_u16()?;
    let _x_offset = reader.read_u16()?;
    let y_offset = reader.read_u16()?;
    let mip_count = (y_offset >> 12) as u8;

    trace!(
        "FSH entry {:?}: code {code:#04x}, {width}x{height}, {mip_count} extra mips",
        dir.name
    );

    let mut bitmaps = Vec::with_capacity(usize::from(mip_count) + 1);
    for level in 0..=mip_count {
        let mip_width = (width >> level).max(1);
        let mip_height = (height >> level).max(1);
        // Block-compressed mips below 4x4 alignment end the chain instead of
        // failing the entry.
        if matches!(code, CODE_DXT1 | CODE_DXT3)
            && (mip_width % 4 != 0 || mip_height % 4 != 0)
        {
            break;
        }
        let size = storage_size(code, mip_width, mip_height)
            .ok_or(Error::UnsupportedBitmapCode(code))?;
        let bytes = reader.take(size)?;
        bitmaps.push(Bitmap {
            code,
            width: mip_width,
            height: mip_height,
            mip_level: level,
            data: bytes.to_vec(),
        });
    }

    let label = parse_label(data, offset, end, block_size);

    Ok(Entry {
        name: dir.name.clone(),
        code,
        width,
        height,
        mip_count,
        label,
        bitmaps,
    })
}

/// A `0x70` block after the bitmap data carries a NUL-terminated label.
fn parse_label(data: &[u8], offset: usize, end: usize, block_size: u32) -> Option<String> {
    if block_size == 0 {
        return None;
    }
    let attachment = offset.checked_add(block_size as usize)?;
    if attachment >= end {
        return None;
    }
    let tail = &data[attachment..end];
    if tail.len() < 5 || tail[0] != 0x70 {
        return None;
    }
    let text = &tail[4..];
    let terminated = match text.iter().position(|&b| b == 0) {
        Some(nul) => &text[..nul],
        None => text,
    };
    Some(String::from_utf8_lossy(terminated).into_owned())
}

fn storage_size(code: u8, width: u16, height: u16) -> Option<usize> {
    let (width, height) = (usize::from(width), usize::from(height));
    match code {
        CODE_DXT1 => Some(width.div_ceil(4) * height.div_ceil(4) * 8),
        CODE_DXT3 => Some(width.div_ceil(4) * height.div_ceil(4) * 16),
        _ => {
            let bpp = bytes_per_pixel(code);
            if bpp == 0 {
                return None;
            }
            Some(width * height * bpp)
        }
    }
}

fn bytes_per_pixel(code: u8) -> usize {
    match code {
        CODE_BGRA32 => 4,
        CODE_BGR24 => 3,
        CODE_ARGB4444 | CODE_RGB565 | CODE_ARGB1555 => 2,
        _ => 0,
    }
}

/// Convert any supported bitmap to tightly packed RGBA8.
pub fn convert_to_rgba8(bitmap: &Bitmap) -> Result<Vec<u8>> {
    let pixel_count = usize::from(bitmap.width) * usize::from(bitmap.height);
    let mut rgba = vec![0u8; pixel_count * 4];

    match bitmap.code {
        CODE_BGRA32 => {
            let expected = pixel_count * 4;
            check_len(bitmap, expected)?;
            for (src, dst) in bitmap.data[..expected]
                .chunks_exact(4)
                .zip(rgba.chunks_exact_mut(4))
            {
                dst.copy_from_slice(&[src[2], src[1], src[0], src[3]]);
            }
        }
        CODE_BGR24 => {
            let expected = pixel_count * 3;
            check_len(bitmap, expected)?;
            for (src, dst) in bitmap.data[..expected]
                .chunks_exact(3)
                .zip(rgba.chunks_exact_mut(4))
            {
                dst.copy_from_slice(&[src[2], src[1], src[0], 255]);
            }
        }
        CODE_ARGB4444 => convert_words(bitmap, pixel_count, &mut rgba, argb4444_to_rgba8)?,
        CODE_RGB565 => convert_words(bitmap, pixel_count, &mut rgba, rgb565_to_rgba8)?,
        CODE_ARGB1555 => convert_words(bitmap, pixel_count, &mut rgba, argb1555_to_rgba8)?,
        CODE_DXT1 | CODE_DXT3 | CODE_DXT5 => {
            if bitmap.width % 4 != 0 || bitmap.height % 4 != 0 {
                return Err(Error::DxtDimensions {
                    width: bitmap.width,
                    height: bitmap.height,
                });
            }
            let block_bytes = if bitmap.code == CODE_DXT1 { 8 } else { 16 };
            let expected = usize::from(bitmap.width / 4) * usize::from(bitmap.height / 4) * block_bytes;
            check_len(bitmap, expected)?;
            let format = match bitmap.code {
                CODE_DXT1 => texpresso::Format::Bc1,
                CODE_DXT3 => texpresso::Format::Bc2,
                _ => texpresso::Format::Bc3,
            };
            format.decompress(
                &bitmap.data[..expected],
                usize::from(bitmap.width),
                usize::from(bitmap.height),
                &mut rgba,
            );
        }
        other => return Err(Error::UnsupportedBitmapCode(other)),
    }

    Ok(rgba)
}

fn check_len(bitmap: &Bitmap, expected: usize) -> Result<()> {
    if bitmap.data.len() < expected {
        return Err(Error::BitmapTruncated {
            expected,
            actual: bitmap.data.len(),
        });
    }
    Ok(())
}

fn convert_words(
    bitmap: &Bitmap,
    pixel_count: usize,
    rgba: &mut [u8],
    convert: fn(u16) -> [u8; 4],
) -> Result<()> {
    let expected = pixel_count * 2;
    check_len(bitmap, expected)?;
    for (src, dst) in bitmap.data[..expected]
        .chunks_exact(2)
        .zip(rgba.chunks_exact_mut(4))
    {
        dst.copy_from_slice(&convert(u16::from_le_bytes([src[0], src[1]])));
    }
    Ok(())
}

fn argb4444_to_rgba8(color: u16) -> [u8; 4] {
    let a = ((color >> 12) & 0xF) as u8;
    let r = ((color >> 8) & 0xF) as u8;
    let g = ((color >> 4) & 0xF) as u8;
    let b = (color & 0xF) as u8;
    [(r << 4) | r, (g << 4) | g, (b << 4) | b, (a << 4) | a]
}

fn rgb565_to_rgba8(color: u16) -> [u8; 4] {
    let r = ((color >> 11) & 0x1F) as u8;
    let g = ((color >> 5) & 0x3F) as u8;
    let b = (color & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 255]
}

fn argb1555_to_rgba8(color: u16) -> [u8; 4] {
    let a = ((color >> 15) & 0x1) as u8;
    let r = ((color >> 10) & 0x1F) as u8;
    let g = ((color >> 5) & 0x1F) as u8;
    let b = (color & 0x1F) as u8;
    [
        (r << 3) | (r >> 2),
        (g << 3) | (g >> 2),
        (b << 3) | (b >> 2),
        if a != 0 { 255 } else { 0 },
    ]
}
