//! Integration tests for the FSH image container decoder

use sc4_formats::fsh::{self, Bitmap};
use sc4_formats::Error;

struct EntrySpec<'a> {
    name: &'a [u8; 4],
    code: u8,
    block_size: u32,
    width: u16,
    height: u16,
    mip_count: u8,
    payload: &'a [u8],
}

fn build_fsh(entries: &[EntrySpec<'_>]) -> Vec<u8> {
    let directory_end = 16 + entries.len() * 8;
    let mut offsets = Vec::new();
    let mut cursor = directory_end;
    for entry in entries {
        offsets.push(cursor as u32);
        cursor += 16 + entry.payload.len();
    }

    let mut buffer = Vec::with_capacity(cursor);
    buffer.extend_from_slice(&fsh::MAGIC_SHPI.to_le_bytes());
    buffer.extend_from_slice(&(cursor as u32).to_le_bytes());
    buffer.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    buffer.extend_from_slice(&0u32.to_le_bytes()); // dir id

    for (entry, offset) in entries.iter().zip(&offsets) {
        buffer.extend_from_slice(entry.name);
        buffer.extend_from_slice(&offset.to_le_bytes());
    }

    for entry in entries {
        buffer.push(entry.code);
        buffer.extend_from_slice(&[
            ((entry.block_size >> 16) & 0xFF) as u8,
            ((entry.block_size >> 8) & 0xFF) as u8,
            (entry.block_size & 0xFF) as u8,
        ]);
        buffer.extend_from_slice(&entry.width.to_le_bytes());
        buffer.extend_from_slice(&entry.height.to_le_bytes());
        buffer.extend_from_slice(&0u16.to_le_bytes()); // x center
        buffer.extend_from_slice(&0u16.to_le_bytes()); // y center
        buffer.extend_from_slice(&0u16.to_le_bytes()); // x offset
        buffer.extend_from_slice(&(u16::from(entry.mip_count) << 12).to_le_bytes());
        buffer.extend_from_slice(entry.payload);
    }

    buffer
}

fn simple_bgra_entry() -> Vec<u8> {
    // 2x2 BGRA pixels: red, green, blue, white.
    build_fsh(&[EntrySpec {
        name: b"0000",
        code: fsh::CODE_BGRA32,
        block_size: 0,
        width: 2,
        height: 2,
        mip_count: 0,
        payload: &[
            0x00, 0x00, 0xFF, 0xFF, //
            0x00, 0xFF, 0x00, 0xFF, //
            0xFF, 0x00, 0x00, 0xFF, //
            0xFF, 0xFF, 0xFF, 0xFF,
        ],
    }])
}

#[test]
fn test_parses_simple_bitmap() {
    let record = fsh::parse(&simple_bgra_entry()).unwrap();
    assert_eq!(record.header.num_entries, 1);
    assert_eq!(record.entries.len(), 1);

    let entry = &record.entries[0];
    assert_eq!(entry.name, "0000");
    assert_eq!(entry.code, fsh::CODE_BGRA32);
    assert_eq!(entry.bitmaps.len(), 1);

    let bitmap = &entry.bitmaps[0];
    assert_eq!((bitmap.width, bitmap.height), (2, 2));
    assert_eq!(bitmap.mip_level, 0);
    assert_eq!(bitmap.data.len(), 16);
}

#[test]
fn test_bgra_converts_to_rgba() {
    let record = fsh::parse(&simple_bgra_entry()).unwrap();
    let rgba = fsh::convert_to_rgba8(&record.entries[0].bitmaps[0]).unwrap();
    assert_eq!(rgba.len(), 16);
    assert_eq!(&rgba[0..4], &[0xFF, 0x00, 0x00, 0xFF]);
    assert_eq!(&rgba[4..8], &[0x00, 0xFF, 0x00, 0xFF]);
    assert_eq!(&rgba[8..12], &[0x00, 0x00, 0xFF, 0xFF]);
    assert_eq!(&rgba[12..16], &[0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_rgba_output_length_invariant() {
    let record = fsh::parse(&simple_bgra_entry()).unwrap();
    for entry in &record.entries {
        for bitmap in &entry.bitmaps {
            let rgba = fsh::convert_to_rgba8(bitmap).unwrap();
            assert_eq!(
                rgba.len(),
                4 * usize::from(bitmap.width) * usize::from(bitmap.height)
            );
        }
    }
}

#[test]
fn test_mip_chain_halves_dimensions() {
    // 4x4 RGB565 with one extra mip: 32 bytes for level 0, 8 for level 1.
    let mut payload = vec![0u8; 32 + 8];
    for chunk in payload.chunks_exact_mut(2) {
        chunk.copy_from_slice(&0xF800u16.to_le_bytes());
    }
    let buffer = build_fsh(&[EntrySpec {
        name: b"mip0",
        code: fsh::CODE_RGB565,
        block_size: 0,
        width: 4,
        height: 4,
        mip_count: 1,
        payload: &payload,
    }]);

    let record = fsh::parse(&buffer).unwrap();
    let entry = &record.entries[0];
    assert_eq!(entry.mip_count, 1);
    assert_eq!(entry.bitmaps.len(), 2);
    assert_eq!(
        (entry.bitmaps[0].width, entry.bitmaps[0].height),
        (4, 4)
    );
    assert_eq!(
        (entry.bitmaps[1].width, entry.bitmaps[1].height),
        (2, 2)
    );
    assert_eq!(entry.bitmaps[1].mip_level, 1);

    let rgba = fsh::convert_to_rgba8(&entry.bitmaps[1]).unwrap();
    assert_eq!(&rgba[0..4], &[0xFF, 0x00, 0x00, 0xFF]);
}

#[test]
fn test_dxt1_solid_color_block() {
    // One BC1 block, both endpoints pure red, all indices zero.
    let block = [0x00, 0xF8, 0x00, 0xF8, 0x00, 0x00, 0x00, 0x00];
    let buffer = build_fsh(&[EntrySpec {
        name: b"dxt1",
        code: fsh::CODE_DXT1,
        block_size: 0,
        width: 4,
        height: 4,
        mip_count: 0,
        payload: &block,
    }]);

    let record = fsh::parse(&buffer).unwrap();
    let bitmap = &record.entries[0].bitmaps[0];
    assert_eq!(bitmap.data.len(), 8);

    let rgba = fsh::convert_to_rgba8(bitmap).unwrap();
    assert_eq!(rgba.len(), 64);
    for pixel in rgba.chunks_exact(4) {
        assert_eq!(pixel, &[0xFF, 0x00, 0x00, 0xFF]);
    }
}

#[test]
fn test_unaligned_dxt_mip_terminates_chain() {
    // A 2x2 DXT1 entry has no 4x4-aligned level at all.
    let buffer = build_fsh(&[EntrySpec {
        name: b"tiny",
        code: fsh::CODE_DXT1,
        block_size: 0,
        width: 2,
        height: 2,
        mip_count: 2,
        payload: &[],
    }]);
    let record = fsh::parse(&buffer).unwrap();
    assert!(record.entries[0].bitmaps.is_empty());
}

#[test]
fn test_unaligned_dxt_conversion_fails() {
    let bitmap = Bitmap {
        code: fsh::CODE_DXT1,
        width: 2,
        height: 2,
        mip_level: 0,
        data: vec![0; 8],
    };
    assert!(matches!(
        fsh::convert_to_rgba8(&bitmap),
        Err(Error::DxtDimensions {
            width: 2,
            height: 2
        })
    ));
}

#[test]
fn test_entry_label_attachment() {
    // Payload: one 1x1 BGRA pixel, then a 0x70 attachment block carrying a
    // NUL-terminated label. block_size covers header + pixel data.
    let mut payload = vec![0x10, 0x20, 0x30, 0xFF];
    payload.extend_from_slice(&[0x70, 0x00, 0x00, 0x00]);
    payload.extend_from_slice(b"Grass\0");
    let buffer = build_fsh(&[EntrySpec {
        name: b"lbl0",
        code: fsh::CODE_BGRA32,
        block_size: 16 + 4,
        width: 1,
        height: 1,
        mip_count: 0,
        payload: &payload,
    }]);

    let record = fsh::parse(&buffer).unwrap();
    let entry = &record.entries[0];
    assert_eq!(entry.label.as_deref(), Some("Grass"));
}

#[test]
fn test_two_entries_bounded_by_next_offset() {
    let buffer = build_fsh(&[
        EntrySpec {
            name: b"one\0",
            code: fsh::CODE_BGRA32,
            block_size: 0,
            width: 1,
            height: 1,
            mip_count: 0,
            payload: &[1, 2, 3, 4],
        },
        EntrySpec {
            name: b"two\0",
            code: fsh::CODE_BGR24,
            block_size: 0,
            width: 1,
            height: 1,
            mip_count: 0,
            payload: &[5, 6, 7],
        },
    ]);
    let record = fsh::parse(&buffer).unwrap();
    assert_eq!(record.entries.len(), 2);
    assert_eq!(record.entries[0].bitmaps[0].data, vec![1, 2, 3, 4]);
    assert_eq!(record.entries[1].bitmaps[0].data, vec![5, 6, 7]);
}

#[test]
fn test_rejects_bad_magic() {
    let mut buffer = simple_bgra_entry();
    buffer[0] = b'X';
    assert!(matches!(fsh::parse(&buffer), Err(Error::BadFshMagic(_))));
}

#[test]
fn test_rejects_out_of_bounds_entry_offset() {
    let mut buffer = build_fsh(&[EntrySpec {
        name: b"oob0",
        code: fsh::CODE_BGRA32,
        block_size: 0,
        width: 1,
        height: 1,
        mip_count: 0,
        payload: &[0; 4],
    }]);
    // Point the directory entry past the end of the file.
    let len = buffer.len() as u32;
    buffer[20..24].copy_from_slice(&(len + 100).to_le_bytes());
    assert!(matches!(
        fsh::parse(&buffer),
        Err(Error::FshEntryOutOfBounds { .. })
    ));
}

#[test]
fn test_rejects_unknown_pixel_code() {
    let buffer = build_fsh(&[EntrySpec {
        name: b"bad0",
        code: 0x55,
        block_size: 0,
        width: 1,
        height: 1,
        mip_count: 0,
        payload: &[0; 4],
    }]);
    assert!(matches!(
        fsh::parse(&buffer),
        Err(Error::UnsupportedBitmapCode(0x55))
    ));
}
