//! S3D chunked 3-D model decoder.
//!
//! A model is a `3DMD` envelope followed by six chunks in fixed order:
//! `HEAD`, `VERT`, `INDX`, `PRIM`, `MATS`, `ANIM`. The decoder fills flat
//! tables; primitive mode semantics (triangle list / strip) are left to the
//! consumer.

use tracing::{debug, trace};

use crate::reader::SliceReader;
use crate::{Error, Result};

/// Sanity cap on block counts in every chunk.
const MAX_BLOCKS: u32 = 1000;

pub const MAT_ALPHA_TEST: u32 = 0x01;
pub const MAT_DEPTH_TEST: u32 = 0x02;
pub const MAT_BACKFACE_CULLING: u32 = 0x08;
pub const MAT_BLEND: u32 = 0x10;
pub const MAT_TEXTURE: u32 = 0x20;
pub const MAT_COLOR_WRITES: u32 = 0x40;
pub const MAT_DEPTH_WRITES: u32 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
    pub uv2: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    fn from_point(point: [f32; 3]) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    fn extend(&mut self, point: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    fn union(&mut self, other: &BoundingBox) {
        self.extend(other.min);
        self.extend(other.max);
    }
}

#[derive(Debug, Clone)]
pub struct VertexBuffer {
    pub flags: u16,
    pub format: u32,
    pub vertices: Vec<Vertex>,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone)]
pub struct IndexBuffer {
    pub flags: u16,
    pub indices: Vec<u16>,
}

/// One draw call into an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    /// 0 = triangle list, 1 = triangle strip, 2 = reserved.
    pub mode: u32,
    pub first: u32,
    pub length: u32,
}

pub type PrimitiveBlock = Vec<Primitive>;

#[derive(Debug, Clone)]
pub struct MaterialTexture {
    pub texture_id: u32,
    pub wrap_s: u8,
    pub wrap_t: u8,
    pub mag_filter: u8,
    pub min_filter: u8,
    pub anim_rate: u16,
    pub anim_mode: u16,
    pub anim_name: String,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub flags: u32,
    pub alpha_func: u8,
    pub depth_func: u8,
    pub src_blend: u8,
    pub dst_blend: u8,
    pub alpha_threshold: f32,
    pub material_class: u32,
    pub textures: Vec<MaterialTexture>,
}

/// Per-frame block selection for one animated mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub vert_block: u16,
    pub index_block: u16,
    pub prim_block: u16,
    pub mats_block: u16,
}

#[derive(Debug, Clone)]
pub struct AnimatedMesh {
    pub name: String,
    pub flags: u8,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub frame_count: u16,
    pub frame_rate: u16,
    pub anim_mode: u16,
    pub flags: u32,
    pub displacement: f32,
    pub meshes: Vec<AnimatedMesh>,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub major_version: u16,
    pub minor_version: u16,
    pub vertex_buffers: Vec<VertexBuffer>,
    pub index_buffers: Vec<IndexBuffer>,
    pub primitive_blocks: Vec<PrimitiveBlock>,
    pub materials: Vec<Material>,
    pub animation: Animation,
    pub bounds: BoundingBox,
}

pub fn parse(data: &[u8]) -> Result<Record> {
    let mut reader = SliceReader::new(data);

    expect_tag(&mut reader, "3DMD")?;
    let _total_length = reader.read_u32()?;
    debug!("S3D: {} bytes", data.len());

    let (major_version, minor_version) = parse_head(&mut reader)?;
    let vertex_buffers = parse_vert(&mut reader, minor_version)?;
    let index_buffers = parse_indx(&mut reader)?;
    let primitive_blocks = parse_prim(&mut reader)?;
    let materials = parse_mats(&mut reader, minor_version)?;
    let animation = parse_anim(&mut reader)?;

    let mut bounds = BoundingBox::default();
    if let Some((first, rest)) = vertex_buffers.split_first() {
        bounds = first.bounds;
        for buffer in rest {
            bounds.union(&buffer.bounds);
        }
    }

    Ok(Record {
        major_version,
        minor_version,
        vertex_buffers,
        index_buffers,
        primitive_blocks,
        materials,
        animation,
        bounds,
    })
}

fn expect_tag(reader: &mut SliceReader<'_>, expected: &'static str) -> Result<()> {
    let tag = reader.peek(4)?;
    if tag != expected.as_bytes() {
        return Err(Error::MissingChunk { expected });
    }
    reader.skip(4)?;
    Ok(())
}

fn block_count(reader: &mut SliceReader<'_>, chunk: &'static str) -> Result<u32> {
    let count = reader.read_u32()?;
    if count > MAX_BLOCKS {
        return Err(Error::TooManyBlocks {
            chunk,
            count,
            limit: MAX_BLOCKS,
        });
    }
    Ok(count)
}

fn parse_head(reader: &mut SliceReader<'_>) -> Result<(u16, u16)> {
    expect_tag(reader, "HEAD")?;
    let _length = reader.read_u32()?;
    let major = reader.read_u16()?;
    let minor = reader.read_u16()?;
    if major != 1 || !(1..=5).contains(&minor) {
        return Err(Error::UnsupportedVersion { major, minor });
    }
    Ok((major, minor))
}

fn parse_vert(reader: &mut SliceReader<'_>, minor_version: u16) -> Result<Vec<VertexBuffer>> {
    expect_tag(reader, "VERT")?;
    let _length = reader.read_u32()?;
    let count = block_count(reader, "VERT")?;

    let mut buffers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let flags = reader.read_u16()?;
        let vertex_count = reader.read_u16()?;

        let (format, stride) = if minor_version >= 4 {
            let format = reader.read_u32()?;
            let (coords, colors, texs) = decode_vertex_format(format);
            let stride =
                3 * 4 * u32::from(coords) + 4 * u32::from(colors) + 2 * 4 * u32::from(texs);
            (format, stride)
        } else {
            let format = u32::from(reader.read_u16()?);
            let stride = u32::from(reader.read_u16()?);
            (format, stride)
        };

        trace!("S3D vertex buffer: {vertex_count} vertices, format {format:#x}");

        let mut vertices = Vec::with_capacity(usize::from(vertex_count));
        let mut bounds = BoundingBox::default();
        for i in 0..vertex_count {
            let vertex = read_vertex(reader, format, stride as usize)?;
            if i == 0 {
                bounds = BoundingBox::from_point(vertex.position);
            } else {
                bounds.extend(vertex.position);
            }
            vertices.push(vertex);
        }

        buffers.push(VertexBuffer {
            flags,
            format,
            vertices,
            bounds,
        });
    }
    Ok(buffers)
}

fn read_vertex(reader: &mut SliceReader<'_>, format: u32, stride: usize) -> Result<Vertex> {
    let start = reader.offset();
    let (_coords, colors, texs) = decode_vertex_format(format);

    let position = [reader.read_f32()?, reader.read_f32()?, reader.read_f32()?];

    let color = if colors > 0 {
        let b = reader.read_u8()?;
        let g = reader.read_u8()?;
        let r = reader.read_u8()?;
        let a = reader.read_u8()?;
        [
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        ]
    } else {
        [1.0, 1.0, 1.0, 1.0]
    };

    let uv = if texs > 0 {
        [reader.read_f32()?, reader.read_f32()?]
    } else {
        [0.0, 0.0]
    };
    let uv2 = if texs > 1 {
        [reader.read_f32()?, reader.read_f32()?]
    } else {
        [0.0, 0.0]
    };

    let consumed = reader.offset() - start;
    if consumed < stride {
        reader.skip(stride - consumed)?;
    }

    Ok(Vertex {
        position,
        color,
        uv,
        uv2,
    })
}

/// Counts of coordinate, color and texture-coordinate sets in a vertex.
///
/// A format word with the high bit set packs the counts directly; otherwise
/// it is a numeric id from a small fixed table.
fn decode_vertex_format(format: u32) -> (u8, u8, u8) {
    if format & 0x8000_0000 != 0 {
        (
            (format & 0x3) as u8,
            ((format >> 8) & 0x3) as u8,
            ((format >> 14) & 0x3) as u8,
        )
    } else {
        match format {
            1 => (1, 1, 0),
            2 => (1, 0, 1),
            3 => (1, 0, 2),
            10 => (1, 1, 1),
            11 => (1, 1, 2),
            _ => (1, 0, 1),
        }
    }
}

fn parse_indx(reader: &mut SliceReader<'_>) -> Result<Vec<IndexBuffer>> {
    expect_tag(reader, "INDX")?;
    let _length = reader.read_u32()?;
    let count = block_count(reader, "INDX")?;

    let mut buffers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let flags = reader.read_u16()?;
        let _stride = reader.read_u16()?;
        let index_count = reader.read_u16()?;
        let mut indices = Vec::with_capacity(usize::from(index_count));
        for _ in 0..index_count {
            indices.push(reader.read_u16()?);
        }
        buffers.push(IndexBuffer { flags, indices });
    }
    Ok(buffers)
}

fn parse_prim(reader: &mut SliceReader<'_>) -> Result<Vec<PrimitiveBlock>> {
    expect_tag(reader, "PRIM")?;
    let _length = reader.read_u32()?;
    let count = block_count(reader, "PRIM")?;

    let mut blocks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let prim_count = reader.read_u16()?;
        let mut block = Vec::with_capacity(usize::from(prim_count));
        for _ in 0..prim_count {
            block.push(Primitive {
                mode: reader.read_u32()?,
                first: reader.read_u32()?,
                length: reader.read_u32()?,
            });
        }
        blocks.push(block);
    }
    Ok(blocks)
}

fn parse_mats(reader: &mut SliceReader<'_>, minor_version: u16) -> Result<Vec<Material>> {
    expect_tag(reader, "MATS")?;
    let _length = reader.read_u32()?;
    let count = block_count(reader, "MATS")?;

    let mut materials = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let flags = reader.read_u32()?;
        let alpha_func = reader.read_u8()?;
        let depth_func = reader.read_u8()?;
        let src_blend = reader.read_u8()?;
        let dst_blend = reader.read_u8()?;
        let alpha_threshold = f32::from(reader.read_u16()?) / 65535.0;
        let material_class = reader.read_u32()?;
        let _reserved = reader.read_u8()?;
        let texture_count = reader.read_u8()?;

        let mut textures = Vec::with_capacity(usize::from(texture_count));
        for _ in 0..texture_count {
            let texture_id = reader.read_u32()?;
            let wrap_s = reader.read_u8()?;
            let wrap_t = reader.read_u8()?;
            let (mag_filter, min_filter) = if minor_version == 5 {
                (reader.read_u8()?, reader.read_u8()?)
            } else {
                (0, 0)
            };
            let anim_rate = reader.read_u16()?;
            let anim_mode = reader.read_u16()?;
            let anim_name_len = reader.read_u8()?;
            let anim_name = reader.read_string(usize::from(anim_name_len))?;
            textures.push(MaterialTexture {
                texture_id,
                wrap_s,
                wrap_t,
                mag_filter,
                min_filter,
                anim_rate,
                anim_mode,
                anim_name,
            });
        }

        materials.push(Material {
            flags,
            alpha_func,
            depth_func,
            src_blend,
            dst_blend,
            alpha_threshold,
            material_class,
            textures,
        });
    }
    Ok(materials)
}

fn parse_anim(reader: &mut SliceReader<'_>) -> Result<Animation> {
    expect_tag(reader, "ANIM")?;
    let _length = reader.read_u32()?;

    let frame_count = reader.read_u16()?;
    let frame_rate = reader.read_u16()?;
    let anim_mode = reader.read_u16()?;
    let flags = reader.read_u32()?;
    let displacement = reader.read_f32()?;
    let mesh_count = reader.read_u16()?;

    let mut meshes = Vec::with_capacity(usize::from(mesh_count));
    for _ in 0..mesh_count {
        let name_len = reader.read_u8()?;
        let mesh_flags = reader.read_u8()?;
        let mut name = reader.read_string(usize::from(name_len))?;
        if name.ends_with('\0') {
            name.pop();
        }

        let mut frames = Vec::with_capacity(usize::from(frame_count));
        for _ in 0..frame_count {
            frames.push(Frame {
                vert_block: reader.read_u16()?,
                index_block: reader.read_u16()?,
                prim_block: reader.read_u16()?,
                mats_block: reader.read_u16()?,
            });
        }
        meshes.push(AnimatedMesh {
            name,
            flags: mesh_flags,
            frames,
        });
    }

    Ok(Animation {
        frame_count,
        frame_rate,
        anim_mode,
        flags,
        displacement,
        meshes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_format_decoding() {
        assert_eq!(decode_vertex_format(1), (1, 1, 0));
        assert_eq!(decode_vertex_format(2), (1, 0, 1));
        assert_eq!(decode_vertex_format(3), (1, 0, 2));
        assert_eq!(decode_vertex_format(10), (1, 1, 1));
        assert_eq!(decode_vertex_format(11), (1, 1, 2));
        assert_eq!(decode_vertex_format(99), (1, 0, 1));
        // Packed form: 1 coord, 1 color set, 2 texture sets.
        let packed = 0x8000_0000 | 0x1 | (0x1 << 8) | (0x2 << 14);
        assert_eq!(decode_vertex_format(packed), (1, 1, 2));
    }

    #[test]
    fn test_bounding_box_union() {
        let mut a = BoundingBox::from_point([0.0, 1.0, 2.0]);
        a.extend([-1.0, 5.0, 0.0]);
        let b = BoundingBox::from_point([3.0, -2.0, 2.5]);
        a.union(&b);
        assert_eq!(a.min, [-1.0, -2.0, 0.0]);
        assert_eq!(a.max, [3.0, 5.0, 2.5]);
    }
}
