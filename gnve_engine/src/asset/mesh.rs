//! CPU-side mesh data and index widening

use bytemuck::{Pod, Zeroable};

use super::import_error::ImportError;
use crate::bindless::TextureSlot;

/// Interleaved vertex as consumed by the forward pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Byte stride of one vertex in the vertex buffer
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;
    /// Byte offset of `uv`
    pub const UV_OFFSET: u32 = 12;
}

/// One imported mesh: all primitives merged into a single vertex/index pair
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub texture_slot: TextureSlot,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Index data as stored in the source accessor
#[derive(Debug, Clone, PartialEq)]
pub enum SourceIndices {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl SourceIndices {
    pub fn len(&self) -> usize {
        match self {
            SourceIndices::U8(v) => v.len(),
            SourceIndices::U16(v) => v.len(),
            SourceIndices::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest index, `None` when empty
    pub fn max_index(&self) -> Option<u32> {
        match self {
            SourceIndices::U8(v) => v.iter().copied().max().map(u32::from),
            SourceIndices::U16(v) => v.iter().copied().max().map(u32::from),
            SourceIndices::U32(v) => v.iter().copied().max(),
        }
    }
}

impl From<gltf::mesh::util::ReadIndices<'_>> for SourceIndices {
    fn from(indices: gltf::mesh::util::ReadIndices<'_>) -> Self {
        use gltf::mesh::util::ReadIndices;
        match indices {
            ReadIndices::U8(iter) => SourceIndices::U8(iter.collect()),
            ReadIndices::U16(iter) => SourceIndices::U16(iter.collect()),
            ReadIndices::U32(iter) => SourceIndices::U32(iter.collect()),
        }
    }
}

/// Widen to 32 bits and offset by `vertex_base`, keeping order
///
/// Fails when an offset index no longer fits in 32 bits.
pub fn widen_indices(indices: &SourceIndices, vertex_base: u32) -> Result<Vec<u32>, ImportError> {
    let offset = |i: u32| {
        i.checked_add(vertex_base).ok_or_else(|| {
            ImportError::MalformedDocument(format!("index {} overflows past vertex base {}", i, vertex_base))
        })
    };
    match indices {
        SourceIndices::U8(v) => v.iter().map(|&i| offset(u32::from(i))).collect(),
        SourceIndices::U16(v) => v.iter().map(|&i| offset(u32::from(i))).collect(),
        SourceIndices::U32(v) => v.iter().map(|&i| offset(i)).collect(),
    }
}
