//! Vertex format masks, the CPU-side batch vertex, and matching
//! `wgpu::VertexBufferLayout`s.
//!
//! Every merged buffer stores [`BatchVertex`] on the CPU. On upload only the
//! attributes named by the buffer's [`VertexFormatMask`] are packed, in mask
//! bit order, so the stride equals [`VertexFormatMask::vertex_size`].

use std::fmt;

use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

/// Set of vertex attributes present in a buffer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VertexFormatMask(u32);

impl VertexFormatMask {
    pub const POSITION: Self = Self(1 << 0);
    pub const NORMAL: Self = Self(1 << 1);
    pub const TEXCOORD0: Self = Self(1 << 2);
    pub const TEXCOORD1: Self = Self(1 << 3);
    pub const TEXCOORD2: Self = Self(1 << 4);
    pub const COLOR: Self = Self(1 << 5);
    pub const EMISSIVE: Self = Self(1 << 6);
    pub const TANGENT: Self = Self(1 << 7);
    pub const TEXTURE_INDEX: Self = Self(1 << 8);

    /// Every attribute in packing order with its wgpu format.
    const ATTRIBUTES: [(VertexFormatMask, VertexFormat); 9] = [
        (Self::POSITION, VertexFormat::Float32x3),
        (Self::NORMAL, VertexFormat::Float32x3),
        (Self::TEXCOORD0, VertexFormat::Float32x2),
        (Self::TEXCOORD1, VertexFormat::Float32x2),
        (Self::TEXCOORD2, VertexFormat::Float32x2),
        (Self::COLOR, VertexFormat::Unorm8x4),
        (Self::EMISSIVE, VertexFormat::Unorm8x4),
        (Self::TANGENT, VertexFormat::Float32x4),
        (Self::TEXTURE_INDEX, VertexFormat::Uint32),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Packed bytes per vertex.
    pub fn vertex_size(self) -> u64 {
        Self::ATTRIBUTES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, format)| format.size())
            .sum()
    }

    /// Attribute list for a pipeline reading this format. Shader locations
    /// follow mask bit order, skipping absent attributes.
    pub fn attributes(self) -> Vec<VertexAttribute> {
        let mut offset = 0;
        Self::ATTRIBUTES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .enumerate()
            .map(|(location, (_, format))| {
                let attribute = VertexAttribute {
                    format: *format,
                    offset,
                    shader_location: location as u32,
                };
                offset += format.size();
                attribute
            })
            .collect()
    }

    /// Vertex buffer layout borrowing `attributes` (from [`Self::attributes`]).
    pub fn buffer_layout(self, attributes: &[VertexAttribute]) -> VertexBufferLayout<'_> {
        VertexBufferLayout {
            array_stride: self.vertex_size(),
            step_mode: VertexStepMode::Vertex,
            attributes,
        }
    }

    /// Pack `vertices` into the upload layout of this mask.
    pub fn pack(self, vertices: &[BatchVertex]) -> Vec<u8> {
        let mut out = Vec::with_capacity(vertices.len() * self.vertex_size() as usize);
        for v in vertices {
            for (bit, _) in Self::ATTRIBUTES.iter().filter(|(bit, _)| self.contains(*bit)) {
                let bytes: &[u8] = match *bit {
                    Self::POSITION => bytemuck::bytes_of(&v.position),
                    Self::NORMAL => bytemuck::bytes_of(&v.normal),
                    Self::TEXCOORD0 => bytemuck::bytes_of(&v.uv0),
                    Self::TEXCOORD1 => bytemuck::bytes_of(&v.uv1),
                    Self::TEXCOORD2 => bytemuck::bytes_of(&v.uv2),
                    Self::COLOR => bytemuck::bytes_of(&v.color),
                    Self::EMISSIVE => bytemuck::bytes_of(&v.emissive),
                    Self::TANGENT => bytemuck::bytes_of(&v.tangent),
                    _ => bytemuck::bytes_of(&v.texture_index),
                };
                out.extend_from_slice(bytes);
            }
        }
        out
    }
}

impl std::ops::BitOr for VertexFormatMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for VertexFormatMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VertexFormatMask({:#05x})", self.0)
    }
}

/// Superset vertex kept on the CPU for every batched face.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BatchVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv0: [f32; 2],
    /// Normal map coordinates.
    pub uv1: [f32; 2],
    /// Specular map coordinates.
    pub uv2: [f32; 2],
    pub color: [u8; 4],
    /// Glow in alpha.
    pub emissive: [u8; 4],
    pub tangent: [f32; 4],
    /// Slot in the draw's batched texture list.
    pub texture_index: u32,
}

static_assertions::assert_eq_size!(BatchVertex, [u8; 76]);
