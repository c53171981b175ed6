use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};

/// Interleaved vertex: position at attribute 0, RGBA color at attribute 1.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl ColorVertex {
    pub const fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }
}

/// One float vertex attribute inside an interleaved buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: i32,
    pub offset: usize,
}

pub const COLOR_VERTEX_STRIDE: i32 = size_of::<ColorVertex>() as i32;

pub const COLOR_VERTEX_ATTRIBUTES: [VertexAttribute; 2] = [
    VertexAttribute {
        location: 0,
        components: 3,
        offset: offset_of!(ColorVertex, position),
    },
    VertexAttribute {
        location: 1,
        components: 4,
        offset: offset_of!(ColorVertex, color),
    },
];

pub struct MeshData {
    pub vertices: Vec<ColorVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// The editor's test quad: four colored corners, two triangles.
    pub fn colored_quad() -> Self {
        Self {
            vertices: vec![
                ColorVertex::new([0.5, -0.5, 0.0], [1.0, 0.0, 0.0, 1.0]), // bottom right
                ColorVertex::new([-0.5, 0.5, 0.0], [0.0, 1.0, 0.0, 1.0]), // top left
                ColorVertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0, 1.0]),  // top right
                ColorVertex::new([-0.5, -0.5, 0.0], [1.0, 1.0, 0.0, 1.0]), // bottom left
            ],
            // counter-clockwise
            indices: vec![2, 1, 0, 0, 1, 3],
        }
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> i32 {
        i32::try_from(self.indices.len()).unwrap_or(i32::MAX)
    }
}
