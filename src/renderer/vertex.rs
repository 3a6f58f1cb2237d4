//! GPU data for portal view passes (must match shader)

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec2};

use crate::math::Line;

/// Cut lines a single pass can carry
pub const MAX_CUT_LINES: usize = 16;

/// Stencil mask vertex, normalized device coordinates
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct StencilVertex {
    pub position: [f32; 2],
}

impl StencilVertex {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { position: [x, y] }
    }
}

/// One cut line, keeping fragments left of `a -> b`
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ClipLineGpu {
    pub a: [f32; 2],
    pub b: [f32; 2],
}

impl From<Line> for ClipLineGpu {
    fn from(line: Line) -> Self {
        Self {
            a: line.a.to_array(),
            b: line.b.to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CutLines {
    pub lines: [ClipLineGpu; MAX_CUT_LINES], // offset 0
    pub count: u32,                          // offset 256
    pub _pad: [u32; 3],                      // pad to 272 bytes
}

impl CutLines {
    /// Pack `lines`, dropping any past `MAX_CUT_LINES`
    pub fn new(lines: &[Line]) -> Self {
        if lines.len() > MAX_CUT_LINES {
            log::warn!(
                "{} cut lines in one pass, dropping {}",
                lines.len(),
                lines.len() - MAX_CUT_LINES
            );
        }
        let mut block = Self::zeroed();
        for (slot, line) in block.lines.iter_mut().zip(lines) {
            *slot = (*line).into();
        }
        block.count = lines.len().min(MAX_CUT_LINES) as u32;
        block
    }

    pub fn iter(&self) -> impl Iterator<Item = Line> + '_ {
        self.lines[..self.count as usize]
            .iter()
            .map(|l| Line::new(Vec2::from_array(l.a), Vec2::from_array(l.b)))
    }
}

/// Per-pass uniform block
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    /// World to clip space, column-major with std140 column padding
    pub view: [[f32; 4]; 3], // offset 0
    pub cut: CutLines,       // offset 48
}

impl ViewUniforms {
    pub fn new(view: Mat3, cut: CutLines) -> Self {
        Self {
            view: [
                view.x_axis.extend(0.0).to_array(),
                view.y_axis.extend(0.0).to_array(),
                view.z_axis.extend(0.0).to_array(),
            ],
            cut,
        }
    }

    pub fn view_matrix(&self) -> Mat3 {
        Mat3::from_cols_array(&[
            self.view[0][0],
            self.view[0][1],
            self.view[0][2],
            self.view[1][0],
            self.view[1][1],
            self.view[1][2],
            self.view[2][0],
            self.view[2][1],
            self.view[2][2],
        ])
    }
}
