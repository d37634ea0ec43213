//! Shadow Atlas
//!
//! One depth-only target split into an N x N grid of square cells, used by
//! single-pass lighting so every shadow can be sampled from one texture.
//!
//! # Sizing
//!
//! The atlas is sized once, when first needed, from the number of shadow
//! casters at that moment: `N = ceil(sqrt(count))` and the side is
//! `cell_resolution * N`. Later growth in caster count does not resize it;
//! casters beyond the cell count go without a shadow for the frame. Only an
//! explicit invalidation (quality or light mode change) drops it.

use glam::Vec2;
use umbra_core::{GraphicsDevice, Rect, RenderTargetDesc, RenderTargetId, Result, TextureId};
use umbra_scene::AtlasRect;

/// Cells along one side for `count` casters
pub fn cells_per_side(count: usize) -> u32 {
    (count.max(1) as f64).sqrt().ceil() as u32
}

#[derive(Debug)]
pub struct ShadowAtlas {
    target: RenderTargetId,
    depth: TextureId,
    cell_resolution: u32,
    cells_per_side: u32,
}

impl ShadowAtlas {
    pub fn allocate(device: &mut dyn GraphicsDevice, cell_resolution: u32, caster_count: usize) -> Result<Self> {
        let cells = cells_per_side(caster_count);
        let size = cell_resolution * cells;
        let target = device.create_render_target(&RenderTargetDesc::depth_only("shadow_atlas", size, size))?;
        let Some(depth) = device.depth_attachment(target) else {
            device.destroy_render_target(target);
            return Err(umbra_core::DeviceError::UnknownRenderTarget(target));
        };
        log::info!(
            "Allocated {}x{} shadow atlas ({}x{} cells of {})",
            size,
            size,
            cells,
            cells,
            cell_resolution
        );
        Ok(Self {
            target,
            depth,
            cell_resolution,
            cells_per_side: cells,
        })
    }

    pub fn release(self, device: &mut dyn GraphicsDevice) {
        log::info!("Released shadow atlas");
        device.destroy_render_target(self.target);
    }

    pub fn target(&self) -> RenderTargetId {
        self.target
    }

    pub fn depth_texture(&self) -> TextureId {
        self.depth
    }

    pub fn cell_resolution(&self) -> u32 {
        self.cell_resolution
    }

    pub fn cells_per_side(&self) -> u32 {
        self.cells_per_side
    }

    pub fn capacity(&self) -> usize {
        (self.cells_per_side * self.cells_per_side) as usize
    }

    pub fn size(&self) -> u32 {
        self.cell_resolution * self.cells_per_side
    }

    /// UV rectangle of cell `index`, `None` past capacity
    pub fn cell_uv(&self, index: usize) -> Option<AtlasRect> {
        if index >= self.capacity() {
            return None;
        }
        let len = self.cells_per_side as f32;
        let column = index as u32 % self.cells_per_side;
        let row = index as u32 / self.cells_per_side;
        Some(AtlasRect {
            offset: Vec2::new(column as f32 / len, row as f32 / len),
            scale: 1.0 / len,
        })
    }

    /// Pixel rectangle of cell `index`, used for viewport and scissor
    pub fn cell_rect(&self, index: usize) -> Option<Rect> {
        if index >= self.capacity() {
            return None;
        }
        let column = index as u32 % self.cells_per_side;
        let row = index as u32 / self.cells_per_side;
        Some(Rect::new(
            column * self.cell_resolution,
            row * self.cell_resolution,
            self.cell_resolution,
            self.cell_resolution,
        ))
    }
}
