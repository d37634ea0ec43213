//! Screen-sized render targets
//!
//! Everything whose size follows the window lives in one [`ScreenTargets`]
//! value. A resize releases the whole set and builds a new one, so no pass
//! can keep using a stale target id.

use umbra_core::{GraphicsDevice, RenderTargetDesc, RenderTargetId, Result, TextureFormat, TextureId};

/// Color formats of the g-buffer: albedo, normal, extra, baked irradiance
pub const GBUFFER_FORMATS: [TextureFormat; 4] = [
    TextureFormat::Rgba32Float,
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rgba16Float,
    TextureFormat::Rgb16Float,
];

/// G-buffer targets copied into the decal snapshot
pub const DECAL_TARGETS: usize = 3;

#[derive(Debug)]
pub struct ScreenTargets {
    width: u32,
    height: u32,
    /// HDR lighting result with depth
    pub illumination: RenderTargetId,
    pub gbuffers: RenderTargetId,
    pub decals: RenderTargetId,
    /// Separable blur pair, the result always ends in `blurred`
    pub blurred: RenderTargetId,
    pub blur_scratch: RenderTargetId,
    /// Post-processing ping/pong pair
    pub ping: RenderTargetId,
    pub pong: RenderTargetId,
}

impl ScreenTargets {
    pub fn create(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<Self> {
        let mut created = Vec::new();
        let result = Self::build(device, width, height, &mut created);
        match &result {
            Ok(_) => log::info!("Created screen targets at {}x{}", width, height),
            Err(_) => {
                for id in created {
                    device.destroy_render_target(id);
                }
            }
        }
        result
    }

    fn build(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        created: &mut Vec<RenderTargetId>,
    ) -> Result<Self> {
        let hdr = [TextureFormat::Rgba32Float];
        let mut make = |desc: RenderTargetDesc| -> Result<RenderTargetId> {
            let id = device.create_render_target(&desc)?;
            created.push(id);
            Ok(id)
        };

        Ok(Self {
            width,
            height,
            illumination: make(RenderTargetDesc::color("illumination", width, height, &hdr).with_depth())?,
            gbuffers: make(RenderTargetDesc::color("gbuffers", width, height, &GBUFFER_FORMATS).with_depth())?,
            decals: make(RenderTargetDesc::color(
                "decals",
                width,
                height,
                &GBUFFER_FORMATS[..DECAL_TARGETS],
            ))?,
            blurred: make(RenderTargetDesc::color("blurred", width, height, &hdr))?,
            blur_scratch: make(RenderTargetDesc::color("blur_scratch", width, height, &hdr))?,
            ping: make(RenderTargetDesc::color("ping", width, height, &hdr))?,
            pong: make(RenderTargetDesc::color("pong", width, height, &hdr))?,
        })
    }

    pub fn release(self, device: &mut dyn GraphicsDevice) {
        for target in [
            self.illumination,
            self.gbuffers,
            self.decals,
            self.blurred,
            self.blur_scratch,
            self.ping,
            self.pong,
        ] {
            device.destroy_render_target(target);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Color attachment `index` of `target`
pub fn color_texture(device: &dyn GraphicsDevice, target: RenderTargetId, index: usize) -> Result<TextureId> {
    device
        .color_attachment(target, index)
        .ok_or(umbra_core::DeviceError::MissingAttachment { target, index })
}

/// Depth attachment of `target`
pub fn depth_texture(device: &dyn GraphicsDevice, target: RenderTargetId) -> Result<TextureId> {
    device
        .depth_attachment(target)
        .ok_or(umbra_core::DeviceError::UnknownRenderTarget(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::HeadlessDevice;

    #[test]
    fn test_create_and_release() {
        let mut device = HeadlessDevice::new(32, 16);
        let targets = ScreenTargets::create(&mut device, 32, 16).unwrap();
        assert_eq!(device.render_target_count(), 7);
        assert_eq!(targets.size(), (32, 16));
        assert!(color_texture(&device, targets.gbuffers, 3).is_ok());
        assert!(color_texture(&device, targets.gbuffers, 4).is_err());
        assert!(depth_texture(&device, targets.illumination).is_ok());

        targets.release(&mut device);
        assert_eq!(device.render_target_count(), 0);
    }

    #[test]
    fn test_failed_create_leaks_nothing() {
        let mut device = HeadlessDevice::new(32, 16);
        assert!(ScreenTargets::create(&mut device, 0, 16).is_err());
        assert_eq!(device.render_target_count(), 0);
    }
}
