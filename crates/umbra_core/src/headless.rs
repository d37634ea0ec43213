//! Headless Recording Device
//!
//! A [`GraphicsDevice`] without a GPU. Every call is appended to a command
//! log and every draw is captured with a snapshot of the enabled shader's
//! uniforms, which is what pass-sequencing tests assert against.
//!
//! Color attachments keep real texel storage. A draw flat-fills the
//! viewport (clipped by the scissor) of each enabled color attachment with
//! the shader's `u_color` uniform, or white when it has none, through the
//! current blend mode. There is no rasterization and no depth testing;
//! depth attachments track existence and shape only.
//!
//! # Usage
//!
//! ```ignore
//! let mut device = HeadlessDevice::new(64, 64);
//! renderer.render_frame(&mut device, &scene, &camera, &ctx)?;
//! assert_eq!(device.draws_with_shader("shadowmap").count(), 1);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::Vec4;

use crate::device::GraphicsDevice;
use crate::error::{DeviceError, Result};
use crate::resource::{
    BuiltinMesh, ClearMask, CubeFace, FallbackTexture, FilterMode, MeshId, Rect, RenderTargetDesc,
    RenderTargetId, TextureDesc, TextureFormat, TextureId,
};
use crate::state::{BlendMode, CullMode, DepthFunc, FrontFace};
use crate::uniform::UniformValue;

/// Largest surface side accepted by the device
pub const MAX_SURFACE_SIZE: u32 = 16384;

/// One entry of the command log
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    CreateTexture(TextureId),
    DestroyTexture(TextureId),
    CreateRenderTarget(RenderTargetId),
    DestroyRenderTarget(RenderTargetId),
    AttachCubeFace {
        target: RenderTargetId,
        cubemap: TextureId,
        face: CubeFace,
    },
    BindRenderTarget(Option<RenderTargetId>),
    DrawBuffer(Option<usize>),
    Viewport(Rect),
    Scissor(Option<Rect>),
    ColorMask(bool),
    Clear {
        target: Option<RenderTargetId>,
        mask: ClearMask,
        color: Vec4,
    },
    EnableShader(String),
    /// `enable_shader` was called for a shader the device does not have
    MissingShader(String),
    Blend(BlendMode),
    DepthTest(bool),
    DepthFunc(DepthFunc),
    Cull(CullMode),
    FrontFace(FrontFace),
    /// Index into [`HeadlessDevice::draws`]
    Draw(usize),
    Copy {
        src: TextureId,
        dst: TextureId,
    },
    GenerateMipmaps(TextureId),
    Upload(TextureId),
}

/// Everything observable about one draw submission
#[derive(Clone, Debug)]
pub struct DrawRecord {
    pub shader: Option<String>,
    pub mesh: MeshId,
    pub target: Option<RenderTargetId>,
    pub viewport: Rect,
    pub scissor: Option<Rect>,
    pub blend: BlendMode,
    pub depth_test: bool,
    pub depth_func: DepthFunc,
    pub cull: CullMode,
    pub front_face: FrontFace,
    pub color_mask: bool,
    pub uniforms: BTreeMap<String, UniformValue>,
    pub textures: BTreeMap<String, TextureId>,
}

impl DrawRecord {
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn texture(&self, name: &str) -> Option<TextureId> {
        self.textures.get(name).copied()
    }
}

struct TextureSlot {
    desc: TextureDesc,
    faces: Vec<Option<Vec<f32>>>,
    mip_generations: u32,
}

struct TargetSlot {
    desc: RenderTargetDesc,
    color: Vec<(TextureId, usize)>,
    depth: Option<TextureId>,
    owned: Vec<TextureId>,
}

#[derive(Default)]
struct ProgramState {
    uniforms: BTreeMap<String, UniformValue>,
    textures: BTreeMap<String, TextureId>,
}

/// GPU-less device that records commands and keeps color texels in memory
pub struct HeadlessDevice {
    width: u32,
    height: u32,
    next_id: u32,
    textures: HashMap<TextureId, TextureSlot>,
    targets: HashMap<RenderTargetId, TargetSlot>,
    meshes: HashMap<MeshId, u32>,
    builtin: [MeshId; 3],
    fallback: [TextureId; 3],
    backbuffer: TextureId,
    missing_shaders: HashSet<String>,
    programs: HashMap<String, ProgramState>,
    shader: Option<String>,
    bound: Option<RenderTargetId>,
    draw_buffer: Option<usize>,
    viewport: Rect,
    scissor: Option<Rect>,
    color_mask: bool,
    blend: BlendMode,
    depth_test: bool,
    depth_func: DepthFunc,
    cull: CullMode,
    front_face: FrontFace,
    commands: Vec<DeviceCommand>,
    draws: Vec<DrawRecord>,
    errors: Vec<String>,
}

impl HeadlessDevice {
    /// Create a device whose default framebuffer is `width` x `height`
    pub fn new(width: u32, height: u32) -> Self {
        let mut device = Self {
            width,
            height,
            next_id: 1,
            textures: HashMap::new(),
            targets: HashMap::new(),
            meshes: HashMap::new(),
            builtin: [MeshId(0); 3],
            fallback: [TextureId(0); 3],
            backbuffer: TextureId(0),
            missing_shaders: HashSet::new(),
            programs: HashMap::new(),
            shader: None,
            bound: None,
            draw_buffer: None,
            viewport: Rect::full(width, height),
            scissor: None,
            color_mask: true,
            blend: BlendMode::Disabled,
            depth_test: true,
            depth_func: DepthFunc::Less,
            cull: CullMode::Back,
            front_face: FrontFace::Ccw,
            commands: Vec::new(),
            draws: Vec::new(),
            errors: Vec::new(),
        };

        device.builtin = [
            device.create_mesh(6),
            device.create_mesh(2880),
            device.create_mesh(36),
        ];

        for (i, kind) in [FallbackTexture::White, FallbackTexture::Black, FallbackTexture::Green]
            .iter()
            .enumerate()
        {
            let id = device.insert_texture(TextureDesc::new_2d(
                format!("fallback_{:?}", kind).to_lowercase(),
                1,
                1,
                TextureFormat::Rgba8Unorm,
            ));
            if let Some(slot) = device.textures.get_mut(&id) {
                slot.faces[0] = Some(kind.rgba().to_vec());
            }
            device.fallback[i] = id;
        }

        device.backbuffer = device.insert_texture(TextureDesc::new_2d(
            "backbuffer",
            width,
            height,
            TextureFormat::Rgba8Unorm,
        ));

        device
    }

    /// Pretend the named shader failed to load
    pub fn with_missing_shader(mut self, name: &str) -> Self {
        self.missing_shaders.insert(name.to_string());
        self
    }

    /// Register a geometry buffer with the given vertex count
    pub fn create_mesh(&mut self, vertex_count: u32) -> MeshId {
        let id = MeshId(self.alloc_id());
        self.meshes.insert(id, vertex_count);
        id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Color texture behind the default framebuffer
    pub fn backbuffer(&self) -> TextureId {
        self.backbuffer
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn draws_with_shader<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DrawRecord> + 'a {
        self.draws
            .iter()
            .filter(move |d| d.shader.as_deref() == Some(name))
    }

    /// Forget recorded commands and draws, keeping all resources
    pub fn reset_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    /// Live textures, including attachments and the device's own fallbacks
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn render_target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn render_target_desc(&self, target: RenderTargetId) -> Option<&RenderTargetDesc> {
        self.targets.get(&target).map(|t| &t.desc)
    }

    /// Render targets whose depth attachment has the given side length
    pub fn depth_targets_with_size(&self, size: u32) -> usize {
        self.targets
            .values()
            .filter(|t| t.desc.depth.is_some() && t.desc.color.is_empty())
            .filter(|t| t.desc.width == size && t.desc.height == size)
            .count()
    }

    pub fn mipmap_generations(&self, texture: TextureId) -> u32 {
        self.textures
            .get(&texture)
            .map(|t| t.mip_generations)
            .unwrap_or(0)
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_texture(&mut self, desc: TextureDesc) -> TextureId {
        let id = TextureId(self.alloc_id());
        let faces = vec![None; desc.kind.layers()];
        self.textures.insert(
            id,
            TextureSlot {
                desc,
                faces,
                mip_generations: 0,
            },
        );
        id
    }

    fn validate_size(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || width > MAX_SURFACE_SIZE || height > MAX_SURFACE_SIZE {
            return Err(DeviceError::InvalidSize { width, height });
        }
        Ok(())
    }

    fn program(&mut self) -> Option<&mut ProgramState> {
        let name = self.shader.as_ref()?;
        self.programs.get_mut(name)
    }

    fn color_outputs(&self) -> Vec<(TextureId, usize)> {
        let all = match self.bound {
            None => vec![(self.backbuffer, 0)],
            Some(target) => match self.targets.get(&target) {
                Some(slot) => slot.color.clone(),
                None => Vec::new(),
            },
        };
        match self.draw_buffer {
            Some(index) => all.into_iter().skip(index).take(1).collect(),
            None => all,
        }
    }

    fn write_rect(&mut self, texture: TextureId, face: usize, rect: Rect, color: [f32; 4], blend: BlendMode) {
        let Some(slot) = self.textures.get_mut(&texture) else {
            return;
        };
        if slot.desc.format.is_depth() || face >= slot.faces.len() {
            return;
        }

        let width = slot.desc.width;
        let height = slot.desc.height;
        let channels = slot.desc.format.channels();
        let clamp = !slot.desc.format.is_float();
        let len = slot.desc.face_len();
        let data = slot.faces[face].get_or_insert_with(|| vec![0.0; len]);

        let x_end = (rect.x + rect.width).min(width);
        let y_end = (rect.y + rect.height).min(height);
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                let base = (y as usize * width as usize + x as usize) * channels;
                let mut dst = [0.0, 0.0, 0.0, 1.0];
                dst[..channels].copy_from_slice(&data[base..base + channels]);
                let out = blend.apply(color, dst);
                for c in 0..channels {
                    data[base + c] = if clamp { out[c].clamp(0.0, 1.0) } else { out[c] };
                }
            }
        }
    }

    fn texture_slot(&self, texture: TextureId) -> Result<&TextureSlot> {
        self.textures
            .get(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        Self::validate_size(desc.width, desc.height)?;
        let id = self.insert_texture(desc.clone());
        self.commands.push(DeviceCommand::CreateTexture(id));
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.commands.push(DeviceCommand::DestroyTexture(texture));
        } else {
            log::debug!("Headless: destroy of unknown texture {:?}", texture);
        }
    }

    fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&texture).map(|t| &t.desc)
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetId> {
        Self::validate_size(desc.width, desc.height)?;

        let mut owned = Vec::with_capacity(desc.color.len() + 1);
        let mut color = Vec::with_capacity(desc.color.len());
        for (i, format) in desc.color.iter().enumerate() {
            let id = self.insert_texture(TextureDesc::new_2d(
                format!("{}_color{}", desc.label, i),
                desc.width,
                desc.height,
                *format,
            ));
            owned.push(id);
            color.push((id, 0));
        }
        let depth = desc.depth.map(|format| {
            let id = self.insert_texture(TextureDesc::new_2d(
                format!("{}_depth", desc.label),
                desc.width,
                desc.height,
                format,
            ));
            owned.push(id);
            id
        });

        let id = RenderTargetId(self.alloc_id());
        self.targets.insert(
            id,
            TargetSlot {
                desc: desc.clone(),
                color,
                depth,
                owned,
            },
        );
        self.commands.push(DeviceCommand::CreateRenderTarget(id));
        Ok(id)
    }

    fn destroy_render_target(&mut self, target: RenderTargetId) {
        let Some(slot) = self.targets.remove(&target) else {
            log::debug!("Headless: destroy of unknown render target {:?}", target);
            return;
        };
        for texture in slot.owned {
            self.textures.remove(&texture);
        }
        if self.bound == Some(target) {
            self.bound = None;
        }
        self.commands.push(DeviceCommand::DestroyRenderTarget(target));
    }

    fn color_attachment(&self, target: RenderTargetId, index: usize) -> Option<TextureId> {
        self.targets.get(&target)?.color.get(index).map(|(t, _)| *t)
    }

    fn depth_attachment(&self, target: RenderTargetId) -> Option<TextureId> {
        self.targets.get(&target)?.depth
    }

    fn attach_cube_face(&mut self, target: RenderTargetId, cubemap: TextureId, face: CubeFace) -> Result<()> {
        let layers = self.texture_slot(cubemap)?.faces.len();
        if face.index() >= layers {
            return Err(DeviceError::FaceOutOfRange {
                texture: cubemap,
                face: face.index(),
            });
        }
        let slot = self
            .targets
            .get_mut(&target)
            .ok_or(DeviceError::UnknownRenderTarget(target))?;
        match slot.color.first_mut() {
            Some(attachment) => *attachment = (cubemap, face.index()),
            None => slot.color.push((cubemap, face.index())),
        }
        self.commands.push(DeviceCommand::AttachCubeFace {
            target,
            cubemap,
            face,
        });
        Ok(())
    }

    fn bind_render_target(&mut self, target: Option<RenderTargetId>) {
        if let Some(id) = target {
            if !self.targets.contains_key(&id) {
                self.errors.push(format!("bind of unknown render target {:?}", id));
            }
        }
        self.bound = target;
        self.draw_buffer = None;
        self.commands.push(DeviceCommand::BindRenderTarget(target));
    }

    fn set_draw_buffer(&mut self, buffer: Option<usize>) {
        self.draw_buffer = buffer;
        self.commands.push(DeviceCommand::DrawBuffer(buffer));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
        self.commands.push(DeviceCommand::Viewport(rect));
    }

    fn set_scissor(&mut self, rect: Option<Rect>) {
        self.scissor = rect;
        self.commands.push(DeviceCommand::Scissor(rect));
    }

    fn set_color_mask(&mut self, write_color: bool) {
        self.color_mask = write_color;
        self.commands.push(DeviceCommand::ColorMask(write_color));
    }

    fn clear(&mut self, mask: ClearMask, color: Vec4) {
        self.commands.push(DeviceCommand::Clear {
            target: self.bound,
            mask,
            color,
        });
        if !mask.color || !self.color_mask {
            return;
        }
        for (texture, face) in self.color_outputs() {
            let Some(desc) = self.texture_desc(texture) else {
                continue;
            };
            let full = Rect::full(desc.width, desc.height);
            let rect = match self.scissor {
                Some(scissor) => match full.intersect(&scissor) {
                    Some(r) => r,
                    None => continue,
                },
                None => full,
            };
            self.write_rect(texture, face, rect, color.to_array(), BlendMode::Disabled);
        }
    }

    fn enable_shader(&mut self, name: &str) -> bool {
        if self.missing_shaders.contains(name) {
            self.shader = None;
            self.commands.push(DeviceCommand::MissingShader(name.to_string()));
            return false;
        }
        self.programs.entry(name.to_string()).or_default();
        self.shader = Some(name.to_string());
        self.commands.push(DeviceCommand::EnableShader(name.to_string()));
        true
    }

    fn disable_shader(&mut self) {
        self.shader = None;
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match self.program() {
            Some(program) => {
                program.uniforms.insert(name.to_string(), value);
            }
            None => self.errors.push(format!("uniform {} set with no shader enabled", name)),
        }
    }

    fn set_texture(&mut self, name: &str, texture: TextureId, _slot: u32) {
        if !self.textures.contains_key(&texture) {
            self.errors.push(format!("texture {} bound to unknown {:?}", name, texture));
        }
        match self.program() {
            Some(program) => {
                program.textures.insert(name.to_string(), texture);
            }
            None => self.errors.push(format!("texture {} set with no shader enabled", name)),
        }
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
        self.commands.push(DeviceCommand::Blend(mode));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
        self.commands.push(DeviceCommand::DepthTest(enabled));
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.depth_func = func;
        self.commands.push(DeviceCommand::DepthFunc(func));
    }

    fn set_cull(&mut self, mode: CullMode) {
        self.cull = mode;
        self.commands.push(DeviceCommand::Cull(mode));
    }

    fn set_front_face(&mut self, face: FrontFace) {
        self.front_face = face;
        self.commands.push(DeviceCommand::FrontFace(face));
    }

    fn draw_mesh(&mut self, mesh: MeshId) {
        if !self.meshes.contains_key(&mesh) {
            self.errors.push(format!("draw of unknown mesh {:?}", mesh));
        }
        if self.shader.is_none() {
            self.errors.push(format!("draw of {:?} with no shader enabled", mesh));
        }

        let (uniforms, textures) = match self.shader.as_ref().and_then(|s| self.programs.get(s)) {
            Some(program) => (program.uniforms.clone(), program.textures.clone()),
            None => (BTreeMap::new(), BTreeMap::new()),
        };
        let color = uniforms
            .get("u_color")
            .and_then(UniformValue::as_vec4)
            .unwrap_or(Vec4::ONE)
            .to_array();

        let index = self.draws.len();
        self.draws.push(DrawRecord {
            shader: self.shader.clone(),
            mesh,
            target: self.bound,
            viewport: self.viewport,
            scissor: self.scissor,
            blend: self.blend,
            depth_test: self.depth_test,
            depth_func: self.depth_func,
            cull: self.cull,
            front_face: self.front_face,
            color_mask: self.color_mask,
            uniforms,
            textures,
        });
        self.commands.push(DeviceCommand::Draw(index));

        if !self.color_mask {
            return;
        }
        let rect = match self.scissor {
            Some(scissor) => match self.viewport.intersect(&scissor) {
                Some(r) => r,
                None => return,
            },
            None => self.viewport,
        };
        let blend = self.blend;
        for (texture, face) in self.color_outputs() {
            self.write_rect(texture, face, rect, color, blend);
        }
    }

    fn builtin_mesh(&self, kind: BuiltinMesh) -> MeshId {
        match kind {
            BuiltinMesh::Quad => self.builtin[0],
            BuiltinMesh::Sphere => self.builtin[1],
            BuiltinMesh::Cube => self.builtin[2],
        }
    }

    fn fallback_texture(&self, kind: FallbackTexture) -> TextureId {
        match kind {
            FallbackTexture::White => self.fallback[0],
            FallbackTexture::Black => self.fallback[1],
            FallbackTexture::Green => self.fallback[2],
        }
    }

    fn copy_texture(&mut self, src: TextureId, dst: TextureId) -> Result<()> {
        let (src_desc, src_faces) = {
            let slot = self.texture_slot(src)?;
            (slot.desc.clone(), slot.faces.clone())
        };
        let dst_slot = self
            .textures
            .get_mut(&dst)
            .ok_or(DeviceError::UnknownTexture(dst))?;
        if src_desc.face_len() != dst_slot.desc.face_len() || src_faces.len() != dst_slot.faces.len() {
            return Err(DeviceError::SizeMismatch {
                expected: dst_slot.desc.face_len(),
                actual: src_desc.face_len(),
            });
        }
        if !dst_slot.desc.format.is_depth() {
            dst_slot.faces = src_faces;
        }
        self.commands.push(DeviceCommand::Copy { src, dst });
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<()> {
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;
        slot.mip_generations += 1;
        self.commands.push(DeviceCommand::GenerateMipmaps(texture));
        Ok(())
    }

    fn set_filter(&mut self, texture: TextureId, filter: FilterMode) -> Result<()> {
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;
        slot.desc.filter = filter;
        Ok(())
    }

    fn read_pixels(&self, texture: TextureId, face: usize) -> Result<Vec<f32>> {
        let slot = self.texture_slot(texture)?;
        if slot.desc.format.is_depth() {
            return Err(DeviceError::NotReadable(texture));
        }
        let data = slot
            .faces
            .get(face)
            .ok_or(DeviceError::FaceOutOfRange { texture, face })?;
        Ok(match data {
            Some(texels) => texels.clone(),
            None => vec![0.0; slot.desc.face_len()],
        })
    }

    fn upload_texture(&mut self, texture: TextureId, face: usize, data: &[f32]) -> Result<()> {
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;
        if slot.desc.format.is_depth() {
            return Err(DeviceError::NotReadable(texture));
        }
        let expected = slot.desc.face_len();
        if data.len() != expected {
            return Err(DeviceError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let layer = slot
            .faces
            .get_mut(face)
            .ok_or(DeviceError::FaceOutOfRange { texture, face })?;
        *layer = Some(data.to_vec());
        self.commands.push(DeviceCommand::Upload(texture));
        Ok(())
    }

    fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_and_read_back() {
        let mut device = HeadlessDevice::new(4, 4);
        let target = device
            .create_render_target(&RenderTargetDesc::color("rt", 4, 4, &[TextureFormat::Rgba32Float]))
            .unwrap();
        device.bind_render_target(Some(target));
        device.clear(ClearMask::COLOR, Vec4::new(0.5, 0.25, 0.0, 1.0));

        let color = device.color_attachment(target, 0).unwrap();
        let texels = device.read_pixels(color, 0).unwrap();
        assert_eq!(texels.len(), 4 * 4 * 4);
        assert!((texels[0] - 0.5).abs() < 0.001);
        assert!((texels[1] - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_draw_fills_viewport_with_color_uniform() {
        let mut device = HeadlessDevice::new(4, 4);
        let target = device
            .create_render_target(&RenderTargetDesc::color("rt", 4, 4, &[TextureFormat::Rgba32Float]))
            .unwrap();
        device.bind_render_target(Some(target));
        device.clear(ClearMask::COLOR, Vec4::ZERO);
        device.set_viewport(Rect::new(0, 0, 2, 4));
        assert!(device.enable_shader("flat"));
        device.set_uniform("u_color", Vec4::new(1.0, 0.0, 0.0, 1.0).into());
        let quad = device.builtin_mesh(BuiltinMesh::Quad);
        device.draw_mesh(quad);

        let texels = device
            .read_pixels(device.color_attachment(target, 0).unwrap(), 0)
            .unwrap();
        assert!((texels[0] - 1.0).abs() < 0.001);
        // Column 3 is outside the viewport
        assert!(texels[3 * 4].abs() < 0.001);
        assert_eq!(device.draws().len(), 1);
        assert!(device.take_errors().is_empty());
    }

    #[test]
    fn test_single_draw_buffer() {
        let mut device = HeadlessDevice::new(2, 2);
        let target = device
            .create_render_target(&RenderTargetDesc::color(
                "gbuffers",
                2,
                2,
                &[TextureFormat::Rgba8Unorm, TextureFormat::Rgba8Unorm],
            ))
            .unwrap();
        device.bind_render_target(Some(target));
        device.set_draw_buffer(Some(1));
        device.clear(ClearMask::COLOR, Vec4::ONE);

        let first = device.read_pixels(device.color_attachment(target, 0).unwrap(), 0).unwrap();
        let second = device.read_pixels(device.color_attachment(target, 1).unwrap(), 0).unwrap();
        assert!(first.iter().all(|v| *v == 0.0));
        assert!(second.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_missing_shader() {
        let mut device = HeadlessDevice::new(2, 2).with_missing_shader("fxaa");
        assert!(!device.enable_shader("fxaa"));
        assert!(device.enable_shader("hdr"));
        assert!(device
            .commands()
            .contains(&DeviceCommand::MissingShader("fxaa".to_string())));
    }

    #[test]
    fn test_destroy_target_releases_attachments() {
        let mut device = HeadlessDevice::new(2, 2);
        let before = device.texture_count();
        let target = device
            .create_render_target(&RenderTargetDesc::depth_only("shadow", 1024, 1024))
            .unwrap();
        assert_eq!(device.texture_count(), before + 1);
        assert_eq!(device.depth_targets_with_size(1024), 1);

        device.destroy_render_target(target);
        assert_eq!(device.texture_count(), before);
        assert_eq!(device.render_target_count(), 0);
    }

    #[test]
    fn test_invalid_size() {
        let mut device = HeadlessDevice::new(2, 2);
        let err = device
            .create_texture(&TextureDesc::new_2d("bad", 0, 4, TextureFormat::R8Unorm))
            .unwrap_err();
        assert_eq!(err, DeviceError::InvalidSize { width: 0, height: 4 });
    }

    #[test]
    fn test_cube_face_attachment() {
        let mut device = HeadlessDevice::new(2, 2);
        let cubemap = device
            .create_texture(&TextureDesc::cubemap("probe", 2, TextureFormat::Rgb8Unorm))
            .unwrap();
        let target = device
            .create_render_target(&RenderTargetDesc::color("capture", 2, 2, &[TextureFormat::Rgb8Unorm]))
            .unwrap();
        device
            .attach_cube_face(target, cubemap, CubeFace::NegativeY)
            .unwrap();
        device.bind_render_target(Some(target));
        device.clear(ClearMask::COLOR, Vec4::new(0.0, 1.0, 0.0, 1.0));

        let face = device.read_pixels(cubemap, CubeFace::NegativeY.index()).unwrap();
        assert!((face[1] - 1.0).abs() < 0.001);
        let other = device.read_pixels(cubemap, 0).unwrap();
        assert!(other.iter().all(|v| *v == 0.0));
    }
}
