//! Scene container
//!
//! Owns the ordered entity list and the asset store. Iteration order is
//! insertion order and never changes within the scene's lifetime, which
//! keeps draw-call building, light gathering and atlas assignment
//! deterministic from one frame to the next.

use glam::{Mat4, Vec3, Vec4};
use umbra_core::{GraphicsDevice, TextureId};

use crate::assets::Assets;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::light::LightEntity;

pub struct Scene {
    pub background_color: Vec4,
    /// sRGB ambient term, linearized at upload
    pub ambient_light: Vec3,
    /// Skybox cubemap
    pub environment: Option<TextureId>,
    pub assets: Assets,
    entities: Vec<Entity>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            background_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            ambient_light: Vec3::splat(0.1),
            environment: None,
            assets: Assets::new(),
            entities: Vec::new(),
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity and assign it the next id
    pub fn add_entity(&mut self, mut entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        entity.id = id;
        log::trace!("Scene: added {} '{}' as {:?}", entity.kind.type_name(), entity.name, id);
        self.entities.push(entity);
        id
    }

    /// Shorthand for adding a light placed by `model`
    pub fn add_light(&mut self, name: impl Into<String>, model: Mat4, light: LightEntity) -> EntityId {
        self.add_entity(Entity::new(name, model, EntityKind::Light(light)))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0 as usize)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0 as usize)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn visible_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.visible)
    }

    /// Light by id, `None` for other kinds
    pub fn light(&self, id: EntityId) -> Option<&LightEntity> {
        self.entity(id)?.as_light()
    }

    /// Release every device resource held by entities
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for entity in &mut self.entities {
            match &mut entity.kind {
                EntityKind::Light(light) => light.release_shadow_map(device),
                EntityKind::ReflectionProbe(probe) => probe.release(device),
                _ => {}
            }
        }
    }
}
