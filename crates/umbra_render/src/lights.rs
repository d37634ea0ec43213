//! Light gathering
//!
//! Collects the lights that affect the current view. In deferred mode the
//! directional light is resolved by the full-screen pass, so it is held
//! apart from the list that drives the light-volume pass.

use umbra_scene::{Camera, EntityId, LightType, Scene};

use crate::settings::RenderMode;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GatheredLights {
    /// Lights shaded per surface (forward) or per volume (deferred)
    pub lights: Vec<EntityId>,
    /// Deferred mode only: the last visible directional light
    pub directional: Option<EntityId>,
    /// Visible shadow-casting non-point lights, sizes the atlas
    pub shadow_casters: usize,
}

impl GatheredLights {
    pub fn gather(scene: &Scene, camera: &Camera, mode: RenderMode) -> Self {
        let mut gathered = Self::default();

        for entity in scene.visible_entities() {
            let Some(light) = entity.as_light() else {
                continue;
            };
            if !light.is_visible(&entity.model, camera) {
                continue;
            }
            if light.needs_shadow_map() {
                gathered.shadow_casters += 1;
            }
            if mode == RenderMode::Deferred && light.light_type == LightType::Directional {
                if let Some(previous) = gathered.directional.replace(entity.id) {
                    log::debug!("Directional light {:?} replaced by {:?}", previous, entity.id);
                }
                continue;
            }
            gathered.lights.push(entity.id);
        }

        gathered
    }

    /// Every gathered light, directional last
    pub fn all(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.lights.iter().copied().chain(self.directional)
    }

    pub fn len(&self) -> usize {
        self.lights.len() + self.directional.map_or(0, |_| 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move the directional light into the shaded list, as the forward
    /// overlay after a deferred resolve needs it
    pub fn merge_directional(&mut self) {
        if let Some(directional) = self.directional.take() {
            self.lights.push(directional);
        }
    }
}
