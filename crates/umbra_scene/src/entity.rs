//! Tagged-variant scene entities
//!
//! Every entity carries the shared placement data (name, model matrix,
//! visibility) and one [`EntityKind`] with the data only that kind needs.
//! Passes dispatch on the kind with `match`, so adding a kind is checked by
//! the compiler everywhere it matters.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::light::LightEntity;
use crate::prefab::Prefab;
use crate::probe::{DecalEntity, IrradianceGrid, Probe, ReflectionProbeEntity};

/// Position of an entity in its scene, stable for the scene's lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Kind-specific entity data
#[derive(Debug)]
pub enum EntityKind {
    Prefab(Prefab),
    Light(LightEntity),
    /// A standalone irradiance probe outside any grid
    Probe(Probe),
    IrradianceGrid(IrradianceGrid),
    ReflectionProbe(ReflectionProbeEntity),
    Decal(DecalEntity),
}

impl EntityKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Prefab(_) => "prefab",
            Self::Light(_) => "light",
            Self::Probe(_) => "probe",
            Self::IrradianceGrid(_) => "irradiance_grid",
            Self::ReflectionProbe(_) => "reflection_probe",
            Self::Decal(_) => "decal",
        }
    }
}

#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    /// Local-to-world transform
    pub model: Mat4,
    pub visible: bool,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(name: impl Into<String>, model: Mat4, kind: EntityKind) -> Self {
        Self {
            id: EntityId(0),
            name: name.into(),
            model,
            visible: true,
            kind,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn as_light(&self) -> Option<&LightEntity> {
        match &self.kind {
            EntityKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut LightEntity> {
        match &mut self.kind {
            EntityKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_grid_mut(&mut self) -> Option<&mut IrradianceGrid> {
        match &mut self.kind {
            EntityKind::IrradianceGrid(grid) => Some(grid),
            _ => None,
        }
    }

    pub fn as_reflection_probe(&self) -> Option<&ReflectionProbeEntity> {
        match &self.kind {
            EntityKind::ReflectionProbe(probe) => Some(probe),
            _ => None,
        }
    }
}
