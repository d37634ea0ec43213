//! Draw-call list
//!
//! Prefab hierarchies are flattened into [`RenderCall`]s once per frame and
//! then sorted: alpha mode ascending (opaque, masked, blended), and within a
//! mode back to front by camera distance. `sort_by` is stable and the
//! comparator uses `total_cmp`, so the order is a strict weak ordering even
//! when a distance is NaN.

use std::cmp::Ordering;

use glam::{Mat4, Vec3};
use umbra_scene::{
    Aabb, AlphaMode, Camera, EntityId, EntityKind, MaterialHandle, MeshHandle, Node, Scene,
};

use crate::settings::TransformComposition;

/// One mesh + material + transform unit of work
#[derive(Clone, Debug, PartialEq)]
pub struct RenderCall {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    /// Local-to-world transform
    pub model: Mat4,
    pub world_bounds: Aabb,
    pub alpha_mode: AlphaMode,
    /// Distance from the world bounds center to the camera eye
    pub camera_distance: f32,
    /// Nearest reflection probe at build time
    pub reflection_probe: Option<EntityId>,
}

impl RenderCall {
    pub fn position(&self) -> Vec3 {
        self.model.w_axis.truncate()
    }

    pub fn is_blended(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }
}

/// Ordering used for the draw-call list
pub fn compare_calls(a: &RenderCall, b: &RenderCall) -> Ordering {
    a.alpha_mode
        .cmp(&b.alpha_mode)
        .then_with(|| b.camera_distance.total_cmp(&a.camera_distance))
}

/// Result of flattening the scene
#[derive(Clone, Debug, Default)]
pub struct RenderCallList {
    pub calls: Vec<RenderCall>,
    /// Nodes with a mesh and material that could not be drawn
    pub skipped: u32,
}

impl RenderCallList {
    /// Walk every visible prefab entity and build the sorted list
    pub fn build(scene: &Scene, camera: &Camera, composition: TransformComposition) -> Self {
        let mut list = Self::default();

        for entity in scene.visible_entities() {
            if let EntityKind::Prefab(prefab) = &entity.kind {
                list.add_node(scene, &prefab.root, &entity.model, &entity.model, composition);
            }
        }

        let probes: Vec<(EntityId, Vec3)> = scene
            .visible_entities()
            .filter(|e| matches!(e.kind, EntityKind::ReflectionProbe(_)))
            .map(|e| (e.id, e.model.w_axis.truncate()))
            .collect();

        for call in &mut list.calls {
            call.camera_distance = call.world_bounds.center().distance(camera.eye);
            call.reflection_probe = nearest_probe(&probes, call.position());
        }

        list.calls.sort_by(compare_calls);
        log::trace!(
            "Built {} render calls ({} skipped)",
            list.calls.len(),
            list.skipped
        );
        list
    }

    fn add_node(
        &mut self,
        scene: &Scene,
        node: &Node,
        root: &Mat4,
        parent: &Mat4,
        composition: TransformComposition,
    ) {
        if !node.visible {
            return;
        }

        let base = match composition {
            TransformComposition::RootOnly => root,
            TransformComposition::Accumulated => parent,
        };
        let world = *base * node.local;

        if let (Some(mesh), Some(material)) = (node.mesh, node.material) {
            self.add_call(scene, mesh, material, world, &node.name);
        }

        for child in &node.children {
            self.add_node(scene, child, root, &world, composition);
        }
    }

    fn add_call(&mut self, scene: &Scene, mesh: MeshHandle, material: MaterialHandle, model: Mat4, name: &str) {
        let (Some(mesh_data), Some(material_data)) = (scene.assets.mesh(mesh), scene.assets.material(material))
        else {
            log::debug!("Node '{}' references a missing mesh or material, skipped", name);
            self.skipped += 1;
            return;
        };
        if mesh_data.vertex_count == 0 {
            log::debug!("Node '{}' has an empty mesh, skipped", name);
            self.skipped += 1;
            return;
        }

        self.calls.push(RenderCall {
            mesh,
            material,
            model,
            world_bounds: mesh_data.bounds.transform(&model),
            alpha_mode: material_data.alpha_mode,
            camera_distance: 0.0,
            reflection_probe: None,
        });
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

fn nearest_probe(probes: &[(EntityId, Vec3)], position: Vec3) -> Option<EntityId> {
    probes
        .iter()
        .min_by(|a, b| {
            a.1.distance_squared(position)
                .total_cmp(&b.1.distance_squared(position))
        })
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::MeshId;
    use umbra_scene::{Entity, Material, Mesh, Prefab, ReflectionProbeEntity};

    fn unit_mesh(scene: &mut Scene) -> MeshHandle {
        scene.assets.add_mesh(Mesh::new(
            "cube",
            MeshId(1),
            36,
            Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
        ))
    }

    fn camera_at_origin() -> Camera {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 1000.0);
        camera.look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        camera
    }

    fn add_prefab(scene: &mut Scene, root: Node, model: Mat4) -> EntityId {
        scene.add_entity(Entity::new("prefab", model, EntityKind::Prefab(Prefab::new("p", root))))
    }

    #[test]
    fn test_sort_alpha_mode_then_back_to_front() {
        let mut scene = Scene::new();
        let mesh = unit_mesh(&mut scene);
        let opaque = scene.assets.add_material(Material::default());
        let blended = scene
            .assets
            .add_material(Material::default().with_alpha_mode(AlphaMode::Blend));

        let mut root = Node::new("root");
        for (z, material) in [(-5.0, blended), (-20.0, opaque), (-30.0, blended), (-10.0, opaque)] {
            root = root.with_child(
                Node::new("n")
                    .with_local(Mat4::from_translation(Vec3::new(0.0, 0.0, z)))
                    .with_mesh(mesh, material),
            );
        }
        add_prefab(&mut scene, root, Mat4::IDENTITY);

        let list = RenderCallList::build(&scene, &camera_at_origin(), TransformComposition::RootOnly);
        let order: Vec<(AlphaMode, i32)> = list
            .calls
            .iter()
            .map(|c| (c.alpha_mode, c.camera_distance.round() as i32))
            .collect();
        assert_eq!(
            order,
            vec![
                (AlphaMode::Opaque, 20),
                (AlphaMode::Opaque, 10),
                (AlphaMode::Blend, 30),
                (AlphaMode::Blend, 5),
            ]
        );
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let mut scene = Scene::new();
        let mesh = unit_mesh(&mut scene);
        let a = scene.assets.add_material(Material::default());
        let b = scene.assets.add_material(Material::default());
        let root = Node::new("root")
            .with_child(Node::new("a").with_mesh(mesh, a))
            .with_child(Node::new("b").with_mesh(mesh, b));
        add_prefab(&mut scene, root, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));

        let list = RenderCallList::build(&scene, &camera_at_origin(), TransformComposition::RootOnly);
        assert_eq!(list.calls[0].material, a);
        assert_eq!(list.calls[1].material, b);
    }

    #[test]
    fn test_invisible_subtree_and_malformed_nodes() {
        let mut scene = Scene::new();
        let mesh = unit_mesh(&mut scene);
        let material = scene.assets.add_material(Material::default());
        let empty = scene
            .assets
            .add_mesh(Mesh::new("empty", MeshId(2), 0, Aabb::new(Vec3::ZERO, Vec3::ZERO)));
        let gone = scene.assets.add_material(Material::default());
        scene.assets.materials.remove(gone);

        let root = Node::new("root")
            .with_child(
                Node::new("hidden")
                    .hidden()
                    .with_mesh(mesh, material)
                    .with_child(Node::new("child").with_mesh(mesh, material)),
            )
            .with_child(Node::new("empty").with_mesh(empty, material))
            .with_child(Node::new("dangling").with_mesh(mesh, gone))
            .with_child(
                // no mesh of its own, children still visited
                Node::new("group").with_child(Node::new("leaf").with_mesh(mesh, material)),
            );
        add_prefab(&mut scene, root, Mat4::IDENTITY);

        let list = RenderCallList::build(&scene, &camera_at_origin(), TransformComposition::RootOnly);
        assert_eq!(list.len(), 1);
        assert_eq!(list.skipped, 2);
    }

    #[test]
    fn test_root_only_composition_ignores_intermediate_levels() {
        let mut scene = Scene::new();
        let mesh = unit_mesh(&mut scene);
        let material = scene.assets.add_material(Material::default());
        let offset = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let root = Node::new("root").with_child(
            Node::new("mid")
                .with_local(offset)
                .with_child(Node::new("leaf").with_local(offset).with_mesh(mesh, material)),
        );
        let model = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0));
        add_prefab(&mut scene, root, model);
        let camera = camera_at_origin();

        let flat = RenderCallList::build(&scene, &camera, TransformComposition::RootOnly);
        assert!((flat.calls[0].position() - Vec3::new(1.0, 0.0, -10.0)).length() < 1e-5);

        let nested = RenderCallList::build(&scene, &camera, TransformComposition::Accumulated);
        assert!((nested.calls[0].position() - Vec3::new(2.0, 0.0, -10.0)).length() < 1e-5);
    }

    #[test]
    fn test_nearest_reflection_probe() {
        let mut scene = Scene::new();
        let mesh = unit_mesh(&mut scene);
        let material = scene.assets.add_material(Material::default());
        let near = scene.add_entity(Entity::new(
            "near",
            Mat4::from_translation(Vec3::new(0.0, 0.0, -8.0)),
            EntityKind::ReflectionProbe(ReflectionProbeEntity::new(16)),
        ));
        scene.add_entity(Entity::new(
            "far",
            Mat4::from_translation(Vec3::new(0.0, 0.0, -50.0)),
            EntityKind::ReflectionProbe(ReflectionProbeEntity::new(16)),
        ));
        add_prefab(
            &mut scene,
            Node::new("root").with_mesh(mesh, material),
            Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0)),
        );

        let list = RenderCallList::build(&scene, &camera_at_origin(), TransformComposition::RootOnly);
        assert_eq!(list.calls[0].reflection_probe, Some(near));
    }

    #[test]
    fn test_nan_distance_does_not_break_ordering() {
        let mut scene = Scene::new();
        let mesh = unit_mesh(&mut scene);
        let material = scene.assets.add_material(Material::default());
        let template = RenderCall {
            mesh,
            material,
            model: Mat4::IDENTITY,
            world_bounds: Aabb::new(Vec3::ZERO, Vec3::ZERO),
            alpha_mode: AlphaMode::Opaque,
            camera_distance: f32::NAN,
            reflection_probe: None,
        };
        let mut calls = vec![
            template.clone(),
            RenderCall {
                camera_distance: 3.0,
                ..template.clone()
            },
            RenderCall {
                alpha_mode: AlphaMode::Blend,
                camera_distance: 1.0,
                ..template
            },
        ];
        calls.sort_by(compare_calls);
        assert_eq!(calls[2].alpha_mode, AlphaMode::Blend);
    }
}
