//! Prefab node hierarchies

use glam::Mat4;

use crate::assets::{MaterialHandle, MeshHandle};

/// One transform node, optionally carrying a mesh and material
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    /// Transform relative to the parent node
    pub local: Mat4,
    /// Invisible nodes hide their whole subtree
    pub visible: bool,
    pub mesh: Option<MeshHandle>,
    pub material: Option<MaterialHandle>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local: Mat4::IDENTITY,
            visible: true,
            mesh: None,
            material: None,
            children: Vec::new(),
        }
    }

    pub fn with_local(mut self, local: Mat4) -> Self {
        self.local = local;
        self
    }

    pub fn with_mesh(mut self, mesh: MeshHandle, material: MaterialHandle) -> Self {
        self.mesh = Some(mesh);
        self.material = Some(material);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Count of nodes in this subtree, including self
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }
}

/// A reusable hierarchy placed in the scene by a prefab entity
#[derive(Clone, Debug)]
pub struct Prefab {
    pub name: String,
    pub root: Node,
}

impl Prefab {
    pub fn new(name: impl Into<String>, root: Node) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }
}
