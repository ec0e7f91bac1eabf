use crate::connection::SceneNodeConnection;
use scenecraft_assets::ModifierConfig;
use scenecraft_common::Transform;
use scenecraft_render::{Object3D, Scene, SceneItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Connection applied when a node is added to a graph: this node's
/// `receiver_key` receives `plug_key` of node `node`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreConnect {
    pub node: String,
    pub plug_key: String,
    pub receiver_key: String,
}

/// A loaded scene node: objects and connection endpoints under one root.
///
/// Objects and endpoints are direct children of the root; their transforms
/// are relative to it.
#[derive(Debug, Clone)]
pub struct SceneNode {
    key: String,
    pub root: Transform,
    objects: BTreeMap<String, Object3D>,
    connections: BTreeMap<String, SceneNodeConnection>,
    pub pre_connects: Vec<PreConnect>,
    modifiers: Vec<ModifierConfig>,
}

impl SceneNode {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            root: Transform::IDENTITY,
            objects: BTreeMap::new(),
            connections: BTreeMap::new(),
            pre_connects: Vec::new(),
            modifiers: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn add_object(&mut self, key: impl Into<String>, object: Object3D) {
        self.objects.insert(key.into(), object);
    }

    pub fn add_connection(&mut self, key: impl Into<String>, connection: SceneNodeConnection) {
        self.connections.insert(key.into(), connection);
    }

    pub fn add_modifier(&mut self, modifier: ModifierConfig) {
        self.modifiers.push(modifier);
    }

    pub fn object(&self, key: &str) -> Option<&Object3D> {
        self.objects.get(key)
    }

    pub fn object_mut(&mut self, key: &str) -> Option<&mut Object3D> {
        self.objects.get_mut(key)
    }

    pub fn objects(&self) -> &BTreeMap<String, Object3D> {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut Object3D> {
        self.objects.values_mut()
    }

    pub fn connection(&self, key: &str) -> Option<&SceneNodeConnection> {
        self.connections.get(key)
    }

    pub fn connection_mut(&mut self, key: &str) -> Option<&mut SceneNodeConnection> {
        self.connections.get_mut(key)
    }

    pub fn connections(&self) -> &BTreeMap<String, SceneNodeConnection> {
        &self.connections
    }

    pub fn modifiers(&self) -> &[ModifierConfig] {
        &self.modifiers
    }

    /// World transform of an endpoint.
    pub fn connection_world(&self, key: &str) -> Option<Transform> {
        let connection = self.connections.get(key)?;
        Some(self.root.mul_transform(&connection.object.transform))
    }

    /// Flatten this node into `scene` under a group named after the key.
    pub fn push_to_scene(&self, scene: &mut Scene) {
        scene.items.push(SceneItem {
            path: self.key.clone(),
            kind: "group",
            world: self.root,
            material: None,
        });
        for object in self.objects.values() {
            scene.push_object(&self.key, object, &self.root);
        }
        for connection in self.connections.values() {
            scene.push_object(&self.key, &connection.object, &self.root);
        }
    }
}
