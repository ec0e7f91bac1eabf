//! COLLADA scene descriptions.
//!
//! Only the parts a scene node needs are read: the material library (id ->
//! name), the light library and the visual scene nodes. A node named
//! `type:key` becomes an [`ObjectSpecification`]; other nodes only carry
//! their transform down to nested nodes.

use crate::connection::ConnectionKind;
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node};
use scenecraft_common::Transform;
use scenecraft_render::{Geometry, Light};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("malformed scene source: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("scene source has no visual scene library")]
    MissingScene,
    #[error("node {node}: bad matrix value '{value}'")]
    Matrix { node: String, value: String },
}

/// What a specification turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Empty,
    Model,
    Primitive(Primitive),
    PointLight,
    Connection(ConnectionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Cube,
    Plane,
    Sphere,
}

impl Primitive {
    pub fn geometry(self) -> Geometry {
        match self {
            Primitive::Cube => Geometry::Cube,
            Primitive::Plane => Geometry::Plane,
            Primitive::Sphere => Geometry::Sphere,
        }
    }
}

impl ObjectType {
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "empty" => ObjectType::Empty,
            "model" => ObjectType::Model,
            "primitive/cube" => ObjectType::Primitive(Primitive::Cube),
            "primitive/plane" => ObjectType::Primitive(Primitive::Plane),
            "primitive/sphere" => ObjectType::Primitive(Primitive::Sphere),
            "light/point" => ObjectType::PointLight,
            "connection/receiver" => ObjectType::Connection(ConnectionKind::Receiver),
            "connection/plug" => ObjectType::Connection(ConnectionKind::Plug),
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Empty => "empty",
            ObjectType::Model => "model",
            ObjectType::Primitive(Primitive::Cube) => "primitive/cube",
            ObjectType::Primitive(Primitive::Plane) => "primitive/plane",
            ObjectType::Primitive(Primitive::Sphere) => "primitive/sphere",
            ObjectType::PointLight => "light/point",
            ObjectType::Connection(ConnectionKind::Receiver) => "connection/receiver",
            ObjectType::Connection(ConnectionKind::Plug) => "connection/plug",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed node of a scene description.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSpecification {
    pub object_type: ObjectType,
    pub key: String,
    /// Relative to the scene root; ancestors are already composed in.
    pub transform: Transform,
    /// Material config keys in reference order.
    pub materials: Vec<String>,
    pub light: Light,
}

impl ObjectSpecification {
    pub fn new(object_type: ObjectType, key: impl Into<String>) -> Self {
        Self {
            object_type,
            key: key.into(),
            transform: Transform::IDENTITY,
            materials: Vec::new(),
            light: Light {
                intensity: 0.0,
                color: Vec3::ONE,
            },
        }
    }
}

/// A parsed scene description.
#[derive(Debug, Clone, Default)]
pub struct SceneSource {
    materials: BTreeMap<String, String>,
    specifications: Vec<ObjectSpecification>,
}

impl SceneSource {
    pub fn parse(text: &str) -> Result<Self, SceneError> {
        let document = Document::parse(text)?;
        let materials = material_library(&document);
        let lights = light_library(&document);
        let scenes = document
            .descendants()
            .find(|n| n.has_tag_name("library_visual_scenes"))
            .ok_or(SceneError::MissingScene)?;

        let mut source = Self {
            materials,
            specifications: Vec::new(),
        };
        for node in scenes.descendants().filter(|n| n.has_tag_name("visual_scene")) {
            for child in node.children().filter(|n| n.has_tag_name("node")) {
                source.collect(child, Mat4::IDENTITY, &lights)?;
            }
        }
        tracing::debug!(
            materials = source.materials.len(),
            objects = source.specifications.len(),
            "scene source parsed"
        );
        Ok(source)
    }

    fn collect(
        &mut self,
        node: Node<'_, '_>,
        parent: Mat4,
        lights: &BTreeMap<String, Light>,
    ) -> Result<(), SceneError> {
        let name = node.attribute("name").unwrap_or_default();
        let world = parent * node_matrix(node, name)?;

        if let Some(mut spec) = specification_header(name) {
            spec.transform = Transform::from_matrix(world);
            for element in own_elements(node) {
                if element.has_tag_name("instance_material") {
                    let referenced = element
                        .attribute("symbol")
                        .and_then(|id| self.materials.get(id));
                    if let Some(material) = referenced {
                        spec.materials.push(material.clone());
                    }
                } else if element.has_tag_name("instance_light") {
                    let id = element.attribute("url").unwrap_or_default();
                    if let Some(light) = lights.get(id.trim_start_matches('#')) {
                        spec.light = *light;
                    }
                }
            }
            self.insert(spec);
        } else if !name.is_empty() {
            tracing::debug!(node = name, "untyped scene node skipped");
        }

        for child in node.children().filter(|n| n.has_tag_name("node")) {
            self.collect(child, world, lights)?;
        }
        Ok(())
    }

    /// A repeated key replaces the earlier specification.
    fn insert(&mut self, spec: ObjectSpecification) {
        match self.specifications.iter_mut().find(|s| s.key == spec.key) {
            Some(existing) => {
                tracing::warn!(key = %spec.key, "duplicate scene object key");
                *existing = spec;
            }
            None => self.specifications.push(spec),
        }
    }

    /// Material id -> config key.
    pub fn material_dict(&self) -> &BTreeMap<String, String> {
        &self.materials
    }

    /// Distinct material config keys, minus `ignore`.
    pub fn material_keys(&self, ignore: &[String]) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for name in self.materials.values() {
            if !ignore.contains(name) && !keys.contains(name) {
                keys.push(name.clone());
            }
        }
        keys
    }

    pub fn model_keys(&self) -> Vec<String> {
        self.of_type(|t| t == ObjectType::Model)
            .map(|s| s.key.clone())
            .collect()
    }

    pub fn specifications(&self) -> &[ObjectSpecification] {
        &self.specifications
    }

    pub fn specification(&self, key: &str) -> Option<&ObjectSpecification> {
        self.specifications.iter().find(|s| s.key == key)
    }

    pub fn of_type(
        &self,
        filter: impl Fn(ObjectType) -> bool,
    ) -> impl Iterator<Item = &ObjectSpecification> {
        self.specifications
            .iter()
            .filter(move |s| filter(s.object_type))
    }
}

fn specification_header(name: &str) -> Option<ObjectSpecification> {
    let mut parts = name.split(':');
    let tag = parts.next()?.trim();
    let key = parts.next()?.trim();
    if key.is_empty() {
        return None;
    }
    let object_type = ObjectType::parse(tag)?;
    Some(ObjectSpecification::new(object_type, key))
}

/// Element descendants of `node` that do not belong to a nested node.
fn own_elements<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let mut found = Vec::new();
    let mut pending: Vec<Node<'a, 'input>> = node.children().filter(Node::is_element).collect();
    while let Some(element) = pending.pop() {
        if element.has_tag_name("node") {
            continue;
        }
        pending.extend(element.children().filter(Node::is_element));
        found.push(element);
    }
    found.reverse();
    found
}

/// Row-major `<matrix>` text; missing trailing values keep identity.
fn node_matrix(node: Node<'_, '_>, name: &str) -> Result<Mat4, SceneError> {
    let Some(text) = node
        .children()
        .find(|n| n.has_tag_name("matrix"))
        .and_then(|n| n.text())
    else {
        return Ok(Mat4::IDENTITY);
    };
    let mut rows = Mat4::IDENTITY.to_cols_array();
    for (slot, value) in rows.iter_mut().zip(text.split_whitespace()) {
        *slot = value.parse().map_err(|_| SceneError::Matrix {
            node: name.to_owned(),
            value: value.to_owned(),
        })?;
    }
    Ok(Mat4::from_cols_array(&rows).transpose())
}

fn material_library(document: &Document<'_>) -> BTreeMap<String, String> {
    let mut materials = BTreeMap::new();
    for library in document
        .descendants()
        .filter(|n| n.has_tag_name("library_materials"))
    {
        for material in library.children().filter(|n| n.has_tag_name("material")) {
            let Some(id) = material.attribute("id") else {
                continue;
            };
            let name = material.attribute("name").unwrap_or(id);
            materials.insert(id.to_owned(), name.to_owned());
        }
    }
    materials
}

fn light_library(document: &Document<'_>) -> BTreeMap<String, Light> {
    let mut lights = BTreeMap::new();
    for light in document
        .descendants()
        .filter(|n| n.has_tag_name("light") && n.parent().is_some_and(|p| p.has_tag_name("library_lights")))
    {
        let Some(id) = light.attribute("id") else {
            continue;
        };
        let mut properties = Light {
            intensity: 0.0,
            color: Vec3::ONE,
        };
        for element in light.descendants() {
            let text = element.text().unwrap_or_default();
            if element.has_tag_name("constant_attenuation") {
                if let Ok(intensity) = text.trim().parse() {
                    properties.intensity = intensity;
                }
            } else if element.has_tag_name("color") {
                let rgb: Vec<f32> = text
                    .split_whitespace()
                    .filter_map(|v| v.parse().ok())
                    .collect();
                if let &[r, g, b, ..] = rgb.as_slice() {
                    properties.color = Vec3::new(r, g, b);
                }
            }
        }
        lights.insert(id.to_owned(), properties);
    }
    lights
}
