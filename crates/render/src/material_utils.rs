//! Material assignment over imported model hierarchies.
//!
//! Slots are keyed on each mesh's source material name, so reassigning a
//! model twice maps against the file's materials and not the previous pass.

use crate::material::Material;
use crate::object::Object3D;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Unique source materials in traversal order. Meshes without a source
/// material share the `None` slot.
pub fn source_material_slots(object: &Object3D) -> Vec<Option<String>> {
    let mut slots: Vec<Option<String>> = Vec::new();
    object.traverse(&mut |o| {
        if let Some(mesh) = o.mesh() {
            if !slots.contains(&mesh.source_material) {
                slots.push(mesh.source_material.clone());
            }
        }
    });
    slots
}

/// Assign `materials[i]` to every mesh whose source material is the i-th
/// unique slot. Slots past the list get `fallback`; with no fallback the
/// mesh keeps what it has.
pub fn apply_material_array(
    object: &mut Object3D,
    materials: &[Arc<Material>],
    fallback: Option<&Arc<Material>>,
) {
    let slots = source_material_slots(object);
    object.for_each_mesh_mut(&mut |mesh| {
        let index = slots.iter().position(|s| *s == mesh.source_material);
        let chosen = index.and_then(|i| materials.get(i)).or(fallback);
        if let Some(material) = chosen {
            mesh.material = Some(material.clone());
        }
    });
}

/// Assign by exact source material name, `fallback` elsewhere.
pub fn apply_material_map(
    object: &mut Object3D,
    map: &BTreeMap<String, Arc<Material>>,
    fallback: Option<&Arc<Material>>,
) {
    object.for_each_mesh_mut(&mut |mesh| {
        let chosen = mesh
            .source_material
            .as_deref()
            .and_then(|name| map.get(name))
            .or(fallback);
        if let Some(material) = chosen {
            mesh.material = Some(material.clone());
        }
    });
}

/// Assign `material` to every mesh, or only to meshes whose source material
/// is `only_source`.
pub fn replace_material(object: &mut Object3D, material: &Arc<Material>, only_source: Option<&str>) {
    object.for_each_mesh_mut(&mut |mesh| {
        let matches = only_source.is_none_or(|name| mesh.source_material.as_deref() == Some(name));
        if matches {
            mesh.material = Some(material.clone());
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialKind;
    use crate::object::{Geometry, MeshData, ObjectKind};

    fn mesh(name: &str, source: Option<&str>) -> Object3D {
        Object3D::new(
            name,
            ObjectKind::Mesh(MeshData {
                geometry: Geometry::Imported {
                    source: "m.obj".into(),
                    part: name.into(),
                },
                source_material: source.map(str::to_owned),
                material: None,
                vertex_count: 3,
            }),
        )
    }

    fn model() -> Object3D {
        Object3D::group("m")
            .with_child(mesh("a", Some("Wood")))
            .with_child(mesh("b", Some("Metal")))
            .with_child(mesh("c", Some("Wood")))
            .with_child(mesh("d", None))
    }

    fn mat(name: &str) -> Arc<Material> {
        Arc::new(Material::new(name, MaterialKind::Standard))
    }

    fn assigned(object: &Object3D) -> Vec<Option<String>> {
        object
            .children
            .iter()
            .map(|c| c.mesh().and_then(|m| m.material.as_ref()).map(|m| m.name.clone()))
            .collect()
    }

    #[test]
    fn slots_are_unique_in_traversal_order() {
        assert_eq!(
            source_material_slots(&model()),
            [Some("Wood".into()), Some("Metal".into()), None]
        );
    }

    #[test]
    fn array_assignment_is_positional_with_fallback() {
        let mut m = model();
        apply_material_array(&mut m, &[mat("oak"), mat("steel")], Some(&mat("grey")));
        assert_eq!(
            assigned(&m),
            [
                Some("oak".into()),
                Some("steel".into()),
                Some("oak".into()),
                Some("grey".into())
            ]
        );
    }

    #[test]
    fn map_assignment_matches_source_names() {
        let mut m = model();
        let map = BTreeMap::from([("Metal".to_string(), mat("steel"))]);
        apply_material_map(&mut m, &map, None);
        assert_eq!(assigned(&m), [None, Some("steel".into()), None, None]);
    }

    #[test]
    fn replace_can_target_one_source_material() {
        let mut m = model();
        replace_material(&mut m, &mat("walnut"), Some("Wood"));
        assert_eq!(
            assigned(&m),
            [Some("walnut".into()), None, Some("walnut".into()), None]
        );
        replace_material(&mut m, &mat("red"), None);
        assert!(assigned(&m).iter().all(|n| n.as_deref() == Some("red")));
    }
}
