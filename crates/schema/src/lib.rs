//! Declarative config schemas.
//!
//! A [`Schema`] is an ordered list of field rules compiled from YAML. Rules
//! may be literal or keyed on another field of the object under validation
//! through a value map (`{target, values}`).
//!
//! # Invariants
//! - Validation stops at the first failing field, in declaration order.
//! - Only `optional: useDefault` fields have their defaults written back.
//! - A null field counts as absent.

mod schema;

pub use schema::{
    DEFAULT_BUCKET, FieldRule, Presence, RuleValue, Schema, SchemaError, ValidationError,
    value_type,
};

use std::sync::LazyLock;

/// Built-in schema per config category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKey {
    TexturePack,
    Material,
    Model,
    Node,
    Modifier,
}

impl SchemaKey {
    pub fn name(self) -> &'static str {
        match self {
            SchemaKey::TexturePack => "TEXTURE_PACK",
            SchemaKey::Material => "MATERIAL",
            SchemaKey::Model => "MODEL",
            SchemaKey::Node => "NODE",
            SchemaKey::Modifier => "MODIFIER",
        }
    }

    fn source(self) -> &'static str {
        match self {
            SchemaKey::TexturePack => include_str!("../schemas/TEXTURE_PACK.yaml"),
            SchemaKey::Material => include_str!("../schemas/MATERIAL.yaml"),
            SchemaKey::Model => include_str!("../schemas/MODEL.yaml"),
            SchemaKey::Node => include_str!("../schemas/NODE.yaml"),
            SchemaKey::Modifier => include_str!("../schemas/MODIFIER.yaml"),
        }
    }
}

fn compile(key: SchemaKey) -> Schema {
    // Embedded sources are covered by tests; a broken one is a build defect.
    Schema::from_yaml_str(key.source())
        .unwrap_or_else(|e| panic!("built-in schema {} is invalid: {e}", key.name()))
}

static TEXTURE_PACK: LazyLock<Schema> = LazyLock::new(|| compile(SchemaKey::TexturePack));
static MATERIAL: LazyLock<Schema> = LazyLock::new(|| compile(SchemaKey::Material));
static MODEL: LazyLock<Schema> = LazyLock::new(|| compile(SchemaKey::Model));
static NODE: LazyLock<Schema> = LazyLock::new(|| compile(SchemaKey::Node));
static MODIFIER: LazyLock<Schema> = LazyLock::new(|| compile(SchemaKey::Modifier));

/// Compiled built-in schema, shared for the life of the process.
pub fn builtin(key: SchemaKey) -> &'static Schema {
    match key {
        SchemaKey::TexturePack => &TEXTURE_PACK,
        SchemaKey::Material => &MATERIAL,
        SchemaKey::Model => &MODEL,
        SchemaKey::Node => &NODE,
        SchemaKey::Modifier => &MODIFIER,
    }
}

/// Returns crate version information.
pub fn crate_info() -> &'static str {
    "scenecraft-schema v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::{Mapping, Value};

    const ALL: [SchemaKey; 5] = [
        SchemaKey::TexturePack,
        SchemaKey::Material,
        SchemaKey::Model,
        SchemaKey::Node,
        SchemaKey::Modifier,
    ];

    #[test]
    fn builtin_schemas_compile() {
        for key in ALL {
            assert!(!builtin(key).fields().is_empty(), "{}", key.name());
        }
    }

    #[test]
    fn model_schema_fills_rotation_defaults() {
        let mut object: Mapping = serde_yaml::from_str("source: chair.obj").unwrap();
        builtin(SchemaKey::Model).validate(&mut object).unwrap();
        assert_eq!(object.get("rotateX"), Some(&Value::Number(0.into())));
        assert_eq!(object.get("rotateLocal"), Some(&Value::Bool(false)));
    }

    #[test]
    fn hdri_pack_defaults_to_hdr_extension() {
        let mut object: Mapping = serde_yaml::from_str("type: hdri\nsources: [studio]").unwrap();
        builtin(SchemaKey::TexturePack).validate(&mut object).unwrap();
        assert_eq!(object.get("defaultExtension").and_then(Value::as_str), Some("hdr"));
    }

    #[test]
    fn texture_pack_accepts_vector_global_properties() {
        let mut object: Mapping =
            serde_yaml::from_str("sources: [a]\nglobalProperties:\n  repeat: [2, 2]\n  wrapS: repeat\n")
                .unwrap();
        builtin(SchemaKey::TexturePack).validate(&mut object).unwrap();
    }

    #[test]
    fn modifier_schema_requires_known_type() {
        let mut object: Mapping = serde_yaml::from_str("type: colour").unwrap();
        let err = builtin(SchemaKey::Modifier).validate(&mut object).unwrap_err();
        assert_eq!(err.key, "type");
    }

    #[test]
    fn material_schema_accepts_mixed_properties() {
        let mut object: Mapping = serde_yaml::from_str(
            "type: physical\nproperties:\n  color: '#ff0000'\n  roughness: 0.5\n",
        )
        .unwrap();
        builtin(SchemaKey::Material).validate(&mut object).unwrap();
    }

    #[test]
    fn crate_info_contains_name() {
        assert!(crate_info().contains("scenecraft-schema"));
    }
}
